
use reqwest::StatusCode;
use serde_json::{json, Value};
use test_utils::*;

#[actix_rt::test]
async fn health_check_reports_record_store() {
    let app = TestApp::spawn().await;

    let (status, body) = app.get_json("/api/v1/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["record_store"]["reachable"], true);
}

#[actix_rt::test]
async fn create_project_returns_201_with_assigned_id() {
    let app = TestApp::spawn().await;

    let response = app.create_project(&project_payload("Portfolio")).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await.unwrap();
    assert_eq!(created["id"], "1");
    assert_eq!(created["name"], "Portfolio");
    assert!(created["createdAt"].is_string());
}

#[actix_rt::test]
async fn create_project_rejects_zero_team_size() {
    let app = TestApp::spawn().await;
    let mut payload = project_payload("Broken");
    payload["teamSize"] = json!(0);

    let response = app.create_project(&payload).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "validation_error");
}

#[actix_rt::test]
async fn malformed_json_body_is_a_bad_request() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(app.url("/api/v1/projects"))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "invalid_input");
}

#[actix_rt::test]
async fn list_is_ordered_by_descending_id_with_counts() {
    let app = TestApp::spawn().await;
    for name in ["First", "Second", "Third"] {
        app.insert_project(&project_payload(name)).await;
    }

    let (status, body) = app.get_json("/api/v1/projects").await;

    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["projects"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["3", "2", "1"]);
    assert_eq!(body["summary"], "Showing 3 of 3 projects");
}

#[actix_rt::test]
async fn list_applies_search_and_filters() {
    let app = TestApp::spawn().await;
    app.insert_project(&project_payload("Weather App")).await;
    let mut advanced = project_payload("Compiler");
    advanced["difficulty"] = json!("advanced");
    advanced["languages"] = json!(["Rust", "C"]);
    app.insert_project(&advanced).await;

    let (_, body) = app.get_json("/api/v1/projects?search=weather").await;
    assert_eq!(body["showing"], 1);
    assert_eq!(body["total"], 2);
    assert_eq!(body["projects"][0]["name"], "Weather App");

    let (_, body) = app.get_json("/api/v1/projects?difficulty=advanced&technology=C").await;
    assert_eq!(body["showing"], 1);
    assert_eq!(body["projects"][0]["name"], "Compiler");

    let (_, body) = app.get_json("/api/v1/projects?projectType=client").await;
    assert_eq!(body["showing"], 0);
    assert_eq!(body["summary"], "Showing 0 of 2 projects");
}

#[actix_rt::test]
async fn detail_includes_labels_links_and_neighbors() {
    let app = TestApp::spawn().await;
    app.insert_project(&project_payload("Older")).await;
    let mut payload = project_payload("Newer");
    payload["githubUrl"] = json!("https://github.com/example/newer");
    payload["includeGitHub"] = json!(false);
    payload["liveUrl"] = json!("https://newer.example.com");
    payload["blocks"] = json!([
        {"id": "b1", "type": "text", "content": "Hello"},
        {"id": "b2", "type": "carousel", "content": "?"}
    ]);
    let id = app.insert_project(&payload).await;

    let (status, body) = app.get_json(&format!("/api/v1/projects/{}", id)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["labels"]["team"], "Solo Project");
    assert_eq!(body["labels"]["difficulty"], "Beginner");
    let links = body["links"].as_array().unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0]["kind"], "live");
    assert_eq!(body["renderedBlocks"].as_array().unwrap().len(), 1);
    assert_eq!(body["neighbors"]["previous"], Value::Null);
    assert_eq!(body["neighbors"]["next"], "1");
}

#[actix_rt::test]
async fn missing_project_is_404() {
    let app = TestApp::spawn().await;

    let (status, body) = app.get_json("/api/v1/projects/999").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
    assert_eq!(body["id"], "999");
}

#[actix_rt::test]
async fn patch_updates_metadata_and_keeps_blocks() {
    let app = TestApp::spawn().await;
    let mut payload = project_payload("Draft");
    payload["blocks"] = json!([{"id": "b1", "type": "text", "content": "Body"}]);
    let id = app.insert_project(&payload).await;

    let response = app
        .client
        .patch(app.url(&format!("/api/v1/projects/{}", id)))
        .json(&json!({"name": "Final", "difficulty": null}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["name"], "Final");
    assert_eq!(updated["difficulty"], Value::Null);
    assert_eq!(updated["description"], "Draft description");
    assert_eq!(updated["blocks"][0]["id"], "b1");
}

#[actix_rt::test]
async fn delete_removes_project() {
    let app = TestApp::spawn().await;
    let id = app.insert_project(&project_payload("Temporary")).await;

    let response = app
        .client
        .delete(app.url(&format!("/api/v1/projects/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (status, _) = app.get_json(&format!("/api/v1/projects/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let response = app
        .client
        .delete(app.url(&format!("/api/v1/projects/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn seeded_store_serves_legacy_documents() {
    let app = TestApp::spawn_with_seed(json!({
        "7": {
            "name": "Legacy",
            "description": "Imported",
            "link": "https://legacy.example.com",
            "teamSize": 3,
            "blocks": {
                "1": {"id": "b2", "type": "text", "content": "second"},
                "0": {"id": "b1", "type": "title", "content": "first"}
            }
        }
    }))
    .await;

    let (status, body) = app.get_json("/api/v1/projects/7").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["labels"]["team"], "Team Size: 3");
    assert_eq!(body["project"]["liveUrl"], "https://legacy.example.com");
    assert_eq!(body["project"]["blocks"][0]["id"], "b1");
    assert_eq!(body["project"]["blocks"][1]["id"], "b2");
}

#[actix_rt::test]
async fn create_rejects_invalid_or_repeated_block_ids() {
    let app = TestApp::spawn().await;

    let mut payload = project_payload("Blocks");
    payload["blocks"] = json!([
        {"id": "a", "type": "text"},
        {"type": "text"},
        {"id": "c", "type": "text"}
    ]);
    let response = app.create_project(&payload).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "validation_error");
    assert_eq!(body["details"][0]["field"], "blocks[1]");

    payload["blocks"] = json!([
        {"id": "a", "type": "text"},
        {"id": "a", "type": "quote"}
    ]);
    let response = app.create_project(&payload).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["details"][0]["field"], "blocks[1]");

    let (_, list) = app.get_json("/api/v1/projects").await;
    assert_eq!(list["total"], 0);
}

#[actix_rt::test]
async fn patch_rejects_invalid_members_and_slideshow_urls() {
    let app = TestApp::spawn().await;
    let id = app.insert_project(&project_payload("Team")).await;

    let response = app
        .client
        .patch(app.url(&format!("/api/v1/projects/{}", id)))
        .json(&json!({
            "teamMembers": [{"name": "", "socialUrl": "javascript:alert(1)"}],
            "slideshowImages": ["not a url"]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"slideshow_images"));
    assert!(fields.contains(&"team_members[0].social_url"));

    let (_, detail) = app.get_json(&format!("/api/v1/projects/{}", id)).await;
    assert_eq!(detail["project"]["teamMembers"], json!([]));
}

#[actix_rt::test]
async fn relative_image_references_resolve_against_public_base() {
    let app = TestApp::spawn_with_seed(json!({
        "1": {
            "name": "Gallery",
            "description": "Pictures",
            "bannerImage": "images/1_a.png",
            "slideshowImages": {"0": "images/2_b.png", "1": "https://cdn.example.com/c.png"},
            "blocks": [{"id": "pic", "type": "image", "content": "images/3_c.png"}]
        }
    }))
    .await;
    let base = format!("{}/uploads", app.address);

    let (status, detail) = app.get_json("/api/v1/projects/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["project"]["bannerImage"], format!("{}/images/1_a.png", base));
    assert_eq!(
        detail["project"]["slideshowImages"],
        json!([format!("{}/images/2_b.png", base), "https://cdn.example.com/c.png"])
    );
    assert_eq!(detail["renderedBlocks"][0]["body"]["src"], format!("{}/images/3_c.png", base));

    let (_, list) = app.get_json("/api/v1/projects").await;
    assert_eq!(list["projects"][0]["bannerImage"], format!("{}/images/1_a.png", base));

    let (_, view) = app.get_json("/api/v1/projects/1/blocks").await;
    assert_eq!(view["blocks"][0]["body"]["src"], format!("{}/images/3_c.png", base));
}
