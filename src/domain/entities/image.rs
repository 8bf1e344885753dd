use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

static UNSAFE_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9.]").expect("valid regex"));

/// Result of a successful upload: where the image can be fetched from and
/// the opaque key the store knows it by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub url: String,
    pub reference: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
}

// For upload requests
#[derive(Debug, Validate)]
pub struct ImageUploadRequest {
    pub file_data: Vec<u8>,
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,
}

/// Storage key for an upload: `images/<millis>_<name>` where every character
/// outside `[a-zA-Z0-9.]` in the name becomes `_`.
pub fn storage_key(file_name: &str, now: DateTime<Utc>) -> String {
    format!("images/{}_{}", now.timestamp_millis(), sanitize_upload_name(file_name))
}

pub fn sanitize_upload_name(file_name: &str) -> String {
    UNSAFE_NAME_CHARS.replace_all(file_name, "_").into_owned()
}

/// Absolute URLs pass through; anything else is treated as a store key and
/// resolved against `base_url`.
pub fn resolve_image_url(reference: &str, base_url: &str) -> String {
    if reference.starts_with("http") {
        return reference.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        reference.trim_start_matches('/')
    )
}
