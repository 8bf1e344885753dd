use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{types::Json, FromRow};

use crate::{
    entities::project::{ProjectId, ProjectInsert, ProjectRecord, StoredProject},
    errors::{AppError, StoreError},
    repositories::sqlx_repo::SqlxProjectRepo,
};

/// Document store holding project records. Listing carries no ordering
/// guarantee.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn check_connection(&self) -> Result<(), AppError>;
    /// Assigns `id` and `createdAt`.
    async fn create_project(&self, project: &ProjectInsert) -> Result<ProjectRecord, AppError>;
    async fn list_projects(&self) -> Result<Vec<ProjectRecord>, AppError>;
    async fn get_project(&self, id: &ProjectId) -> Result<Option<ProjectRecord>, AppError>;
    /// Replaces the whole stored document. `NotFound` when the id is unknown.
    async fn save_project(&self, project: &ProjectRecord) -> Result<(), AppError>;
    /// `false` when nothing was deleted.
    async fn delete_project(&self, id: &ProjectId) -> Result<bool, AppError>;
}

#[async_trait]
impl<R> ProjectRepository for Arc<R>
where
    R: ProjectRepository + ?Sized,
{
    async fn check_connection(&self) -> Result<(), AppError> {
        (**self).check_connection().await
    }

    async fn create_project(&self, project: &ProjectInsert) -> Result<ProjectRecord, AppError> {
        (**self).create_project(project).await
    }

    async fn list_projects(&self) -> Result<Vec<ProjectRecord>, AppError> {
        (**self).list_projects().await
    }

    async fn get_project(&self, id: &ProjectId) -> Result<Option<ProjectRecord>, AppError> {
        (**self).get_project(id).await
    }

    async fn save_project(&self, project: &ProjectRecord) -> Result<(), AppError> {
        (**self).save_project(project).await
    }

    async fn delete_project(&self, id: &ProjectId) -> Result<bool, AppError> {
        (**self).delete_project(id).await
    }
}

#[derive(Debug, FromRow)]
struct ProjectRow {
    id: String,
    document: Json<Value>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProjectRow> for ProjectRecord {
    type Error = StoreError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        let stored: StoredProject = serde_json::from_value(row.document.0)?;
        let mut record = ProjectRecord::from_stored(ProjectId(row.id), stored);
        record.created_at = Some(row.created_at);
        Ok(record)
    }
}

impl SqlxProjectRepo {
    pub fn new(pool: sqlx::PgPool) -> Self {
        SqlxProjectRepo { pool }
    }
}

#[async_trait]
impl ProjectRepository for SqlxProjectRepo {
    async fn check_connection(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(AppError::from)
    }

    async fn create_project(&self, project: &ProjectInsert) -> Result<ProjectRecord, AppError> {
        let created_at = project.record.created_at.unwrap_or_else(Utc::now);
        let mut document = project.record.to_document()?;
        if let Value::Object(map) = &mut document {
            map.insert("createdAt".to_string(), serde_json::to_value(created_at).map_err(StoreError::from)?);
        }

        let row: ProjectRow = sqlx::query_as(
            r#"
            INSERT INTO projects (document, created_at)
            VALUES ($1, $2)
            RETURNING id, document, created_at
            "#,
        )
        .bind(Json(document))
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;

        let record = ProjectRecord::try_from(row)?;
        tracing::info!(project_id = %record.id, "Project created");
        Ok(record)
    }

    async fn list_projects(&self) -> Result<Vec<ProjectRecord>, AppError> {
        let rows: Vec<ProjectRow> = sqlx::query_as("SELECT id, document, created_at FROM projects")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| ProjectRecord::try_from(row).map_err(AppError::from))
            .collect()
    }

    async fn get_project(&self, id: &ProjectId) -> Result<Option<ProjectRecord>, AppError> {
        let row: Option<ProjectRow> =
            sqlx::query_as("SELECT id, document, created_at FROM projects WHERE id = $1")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        row.map(ProjectRecord::try_from)
            .transpose()
            .map_err(AppError::from)
    }

    async fn save_project(&self, project: &ProjectRecord) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE projects
            SET document = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(project.id.as_str())
        .bind(Json(project.to_document()?))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::project_not_found(project.id.as_str()));
        }
        Ok(())
    }

    async fn delete_project(&self, id: &ProjectId) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
