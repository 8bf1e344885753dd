use crate::{entities::project::ProjectId, errors::AppError};

const MAX_ID_LENGTH: usize = 128;

/// Validates a record id taken from a request path. Ids are opaque, so this
/// only rejects values no store would ever have issued.
pub fn valid_project_id(id: &str) -> Result<ProjectId, AppError> {
    let trimmed = id.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_ID_LENGTH {
        return Err(AppError::InvalidInput("Invalid project id".to_string()));
    }
    if trimmed.chars().any(|c| c.is_control() || c == '/') {
        return Err(AppError::InvalidInput("Invalid project id".to_string()));
    }
    Ok(ProjectId(trimmed.to_string()))
}
