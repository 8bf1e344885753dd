use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;

pub static START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

/// Seconds a health report is served from cache.
pub const HEALTH_CACHE_SECONDS: i64 = 5;

/// Upper bound on edits accepted in one block edit request.
pub const MAX_EDIT_BATCH: usize = 200;

/// Largest JSON body accepted by the API.
pub const MAX_JSON_PAYLOAD_BYTES: usize = 2 * 1024 * 1024;
