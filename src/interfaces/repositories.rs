pub mod image_store;
pub mod memory;
pub mod project;
pub mod sqlx_repo;
