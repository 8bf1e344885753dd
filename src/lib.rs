use std::sync::Arc;

mod domain;
mod interfaces;
mod infrastructure;
pub mod errors;
pub mod settings;
pub mod constants;
pub mod graceful_shutdown;

pub use domain::{entities, rendering, use_cases};
pub use interfaces::{handlers, repositories, routes};
pub use infrastructure::{db, utils};

use repositories::{
    image_store::{ImageStore, LocalImageStore},
    memory::InMemoryProjectRepo,
    project::ProjectRepository,
    sqlx_repo::SqlxProjectRepo,
};
use settings::{AppConfig, StoreBackend};
use use_cases::{images::ImageHandler, projects::ProjectHandler};

pub struct AppState {
    pub project_handler: AppProjectHandler,
    pub image_handler: AppImageHandler,
}

pub type AppProjectHandler = ProjectHandler<Arc<dyn ProjectRepository>>;
pub type AppImageHandler = ImageHandler<Arc<dyn ImageStore>>;

impl AppState {
    pub fn new(
        config: &AppConfig,
        project_repo: Arc<dyn ProjectRepository>,
        image_store: Arc<dyn ImageStore>,
    ) -> Self {
        AppState {
            project_handler: ProjectHandler::new(project_repo)
                .with_image_base_url(config.image_base_url()),
            image_handler: ImageHandler::new(image_store, config.max_upload_bytes),
        }
    }
}

/// Opens the configured record store. Postgres runs pending migrations;
/// the memory store is seeded from `projects_seed_file` when set.
pub async fn init_project_store(config: &AppConfig) -> anyhow::Result<Arc<dyn ProjectRepository>> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let pool = db::postgres::create_pool(&config.database_url).await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!("Database migrations applied");
            Ok(Arc::new(SqlxProjectRepo::new(pool)))
        }
        StoreBackend::Memory => {
            let repo = match config.projects_seed_file.as_deref() {
                Some(path) if !path.trim().is_empty() => InMemoryProjectRepo::from_json_file(path).await?,
                _ => InMemoryProjectRepo::new(),
            };
            tracing::info!(projects = repo.len(), "Using in-memory project store");
            Ok(Arc::new(repo))
        }
    }
}

pub async fn init_image_store(config: &AppConfig) -> anyhow::Result<Arc<dyn ImageStore>> {
    let store = LocalImageStore::new(&config.upload_dir, config.image_base_url());
    store.initialize().await?;
    Ok(Arc::new(store))
}
