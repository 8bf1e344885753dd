use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use serde::Serialize;
use validator::Validate;

use crate::{
    constants::MAX_EDIT_BATCH,
    rendering::{self, code_download, render_blocks, CodeDownload, RenderMode, RenderedOutput},
    entities::{
        block::{Block, BlockId},
        project::{
            ExternalLink, NewProjectRequest, ProjectId, ProjectInsert, ProjectLabels, ProjectRecord,
            ProjectSummary, UpdateProjectRequest,
        },
    },
    errors::AppError,
    repositories::project::ProjectRepository,
    use_cases::{
        editor::{BlockEdit, BlockEditor, EditOutcome},
        filter::{filter_projects, neighbors, sort_default, FilterOptions, Neighbors, ProjectFilter},
    },
    utils::valid_id::valid_project_id,
};

// ───── API Response Models ──────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectListResponse {
    pub projects: Vec<ProjectSummary>,
    pub total: usize,
    pub showing: usize,
    pub summary: String,
    pub filter: ProjectFilter,
    pub options: FilterOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetail {
    pub project: ProjectRecord,
    pub labels: ProjectLabels,
    pub links: Vec<ExternalLink>,
    pub languages: Vec<String>,
    pub topics: Vec<String>,
    pub rendered_blocks: Vec<RenderedOutput>,
    pub html: String,
    pub neighbors: Neighbors,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockView {
    pub project_id: ProjectId,
    pub mode: RenderMode,
    pub blocks: Vec<RenderedOutput>,
    pub unsupported: Vec<BlockId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockEditResponse {
    pub project_id: ProjectId,
    pub outcomes: Vec<EditOutcome>,
    pub persisted: bool,
    pub blocks: Vec<Block>,
}

pub struct ProjectHandler<R>
where
    R: ProjectRepository,
{
    pub project_repo: R,
    image_base_url: Option<String>,
}

impl<R> ProjectHandler<R>
where
    R: ProjectRepository,
{
    pub fn new(project_repo: R) -> Self {
        ProjectHandler { project_repo, image_base_url: None }
    }

    /// Relative image references in display output are resolved against
    /// `base_url`.
    pub fn with_image_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.image_base_url = Some(base_url.into());
        self
    }

    fn for_display(&self, record: ProjectRecord) -> ProjectRecord {
        match &self.image_base_url {
            Some(base_url) => record.with_resolved_images(base_url),
            None => record,
        }
    }

    /// Creates a project record from validated input
    pub async fn create_project(&self, request: NewProjectRequest) -> Result<ProjectRecord, AppError> {
        let insert = ProjectInsert::try_from(request)?;
        self.project_repo.create_project(&insert).await
    }

    /// All records in default display order (descending numeric id)
    pub async fn list_projects(&self) -> Result<Vec<ProjectRecord>, AppError> {
        let mut records = self.project_repo.list_projects().await?;
        sort_default(&mut records);
        Ok(records)
    }

    /// Filtered list plus the counts and filter choices the list view shows
    pub async fn search_projects(&self, filter: ProjectFilter) -> Result<ProjectListResponse, AppError> {
        let records = self.list_projects().await?;
        let options = FilterOptions::collect(&records);
        let matched: Vec<ProjectSummary> = filter_projects(&records, &filter)
            .into_iter()
            .map(|record| self.for_display(record.clone()).to_summary())
            .collect();

        let total = records.len();
        let showing = matched.len();
        tracing::debug!(total, showing, "Filtered project list");

        Ok(ProjectListResponse {
            projects: matched,
            total,
            showing,
            summary: format!("Showing {} of {} projects", showing, total),
            filter,
            options,
        })
    }

    /// Retrieves one record by id
    pub async fn get_project(&self, id: &str) -> Result<ProjectRecord, AppError> {
        let id = valid_project_id(id)?;
        self.project_repo
            .get_project(&id)
            .await?
            .ok_or_else(|| AppError::project_not_found(id.as_str()))
    }

    /// Detail view: labels, gated links, read-only blocks and neighbours
    pub async fn project_detail(&self, id: &str) -> Result<ProjectDetail, AppError> {
        let id = valid_project_id(id)?;
        let records = self.list_projects().await?;
        let Some(project) = records.iter().find(|r| r.id == id).cloned() else {
            return Err(AppError::project_not_found(id.as_str()));
        };
        let project = self.for_display(project);

        let rendered_blocks = render_blocks(&project.blocks, RenderMode::ReadOnly);
        let html = rendering::to_html(&rendered_blocks);

        Ok(ProjectDetail {
            labels: project.labels(),
            links: project.visible_links(),
            languages: project.display_languages().into_iter().map(String::from).collect(),
            topics: project.display_topics().into_iter().map(String::from).collect(),
            neighbors: neighbors(&records, &id),
            rendered_blocks,
            html,
            project,
        })
    }

    /// Renders a record's blocks in the requested mode
    pub async fn render_project_blocks(&self, id: &str, mode: RenderMode) -> Result<BlockView, AppError> {
        let project = self.for_display(self.get_project(id).await?);
        let unsupported = project
            .blocks
            .iter()
            .filter(|b| !b.is_supported())
            .map(|b| b.id.clone())
            .collect();

        Ok(BlockView {
            blocks: render_blocks(&project.blocks, mode),
            project_id: project.id,
            mode,
            unsupported,
        })
    }

    /// Applies a batch of block edits in order and persists the whole record
    /// once if anything changed. A rejected edit aborts the batch unsaved.
    pub async fn apply_block_edits(&self, id: &str, edits: Vec<BlockEdit>) -> Result<BlockEditResponse, AppError> {
        if edits.len() > MAX_EDIT_BATCH {
            return Err(AppError::validation(
                "edits",
                format!("At most {} edits can be applied at once", MAX_EDIT_BATCH),
            ));
        }
        let mut project = self.get_project(id).await?;

        let changes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&changes);
        let mut editor = BlockEditor::new(project.id.as_str(), std::mem::take(&mut project.blocks))
            .with_observer(move |blocks| {
                counter.fetch_add(1, Ordering::SeqCst);
                tracing::trace!(blocks = blocks.len(), "Block sequence changed");
            });

        let mut outcomes = Vec::with_capacity(edits.len());
        for (index, edit) in edits.into_iter().enumerate() {
            let outcome = editor.apply(edit).map_err(|e| {
                AppError::validation(&format!("edits[{}]", index), e.to_string())
            })?;
            outcomes.push(outcome);
        }

        project.blocks = editor.into_blocks();
        let persisted = changes.load(Ordering::SeqCst) > 0;
        if persisted {
            self.project_repo.save_project(&project).await?;
            tracing::info!(project_id = %project.id, edits = outcomes.len(), "Saved block edits");
        }

        Ok(BlockEditResponse {
            project_id: project.id,
            outcomes,
            persisted,
            blocks: project.blocks,
        })
    }

    /// Updates record metadata; blocks and creation time are left alone
    pub async fn update_project(&self, id: &str, request: UpdateProjectRequest) -> Result<ProjectRecord, AppError> {
        request.validate()?;
        let mut project = self.get_project(id).await?;

        request
            .apply_to(&mut project)
            .map_err(|e| AppError::validation(&e.code, e.to_string()))?;

        self.project_repo.save_project(&project).await?;
        Ok(project)
    }

    /// Deletes a record by id
    pub async fn delete_project(&self, id: &str) -> Result<(), AppError> {
        let id = valid_project_id(id)?;
        if !self.project_repo.delete_project(&id).await? {
            return Err(AppError::project_not_found(id.as_str()));
        }
        tracing::info!(project_id = %id, "Project deleted");
        Ok(())
    }

    /// Source download for one code block
    pub async fn code_download(&self, id: &str, block_id: &str) -> Result<CodeDownload, AppError> {
        let project = self.get_project(id).await?;
        let block = project
            .blocks
            .iter()
            .find(|b| b.id.as_str() == block_id)
            .ok_or_else(|| AppError::block_not_found(block_id))?;

        code_download(block).ok_or_else(|| {
            AppError::InvalidInput(format!("Block '{}' is not a code block", block_id))
        })
    }
}
