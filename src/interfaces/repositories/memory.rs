use std::{
    collections::HashSet,
    path::Path,
    sync::atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;

use crate::{
    entities::project::{ProjectId, ProjectInsert, ProjectRecord, StoredProject},
    errors::{AppError, StoreError},
    repositories::project::ProjectRepository,
};

/// Process-local record store. Ids are numeric strings handed out in
/// increasing order.
#[derive(Debug)]
pub struct InMemoryProjectRepo {
    projects: DashMap<String, ProjectRecord>,
    next_id: AtomicU64,
}

impl InMemoryProjectRepo {
    pub fn new() -> Self {
        InMemoryProjectRepo {
            projects: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Seeds the store from a static JSON export: either an object keyed by
    /// id, or an array whose entries carry their own `id` (falling back to
    /// their 1-based position).
    pub fn from_json(seed: Value) -> Result<Self, StoreError> {
        let repo = Self::new();
        let entries: Vec<(String, Value)> = match seed {
            Value::Object(map) => map.into_iter().collect(),
            Value::Array(items) => array_seed_entries(items),
            _ => Vec::new(),
        };

        for (id, document) in entries {
            let stored: StoredProject = serde_json::from_value(document)?;
            repo.insert(ProjectRecord::from_stored(ProjectId(id), stored));
        }

        tracing::info!(count = repo.projects.len(), "Seeded in-memory project store");
        Ok(repo)
    }

    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await.map_err(StoreError::Io)?;
        let seed: Value = serde_json::from_str(&raw)?;
        Self::from_json(seed)
    }

    fn insert(&self, record: ProjectRecord) {
        if let Some(n) = record.id.numeric().and_then(|n| u64::try_from(n).ok()) {
            self.next_id.fetch_max(n + 1, Ordering::SeqCst);
        }
        self.projects.insert(record.id.0.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

fn embedded_id(item: &Value) -> Option<String> {
    match item.get("id") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Pairs array entries with ids. Explicit ids win: a positional id already
/// claimed elsewhere is moved past every id in use, and a repeated explicit
/// id keeps only its first entry.
fn array_seed_entries(items: Vec<Value>) -> Vec<(String, Value)> {
    let explicit: HashSet<String> = items.iter().filter_map(embedded_id).collect();
    let mut taken: HashSet<String> = HashSet::with_capacity(items.len());
    let mut entries = Vec::with_capacity(items.len());

    for (index, item) in items.into_iter().enumerate() {
        let id = match embedded_id(&item) {
            Some(id) => id,
            None => {
                let position = (index + 1).to_string();
                if explicit.contains(&position) || taken.contains(&position) {
                    let free = explicit
                        .iter()
                        .chain(taken.iter())
                        .filter_map(|id| id.parse::<u64>().ok())
                        .max()
                        .unwrap_or(0)
                        + 1;
                    tracing::warn!(index, position = %position, assigned = free, "Seed position id already in use");
                    free.to_string()
                } else {
                    position
                }
            }
        };

        if !taken.insert(id.clone()) {
            tracing::warn!(index, id = %id, "Skipping seed entry with duplicate id");
            continue;
        }
        entries.push((id, item));
    }
    entries
}

impl Default for InMemoryProjectRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProjectRepository for InMemoryProjectRepo {
    async fn check_connection(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn create_project(&self, project: &ProjectInsert) -> Result<ProjectRecord, AppError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        let mut record = project.record.clone();
        record.id = ProjectId(id.clone());
        record.created_at = Some(record.created_at.unwrap_or_else(Utc::now));

        self.projects.insert(id, record.clone());
        tracing::info!(project_id = %record.id, "Project created");
        Ok(record)
    }

    async fn list_projects(&self) -> Result<Vec<ProjectRecord>, AppError> {
        Ok(self.projects.iter().map(|entry| entry.value().clone()).collect())
    }

    async fn get_project(&self, id: &ProjectId) -> Result<Option<ProjectRecord>, AppError> {
        Ok(self.projects.get(id.as_str()).map(|entry| entry.value().clone()))
    }

    async fn save_project(&self, project: &ProjectRecord) -> Result<(), AppError> {
        match self.projects.get_mut(project.id.as_str()) {
            Some(mut existing) => {
                let created_at = existing.created_at;
                *existing = project.clone();
                existing.created_at = created_at;
                Ok(())
            }
            None => Err(AppError::project_not_found(project.id.as_str())),
        }
    }

    async fn delete_project(&self, id: &ProjectId) -> Result<bool, AppError> {
        Ok(self.projects.remove(id.as_str()).is_some())
    }
}
