use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::entities::project::{Difficulty, ProjectId, ProjectRecord, ProjectType};

/// Active list filters. Empty strings count as "not set"; all set filters
/// must match.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectFilter {
    #[serde(alias = "search")]
    pub search_term: Option<String>,
    pub difficulty: Option<String>,
    pub project_type: Option<String>,
    pub technology: Option<String>,
}

impl ProjectFilter {
    pub fn is_empty(&self) -> bool {
        [&self.search_term, &self.difficulty, &self.project_type, &self.technology]
            .iter()
            .all(|f| active(f).is_none())
    }

    pub fn matches(&self, record: &ProjectRecord) -> bool {
        if let Some(term) = active(&self.search_term) {
            let term = term.to_lowercase();
            let hit = record.name.to_lowercase().contains(&term)
                || record.description.to_lowercase().contains(&term)
                || record.topics.iter().any(|t| t.to_lowercase().contains(&term));
            if !hit {
                return false;
            }
        }

        if let Some(difficulty) = active(&self.difficulty) {
            if record.difficulty.as_ref().map(Difficulty::as_str) != Some(difficulty) {
                return false;
            }
        }

        if let Some(project_type) = active(&self.project_type) {
            if record.project_type.as_ref().map(ProjectType::as_str) != Some(project_type) {
                return false;
            }
        }

        if let Some(technology) = active(&self.technology) {
            if !record.languages.iter().any(|l| l == technology) {
                return false;
            }
        }

        true
    }
}

fn active(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Matching records in input order. The input is never modified.
pub fn filter_projects<'a>(records: &'a [ProjectRecord], filter: &ProjectFilter) -> Vec<&'a ProjectRecord> {
    records.iter().filter(|r| filter.matches(r)).collect()
}

/// Default list order: descending numeric id. Ids that are not numeric sort
/// after all numeric ones, keeping their relative order.
pub fn sort_default(records: &mut [ProjectRecord]) {
    records.sort_by(|a, b| compare_ids_desc(&a.id, &b.id));
}

fn compare_ids_desc(a: &ProjectId, b: &ProjectId) -> Ordering {
    match (a.numeric(), b.numeric()) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Distinct values offered by the list view's filter controls, in first-seen
/// order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub difficulties: Vec<String>,
    pub project_types: Vec<String>,
    pub technologies: Vec<String>,
}

impl FilterOptions {
    pub fn collect(records: &[ProjectRecord]) -> Self {
        let mut options = FilterOptions::default();
        for record in records {
            if let Some(difficulty) = &record.difficulty {
                push_unique(&mut options.difficulties, difficulty.as_str());
            }
            if let Some(project_type) = &record.project_type {
                push_unique(&mut options.project_types, project_type.as_str());
            }
            for language in &record.languages {
                push_unique(&mut options.technologies, language);
            }
        }
        options
    }
}

fn push_unique(values: &mut Vec<String>, value: &str) {
    if !value.is_empty() && !values.iter().any(|v| v == value) {
        values.push(value.to_string());
    }
}

/// Previous and next records around `id` in display order. No wrap-around.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Neighbors {
    pub previous: Option<ProjectId>,
    pub next: Option<ProjectId>,
}

pub fn neighbors(ordered: &[ProjectRecord], id: &ProjectId) -> Neighbors {
    let Some(index) = ordered.iter().position(|r| &r.id == id) else {
        return Neighbors::default();
    };
    Neighbors {
        previous: index.checked_sub(1).map(|i| ordered[i].id.clone()),
        next: ordered.get(index + 1).map(|r| r.id.clone()),
    }
}
