use std::{borrow::Cow, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError};

use crate::{
    entities::{
        block::{blocks_from_input, blocks_from_values, lenient_string, Block, BlockKind},
        image::resolve_image_url,
        option_fields::OptionField,
    },
    errors::{AppError, StoreError},
};

// ───── Constants ──────────────────────────────────────────────────────
const MAX_NAME_LENGTH: u64 = 120;
const MAX_DESCRIPTION_LENGTH: u64 = 5_000;
const MAX_TAGS: usize = 30;
const MAX_TAG_LENGTH: usize = 40;

// ───── Identity ───────────────────────────────────────────────────────

/// Opaque record id assigned by the store. The default list order relies on
/// ids being numeric strings assigned in increasing order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub String);

impl ProjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn numeric(&self) -> Option<i64> {
        self.0.trim().parse().ok()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(value: &str) -> Self {
        ProjectId(value.to_string())
    }
}

// ───── Enumerations with raw fallback ─────────────────────────────────

macro_rules! labelled_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => ($raw:literal, $label:literal)),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            /// A value outside the known set, kept verbatim.
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $raw,)+
                    $name::Other(raw) => raw,
                }
            }

            pub fn label(&self) -> Cow<'_, str> {
                match self {
                    $($name::$variant => Cow::Borrowed($label),)+
                    $name::Other(raw) => Cow::Borrowed(raw.as_str()),
                }
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                match raw.as_str() {
                    $($raw => $name::$variant,)+
                    _ => $name::Other(raw),
                }
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                $name::from(raw.to_string())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

labelled_enum! {
    ProjectType {
        Personal => ("personal", "Personal"),
        Fun => ("fun", "Fun"),
        Design => ("design", "Design"),
        Practice => ("practice", "Practice"),
        Client => ("client", "Client"),
        Group => ("group", "Group"),
        Challenge => ("challenge", "Challenge"),
        School => ("school", "School"),
        Hackathon => ("hackathon", "Hackathon"),
        OpenSource => ("open_source", "Open Source"),
        Portfolio => ("portfolio", "Portfolio"),
    }
}

labelled_enum! {
    ProjectStatus {
        Planning => ("planning", "Planning"),
        Started => ("started", "Started"),
        InProgress => ("in_progress", "In Progress"),
        Completed => ("completed", "Completed"),
        OnHold => ("on_hold", "On Hold"),
        Abandoned => ("abandoned", "Abandoned"),
    }
}

labelled_enum! {
    Difficulty {
        Beginner => ("beginner", "Beginner"),
        Intermediate => ("intermediate", "Intermediate"),
        Advanced => ("advanced", "Advanced"),
        Expert => ("expert", "Expert"),
    }
}

impl Difficulty {
    /// Unknown difficulties are shown with their first letter capitalized.
    pub fn display_label(&self) -> String {
        match self {
            Difficulty::Other(raw) => capitalize(raw),
            known => known.label().into_owned(),
        }
    }
}

fn capitalize(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ───── Record parts ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub role: String,
    #[serde(default)]
    #[validate(custom(function = "validate_url"))]
    pub social_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeInvested {
    pub value: f64,
    pub unit: String,
}

impl TimeInvested {
    /// Accepts either the structured `{value, unit}` form or the separate
    /// `completionTime` / `completionTimeUnit` scalars. The structured form
    /// wins when both are present.
    pub fn normalize(structured: Option<&Value>, scalar: Option<&Value>, scalar_unit: Option<&Value>) -> Option<Self> {
        if let Some(Value::Object(map)) = structured {
            let value = map.get("value").and_then(number_from_value);
            let unit = map.get("unit").and_then(string_from_value);
            if let (Some(value), Some(unit)) = (value, unit) {
                return Some(TimeInvested { value, unit });
            }
        }

        let value = scalar.and_then(number_from_value)?;
        let unit = scalar_unit.and_then(string_from_value)?;
        Some(TimeInvested { value, unit })
    }

    pub fn label(&self) -> String {
        if self.value.fract() == 0.0 {
            format!("{} {}", self.value as i64, self.unit)
        } else {
            format!("{} {}", self.value, self.unit)
        }
    }
}

fn number_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

// ───── Canonical record ───────────────────────────────────────────────

/// One portfolio entry. Absent optional fields serialize as explicit `null`
/// so a stored document reads back with the same optional-field semantics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub id: ProjectId,
    pub name: String,
    pub description: String,
    pub banner_image: Option<String>,
    pub slideshow_images: Vec<String>,
    pub languages: Vec<String>,
    pub custom_language: Option<String>,
    pub topics: Vec<String>,
    pub custom_topic: Option<String>,
    pub project_type: Option<ProjectType>,
    pub status: Option<ProjectStatus>,
    pub difficulty: Option<Difficulty>,
    pub team_size: Option<u32>,
    pub team_members: Vec<TeamMember>,
    pub time_invested: Option<TimeInvested>,
    pub live_url: Option<String>,
    pub github_url: Option<String>,
    pub codepen_url: Option<String>,
    #[serde(rename = "includeGitHub")]
    pub include_github: bool,
    #[serde(rename = "includeCodePen")]
    pub include_codepen: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Live,
    GitHub,
    CodePen,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternalLink {
    pub kind: LinkKind,
    pub url: String,
}

impl ProjectRecord {
    /// External links the record is allowed to show. GitHub and CodePen
    /// links need their `include*` flag set.
    pub fn visible_links(&self) -> Vec<ExternalLink> {
        let mut links = Vec::new();
        if let Some(url) = non_empty(&self.live_url) {
            links.push(ExternalLink { kind: LinkKind::Live, url: url.to_string() });
        }
        if self.include_github {
            if let Some(url) = non_empty(&self.github_url) {
                links.push(ExternalLink { kind: LinkKind::GitHub, url: url.to_string() });
            }
        }
        if self.include_codepen {
            if let Some(url) = non_empty(&self.codepen_url) {
                links.push(ExternalLink { kind: LinkKind::CodePen, url: url.to_string() });
            }
        }
        links
    }

    /// Languages for display, followed by the free-text custom language.
    pub fn display_languages(&self) -> Vec<&str> {
        with_custom(&self.languages, &self.custom_language)
    }

    pub fn display_topics(&self) -> Vec<&str> {
        with_custom(&self.topics, &self.custom_topic)
    }

    pub fn team_label(&self) -> Option<String> {
        self.team_size.map(|size| match size {
            1 => "Solo Project".to_string(),
            n => format!("Team Size: {}", n),
        })
    }

    pub fn labels(&self) -> ProjectLabels {
        ProjectLabels {
            project_type: self.project_type.as_ref().map(|t| t.label().into_owned()),
            status: self.status.as_ref().map(|s| s.label().into_owned()),
            difficulty: self.difficulty.as_ref().map(Difficulty::display_label),
            team: self.team_label(),
            time_invested: self.time_invested.as_ref().map(TimeInvested::label),
        }
    }

    pub fn to_summary(&self) -> ProjectSummary {
        ProjectSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            banner_image: self.banner_image.clone(),
            languages: self.display_languages().into_iter().map(String::from).collect(),
            topics: self.display_topics().into_iter().map(String::from).collect(),
            project_type: self.project_type.clone(),
            status: self.status.clone(),
            difficulty: self.difficulty.clone(),
            labels: self.labels(),
            created_at: self.created_at,
        }
    }

    /// Builds the canonical record from a stored document keyed by `id`.
    pub fn from_stored(id: ProjectId, raw: StoredProject) -> Self {
        let time_invested = TimeInvested::normalize(
            raw.time_invested.as_ref(),
            raw.completion_time.as_ref(),
            raw.completion_time_unit.as_ref(),
        );
        let blocks = blocks_from_values(raw.blocks.into_values(), id.as_str());

        ProjectRecord {
            name: raw.name.unwrap_or_default(),
            description: raw.description.unwrap_or_default(),
            banner_image: raw.banner_image.filter(|s| !s.is_empty()),
            slideshow_images: raw.slideshow_images.unwrap_or_default(),
            languages: raw.languages.unwrap_or_default(),
            custom_language: raw.custom_language.filter(|s| !s.is_empty()),
            topics: raw.topics.unwrap_or_default(),
            custom_topic: raw.custom_topic.filter(|s| !s.is_empty()),
            project_type: raw.project_type.filter(|s| !s.is_empty()).map(ProjectType::from),
            status: raw.status.filter(|s| !s.is_empty()).map(ProjectStatus::from),
            difficulty: raw.difficulty.filter(|s| !s.is_empty()).map(Difficulty::from),
            team_size: raw.team_size.as_ref().and_then(number_from_value).and_then(to_u32),
            team_members: raw.team_members.unwrap_or_default(),
            time_invested,
            live_url: raw.live_url.or(raw.link).filter(|s| !s.is_empty()),
            github_url: raw.github_url.filter(|s| !s.is_empty()),
            codepen_url: raw.codepen_url.filter(|s| !s.is_empty()),
            include_github: raw.include_github.unwrap_or(false),
            include_codepen: raw.include_codepen.unwrap_or(false),
            created_at: raw.created_at,
            blocks,
            id,
        }
    }

    /// Stored document for this record (no id; the store keys by id).
    pub fn to_document(&self) -> Result<Value, StoreError> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.remove("id");
        }
        Ok(value)
    }

    /// Rewrites stored image references (banner, slideshow and image-like
    /// blocks) into absolute URLs under `base_url`. Only for display; the
    /// store keeps the raw references.
    pub fn with_resolved_images(mut self, base_url: &str) -> Self {
        let resolve = |reference: &mut String| {
            if !reference.trim().is_empty() {
                *reference = resolve_image_url(reference, base_url);
            }
        };
        if let Some(banner) = self.banner_image.as_mut() {
            resolve(banner);
        }
        self.slideshow_images.iter_mut().for_each(resolve);
        self.blocks
            .iter_mut()
            .filter(|b| matches!(b.kind(), Some(BlockKind::Image | BlockKind::Gif | BlockKind::Icon)))
            .for_each(|b| resolve(&mut b.content));
        self
    }
}

fn to_u32(value: f64) -> Option<u32> {
    (value >= 0.0 && value <= u32::MAX as f64).then(|| value.round() as u32)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

fn with_custom<'a>(tags: &'a [String], custom: &'a Option<String>) -> Vec<&'a str> {
    let mut out: Vec<&str> = tags.iter().map(String::as_str).collect();
    if let Some(custom) = non_empty(custom) {
        if !out.contains(&custom) {
            out.push(custom);
        }
    }
    out
}

// ───── Stored document ────────────────────────────────────────────────

/// A project document exactly as the store hands it back: every field
/// optional, numbers possibly as strings, blocks as a list or an index-keyed
/// object.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoredProject {
    pub name: Option<String>,
    pub description: Option<String>,
    pub banner_image: Option<String>,
    #[serde(deserialize_with = "lenient_strings")]
    pub slideshow_images: Option<Vec<String>>,
    #[serde(deserialize_with = "lenient_strings")]
    pub languages: Option<Vec<String>>,
    pub custom_language: Option<String>,
    #[serde(deserialize_with = "lenient_strings")]
    pub topics: Option<Vec<String>>,
    pub custom_topic: Option<String>,
    pub project_type: Option<String>,
    pub status: Option<String>,
    pub difficulty: Option<String>,
    pub team_size: Option<Value>,
    #[serde(deserialize_with = "lenient_members")]
    pub team_members: Option<Vec<TeamMember>>,
    pub time_invested: Option<Value>,
    pub completion_time: Option<Value>,
    pub completion_time_unit: Option<Value>,
    pub live_url: Option<String>,
    pub link: Option<String>,
    pub github_url: Option<String>,
    pub codepen_url: Option<String>,
    #[serde(rename = "includeGitHub", alias = "includeGithub")]
    pub include_github: Option<bool>,
    #[serde(rename = "includeCodePen", alias = "includeCodepen")]
    pub include_codepen: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
    pub blocks: StoredBlocks,
}

#[derive(Debug, Default)]
pub struct StoredBlocks(Vec<Value>);

impl StoredBlocks {
    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

impl<'de> Deserialize<'de> for StoredBlocks {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(StoredBlocks(list_or_keyed(Value::deserialize(deserializer)?)))
    }
}

/// Stored lists come back either as arrays or as objects keyed by position.
/// Keyed entries are ordered numerically; anything else is an empty list.
fn list_or_keyed(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| match (a.parse::<u64>(), b.parse::<u64>()) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => a.cmp(b),
            });
            entries.into_iter().map(|(_, v)| v).collect()
        }
        _ => Vec::new(),
    }
}

fn lenient_strings<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        value => Some(
            list_or_keyed(value)
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
        ),
    })
}

/// Team member as stored; entries without a usable name are skipped.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StoredTeamMember {
    #[serde(deserialize_with = "lenient_string")]
    name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    role: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    social_url: Option<String>,
}

impl StoredTeamMember {
    fn into_member(self) -> Option<TeamMember> {
        let name = self.name.filter(|n| !n.trim().is_empty())?;
        Some(TeamMember {
            name,
            role: self.role.unwrap_or_default(),
            social_url: self.social_url.filter(|u| !u.trim().is_empty()),
        })
    }
}

fn lenient_members<'de, D>(deserializer: D) -> Result<Option<Vec<TeamMember>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        value => Some(
            list_or_keyed(value)
                .into_iter()
                .filter_map(|item| serde_json::from_value::<StoredTeamMember>(item).ok())
                .filter_map(StoredTeamMember::into_member)
                .collect(),
        ),
    })
}

// ───── API Response Models ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectLabels {
    pub project_type: Option<String>,
    pub status: Option<String>,
    pub difficulty: Option<String>,
    pub team: Option<String>,
    pub time_invested: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: ProjectId,
    pub name: String,
    pub description: String,
    pub banner_image: Option<String>,
    pub languages: Vec<String>,
    pub topics: Vec<String>,
    pub project_type: Option<ProjectType>,
    pub status: Option<ProjectStatus>,
    pub difficulty: Option<Difficulty>,
    pub labels: ProjectLabels,
    pub created_at: Option<DateTime<Utc>>,
}

// ───── Input & Validation Requests ──────────────────────────────────

/// Payload for creating a record. Duration may be sent in either shape.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct NewProjectRequest {
    #[validate(length(min = 1, max = MAX_NAME_LENGTH), custom(function = "validate_trimmed"))]
    pub name: String,

    #[validate(length(min = 1, max = MAX_DESCRIPTION_LENGTH))]
    pub description: String,

    #[validate(custom(function = "validate_url"))]
    pub banner_image: Option<String>,

    #[validate(custom(function = "validate_urls"))]
    pub slideshow_images: Vec<String>,

    #[validate(custom(function = "validate_tags"))]
    pub languages: Vec<String>,
    pub custom_language: Option<String>,

    #[validate(custom(function = "validate_tags"))]
    pub topics: Vec<String>,
    pub custom_topic: Option<String>,

    pub project_type: Option<String>,
    pub status: Option<String>,
    pub difficulty: Option<String>,

    #[validate(range(min = 1, message = "Team size must be a positive integer"))]
    pub team_size: Option<u32>,

    #[validate(nested)]
    pub team_members: Vec<TeamMember>,

    pub time_invested: Option<Value>,
    pub completion_time: Option<Value>,
    pub completion_time_unit: Option<Value>,

    #[validate(custom(function = "validate_url"))]
    pub live_url: Option<String>,
    #[validate(custom(function = "validate_url"))]
    pub link: Option<String>,
    #[validate(custom(function = "validate_url"))]
    pub github_url: Option<String>,
    #[validate(custom(function = "validate_url"))]
    pub codepen_url: Option<String>,

    #[serde(rename = "includeGitHub")]
    pub include_github: bool,
    #[serde(rename = "includeCodePen")]
    pub include_codepen: bool,

    pub blocks: Vec<Value>,
}

/// Validated create payload, ready for the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectInsert {
    pub record: ProjectRecord,
}

impl TryFrom<NewProjectRequest> for ProjectInsert {
    type Error = AppError;

    fn try_from(value: NewProjectRequest) -> Result<Self, Self::Error> {
        value.validate()?;

        let time_invested = TimeInvested::normalize(
            value.time_invested.as_ref(),
            value.completion_time.as_ref(),
            value.completion_time_unit.as_ref(),
        );

        // The store assigns the id; blocks are keyed by their own ids.
        let placeholder = ProjectId(String::new());
        let blocks = blocks_from_input(value.blocks).map_err(|(index, reason)| {
            AppError::validation(&format!("blocks[{}]", index), reason.to_string())
        })?;

        let record = ProjectRecord {
            id: placeholder,
            name: value.name,
            description: value.description,
            banner_image: value.banner_image.filter(|s| !s.is_empty()),
            slideshow_images: value.slideshow_images,
            languages: value.languages,
            custom_language: value.custom_language.filter(|s| !s.trim().is_empty()),
            topics: value.topics,
            custom_topic: value.custom_topic.filter(|s| !s.trim().is_empty()),
            project_type: value.project_type.filter(|s| !s.is_empty()).map(ProjectType::from),
            status: value.status.filter(|s| !s.is_empty()).map(ProjectStatus::from),
            difficulty: value.difficulty.filter(|s| !s.is_empty()).map(Difficulty::from),
            team_size: value.team_size,
            team_members: value.team_members,
            time_invested,
            live_url: value.live_url.or(value.link).filter(|s| !s.is_empty()),
            github_url: value.github_url.filter(|s| !s.is_empty()),
            codepen_url: value.codepen_url.filter(|s| !s.is_empty()),
            include_github: value.include_github,
            include_codepen: value.include_codepen,
            created_at: Some(Utc::now()),
            blocks,
        };

        Ok(ProjectInsert { record })
    }
}

/// PATCH payload for record metadata. Blocks are edited through the block
/// editor, never here.
#[derive(Debug, Clone, Deserialize, Validate, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = MAX_NAME_LENGTH))]
    pub name: OptionField<String>,
    #[validate(length(min = 1, max = MAX_DESCRIPTION_LENGTH))]
    pub description: OptionField<String>,
    #[validate(custom(function = "validate_optional_url_field"))]
    pub banner_image: OptionField<String>,
    #[validate(custom(function = "validate_optional_urls"))]
    pub slideshow_images: OptionField<Vec<String>>,
    pub languages: OptionField<Vec<String>>,
    pub custom_language: OptionField<String>,
    pub topics: OptionField<Vec<String>>,
    pub custom_topic: OptionField<String>,
    pub project_type: OptionField<String>,
    pub status: OptionField<String>,
    pub difficulty: OptionField<String>,
    pub team_size: OptionField<u32>,
    #[validate(nested)]
    pub team_members: OptionField<Vec<TeamMember>>,
    pub time_invested: OptionField<TimeInvested>,
    #[validate(custom(function = "validate_optional_url_field"))]
    pub live_url: OptionField<String>,
    #[validate(custom(function = "validate_optional_url_field"))]
    pub github_url: OptionField<String>,
    #[validate(custom(function = "validate_optional_url_field"))]
    pub codepen_url: OptionField<String>,
    #[serde(rename = "includeGitHub")]
    pub include_github: OptionField<bool>,
    #[serde(rename = "includeCodePen")]
    pub include_codepen: OptionField<bool>,
}

impl UpdateProjectRequest {
    /// Applies the patch. `createdAt`, `id` and `blocks` are never touched.
    pub fn apply_to(self, record: &mut ProjectRecord) -> Result<(), ValidationError> {
        if let OptionField::SetToValue(0) = self.team_size {
            return Err(new_validation_error("team_size_zero", "Team size must be a positive integer"));
        }
        if let Some(tags) = self.languages.value_ref() {
            validate_tags(tags)?;
        }
        if let Some(tags) = self.topics.value_ref() {
            validate_tags(tags)?;
        }

        self.name.apply_required(&mut record.name);
        self.description.apply_required(&mut record.description);
        self.banner_image.apply(&mut record.banner_image);
        self.slideshow_images.apply_or_default(&mut record.slideshow_images);
        self.languages.apply_or_default(&mut record.languages);
        self.custom_language.apply(&mut record.custom_language);
        self.topics.apply_or_default(&mut record.topics);
        self.custom_topic.apply(&mut record.custom_topic);
        self.project_type.map_value(ProjectType::from).apply(&mut record.project_type);
        self.status.map_value(ProjectStatus::from).apply(&mut record.status);
        self.difficulty.map_value(Difficulty::from).apply(&mut record.difficulty);
        self.team_size.apply(&mut record.team_size);
        self.team_members.apply_or_default(&mut record.team_members);
        self.time_invested.apply(&mut record.time_invested);
        self.live_url.apply(&mut record.live_url);
        self.github_url.apply(&mut record.github_url);
        self.codepen_url.apply(&mut record.codepen_url);
        self.include_github.apply_or_default(&mut record.include_github);
        self.include_codepen.apply_or_default(&mut record.include_codepen);
        Ok(())
    }
}

// ───── Validation Helpers ───────────────────────────────────────────

pub fn validate_url(url: &str) -> Result<(), ValidationError> {
    match url::Url::parse(url) {
        Ok(parsed) => {
            if parsed.scheme() == "http" || parsed.scheme() == "https" {
                Ok(())
            } else {
                Err(new_validation_error("invalid_url_scheme", "URL must start with http:// or https://"))
            }
        }
        Err(_) => Err(new_validation_error("invalid_url", "Invalid URL format")),
    }
}

pub fn validate_urls(urls: &[String]) -> Result<(), ValidationError> {
    urls.iter().try_for_each(|url| validate_url(url))
}

pub fn validate_optional_url_field(value: &OptionField<String>) -> Result<(), ValidationError> {
    if let OptionField::SetToValue(url) = value {
        validate_url(url)?;
    }
    Ok(())
}

pub fn validate_optional_urls(value: &OptionField<Vec<String>>) -> Result<(), ValidationError> {
    match value {
        OptionField::SetToValue(urls) => validate_urls(urls),
        _ => Ok(()),
    }
}

pub fn validate_tags(tags: &[String]) -> Result<(), ValidationError> {
    if tags.len() > MAX_TAGS {
        return Err(new_validation_error("too_many_tags", "Too many tags provided"));
    }
    for tag in tags {
        if tag.trim().is_empty() || tag.len() > MAX_TAG_LENGTH {
            return Err(new_validation_error("invalid_tag_length", "Tag length must be within allowed range"));
        }
    }
    Ok(())
}

pub fn validate_trimmed(value: &str) -> Result<(), ValidationError> {
    if value.trim().len() != value.len() {
        return Err(new_validation_error("whitespace", "Value must not have leading or trailing whitespace"));
    }
    Ok(())
}

fn new_validation_error(code: &'static str, msg: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(msg));
    err
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn stored(value: Value) -> StoredProject {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn unknown_enum_values_fall_back_to_raw_string() {
        let kind = ProjectType::from("game_jam");
        assert_eq!(kind, ProjectType::Other("game_jam".into()));
        assert_eq!(kind.label(), "game_jam");
        assert_eq!(ProjectType::from("open_source").label(), "Open Source");
        assert_eq!(ProjectStatus::from("in_progress").label(), "In Progress");
        assert_eq!(Difficulty::from("legendary").display_label(), "Legendary");
    }

    #[test]
    fn both_duration_shapes_normalize_to_one() {
        let structured = ProjectRecord::from_stored(
            "1".into(),
            stored(json!({"name": "a", "timeInvested": {"value": 3, "unit": "weeks"}})),
        );
        let scalar = ProjectRecord::from_stored(
            "2".into(),
            stored(json!({"name": "b", "completionTime": "3", "completionTimeUnit": "weeks"})),
        );

        let expected = Some(TimeInvested { value: 3.0, unit: "weeks".into() });
        assert_eq!(structured.time_invested, expected);
        assert_eq!(scalar.time_invested, expected);
        assert_eq!(scalar.labels().time_invested.as_deref(), Some("3 weeks"));
    }

    #[test]
    fn zero_team_size_is_not_conflated_with_absent() {
        let zero = ProjectRecord::from_stored("1".into(), stored(json!({"teamSize": 0})));
        let absent = ProjectRecord::from_stored("2".into(), stored(json!({})));

        assert_eq!(zero.team_size, Some(0));
        assert_eq!(absent.team_size, None);
    }

    #[test]
    fn github_and_codepen_links_are_gated() {
        let record = ProjectRecord::from_stored(
            "1".into(),
            stored(json!({
                "link": "https://example.com",
                "githubUrl": "https://github.com/me/x",
                "includeGitHub": false,
                "codepenUrl": "https://codepen.io/me/pen/y",
                "includeCodePen": true
            })),
        );

        let kinds: Vec<_> = record.visible_links().into_iter().map(|l| l.kind).collect();
        assert_eq!(kinds, vec![LinkKind::Live, LinkKind::CodePen]);
    }

    #[test]
    fn blocks_stored_as_index_keyed_object_keep_order() {
        let record = ProjectRecord::from_stored(
            "1".into(),
            stored(json!({
                "blocks": {
                    "10": {"id": "c", "type": "text"},
                    "2": {"id": "b", "type": "text"},
                    "0": {"id": "a", "type": "text"}
                }
            })),
        );

        let ids: Vec<_> = record.blocks.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn document_round_trips_with_explicit_nulls() {
        let record = ProjectRecord::from_stored(
            "9".into(),
            stored(json!({"name": "n", "description": "d", "blocks": [{"id": "x", "type": "quote", "content": "q"}]})),
        );

        let doc = record.to_document().unwrap();
        assert_eq!(doc.get("githubUrl"), Some(&Value::Null));
        assert!(doc.get("id").is_none());

        let back = ProjectRecord::from_stored("9".into(), serde_json::from_value(doc).unwrap());
        assert_eq!(back, record);
    }

    #[test]
    fn new_project_request_rejects_zero_team_size_and_bad_urls() {
        let request = NewProjectRequest {
            name: "Site".into(),
            description: "A site".into(),
            team_size: Some(0),
            github_url: Some("ftp://nope".into()),
            ..Default::default()
        };

        let fields = field_names(ProjectInsert::try_from(request).unwrap_err());
        assert!(fields.contains(&"team_size".to_string()));
        assert!(fields.contains(&"github_url".to_string()));
    }

    fn field_names(err: AppError) -> Vec<String> {
        match err {
            AppError::ValidationError(fields) => fields.into_iter().map(|f| f.field).collect(),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    fn request_with_blocks(blocks: Vec<Value>) -> NewProjectRequest {
        NewProjectRequest {
            name: "Site".into(),
            description: "A site".into(),
            blocks,
            ..Default::default()
        }
    }

    #[test]
    fn new_project_rejects_invalid_or_repeated_blocks() {
        let missing_id = request_with_blocks(vec![
            json!({"id": "a", "type": "text"}),
            json!({"type": "text"}),
        ]);
        assert_eq!(field_names(ProjectInsert::try_from(missing_id).unwrap_err()), vec!["blocks[1]"]);

        let repeated = request_with_blocks(vec![
            json!({"id": "a", "type": "text"}),
            json!({"id": "b", "type": "text"}),
            json!({"id": "a", "type": "quote"}),
        ]);
        assert_eq!(field_names(ProjectInsert::try_from(repeated).unwrap_err()), vec!["blocks[2]"]);

        let valid = request_with_blocks(vec![json!({"id": "a", "type": "text", "content": "hi"})]);
        let insert = ProjectInsert::try_from(valid).unwrap();
        assert_eq!(insert.record.blocks.len(), 1);
    }

    #[test]
    fn stored_lists_accept_keyed_objects_and_skip_nameless_members() {
        let record = ProjectRecord::from_stored(
            "2".into(),
            stored(json!({
                "name": "legacy",
                "slideshowImages": {"1": "images/b.png", "0": "images/a.png"},
                "languages": ["Rust", 7, null],
                "topics": "not a list",
                "teamMembers": [
                    {"role": "dev"},
                    {"name": "  "},
                    {"name": "Ada", "role": 3, "socialUrl": ""},
                    "stray"
                ]
            })),
        );

        assert_eq!(record.slideshow_images, vec!["images/a.png", "images/b.png"]);
        assert_eq!(record.languages, vec!["Rust", "7"]);
        assert!(record.topics.is_empty());
        assert_eq!(
            record.team_members,
            vec![TeamMember { name: "Ada".into(), role: "3".into(), social_url: None }]
        );
    }

    #[test]
    fn image_references_resolve_for_display_only() {
        let record = ProjectRecord::from_stored(
            "3".into(),
            stored(json!({
                "bannerImage": "images/1_a.png",
                "slideshowImages": ["https://cdn.example.com/s.png", "/images/2_b.png"],
                "blocks": [
                    {"id": "i", "type": "image", "content": "images/3_c.png"},
                    {"id": "g", "type": "gif", "content": ""},
                    {"id": "t", "type": "text", "content": "images/not-an-image"}
                ]
            })),
        );

        let shown = record.clone().with_resolved_images("http://host/uploads/");

        assert_eq!(shown.banner_image.as_deref(), Some("http://host/uploads/images/1_a.png"));
        assert_eq!(
            shown.slideshow_images,
            vec!["https://cdn.example.com/s.png", "http://host/uploads/images/2_b.png"]
        );
        assert_eq!(shown.blocks[0].content, "http://host/uploads/images/3_c.png");
        assert_eq!(shown.blocks[1].content, "");
        assert_eq!(shown.blocks[2].content, "images/not-an-image");
        assert_eq!(record.banner_image.as_deref(), Some("images/1_a.png"));
    }

    #[test]
    fn patch_validates_members_and_slideshow_urls() {
        let patch: UpdateProjectRequest = serde_json::from_value(json!({
            "teamMembers": [{"name": "", "socialUrl": "javascript:alert(1)"}],
            "slideshowImages": ["not a url"]
        }))
        .unwrap();

        let mut fields = field_names(AppError::from(patch.validate().unwrap_err()));
        fields.sort();
        assert_eq!(
            fields,
            vec!["slideshow_images", "team_members[0].name", "team_members[0].social_url"]
        );

        let clean: UpdateProjectRequest = serde_json::from_value(json!({
            "teamMembers": [{"name": "Ada", "socialUrl": "https://ada.dev"}],
            "slideshowImages": ["https://cdn.example.com/a.png"]
        }))
        .unwrap();
        assert!(clean.validate().is_ok());
    }

    #[test]
    fn update_leaves_untouched_fields_alone() {
        let mut record = ProjectRecord::from_stored(
            "1".into(),
            stored(json!({"name": "old", "description": "keep", "githubUrl": "https://github.com/a/b"})),
        );
        let patch: UpdateProjectRequest = serde_json::from_value(json!({
            "name": "new",
            "githubUrl": null
        }))
        .unwrap();

        patch.apply_to(&mut record).unwrap();

        assert_eq!(record.name, "new");
        assert_eq!(record.description, "keep");
        assert_eq!(record.github_url, None);
    }
}
