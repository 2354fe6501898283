use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::identity::AgentId;

pub const NAME_MIN: usize = 2;
pub const NAME_MAX: usize = 32;
pub const MAX_TAGS: usize = 10;
pub const TAG_MAX_CHARS: usize = 32;

/// Names that double as key-layout segments under the `proj:` prefix. A
/// project named `meta` would write `proj:public:meta`, colliding with the
/// meta key of a project named `public`.
const RESERVED_NAMES: [&str; 5] = ["meta", "public", "by_owner", "by_member", "member"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    Paused,
    Completed,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Owner,
    Member,
    Viewer,
}

/// Project record, stored at `proj:{name}:meta`. `name` is the lowercased
/// unique identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub description: String,
    pub visibility: Visibility,
    pub tags: Vec<String>,
    pub status: ProjectStatus,
    pub owner_id: AgentId,
    pub owner_name: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Membership record, stored at `proj:{name}:member:{agent}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub name: String,
    pub role: MemberRole,
    pub joined: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_visibility")]
    pub visibility: Visibility,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_visibility() -> Visibility {
    Visibility::Private
}

/// Recognized fields for project updates. Anything else in a request body
/// is the request layer's problem.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectPatch {
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    pub name: String,
    pub description: String,
    pub status: ProjectStatus,
    pub visibility: Visibility,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<MemberRole>,
    pub created: DateTime<Utc>,
}

/// Per-project task dashboard returned with project details.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Dashboard {
    pub by_status: std::collections::BTreeMap<String, u64>,
    pub by_priority: std::collections::BTreeMap<String, u64>,
    pub unassigned: u64,
    pub overdue: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectView {
    #[serde(flatten)]
    pub project: Project,
    /// Caller's role, or `None` when reading a public project as a non-member.
    pub role: Option<MemberRole>,
    pub dashboard: Dashboard,
}

/// Validate a project name and return its canonical (lowercased) form.
pub fn validate_name(name: &str) -> Result<String> {
    if name.len() < NAME_MIN || name.len() > NAME_MAX {
        return Err(EngineError::Validation(format!(
            "name must be {NAME_MIN}-{NAME_MAX} characters"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(EngineError::Validation(
            "name: only a-z, A-Z, 0-9, _ and -".to_string(),
        ));
    }
    let name = name.to_lowercase();
    if RESERVED_NAMES.contains(&name.as_str()) {
        return Err(EngineError::Validation(format!("name \"{name}\" is reserved")));
    }
    Ok(name)
}

/// Clamp a tag list to the shared cap: at most 10 tags, 32 chars each.
pub fn clamp_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .take(MAX_TAGS)
        .map(|t| t.chars().take(TAG_MAX_CHARS).collect())
        .collect()
}

/// Truncate free text to the tier's description budget.
pub fn clamp_text(text: String, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text
    } else {
        text.chars().take(max_chars).collect()
    }
}
