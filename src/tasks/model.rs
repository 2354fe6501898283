use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::identity::AgentId;

pub const TITLE_MAX: usize = 256;
pub const MAX_DEPENDENCIES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Review,
    Done,
    Blocked,
    Cancelled,
}

impl TaskStatus {
    /// Every status, in index order. Used by the repair pass to enumerate
    /// by-status prefixes.
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Review,
        TaskStatus::Done,
        TaskStatus::Blocked,
        TaskStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Review => "review",
            TaskStatus::Done => "done",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

/// Task record, stored at `task:{id}:meta`. Authoritative over every
/// secondary index entry that points at it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub project: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub depends_on: Vec<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub metadata: Value,
    pub assignee_id: Option<AgentId>,
    pub assignee_name: Option<String>,
    pub creator_id: AgentId,
    pub creator_name: String,
    pub parent_id: Option<String>,
    pub result: Option<Value>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub project: Option<String>,
    /// Agent name, or `"self"` for the caller.
    pub assignee: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub priority: Option<Priority>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSubtask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub assignee: Option<String>,
    pub priority: Option<Priority>,
    pub deadline: Option<DateTime<Utc>>,
}

/// Assignee change requested through a task patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssigneeChange {
    /// Clear the assignee (task returns to the unassigned pool).
    Clear,
    /// Assign by agent name; `"self"` resolves to the acting agent.
    Set(String),
}

/// Field-level patch for `update_task`. Status, assignee and result are
/// writable by any authorized actor; the rest only by creator or project
/// owner (others' values are ignored, not rejected).
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
    pub depends_on: Option<Vec<String>>,
    pub deadline: Option<Option<DateTime<Utc>>>,
    pub metadata: Option<Value>,
    pub status: Option<TaskStatus>,
    pub assignee: Option<AssigneeChange>,
    pub result: Option<Value>,
}

/// Trimmed task shape returned by list endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
}

impl TaskSummary {
    pub fn of(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            status: task.status,
            priority: task.priority,
            assignee: task.assignee_name.clone(),
            project: task.project.clone(),
            tags: task.tags.clone(),
            deadline: task.deadline,
            created: task.created,
        }
    }
}

/// Filters for the generic list endpoint. At least one of project, status
/// or assignee must be present to pick a scanning index.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskQuery {
    pub project: Option<String>,
    pub status: Option<TaskStatus>,
    pub assignee: Option<String>,
    pub priority: Option<Priority>,
    pub tag: Option<String>,
}

/// Secondary filters shared by the mine/created list endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListFilter {
    pub status: Option<TaskStatus>,
    pub project: Option<String>,
    pub priority: Option<Priority>,
}

pub fn new_task_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("t_{}", &hex[..12])
}

pub fn validate_title(title: &str) -> Result<()> {
    if title.is_empty() || title.chars().count() > TITLE_MAX {
        return Err(EngineError::Validation(format!(
            "title must be 1-{TITLE_MAX} characters"
        )));
    }
    Ok(())
}
