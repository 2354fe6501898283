//! Access control predicates.
//!
//! Pure functions of already-loaded state, no I/O here. Callers load the
//! task and the actor's membership (if any) and ask.

use crate::identity::AgentId;
use crate::projects::model::{MemberRole, Membership};
use crate::tasks::model::Task;

/// Role under which an actor may mutate a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRole {
    Creator,
    Assignee,
    /// Owner of the task's project.
    Owner,
}

impl TaskRole {
    /// Creator and project owner hold full field-level write scope;
    /// the assignee may only change status, assignee and result.
    pub fn full_edit(self) -> bool {
        matches!(self, TaskRole::Creator | TaskRole::Owner)
    }
}

/// Read access: creator, assignee, or any membership role in the task's
/// project.
pub fn can_access_task(task: &Task, agent: &AgentId, membership: Option<&Membership>) -> bool {
    if task.creator_id == *agent {
        return true;
    }
    if task.assignee_id.as_ref() == Some(agent) {
        return true;
    }
    membership.is_some()
}

/// Project mutation (metadata, members, deletion): owner role only.
pub fn can_mutate_project(membership: Option<&Membership>) -> bool {
    matches!(membership, Some(m) if m.role == MemberRole::Owner)
}

/// Resolve the strongest mutation role the actor holds on a task, if any.
pub fn mutation_role(
    task: &Task,
    agent: &AgentId,
    membership: Option<&Membership>,
) -> Option<TaskRole> {
    if task.creator_id == *agent {
        return Some(TaskRole::Creator);
    }
    if task.assignee_id.as_ref() == Some(agent) {
        return Some(TaskRole::Assignee);
    }
    if can_mutate_project(membership) {
        return Some(TaskRole::Owner);
    }
    None
}

/// Task deletion: creator or project owner, never the bare assignee.
pub fn can_delete_task(task: &Task, agent: &AgentId, membership: Option<&Membership>) -> bool {
    task.creator_id == *agent || can_mutate_project(membership)
}
