//! Key-naming conventions. Every key string the engine writes or scans is
//! built here, so the layout has exactly one owner.
//!
//! Colons separate segments; project names and agent/task ids never contain
//! them, so the id of an index entry is always the last segment.

use crate::identity::AgentId;
use crate::tasks::model::TaskStatus;

// ─── Projects ────────────────────────────────────────────────────────────────

pub fn project_meta(name: &str) -> String {
    format!("proj:{name}:meta")
}

pub fn project_member(name: &str, agent: &AgentId) -> String {
    format!("proj:{name}:member:{agent}")
}

pub fn project_member_prefix(name: &str) -> String {
    format!("proj:{name}:member:")
}

pub fn project_by_owner(agent: &AgentId, name: &str) -> String {
    format!("proj:by_owner:{agent}:{name}")
}

pub fn project_by_member(agent: &AgentId, name: &str) -> String {
    format!("proj:by_member:{agent}:{name}")
}

pub fn project_by_member_prefix(agent: &AgentId) -> String {
    format!("proj:by_member:{agent}:")
}

pub fn project_public(name: &str) -> String {
    format!("proj:public:{name}")
}

pub const PROJECT_PUBLIC_PREFIX: &str = "proj:public:";

// ─── Tasks ───────────────────────────────────────────────────────────────────

pub fn task_meta(id: &str) -> String {
    format!("task:{id}:meta")
}

pub fn task_by_creator(agent: &AgentId, id: &str) -> String {
    format!("task:by_creator:{agent}:{id}")
}

pub fn task_by_creator_prefix(agent: &AgentId) -> String {
    format!("task:by_creator:{agent}:")
}

pub fn task_by_status(status: TaskStatus, id: &str) -> String {
    format!("task:by_status:{status}:{id}")
}

pub fn task_by_status_prefix(status: TaskStatus) -> String {
    format!("task:by_status:{status}:")
}

pub fn task_by_project(project: &str, id: &str) -> String {
    format!("task:by_project:{project}:{id}")
}

pub fn task_by_project_prefix(project: &str) -> String {
    format!("task:by_project:{project}:")
}

pub fn task_by_assignee(agent: &AgentId, id: &str) -> String {
    format!("task:by_assignee:{agent}:{id}")
}

pub fn task_by_assignee_prefix(agent: &AgentId) -> String {
    format!("task:by_assignee:{agent}:")
}

pub fn task_unassigned(project: &str, id: &str) -> String {
    format!("task:unassigned:{project}:{id}")
}

pub fn task_unassigned_prefix(project: &str) -> String {
    format!("task:unassigned:{project}:")
}

pub fn task_by_parent(parent: &str, id: &str) -> String {
    format!("task:parent:{parent}:{id}")
}

pub fn task_by_parent_prefix(parent: &str) -> String {
    format!("task:parent:{parent}:")
}

pub fn task_comment(task: &str, created_ms: i64, comment_id: &str) -> String {
    format!("task:{task}:comment:{created_ms:013}:{comment_id}")
}

pub fn task_comment_prefix(task: &str) -> String {
    format!("task:{task}:comment:")
}

// ─── Watch relations ─────────────────────────────────────────────────────────

pub fn watch_task(task: &str, agent: &AgentId) -> String {
    format!("watch:task:{task}:{agent}")
}

pub fn watch_task_prefix(task: &str) -> String {
    format!("watch:task:{task}:")
}

pub fn watch_project(name: &str, agent: &AgentId) -> String {
    format!("watch:proj:{name}:{agent}")
}

pub fn watch_project_prefix(name: &str) -> String {
    format!("watch:proj:{name}:")
}

// ─── Feed ────────────────────────────────────────────────────────────────────

/// Feed keys embed an inverted millisecond timestamp so a plain ascending
/// prefix scan returns events newest-first.
const TS_CEILING_MS: i64 = 10_000_000_000_000;

pub fn feed_entry(agent: &AgentId, ts_ms: i64, event_id: &str) -> String {
    let inverted = TS_CEILING_MS - ts_ms;
    format!("feed:{agent}:{inverted:013}:{event_id}")
}

pub fn feed_prefix(agent: &AgentId) -> String {
    format!("feed:{agent}:")
}

// ─── Counters ────────────────────────────────────────────────────────────────

pub fn count_projects_owned(agent: &AgentId) -> String {
    format!("count:proj_owned:{agent}")
}

pub fn count_tasks_created(agent: &AgentId) -> String {
    format!("count:tasks_created:{agent}")
}

pub fn count_members(project: &str) -> String {
    format!("count:members:{project}")
}

pub fn count_subtasks(parent: &str) -> String {
    format!("count:subtasks:{parent}")
}

pub fn count_comments(task: &str) -> String {
    format!("count:comments:{task}")
}

pub const STATS_PROJECTS: &str = "stats:projects";
pub const STATS_TASKS: &str = "stats:tasks";

// ─── Parsing ─────────────────────────────────────────────────────────────────

/// Trailing segment of an index key: the entity id the entry points at.
pub fn last_segment(key: &str) -> &str {
    key.rsplit(':').next().unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_ids_round_trip() {
        let agent = AgentId("a_42".into());
        let key = task_by_creator(&agent, "t_abc123");
        assert!(key.starts_with(&task_by_creator_prefix(&agent)));
        assert_eq!(last_segment(&key), "t_abc123");
    }

    #[test]
    fn feed_keys_sort_newest_first() {
        let agent = AgentId("a_1".into());
        let older = feed_entry(&agent, 1_700_000_000_000, "e1");
        let newer = feed_entry(&agent, 1_700_000_005_000, "e2");
        assert!(newer < older);
    }

    #[test]
    fn comment_keys_sort_chronologically() {
        let a = task_comment("t_1", 1_700_000_000_000, "c_a");
        let b = task_comment("t_1", 1_700_000_000_001, "c_b");
        assert!(a < b);
    }
}
