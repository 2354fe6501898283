//! Rebuild secondary indexes from entity records.
//!
//! The store offers no multi-key transactions, so an index write can be lost
//! after its entity write succeeded (or survive after a delete). Entity meta
//! records are authoritative; this pass makes the indexes agree with them:
//! missing entries are recreated, stale ones deleted.

use std::collections::HashSet;

use tracing::info;

use super::{keys, Store, StoreResult};
use crate::identity::AgentId;
use crate::projects::model::{Project, Visibility};
use crate::tasks::model::{Task, TaskStatus};

/// Upper bound on keys examined per namespace in one pass.
const REPAIR_SCAN_LIMIT: usize = 10_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub tasks_seen: u64,
    pub projects_seen: u64,
    pub added: u64,
    pub removed: u64,
}

/// Run the full rebuild for both namespaces.
pub async fn rebuild_indexes(store: &Store) -> StoreResult<RepairReport> {
    let mut report = RepairReport::default();
    rebuild_task_indexes(store, &mut report).await?;
    rebuild_project_indexes(store, &mut report).await?;
    info!(
        tasks = report.tasks_seen,
        projects = report.projects_seen,
        added = report.added,
        removed = report.removed,
        "index repair finished"
    );
    Ok(report)
}

async fn rebuild_task_indexes(store: &Store, report: &mut RepairReport) -> StoreResult<()> {
    let mut expected: HashSet<String> = HashSet::new();

    for key in store.list_keys("task:", REPAIR_SCAN_LIMIT).await? {
        let parts: Vec<&str> = key.split(':').collect();
        if parts.len() != 3 || parts[2] != "meta" {
            continue;
        }
        let Some(task) = store.get_json::<Task>(&key).await? else {
            continue;
        };
        report.tasks_seen += 1;

        expected.insert(keys::task_by_creator(&task.creator_id, &task.id));
        expected.insert(keys::task_by_status(task.status, &task.id));
        if let Some(project) = &task.project {
            expected.insert(keys::task_by_project(project, &task.id));
        }
        match (&task.assignee_id, &task.project) {
            (Some(assignee), _) => {
                expected.insert(keys::task_by_assignee(assignee, &task.id));
            }
            (None, Some(project)) => {
                expected.insert(keys::task_unassigned(project, &task.id));
            }
            (None, None) => {}
        }
        if let Some(parent) = &task.parent_id {
            expected.insert(keys::task_by_parent(parent, &task.id));
        }
    }

    let mut observed: HashSet<String> = HashSet::new();
    for prefix in [
        "task:by_creator:",
        "task:by_project:",
        "task:by_assignee:",
        "task:unassigned:",
        "task:parent:",
    ] {
        observed.extend(store.list_keys(prefix, REPAIR_SCAN_LIMIT).await?);
    }
    for status in TaskStatus::ALL {
        observed.extend(
            store
                .list_keys(&keys::task_by_status_prefix(status), REPAIR_SCAN_LIMIT)
                .await?,
        );
    }

    reconcile(store, &expected, &observed, report).await
}

async fn rebuild_project_indexes(store: &Store, report: &mut RepairReport) -> StoreResult<()> {
    let mut expected: HashSet<String> = HashSet::new();

    for key in store.list_keys("proj:", REPAIR_SCAN_LIMIT).await? {
        let parts: Vec<&str> = key.split(':').collect();
        if parts.len() == 3 && parts[2] == "meta" {
            let Some(project) = store.get_json::<Project>(&key).await? else {
                continue;
            };
            report.projects_seen += 1;
            expected.insert(keys::project_by_owner(&project.owner_id, &project.name));
            if project.visibility == Visibility::Public {
                expected.insert(keys::project_public(&project.name));
            }
        } else if parts.len() == 4 && parts[2] == "member" {
            // Membership records drive the by_member index.
            let agent = AgentId(parts[3].to_string());
            expected.insert(keys::project_by_member(&agent, parts[1]));
        }
    }

    let mut observed: HashSet<String> = HashSet::new();
    for prefix in ["proj:by_owner:", "proj:by_member:", keys::PROJECT_PUBLIC_PREFIX] {
        observed.extend(store.list_keys(prefix, REPAIR_SCAN_LIMIT).await?);
    }

    reconcile(store, &expected, &observed, report).await
}

async fn reconcile(
    store: &Store,
    expected: &HashSet<String>,
    observed: &HashSet<String>,
    report: &mut RepairReport,
) -> StoreResult<()> {
    for key in expected.difference(observed) {
        store.put_marker(key).await?;
        report.added += 1;
    }
    for key in observed.difference(expected) {
        store.delete(key).await?;
        report.removed += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Utc;
    use std::sync::Arc;

    fn task(id: &str, creator: &str, project: Option<&str>) -> Task {
        Task {
            id: id.into(),
            title: "t".into(),
            description: String::new(),
            project: project.map(String::from),
            status: TaskStatus::Todo,
            priority: crate::tasks::model::Priority::Medium,
            tags: vec![],
            depends_on: vec![],
            deadline: None,
            metadata: serde_json::json!({}),
            assignee_id: None,
            assignee_name: None,
            creator_id: AgentId(creator.into()),
            creator_name: creator.into(),
            parent_id: None,
            result: None,
            created: Utc::now(),
            updated: Utc::now(),
        }
    }

    #[tokio::test]
    async fn recreates_missing_and_drops_stale_entries() {
        let store = Store::new(Arc::new(MemoryStore::new()));
        let t = task("t_1", "a_1", Some("p1"));
        store.put_json(&keys::task_meta(&t.id), &t, None).await.unwrap();
        // Missing: every index for t_1. Stale: an index for a task that
        // does not exist.
        store
            .put_marker(&keys::task_by_status(TaskStatus::Done, "t_gone"))
            .await
            .unwrap();

        let report = rebuild_indexes(&store).await.unwrap();
        assert_eq!(report.tasks_seen, 1);
        assert_eq!(report.removed, 1);
        // by_creator, by_status, by_project, unassigned
        assert_eq!(report.added, 4);

        let by_status = store
            .list_keys(&keys::task_by_status_prefix(TaskStatus::Todo), 10)
            .await
            .unwrap();
        assert_eq!(by_status, vec![keys::task_by_status(TaskStatus::Todo, "t_1")]);
        assert!(store
            .list_keys(&keys::task_by_status_prefix(TaskStatus::Done), 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn repair_is_idempotent() {
        let store = Store::new(Arc::new(MemoryStore::new()));
        let t = task("t_1", "a_1", None);
        store.put_json(&keys::task_meta(&t.id), &t, None).await.unwrap();

        rebuild_indexes(&store).await.unwrap();
        let second = rebuild_indexes(&store).await.unwrap();
        assert_eq!(second.added, 0);
        assert_eq!(second.removed, 0);
    }
}
