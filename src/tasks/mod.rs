//! Task Graph Manager: task CRUD, the status state machine, dependency
//! tracking and the auto-unblock cascade.

pub mod model;
pub mod transitions;

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use crate::access::{can_access_task, can_delete_task, mutation_role};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::feed::{Event, EventKind, FeedService, SYSTEM_ACTOR};
use crate::identity::{Agent, AgentId, Directory, QuotaGate, ResourceKind};
use crate::projects::model::{clamp_tags, clamp_text, Membership};
use crate::projects::ProjectDirectory;
use crate::store::{keys, Store, StoreResult};

use model::{
    new_task_id, validate_title, AssigneeChange, CreateSubtask, CreateTask, ListFilter, Priority,
    Task, TaskPatch, TaskQuery, TaskStatus, TaskSummary,
};
use transitions::{apply_transition, initial_status, SideEffect};

/// Upper bound on tasks visited while checking a dependency edge for cycles.
/// Edges are at most 10 wide, so this covers any reasonable graph.
const CYCLE_VISIT_CAP: usize = 256;

pub struct TaskGraph {
    store: Store,
    directory: Arc<dyn Directory>,
    quota: Arc<dyn QuotaGate>,
    projects: Arc<ProjectDirectory>,
    feed: Arc<FeedService>,
    config: Arc<EngineConfig>,
}

impl TaskGraph {
    pub fn new(
        store: Store,
        directory: Arc<dyn Directory>,
        quota: Arc<dyn QuotaGate>,
        projects: Arc<ProjectDirectory>,
        feed: Arc<FeedService>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self { store, directory, quota, projects, feed, config }
    }

    pub(crate) async fn load(&self, id: &str) -> Result<Option<Task>> {
        Ok(self.store.get_json(&keys::task_meta(id)).await?)
    }

    async fn membership_for(&self, task: &Task, agent: &AgentId) -> Result<Option<Membership>> {
        match &task.project {
            Some(project) => self.projects.membership(project, agent).await,
            None => Ok(None),
        }
    }

    fn feed_ttl(actor: &Agent) -> Duration {
        actor.tier.limits().feed_ttl()
    }

    // ─── Create ──────────────────────────────────────────────────────────────

    pub async fn create_task(&self, actor: &Agent, req: CreateTask) -> Result<Task> {
        self.quota.check(&actor.id, ResourceKind::Task).await?;
        validate_title(&req.title)?;

        let project = match req.project {
            Some(name) => {
                let name = name.to_lowercase();
                self.projects
                    .load(&name)
                    .await?
                    .ok_or(EngineError::NotFound("project"))?;
                if self.projects.membership(&name, &actor.id).await?.is_none() {
                    return Err(EngineError::Forbidden("not a project member".to_string()));
                }
                Some(name)
            }
            None => None,
        };

        // Dependencies must exist; initial status is computed from their
        // state at insertion only and never re-verified afterwards.
        let depends_on = req.depends_on;
        if depends_on.len() > model::MAX_DEPENDENCIES {
            return Err(EngineError::Validation(format!(
                "at most {} dependencies",
                model::MAX_DEPENDENCIES
            )));
        }
        let mut any_incomplete = false;
        for dep in &depends_on {
            let dep_task = self.load(dep).await?.ok_or_else(|| {
                EngineError::Validation(format!("dependency {dep} not found"))
            })?;
            if dep_task.status != TaskStatus::Done {
                any_incomplete = true;
            }
        }

        let (assignee_id, assignee_name) = self.resolve_assignee(actor, req.assignee).await?;

        // Reserve a slot in the creator's task quota before any writes.
        let limits = actor.tier.limits();
        let counter = keys::count_tasks_created(&actor.id);
        let created = self.store.incr(&counter, 1).await?;
        if created as u64 > limits.tasks {
            self.store.incr(&counter, -1).await?;
            return Err(EngineError::LimitExceeded {
                resource: "tasks",
                current: (created - 1) as u64,
                limit: limits.tasks,
            });
        }

        let now = Utc::now();
        let task = Task {
            id: new_task_id(),
            title: req.title,
            description: clamp_text(req.description, limits.description_chars),
            project,
            status: initial_status(any_incomplete),
            priority: req.priority.unwrap_or(Priority::Medium),
            tags: clamp_tags(req.tags),
            depends_on,
            deadline: req.deadline,
            metadata: req.metadata.unwrap_or_else(|| json!({})),
            assignee_id,
            assignee_name,
            creator_id: actor.id.clone(),
            creator_name: actor.name.clone(),
            parent_id: None,
            result: None,
            created: now,
            updated: now,
        };

        self.persist_new(&task).await?;
        self.store.incr(keys::STATS_TASKS, 1).await?;

        self.feed.emit(
            Event::new(
                EventKind::TaskCreated { title: task.title.clone() },
                Some(&task.id),
                Some(&task.title),
                task.project.as_deref(),
                &actor.name,
            ),
            Self::feed_ttl(actor),
        );

        info!(task = %task.id, status = %task.status, creator = %actor.id, "task created");
        Ok(task)
    }

    pub async fn create_subtask(
        &self,
        actor: &Agent,
        parent_id: &str,
        req: CreateSubtask,
    ) -> Result<Task> {
        let parent = self.load(parent_id).await?.ok_or(EngineError::NotFound("task"))?;
        let membership = self.membership_for(&parent, &actor.id).await?;
        if !can_access_task(&parent, &actor.id, membership.as_ref()) {
            return Err(EngineError::Forbidden("no access to parent task".to_string()));
        }
        self.quota.check(&actor.id, ResourceKind::Subtask).await?;
        validate_title(&req.title)?;

        let limits = actor.tier.limits();
        let counter = keys::count_subtasks(parent_id);
        let subtasks = self.store.incr(&counter, 1).await?;
        if subtasks as u64 > limits.subtasks {
            self.store.incr(&counter, -1).await?;
            return Err(EngineError::LimitExceeded {
                resource: "subtasks",
                current: (subtasks - 1) as u64,
                limit: limits.subtasks,
            });
        }

        let (assignee_id, assignee_name) = self.resolve_assignee(actor, req.assignee).await?;

        let now = Utc::now();
        let task = Task {
            id: new_task_id(),
            title: req.title,
            description: clamp_text(req.description, limits.description_chars),
            project: parent.project.clone(),
            status: TaskStatus::Todo,
            priority: req.priority.unwrap_or(Priority::Medium),
            tags: Vec::new(),
            depends_on: Vec::new(),
            deadline: req.deadline,
            metadata: json!({}),
            assignee_id,
            assignee_name,
            creator_id: actor.id.clone(),
            creator_name: actor.name.clone(),
            parent_id: Some(parent_id.to_string()),
            result: None,
            created: now,
            updated: now,
        };

        self.persist_new(&task).await?;
        self.store
            .put_marker(&keys::task_by_parent(parent_id, &task.id))
            .await?;
        self.store.incr(&keys::count_tasks_created(&actor.id), 1).await?;
        self.store.incr(keys::STATS_TASKS, 1).await?;

        self.feed.emit(
            Event::new(
                EventKind::SubtaskCreated {
                    parent_id: parent_id.to_string(),
                    title: task.title.clone(),
                },
                Some(&task.id),
                Some(&task.title),
                task.project.as_deref(),
                &actor.name,
            ),
            Self::feed_ttl(actor),
        );
        Ok(task)
    }

    /// Entity write plus the index and watch writes shared by task and
    /// subtask creation. Not atomic: the meta record is authoritative.
    async fn persist_new(&self, task: &Task) -> Result<()> {
        self.store.put_json(&keys::task_meta(&task.id), task, None).await?;
        self.store
            .put_marker(&keys::task_by_creator(&task.creator_id, &task.id))
            .await?;
        self.store
            .put_marker(&keys::task_by_status(task.status, &task.id))
            .await?;
        if let Some(project) = &task.project {
            self.store.put_marker(&keys::task_by_project(project, &task.id)).await?;
        }
        match (&task.assignee_id, &task.project) {
            (Some(assignee), _) => {
                self.store.put_marker(&keys::task_by_assignee(assignee, &task.id)).await?;
            }
            (None, Some(project)) => {
                self.store.put_marker(&keys::task_unassigned(project, &task.id)).await?;
            }
            (None, None) => {}
        }

        self.store
            .put_marker(&keys::watch_task(&task.id, &task.creator_id))
            .await?;
        if let Some(assignee) = &task.assignee_id {
            if *assignee != task.creator_id {
                self.store.put_marker(&keys::watch_task(&task.id, assignee)).await?;
            }
        }
        Ok(())
    }

    async fn resolve_assignee(
        &self,
        actor: &Agent,
        assignee: Option<String>,
    ) -> Result<(Option<AgentId>, Option<String>)> {
        match assignee {
            None => Ok((None, None)),
            Some(name) if name == "self" => {
                Ok((Some(actor.id.clone()), Some(actor.name.clone())))
            }
            Some(name) => {
                let id = self
                    .directory
                    .resolve_name(&name)
                    .await?
                    .ok_or(EngineError::NotFound("agent"))?;
                Ok((Some(id), Some(name)))
            }
        }
    }

    // ─── Read ────────────────────────────────────────────────────────────────

    pub async fn get_task(&self, actor: &Agent, id: &str) -> Result<Task> {
        let task = self.load(id).await?.ok_or(EngineError::NotFound("task"))?;
        let membership = self.membership_for(&task, &actor.id).await?;
        if !can_access_task(&task, &actor.id, membership.as_ref()) {
            return Err(EngineError::Forbidden("no access to this task".to_string()));
        }
        Ok(task)
    }

    // ─── Update ──────────────────────────────────────────────────────────────

    pub async fn update_task(&self, actor: &Agent, id: &str, patch: TaskPatch) -> Result<Task> {
        let mut task = self.load(id).await?.ok_or(EngineError::NotFound("task"))?;
        let membership = self.membership_for(&task, &actor.id).await?;
        let role = mutation_role(&task, &actor.id, membership.as_ref()).ok_or_else(|| {
            EngineError::Forbidden(
                "must be creator, assignee, or project owner".to_string(),
            )
        })?;

        let limits = actor.tier.limits();

        // Creator/owner field scope. Patches from the bare assignee to these
        // fields are ignored rather than rejected.
        if role.full_edit() {
            if let Some(title) = patch.title {
                validate_title(&title)?;
                task.title = title;
            }
            if let Some(description) = patch.description {
                task.description = clamp_text(description, limits.description_chars);
            }
            if let Some(priority) = patch.priority {
                task.priority = priority;
            }
            if let Some(tags) = patch.tags {
                task.tags = clamp_tags(tags);
            }
            if let Some(depends_on) = patch.depends_on {
                let depends_on = self.validate_dependencies(depends_on).await?;
                self.ensure_acyclic(&task.id, &depends_on).await?;
                // Status is not recomputed here; blocking is evaluated at
                // creation and by the unblock cascade only.
                task.depends_on = depends_on;
            }
            if let Some(deadline) = patch.deadline {
                task.deadline = deadline;
            }
            if let Some(metadata) = patch.metadata {
                task.metadata = metadata;
            }
        }

        // Status: index move happens before the meta write.
        let mut status_change = None;
        if let Some(new_status) = patch.status {
            for effect in apply_transition(task.status, new_status) {
                match effect {
                    SideEffect::ReindexStatus { from, to } => {
                        self.store.delete(&keys::task_by_status(from, &task.id)).await?;
                        self.store.put_marker(&keys::task_by_status(to, &task.id)).await?;
                        task.status = to;
                    }
                    SideEffect::EmitStatusChanged { from, to } => {
                        status_change = Some((from, to));
                    }
                    SideEffect::ResolveDependents => {}
                }
            }
        }

        // Assignee: any authorized role.
        let mut assignee_change = None;
        if let Some(change) = patch.assignee {
            let (new_id, new_name) = match change {
                AssigneeChange::Clear => (None, None),
                AssigneeChange::Set(name) => {
                    let (id, name) = self.resolve_assignee(actor, Some(name)).await?;
                    (id, name)
                }
            };
            if new_id != task.assignee_id {
                match (&task.assignee_id, &task.project) {
                    (Some(old), _) => {
                        self.store.delete(&keys::task_by_assignee(old, &task.id)).await?;
                    }
                    (None, Some(project)) => {
                        self.store.delete(&keys::task_unassigned(project, &task.id)).await?;
                    }
                    (None, None) => {}
                }

                let old_id = task.assignee_id.take();
                task.assignee_name = new_name;
                task.assignee_id = new_id;

                match (&task.assignee_id, &task.project) {
                    (Some(new), _) => {
                        self.store.put_marker(&keys::task_by_assignee(new, &task.id)).await?;
                        self.store.put_marker(&keys::watch_task(&task.id, new)).await?;
                    }
                    (None, Some(project)) => {
                        self.store
                            .put_marker(&keys::task_unassigned(project, &task.id))
                            .await?;
                    }
                    (None, None) => {}
                }
                assignee_change = Some((old_id, task.assignee_id.clone()));
            }
        }

        if let Some(result) = patch.result {
            task.result = Some(result);
        }

        task.updated = Utc::now();
        self.store.put_json(&keys::task_meta(&task.id), &task, None).await?;

        // Entering done re-evaluates blocked dependents, eagerly and in this
        // same call.
        if matches!(status_change, Some((_, TaskStatus::Done))) {
            self.resolve_dependents(&task, Self::feed_ttl(actor)).await?;
        }

        if let Some((from, to)) = status_change {
            self.feed.emit(
                Event::new(
                    EventKind::StatusChanged { from, to },
                    Some(&task.id),
                    Some(&task.title),
                    task.project.as_deref(),
                    &actor.name,
                ),
                Self::feed_ttl(actor),
            );
        }
        if let Some((from, to)) = assignee_change {
            self.feed.emit(
                Event::new(
                    EventKind::AssigneeChanged { from, to },
                    Some(&task.id),
                    Some(&task.title),
                    task.project.as_deref(),
                    &actor.name,
                ),
                Self::feed_ttl(actor),
            );
        }

        Ok(task)
    }

    /// Auto-unblock cascade. Candidates are the completed task's project
    /// siblings, or the global blocked set when it has no project; the scan
    /// is capped, which bounds work on huge graphs.
    async fn resolve_dependents(&self, completed: &Task, ttl: Duration) -> Result<()> {
        let prefix = match &completed.project {
            Some(project) => keys::task_by_project_prefix(project),
            None => keys::task_by_status_prefix(TaskStatus::Blocked),
        };
        let candidates = self
            .store
            .list_keys(&prefix, self.config.unblock_scan_limit)
            .await?;

        for key in candidates {
            let id = keys::last_segment(&key);
            if id == completed.id || !id.starts_with("t_") {
                continue;
            }
            let Some(mut candidate) = self.load(id).await? else {
                continue;
            };
            if candidate.status != TaskStatus::Blocked
                || !candidate.depends_on.iter().any(|d| d == &completed.id)
            {
                continue;
            }

            // Eligible to leave blocked only when every dependency is done.
            let mut all_done = true;
            for dep in &candidate.depends_on {
                let done = match self.load(dep).await? {
                    Some(t) => t.status == TaskStatus::Done,
                    None => false,
                };
                if !done {
                    all_done = false;
                    break;
                }
            }
            if !all_done {
                continue;
            }

            self.store
                .delete(&keys::task_by_status(TaskStatus::Blocked, &candidate.id))
                .await?;
            candidate.status = TaskStatus::Todo;
            candidate.updated = Utc::now();
            self.store
                .put_json(&keys::task_meta(&candidate.id), &candidate, None)
                .await?;
            self.store
                .put_marker(&keys::task_by_status(TaskStatus::Todo, &candidate.id))
                .await?;

            debug!(task = %candidate.id, unblocked_by = %completed.id, "task unblocked");
            self.feed.emit(
                Event::new(
                    EventKind::TaskUnblocked { unblocked_by: completed.id.clone() },
                    Some(&candidate.id),
                    Some(&candidate.title),
                    candidate.project.as_deref(),
                    SYSTEM_ACTOR,
                ),
                ttl,
            );
        }
        Ok(())
    }

    // ─── Delete ──────────────────────────────────────────────────────────────

    pub async fn delete_task(&self, actor: &Agent, id: &str) -> Result<()> {
        let task = self.load(id).await?.ok_or(EngineError::NotFound("task"))?;
        let membership = self.membership_for(&task, &actor.id).await?;
        if !can_delete_task(&task, &actor.id, membership.as_ref()) {
            return Err(EngineError::Forbidden(
                "must be creator or project owner".to_string(),
            ));
        }
        purge_task_records(&self.store, &self.config, &task).await?;
        info!(task = %id, actor = %actor.id, "task deleted");
        Ok(())
    }

    // ─── Lists ───────────────────────────────────────────────────────────────

    /// Tasks assigned to the caller.
    pub async fn list_mine(&self, actor: &Agent, filter: ListFilter) -> Result<Vec<TaskSummary>> {
        self.scan_index(&keys::task_by_assignee_prefix(&actor.id), |task| {
            task.assignee_id.as_ref() == Some(&actor.id) && filter.matches(task)
        })
        .await
    }

    /// Tasks the caller created.
    pub async fn list_created(&self, actor: &Agent, filter: ListFilter) -> Result<Vec<TaskSummary>> {
        self.scan_index(&keys::task_by_creator_prefix(&actor.id), |task| {
            task.creator_id == actor.id && filter.matches(task)
        })
        .await
    }

    /// Unassigned tasks in a project. Membership required.
    pub async fn list_unassigned(&self, actor: &Agent, project: &str) -> Result<Vec<TaskSummary>> {
        let project = project.to_lowercase();
        if self.projects.membership(&project, &actor.id).await?.is_none() {
            return Err(EngineError::Forbidden("not a project member".to_string()));
        }
        self.scan_index(&keys::task_unassigned_prefix(&project), |task| {
            task.assignee_id.is_none()
        })
        .await
    }

    /// Generic filtered list. One of project/status/assignee picks the
    /// scanning index; everything else filters in memory after the scan.
    pub async fn list_filtered(&self, actor: &Agent, query: TaskQuery) -> Result<Vec<TaskSummary>> {
        let project = query.project.as_ref().map(|p| p.to_lowercase());
        if let Some(project) = &project {
            if self.projects.membership(project, &actor.id).await?.is_none() {
                return Err(EngineError::Forbidden("not a project member".to_string()));
            }
        }

        let assignee_id = match &query.assignee {
            Some(name) => self.directory.resolve_name(name).await?,
            None => None,
        };

        let prefix = if let Some(project) = &project {
            keys::task_by_project_prefix(project)
        } else if let Some(status) = query.status {
            keys::task_by_status_prefix(status)
        } else if let Some(assignee) = &assignee_id {
            keys::task_by_assignee_prefix(assignee)
        } else {
            return Err(EngineError::Validation(
                "must specify at least one filter: project, status, or assignee".to_string(),
            ));
        };

        self.scan_index(&prefix, |task| {
            if let Some(project) = &project {
                if task.project.as_deref() != Some(project.as_str()) {
                    return false;
                }
            }
            if let Some(status) = query.status {
                if task.status != status {
                    return false;
                }
            }
            if query.assignee.is_some() {
                match &assignee_id {
                    Some(id) => {
                        if task.assignee_id.as_ref() != Some(id) {
                            return false;
                        }
                    }
                    // Asked for an unknown assignee: nothing matches.
                    None => return false,
                }
            }
            if let Some(priority) = query.priority {
                if task.priority != priority {
                    return false;
                }
            }
            if let Some(tag) = &query.tag {
                if !task.tags.iter().any(|t| t == tag) {
                    return false;
                }
            }
            true
        })
        .await
    }

    /// Scan an index prefix, load each entity, keep the ones `keep` accepts.
    /// Index entries are hints; the loaded record decides.
    async fn scan_index<F>(&self, prefix: &str, keep: F) -> Result<Vec<TaskSummary>>
    where
        F: Fn(&Task) -> bool,
    {
        let listed = self.store.list_keys(prefix, self.config.index_scan_limit).await?;
        let mut tasks = Vec::new();
        for key in listed {
            let id = keys::last_segment(&key);
            let Some(task) = self.load(id).await? else {
                continue;
            };
            if keep(&task) {
                tasks.push(TaskSummary::of(&task));
            }
        }
        Ok(tasks)
    }

    pub async fn list_subtasks(&self, actor: &Agent, parent_id: &str) -> Result<Vec<TaskSummary>> {
        let parent = self.load(parent_id).await?.ok_or(EngineError::NotFound("task"))?;
        let membership = self.membership_for(&parent, &actor.id).await?;
        if !can_access_task(&parent, &actor.id, membership.as_ref()) {
            return Err(EngineError::Forbidden("no access to parent task".to_string()));
        }
        self.scan_index(&keys::task_by_parent_prefix(parent_id), |task| {
            task.parent_id.as_deref() == Some(parent_id)
        })
        .await
    }

    // ─── Watch relations ─────────────────────────────────────────────────────

    pub async fn watch(&self, actor: &Agent, id: &str) -> Result<()> {
        self.load(id).await?.ok_or(EngineError::NotFound("task"))?;
        self.store.put_marker(&keys::watch_task(id, &actor.id)).await?;
        Ok(())
    }

    pub async fn unwatch(&self, actor: &Agent, id: &str) -> Result<()> {
        self.store.delete(&keys::watch_task(id, &actor.id)).await?;
        Ok(())
    }

    // ─── Dependency validation ───────────────────────────────────────────────

    async fn validate_dependencies(&self, depends_on: Vec<String>) -> Result<Vec<String>> {
        if depends_on.len() > model::MAX_DEPENDENCIES {
            return Err(EngineError::Validation(format!(
                "at most {} dependencies",
                model::MAX_DEPENDENCIES
            )));
        }
        for dep in &depends_on {
            if self.load(dep).await?.is_none() {
                return Err(EngineError::Validation(format!("dependency {dep} not found")));
            }
        }
        Ok(depends_on)
    }

    /// Reject a `depends_on` edit that would make `task_id` reachable from
    /// its own dependencies. Bounded walk; edges are narrow (≤10) so the cap
    /// is generous. A graph too large to verify within the cap is rejected
    /// rather than accepted unchecked.
    async fn ensure_acyclic(&self, task_id: &str, depends_on: &[String]) -> Result<()> {
        let mut queue: VecDeque<String> = depends_on.iter().cloned().collect();
        let mut seen: HashSet<String> = HashSet::new();
        while let Some(id) = queue.pop_front() {
            if id == task_id {
                return Err(EngineError::Validation(
                    "dependency cycle detected".to_string(),
                ));
            }
            if !seen.insert(id.clone()) {
                continue;
            }
            if seen.len() > CYCLE_VISIT_CAP {
                return Err(EngineError::Validation(
                    "dependency graph too large to verify".to_string(),
                ));
            }
            if let Some(task) = self.load(&id).await? {
                queue.extend(task.depends_on.iter().cloned());
            }
        }
        Ok(())
    }
}

impl ListFilter {
    fn matches(&self, task: &Task) -> bool {
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }
        if let Some(project) = &self.project {
            if task.project.as_deref() != Some(project.to_lowercase().as_str()) {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if task.priority != priority {
                return false;
            }
        }
        true
    }
}

/// Remove a task record and every key derived from it: secondary indexes,
/// watch relations, comments, counters. Shared by task deletion and the
/// project cascade. Decrements the global and per-creator task counters.
pub(crate) async fn purge_task_records(
    store: &Store,
    config: &EngineConfig,
    task: &Task,
) -> StoreResult<()> {
    store.delete(&keys::task_meta(&task.id)).await?;
    store.delete(&keys::task_by_creator(&task.creator_id, &task.id)).await?;
    store.delete(&keys::task_by_status(task.status, &task.id)).await?;
    if let Some(project) = &task.project {
        store.delete(&keys::task_by_project(project, &task.id)).await?;
    }
    match (&task.assignee_id, &task.project) {
        (Some(assignee), _) => {
            store.delete(&keys::task_by_assignee(assignee, &task.id)).await?;
        }
        (None, Some(project)) => {
            store.delete(&keys::task_unassigned(project, &task.id)).await?;
        }
        (None, None) => {}
    }
    if let Some(parent) = &task.parent_id {
        store.delete(&keys::task_by_parent(parent, &task.id)).await?;
        // The cascade may have purged the parent first; touching its counter
        // then would resurrect a deleted key.
        if store.get_raw(&keys::task_meta(parent)).await?.is_some() {
            store.incr(&keys::count_subtasks(parent), -1).await?;
        }
    }

    for key in store
        .list_keys(&keys::watch_task_prefix(&task.id), config.watch_scan_limit)
        .await?
    {
        store.delete(&key).await?;
    }
    for key in store
        .list_keys(&keys::task_comment_prefix(&task.id), config.comment_scan_limit)
        .await?
    {
        store.delete(&key).await?;
    }
    store.delete(&keys::count_comments(&task.id)).await?;
    store.delete(&keys::count_subtasks(&task.id)).await?;

    store.incr(&keys::count_tasks_created(&task.creator_id), -1).await?;
    store.incr(keys::STATS_TASKS, -1).await?;
    Ok(())
}
