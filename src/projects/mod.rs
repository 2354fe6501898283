//! Project Directory: project CRUD, membership, visibility, watch relations.

pub mod model;

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::access::can_mutate_project;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::identity::{Agent, AgentId, Directory, QuotaGate, ResourceKind};
use crate::store::{keys, Store};
use crate::tasks::model::{Task, TaskStatus};
use crate::tasks::purge_task_records;

use model::{
    clamp_tags, clamp_text, validate_name, CreateProject, Dashboard, MemberRole, Membership,
    Project, ProjectPatch, ProjectSummary, ProjectView, Visibility,
};

pub struct ProjectDirectory {
    store: Store,
    directory: Arc<dyn Directory>,
    quota: Arc<dyn QuotaGate>,
    config: Arc<EngineConfig>,
}

impl ProjectDirectory {
    pub fn new(
        store: Store,
        directory: Arc<dyn Directory>,
        quota: Arc<dyn QuotaGate>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self { store, directory, quota, config }
    }

    pub(crate) async fn load(&self, name: &str) -> Result<Option<Project>> {
        Ok(self.store.get_json(&keys::project_meta(name)).await?)
    }

    /// Membership record for `agent` in `name`, if any.
    pub(crate) async fn membership(
        &self,
        name: &str,
        agent: &AgentId,
    ) -> Result<Option<Membership>> {
        Ok(self.store.get_json(&keys::project_member(name, agent)).await?)
    }

    // ─── CRUD ────────────────────────────────────────────────────────────────

    pub async fn create_project(&self, actor: &Agent, req: CreateProject) -> Result<Project> {
        self.quota.check(&actor.id, ResourceKind::Project).await?;
        let name = validate_name(&req.name)?;

        if self.load(&name).await?.is_some() {
            return Err(EngineError::Conflict(format!("project \"{name}\" already exists")));
        }

        // Reserve a slot in the owner's project quota before any writes.
        let limits = actor.tier.limits();
        let counter = keys::count_projects_owned(&actor.id);
        let owned = self.store.incr(&counter, 1).await?;
        if owned as u64 > limits.projects {
            self.store.incr(&counter, -1).await?;
            return Err(EngineError::LimitExceeded {
                resource: "projects",
                current: (owned - 1) as u64,
                limit: limits.projects,
            });
        }

        let now = Utc::now();
        let project = Project {
            name: name.clone(),
            description: clamp_text(req.description, limits.description_chars),
            visibility: req.visibility,
            tags: clamp_tags(req.tags),
            status: model::ProjectStatus::Active,
            owner_id: actor.id.clone(),
            owner_name: actor.name.clone(),
            created: now,
            updated: now,
        };

        self.store.put_json(&keys::project_meta(&name), &project, None).await?;
        self.store.put_marker(&keys::project_by_owner(&actor.id, &name)).await?;
        if project.visibility == Visibility::Public {
            self.store.put_marker(&keys::project_public(&name)).await?;
        }

        // The owner membership is created with the project.
        let membership = Membership {
            name: actor.name.clone(),
            role: MemberRole::Owner,
            joined: now,
        };
        self.store
            .put_json(&keys::project_member(&name, &actor.id), &membership, None)
            .await?;
        self.store.put_marker(&keys::project_by_member(&actor.id, &name)).await?;
        self.store.incr(&keys::count_members(&name), 1).await?;

        // Owners watch their projects from the start.
        self.store.put_marker(&keys::watch_project(&name, &actor.id)).await?;

        self.store.incr(keys::STATS_PROJECTS, 1).await?;
        info!(project = %name, owner = %actor.id, "project created");
        Ok(project)
    }

    /// Project details plus the task dashboard. Members see everything;
    /// non-members only public projects.
    pub async fn get_project(&self, actor: &Agent, name: &str) -> Result<ProjectView> {
        let name = name.to_lowercase();
        let project = self.load(&name).await?.ok_or(EngineError::NotFound("project"))?;

        let membership = self.membership(&name, &actor.id).await?;
        if membership.is_none() && project.visibility != Visibility::Public {
            return Err(EngineError::Forbidden("not a project member".to_string()));
        }

        let dashboard = self.dashboard(&name).await?;
        Ok(ProjectView {
            project,
            role: membership.map(|m| m.role),
            dashboard,
        })
    }

    async fn dashboard(&self, name: &str) -> Result<Dashboard> {
        let listed = self
            .store
            .list_keys(&keys::task_by_project_prefix(name), self.config.index_scan_limit)
            .await?;

        let mut dashboard = Dashboard {
            total: listed.len() as u64,
            ..Default::default()
        };
        let now = Utc::now();
        for key in listed {
            let id = keys::last_segment(&key);
            let Some(task) = self.store.get_json::<Task>(&keys::task_meta(id)).await? else {
                continue;
            };
            *dashboard.by_status.entry(task.status.as_str().to_string()).or_default() += 1;
            *dashboard
                .by_priority
                .entry(task.priority.as_str().to_string())
                .or_default() += 1;
            if task.assignee_id.is_none() {
                dashboard.unassigned += 1;
            }
            let closed = matches!(task.status, TaskStatus::Done | TaskStatus::Cancelled);
            if !closed && task.deadline.is_some_and(|d| d < now) {
                dashboard.overdue += 1;
            }
        }
        Ok(dashboard)
    }

    /// Projects the actor belongs to, with their role in each.
    pub async fn list_mine(&self, actor: &Agent) -> Result<Vec<ProjectSummary>> {
        let listed = self
            .store
            .list_keys(&keys::project_by_member_prefix(&actor.id), self.config.index_scan_limit)
            .await?;

        let mut projects = Vec::new();
        for key in listed {
            let name = keys::last_segment(&key);
            let Some(project) = self.load(name).await? else {
                continue;
            };
            let role = self.membership(name, &actor.id).await?.map(|m| m.role);
            projects.push(ProjectSummary {
                name: project.name,
                description: project.description,
                status: project.status,
                visibility: project.visibility,
                tags: project.tags,
                role,
                created: project.created,
            });
        }
        Ok(projects)
    }

    /// Public directory: browsable without membership.
    pub async fn list_public(&self) -> Result<Vec<ProjectSummary>> {
        let listed = self
            .store
            .list_keys(keys::PROJECT_PUBLIC_PREFIX, self.config.index_scan_limit)
            .await?;

        let mut projects = Vec::new();
        for key in listed {
            let Some(project) = self.load(keys::last_segment(&key)).await? else {
                continue;
            };
            projects.push(ProjectSummary {
                name: project.name,
                description: project.description,
                status: project.status,
                visibility: project.visibility,
                tags: project.tags,
                role: None,
                created: project.created,
            });
        }
        Ok(projects)
    }

    pub async fn update_project(
        &self,
        actor: &Agent,
        name: &str,
        patch: ProjectPatch,
    ) -> Result<Project> {
        let name = name.to_lowercase();
        let mut project = self.load(&name).await?.ok_or(EngineError::NotFound("project"))?;
        self.require_owner(&name, &actor.id).await?;

        let limits = actor.tier.limits();
        if let Some(description) = patch.description {
            project.description = clamp_text(description, limits.description_chars);
        }
        if let Some(status) = patch.status {
            project.status = status;
        }
        if let Some(tags) = patch.tags {
            project.tags = clamp_tags(tags);
        }
        project.updated = Utc::now();

        self.store.put_json(&keys::project_meta(&name), &project, None).await?;
        Ok(project)
    }

    /// Delete a project and everything under it: tasks (with their comments,
    /// watches and index entries), memberships, watch relations, the public
    /// index entry. Returns the number of tasks removed.
    pub async fn delete_project(&self, actor: &Agent, name: &str) -> Result<u64> {
        let name = name.to_lowercase();
        let project = self.load(&name).await?.ok_or(EngineError::NotFound("project"))?;
        self.require_owner(&name, &actor.id).await?;

        // Tasks first, so a crash mid-cascade leaves the project record as
        // the re-entry point.
        let task_keys = self
            .store
            .list_keys(&keys::task_by_project_prefix(&name), self.config.index_scan_limit)
            .await?;
        let mut tasks_deleted: u64 = 0;
        for key in task_keys {
            let id = keys::last_segment(&key);
            let Some(task) = self.store.get_json::<Task>(&keys::task_meta(id)).await? else {
                // Stale index entry; drop it and move on.
                self.store.delete(&key).await?;
                continue;
            };
            purge_task_records(&self.store, &self.config, &task).await?;
            tasks_deleted += 1;
        }

        self.store.delete(&keys::project_meta(&name)).await?;
        self.store.delete(&keys::project_by_owner(&project.owner_id, &name)).await?;
        if project.visibility == Visibility::Public {
            self.store.delete(&keys::project_public(&name)).await?;
        }

        let member_keys = self
            .store
            .list_keys(&keys::project_member_prefix(&name), self.config.member_scan_limit)
            .await?;
        for key in member_keys {
            let member = AgentId(keys::last_segment(&key).to_string());
            self.store.delete(&key).await?;
            self.store.delete(&keys::project_by_member(&member, &name)).await?;
        }
        self.store.delete(&keys::count_members(&name)).await?;

        for key in self
            .store
            .list_keys(&keys::watch_project_prefix(&name), self.config.watch_scan_limit)
            .await?
        {
            self.store.delete(&key).await?;
        }

        // Task counters (global and per-creator) were already decremented by
        // the per-task purge above.
        self.store.incr(&keys::count_projects_owned(&project.owner_id), -1).await?;
        self.store.incr(keys::STATS_PROJECTS, -1).await?;

        info!(project = %name, tasks_deleted, "project deleted");
        Ok(tasks_deleted)
    }

    // ─── Membership ──────────────────────────────────────────────────────────

    pub async fn add_member(
        &self,
        actor: &Agent,
        name: &str,
        agent_name: &str,
        role: MemberRole,
    ) -> Result<Membership> {
        let name = name.to_lowercase();
        self.load(&name).await?.ok_or(EngineError::NotFound("project"))?;
        self.require_owner(&name, &actor.id).await?;
        self.quota.check(&actor.id, ResourceKind::Member).await?;

        if role == MemberRole::Owner {
            return Err(EngineError::Validation(
                "a project has exactly one owner".to_string(),
            ));
        }

        let target_id = self
            .directory
            .resolve_name(agent_name)
            .await?
            .ok_or(EngineError::NotFound("agent"))?;

        // Re-adding an existing member only updates the role; the member
        // count must not move.
        let existing = self.membership(&name, &target_id).await?;
        if existing.is_none() {
            let limits = actor.tier.limits();
            let counter = keys::count_members(&name);
            let members = self.store.incr(&counter, 1).await?;
            if members as u64 > limits.members {
                self.store.incr(&counter, -1).await?;
                return Err(EngineError::LimitExceeded {
                    resource: "members",
                    current: (members - 1) as u64,
                    limit: limits.members,
                });
            }
        }

        let membership = Membership {
            name: agent_name.to_string(),
            role,
            joined: existing.map_or_else(Utc::now, |m| m.joined),
        };
        self.store
            .put_json(&keys::project_member(&name, &target_id), &membership, None)
            .await?;
        self.store.put_marker(&keys::project_by_member(&target_id, &name)).await?;

        // New members start receiving project events going forward.
        self.store.put_marker(&keys::watch_project(&name, &target_id)).await?;

        debug!(project = %name, member = %target_id, ?role, "member added");
        Ok(membership)
    }

    pub async fn remove_member(&self, actor: &Agent, name: &str, agent_name: &str) -> Result<()> {
        let name = name.to_lowercase();
        self.load(&name).await?.ok_or(EngineError::NotFound("project"))?;
        self.require_owner(&name, &actor.id).await?;

        let target_id = self
            .directory
            .resolve_name(agent_name)
            .await?
            .ok_or(EngineError::NotFound("agent"))?;

        let membership = self
            .membership(&name, &target_id)
            .await?
            .ok_or(EngineError::NotFound("member"))?;
        if membership.role == MemberRole::Owner {
            return Err(EngineError::Validation("cannot remove the owner".to_string()));
        }

        self.store.delete(&keys::project_member(&name, &target_id)).await?;
        self.store.delete(&keys::project_by_member(&target_id, &name)).await?;
        self.store.delete(&keys::watch_project(&name, &target_id)).await?;
        self.store.incr(&keys::count_members(&name), -1).await?;
        Ok(())
    }

    // ─── Watch relations ─────────────────────────────────────────────────────

    pub async fn watch(&self, actor: &Agent, name: &str) -> Result<()> {
        let name = name.to_lowercase();
        let project = self.load(&name).await?.ok_or(EngineError::NotFound("project"))?;
        let membership = self.membership(&name, &actor.id).await?;
        if membership.is_none() && project.visibility != Visibility::Public {
            return Err(EngineError::Forbidden(
                "must be a project member to watch".to_string(),
            ));
        }
        self.store.put_marker(&keys::watch_project(&name, &actor.id)).await?;
        Ok(())
    }

    pub async fn unwatch(&self, actor: &Agent, name: &str) -> Result<()> {
        let name = name.to_lowercase();
        self.store.delete(&keys::watch_project(&name, &actor.id)).await?;
        Ok(())
    }

    async fn require_owner(&self, name: &str, agent: &AgentId) -> Result<()> {
        let membership = self.membership(name, agent).await?;
        if !can_mutate_project(membership.as_ref()) {
            return Err(EngineError::Forbidden("owner access required".to_string()));
        }
        Ok(())
    }
}
