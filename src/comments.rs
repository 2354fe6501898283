//! Append-only comment ledger, scoped to a task. Comments are ordered by
//! their chronological key and removed only when the task is deleted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::access::can_access_task;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::feed::{Event, EventKind, FeedService};
use crate::identity::{Agent, AgentId, QuotaGate, ResourceKind};
use crate::projects::ProjectDirectory;
use crate::store::{keys, Store};
use crate::tasks::model::Task;

pub const COMMENT_MAX_BYTES: usize = 2048;
const PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub task_id: String,
    pub author_id: AgentId,
    pub author_name: String,
    pub text: String,
    pub created: DateTime<Utc>,
}

pub struct Comments {
    store: Store,
    projects: Arc<ProjectDirectory>,
    quota: Arc<dyn QuotaGate>,
    feed: Arc<FeedService>,
    config: Arc<EngineConfig>,
}

impl Comments {
    pub fn new(
        store: Store,
        projects: Arc<ProjectDirectory>,
        quota: Arc<dyn QuotaGate>,
        feed: Arc<FeedService>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self { store, projects, quota, feed, config }
    }

    async fn accessible_task(&self, actor: &Agent, task_id: &str) -> Result<Task> {
        let task: Task = self
            .store
            .get_json(&keys::task_meta(task_id))
            .await?
            .ok_or(EngineError::NotFound("task"))?;
        let membership = match &task.project {
            Some(project) => self.projects.membership(project, &actor.id).await?,
            None => None,
        };
        if !can_access_task(&task, &actor.id, membership.as_ref()) {
            return Err(EngineError::Forbidden("no access to this task".to_string()));
        }
        Ok(task)
    }

    pub async fn add_comment(&self, actor: &Agent, task_id: &str, text: &str) -> Result<Comment> {
        let task = self.accessible_task(actor, task_id).await?;
        self.quota.check(&actor.id, ResourceKind::Comment).await?;

        if text.is_empty() {
            return Err(EngineError::Validation("text is required".to_string()));
        }
        if text.len() > COMMENT_MAX_BYTES {
            return Err(EngineError::PayloadTooLarge { limit: COMMENT_MAX_BYTES });
        }

        let limits = actor.tier.limits();
        let counter = keys::count_comments(task_id);
        let count = self.store.incr(&counter, 1).await?;
        if count as u64 > limits.comments {
            self.store.incr(&counter, -1).await?;
            return Err(EngineError::LimitExceeded {
                resource: "comments",
                current: (count - 1) as u64,
                limit: limits.comments,
            });
        }

        let now = Utc::now();
        let hex = uuid::Uuid::new_v4().simple().to_string();
        let comment = Comment {
            id: format!("c_{}", &hex[..12]),
            task_id: task_id.to_string(),
            author_id: actor.id.clone(),
            author_name: actor.name.clone(),
            text: text.to_string(),
            created: now,
        };
        let key = keys::task_comment(task_id, now.timestamp_millis(), &comment.id);
        self.store.put_json(&key, &comment, None).await?;

        self.feed.emit(
            Event::new(
                EventKind::CommentAdded {
                    comment_id: comment.id.clone(),
                    preview: text.chars().take(PREVIEW_CHARS).collect(),
                },
                Some(task_id),
                Some(&task.title),
                task.project.as_deref(),
                &actor.name,
            ),
            actor.tier.limits().feed_ttl(),
        );
        Ok(comment)
    }

    /// Comments in creation order.
    pub async fn list_comments(&self, actor: &Agent, task_id: &str) -> Result<Vec<Comment>> {
        self.accessible_task(actor, task_id).await?;
        let listed = self
            .store
            .list_keys(&keys::task_comment_prefix(task_id), self.config.comment_scan_limit)
            .await?;
        let mut comments = Vec::new();
        for key in listed {
            if let Some(comment) = self.store.get_json::<Comment>(&key).await? {
                comments.push(comment);
            }
        }
        Ok(comments)
    }
}
