//! Notification fan-out and per-agent activity feeds.
//!
//! One logical event is delivered as one physical copy per watcher, written
//! under a reverse-chronological per-agent key with a tier-dependent TTL.
//! Delivery runs on a spawned worker behind an unbounded queue: `emit`
//! enqueues and returns, and nothing about the triggering operation rolls
//! back if a watcher's write fails; that copy is logged and skipped.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::identity::{Agent, AgentId};
use crate::store::{keys, Store};
use crate::tasks::model::TaskStatus;

/// Actor name recorded on dependency-triggered unblock events.
pub const SYSTEM_ACTOR: &str = "system";

/// Event payloads, tagged by `type` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    TaskCreated {
        title: String,
    },
    StatusChanged {
        from: TaskStatus,
        to: TaskStatus,
    },
    AssigneeChanged {
        from: Option<AgentId>,
        to: Option<AgentId>,
    },
    TaskUnblocked {
        unblocked_by: String,
    },
    SubtaskCreated {
        parent_id: String,
        title: String,
    },
    CommentAdded {
        comment_id: String,
        preview: String,
    },
}

/// One feed event, persisted once per interested watcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn new(
        kind: EventKind,
        task_id: Option<&str>,
        task_title: Option<&str>,
        project: Option<&str>,
        actor: &str,
    ) -> Self {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        Self {
            id: hex[..12].to_string(),
            task_id: task_id.map(String::from),
            task_title: task_title.map(String::from),
            project: project.map(String::from),
            actor: actor.to_string(),
            timestamp: Utc::now(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedQuery {
    /// Drop events older than this timestamp.
    pub since: Option<DateTime<Utc>>,
    /// Keep only events for this project.
    pub project: Option<String>,
    pub limit: Option<usize>,
}

enum Job {
    Deliver { event: Box<Event>, ttl: Duration },
    Flush(oneshot::Sender<()>),
}

/// Fan-out queue plus feed reads.
pub struct FeedService {
    store: Store,
    config: Arc<EngineConfig>,
    tx: mpsc::UnboundedSender<Job>,
}

impl FeedService {
    /// Create the service and spawn its delivery worker.
    pub fn spawn(store: Store, config: Arc<EngineConfig>) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let service = Arc::new(Self { store: store.clone(), config: config.clone(), tx });
        tokio::spawn(run_worker(store, config, rx));
        service
    }

    /// Enqueue one event for delivery to its watcher set. Fire-and-forget:
    /// the triggering operation has already succeeded.
    pub fn emit(&self, event: Event, ttl: Duration) {
        if self
            .tx
            .send(Job::Deliver { event: Box::new(event), ttl })
            .is_err()
        {
            warn!("fan-out worker is gone, dropping event");
        }
    }

    /// Barrier: resolves once every event enqueued before it is delivered.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Job::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    /// Union of the watch relations registered under a task and a project.
    pub async fn compute_watchers(
        &self,
        task_id: Option<&str>,
        project: Option<&str>,
    ) -> Result<BTreeSet<AgentId>> {
        Ok(compute_watchers(&self.store, &self.config, task_id, project).await?)
    }

    /// Newest-first page of the agent's feed. No cross-agent deduplication.
    pub async fn get_feed(&self, actor: &Agent, query: FeedQuery) -> Result<Vec<Event>> {
        let limit = query
            .limit
            .unwrap_or(self.config.feed_default_page)
            .min(self.config.feed_page_cap)
            .max(1);

        // Over-scan to leave room for filtered-out entries.
        let listed = self
            .store
            .list_keys(&keys::feed_prefix(&actor.id), limit * 2)
            .await?;

        let mut events = Vec::new();
        for key in listed {
            let Some(event) = self.store.get_json::<Event>(&key).await? else {
                continue;
            };
            if let Some(since) = query.since {
                if event.timestamp < since {
                    continue;
                }
            }
            if let Some(project) = &query.project {
                if event.project.as_deref() != Some(project.as_str()) {
                    continue;
                }
            }
            events.push(event);
            if events.len() >= limit {
                break;
            }
        }
        Ok(events)
    }
}

async fn run_worker(
    store: Store,
    config: Arc<EngineConfig>,
    mut rx: mpsc::UnboundedReceiver<Job>,
) {
    while let Some(job) = rx.recv().await {
        match job {
            Job::Deliver { event, ttl } => deliver(&store, &config, &event, ttl).await,
            Job::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

async fn deliver(store: &Store, config: &EngineConfig, event: &Event, ttl: Duration) {
    let watchers =
        match compute_watchers(store, config, event.task_id.as_deref(), event.project.as_deref())
            .await
        {
            Ok(w) => w,
            Err(e) => {
                warn!(event_id = %event.id, err = %e, "failed to compute watcher set");
                return;
            }
        };

    let ts_ms = event.timestamp.timestamp_millis();
    for agent in watchers {
        let key = keys::feed_entry(&agent, ts_ms, &event.id);
        if let Err(e) = store.put_json(&key, event, Some(ttl)).await {
            // Partial delivery is acceptable; the watcher can re-read state.
            warn!(event_id = %event.id, watcher = %agent, err = %e, "feed write failed");
        }
    }
}

async fn compute_watchers(
    store: &Store,
    config: &EngineConfig,
    task_id: Option<&str>,
    project: Option<&str>,
) -> crate::store::StoreResult<BTreeSet<AgentId>> {
    let mut watchers = BTreeSet::new();
    if let Some(task_id) = task_id {
        for key in store
            .list_keys(&keys::watch_task_prefix(task_id), config.watch_scan_limit)
            .await?
        {
            watchers.insert(AgentId(keys::last_segment(&key).to_string()));
        }
    }
    if let Some(project) = project {
        for key in store
            .list_keys(&keys::watch_project_prefix(project), config.watch_scan_limit)
            .await?
        {
            watchers.insert(AgentId(keys::last_segment(&key).to_string()));
        }
    }
    Ok(watchers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::tier::Tier;

    fn test_store() -> Store {
        Store::new(Arc::new(MemoryStore::new()))
    }

    fn agent(id: &str) -> Agent {
        Agent { id: AgentId(id.into()), name: id.into(), tier: Tier::Free }
    }

    #[tokio::test]
    async fn fan_out_reaches_task_and_project_watchers() {
        let store = test_store();
        let feed = FeedService::spawn(store.clone(), Arc::new(EngineConfig::default()));

        store.put_marker(&keys::watch_task("t_1", &AgentId("a_1".into()))).await.unwrap();
        store.put_marker(&keys::watch_project("p1", &AgentId("a_2".into()))).await.unwrap();

        let event = Event::new(
            EventKind::TaskCreated { title: "hello".into() },
            Some("t_1"),
            Some("hello"),
            Some("p1"),
            "a_1",
        );
        feed.emit(event, Duration::from_secs(60));
        feed.flush().await;

        for a in ["a_1", "a_2"] {
            let events = feed.get_feed(&agent(a), FeedQuery::default()).await.unwrap();
            assert_eq!(events.len(), 1, "watcher {a} should see the event");
        }
        // Non-watchers see nothing.
        let events = feed.get_feed(&agent("a_3"), FeedQuery::default()).await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn feed_is_newest_first_and_filtered() {
        let store = test_store();
        let feed = FeedService::spawn(store.clone(), Arc::new(EngineConfig::default()));
        let me = AgentId("a_1".into());
        store.put_marker(&keys::watch_task("t_1", &me)).await.unwrap();

        for (i, project) in [("one", "p1"), ("two", "p2")].iter().enumerate() {
            let mut event = Event::new(
                EventKind::TaskCreated { title: i.to_string() },
                Some("t_1"),
                None,
                Some(project.1),
                "a_1",
            );
            // Force distinct, ordered timestamps.
            event.timestamp = Utc::now() + chrono::Duration::milliseconds(i as i64 + 1);
            feed.emit(event, Duration::from_secs(60));
        }
        feed.flush().await;

        let events = feed.get_feed(&agent("a_1"), FeedQuery::default()).await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].timestamp > events[1].timestamp);

        let only_p2 = feed
            .get_feed(
                &agent("a_1"),
                FeedQuery { project: Some("p2".into()), ..Default::default() },
            )
            .await
            .unwrap();
        assert_eq!(only_p2.len(), 1);
    }
}
