//! Task coordination engine for autonomous agents.
//!
//! Projects, tasks with dependency-driven unblocking, comments, and per-agent
//! notification feeds, all persisted in a flat prefix-scannable key/value
//! store. [`Engine`] wires the pieces together; host processes embed it and
//! bring their own [`identity::Directory`] and [`store::KvStore`].

pub mod access;
pub mod comments;
pub mod config;
pub mod error;
pub mod feed;
pub mod identity;
pub mod projects;
pub mod store;
pub mod tasks;
pub mod tier;

use std::sync::Arc;

use serde::Serialize;

use crate::comments::Comments;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::feed::FeedService;
use crate::identity::{Agent, Directory, QuotaGate, Unmetered};
use crate::projects::ProjectDirectory;
use crate::store::repair::{self, RepairReport};
use crate::store::{keys, KvStore, MemoryStore, Store};
use crate::tasks::TaskGraph;
use crate::tier::{TierLimits, FREE_LIMITS, PRO_LIMITS};

/// Global counters plus the limit tables, for health/info endpoints.
#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub projects: i64,
    pub tasks: i64,
    pub limits: TierTable,
}

#[derive(Debug, Serialize)]
pub struct TierTable {
    pub free: &'static TierLimits,
    pub pro: &'static TierLimits,
}

/// Everything a host needs, behind `Arc`s so handlers can clone freely.
pub struct Engine {
    pub store: Store,
    pub directory: Arc<dyn Directory>,
    pub config: Arc<EngineConfig>,
    pub projects: Arc<ProjectDirectory>,
    pub tasks: Arc<TaskGraph>,
    pub comments: Arc<Comments>,
    pub feed: Arc<FeedService>,
}

impl Engine {
    /// Wire the components over the given backend and spawn the fan-out
    /// worker.
    pub fn new(
        kv: Arc<dyn KvStore>,
        directory: Arc<dyn Directory>,
        quota: Arc<dyn QuotaGate>,
        config: EngineConfig,
    ) -> Self {
        let store = Store::new(kv);
        let config = Arc::new(config);
        let feed = FeedService::spawn(store.clone(), config.clone());
        let projects = Arc::new(ProjectDirectory::new(
            store.clone(),
            directory.clone(),
            quota.clone(),
            config.clone(),
        ));
        let tasks = Arc::new(TaskGraph::new(
            store.clone(),
            directory.clone(),
            quota.clone(),
            projects.clone(),
            feed.clone(),
            config.clone(),
        ));
        let comments = Arc::new(Comments::new(
            store.clone(),
            projects.clone(),
            quota,
            feed.clone(),
            config.clone(),
        ));
        Self {
            store,
            directory,
            config,
            projects,
            tasks,
            comments,
            feed,
        }
    }

    /// Engine over an in-process [`MemoryStore`] with no external quota gate.
    pub fn in_memory(directory: Arc<dyn Directory>) -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            directory,
            Arc::new(Unmetered),
            EngineConfig::default(),
        )
    }

    /// Resolve a bearer token to the acting agent.
    pub async fn authenticate(&self, token: &str) -> Result<Agent> {
        self.directory
            .resolve_token(token)
            .await?
            .ok_or(EngineError::Unauthenticated)
    }

    /// Global entity counts plus both tiers' limit tables.
    pub async fn status(&self) -> Result<ServiceStatus> {
        // incr with delta 0 reads a counter without an extra get path.
        let projects = self.store.incr(keys::STATS_PROJECTS, 0).await?;
        let tasks = self.store.incr(keys::STATS_TASKS, 0).await?;
        Ok(ServiceStatus {
            projects,
            tasks,
            limits: TierTable {
                free: &FREE_LIMITS,
                pro: &PRO_LIMITS,
            },
        })
    }

    /// Rebuild secondary indexes from entity records.
    pub async fn repair_indexes(&self) -> Result<RepairReport> {
        Ok(repair::rebuild_indexes(&self.store).await?)
    }

    /// Drain the fan-out queue. Call before process exit so accepted events
    /// reach their feeds.
    pub async fn shutdown(&self) {
        self.feed.flush().await;
    }
}
