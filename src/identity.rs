//! Identity and quota collaborator seams.
//!
//! The engine does not own agent registration or per-tenant accounting; it
//! consumes both through these traits. `StaticDirectory` is the embedded
//! implementation used by tests and single-process deployments.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::tier::Tier;

/// Opaque, globally unique agent identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An authenticated agent, as resolved from a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub tier: Tier,
}

/// Identity service interface: token to agent, name to id.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Resolve a bearer token to an agent, or `None` if unknown/expired.
    async fn resolve_token(&self, token: &str) -> Result<Option<Agent>>;

    /// Resolve an agent name (case-insensitive) to its id.
    async fn resolve_name(&self, name: &str) -> Result<Option<AgentId>>;
}

/// Resource kinds the external quota gate meters on create operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Project,
    Task,
    Subtask,
    Comment,
    Member,
}

/// Per-tenant quota gate consulted before any create. Rejecting here means
/// no writes have happened yet.
#[async_trait]
pub trait QuotaGate: Send + Sync {
    async fn check(&self, agent: &AgentId, resource: ResourceKind) -> Result<()>;
}

/// Quota gate that admits everything. Tier caps still apply inside the engine.
pub struct Unmetered;

#[async_trait]
impl QuotaGate for Unmetered {
    async fn check(&self, _agent: &AgentId, _resource: ResourceKind) -> Result<()> {
        Ok(())
    }
}

// ─── StaticDirectory ─────────────────────────────────────────────────────────

struct DirectoryInner {
    by_token: HashMap<String, Agent>,
    by_name: HashMap<String, AgentId>,
}

/// In-memory directory. Register agents up front, hand out their tokens.
pub struct StaticDirectory {
    inner: Arc<RwLock<DirectoryInner>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(DirectoryInner {
                by_token: HashMap::new(),
                by_name: HashMap::new(),
            })),
        }
    }

    /// Register an agent and return the bearer token that resolves to it.
    pub async fn register(&self, id: &str, name: &str, tier: Tier) -> String {
        let token = format!("tok_{}", uuid::Uuid::new_v4().simple());
        let agent = Agent {
            id: AgentId(id.to_string()),
            name: name.to_string(),
            tier,
        };
        let mut inner = self.inner.write().await;
        inner.by_name.insert(name.to_lowercase(), agent.id.clone());
        inner.by_token.insert(token.clone(), agent);
        token
    }
}

impl Default for StaticDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn resolve_token(&self, token: &str) -> Result<Option<Agent>> {
        Ok(self.inner.read().await.by_token.get(token).cloned())
    }

    async fn resolve_name(&self, name: &str) -> Result<Option<AgentId>> {
        Ok(self.inner.read().await.by_name.get(&name.to_lowercase()).cloned())
    }
}
