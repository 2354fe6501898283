use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Service level of the acting agent. Drives numeric caps and feed retention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Free,
    Pro,
}

impl Tier {
    pub fn limits(self) -> &'static TierLimits {
        match self {
            Tier::Free => &FREE_LIMITS,
            Tier::Pro => &PRO_LIMITS,
        }
    }
}

/// Numeric caps for one tier.
#[derive(Debug, Clone, Serialize)]
pub struct TierLimits {
    /// Projects owned per agent.
    pub projects: u64,
    /// Tasks created per agent.
    pub tasks: u64,
    /// Subtasks per parent task.
    pub subtasks: u64,
    /// Comments per task.
    pub comments: u64,
    /// Members per project (owner included).
    pub members: u64,
    /// Description length in characters (projects and tasks).
    pub description_chars: usize,
    /// Feed event retention in seconds.
    pub feed_ttl_secs: u64,
}

impl TierLimits {
    pub fn feed_ttl(&self) -> Duration {
        Duration::from_secs(self.feed_ttl_secs)
    }
}

pub static FREE_LIMITS: TierLimits = TierLimits {
    projects: 3,
    tasks: 50,
    subtasks: 10,
    comments: 20,
    members: 10,
    description_chars: 1024,
    feed_ttl_secs: 604_800, // 7 days
};

pub static PRO_LIMITS: TierLimits = TierLimits {
    projects: 50,
    tasks: 2000,
    subtasks: 50,
    comments: 200,
    members: 50,
    description_chars: 4096,
    feed_ttl_secs: 2_592_000, // 30 days
};
