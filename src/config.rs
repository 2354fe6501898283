use serde::{Deserialize, Serialize};

const DEFAULT_UNBLOCK_SCAN_LIMIT: usize = 1000;
const DEFAULT_WATCH_SCAN_LIMIT: usize = 200;
const DEFAULT_MEMBER_SCAN_LIMIT: usize = 200;
const DEFAULT_COMMENT_SCAN_LIMIT: usize = 500;
const DEFAULT_INDEX_SCAN_LIMIT: usize = 1000;
const DEFAULT_FEED_PAGE_CAP: usize = 50;
const DEFAULT_FEED_DEFAULT_PAGE: usize = 20;

/// Tunable engine parameters.
///
/// Every prefix scan the engine issues is bounded by one of these caps.
/// Candidates beyond a cap are simply not examined, so very large blocked
/// sets or projects are a scaling limit rather than a correctness issue.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Max candidate tasks examined by one dependency-resolution pass.
    pub unblock_scan_limit: usize,
    /// Max watch relations unioned into one fan-out target set (per subject).
    pub watch_scan_limit: usize,
    /// Max memberships enumerated per project (cascade delete, member list).
    pub member_scan_limit: usize,
    /// Max comments enumerated per task.
    pub comment_scan_limit: usize,
    /// Max index keys loaded by one list endpoint before secondary filters.
    pub index_scan_limit: usize,
    /// Hard cap on `limit` for feed reads.
    pub feed_page_cap: usize,
    /// Feed page size when the caller does not pass `limit`.
    pub feed_default_page: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unblock_scan_limit: DEFAULT_UNBLOCK_SCAN_LIMIT,
            watch_scan_limit: DEFAULT_WATCH_SCAN_LIMIT,
            member_scan_limit: DEFAULT_MEMBER_SCAN_LIMIT,
            comment_scan_limit: DEFAULT_COMMENT_SCAN_LIMIT,
            index_scan_limit: DEFAULT_INDEX_SCAN_LIMIT,
            feed_page_cap: DEFAULT_FEED_PAGE_CAP,
            feed_default_page: DEFAULT_FEED_DEFAULT_PAGE,
        }
    }
}
