//! Explicit status state machine.
//!
//! Any authorized actor may set any of the six statuses; there is no
//! transition table restricting pairs. What the machine pins down is the
//! side effects: which index moves, which events, and whether dependency
//! resolution runs. `apply_transition` is pure and storage-free.

use super::model::TaskStatus;

/// Side effects of one status transition, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    /// Move the by-status index entry (delete old key, write new key).
    ReindexStatus { from: TaskStatus, to: TaskStatus },
    /// Emit a `status_changed` event with before/after values.
    EmitStatusChanged { from: TaskStatus, to: TaskStatus },
    /// The task entered `done`: re-evaluate blocked dependents.
    ResolveDependents,
}

/// Compute the side effects of setting `new` on a task currently at `old`.
/// Same-status writes produce no effects at all, which is what makes
/// repeated `done` writes idempotent for successors.
pub fn apply_transition(old: TaskStatus, new: TaskStatus) -> Vec<SideEffect> {
    if old == new {
        return Vec::new();
    }
    let mut effects = vec![
        SideEffect::ReindexStatus { from: old, to: new },
        SideEffect::EmitStatusChanged { from: old, to: new },
    ];
    if new == TaskStatus::Done {
        effects.push(SideEffect::ResolveDependents);
    }
    effects
}

/// Initial status at creation time: blocked iff any dependency is not done.
/// Checked on first insertion only, never re-verified afterwards.
pub fn initial_status(any_dependency_incomplete: bool) -> TaskStatus {
    if any_dependency_incomplete {
        TaskStatus::Blocked
    } else {
        TaskStatus::Todo
    }
}
