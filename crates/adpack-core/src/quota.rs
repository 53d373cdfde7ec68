//! Abstract quota interfaces.
//!
//! The concrete implementation lives in `adpack-quota`. We keep only traits here
//! so any crate can depend on the API without pulling the counter backends.

use crate::id::WorkspaceId;

/// A held concurrency slot.
///
/// The concrete type lives in `adpack-quota`. It must be RAII (releases on
/// Drop, exactly once), `Send`, and panic-safe.
pub trait QuotaSlot: Send {
    fn workspace(&self) -> WorkspaceId;
    /// Optional debug tag for tracing (`init`, `render`, ...).
    fn stage(&self) -> &'static str {
        "slot"
    }
}

/// Result of an admission attempt.
#[derive(Debug)]
pub enum Admission<S> {
    Granted(S),
    /// Ceiling reached; the caller must surface `quota_exceeded`.
    Denied { in_flight: usize, ceiling: usize },
    /// The counter backend failed. Treated as not admitted.
    Unavailable(String),
}

impl<S> Admission<S> {
    pub fn granted(self) -> Option<S> {
        match self {
            Admission::Granted(s) => Some(s),
            _ => None,
        }
    }
}

/// Per-workspace concurrency gate.
pub trait QuotaGate: Send + Sync + 'static {
    type Slot: QuotaSlot;

    /// Attempt to take one slot for `workspace`.
    fn try_admit(&self, workspace: WorkspaceId, stage: &'static str) -> Admission<Self::Slot>;

    /// Configured ceiling per workspace.
    fn ceiling(&self) -> usize;

    /// Current in-flight count (advisory; not a correctness API).
    fn in_flight(&self, workspace: WorkspaceId) -> usize;
}

// NOTE: no default impls that would silently admit. Slots are only
// constructed by the quota crate.
