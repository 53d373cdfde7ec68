//! QuotaGate + RAII slot implementations.
//!
//! Callers take a slot once at the top of a scope and let it fall out of scope.
//! Dropping the guard returns the slot (panic-safe, cancellation-safe).

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use adpack_core::id::WorkspaceId;
use adpack_core::quota::{Admission, QuotaGate, QuotaSlot};

use crate::error::{Error, Result};
use crate::tracking::PeakTracker;

/// Backend owning the per-workspace counters.
///
/// Both operations must be single atomic steps against the shared counter
/// (compare-and-swap, or `UPDATE ... SET n = n + 1 WHERE n < ceiling`), never
/// read-then-write, because several request handlers admit concurrently.
pub trait CounterStore: Send + Sync {
    /// Increment when the counter is below `ceiling`. Returns the new value,
    /// or `None` when the workspace is full.
    fn try_increment(&self, workspace: WorkspaceId, ceiling: usize) -> Result<Option<usize>>;

    /// Decrement by one. Fails with [`Error::Underflow`] instead of going negative.
    fn decrement(&self, workspace: WorkspaceId) -> Result<usize>;

    /// Current value (advisory).
    fn current(&self, workspace: WorkspaceId) -> Result<usize>;
}

/// In-process counters: one atomic per workspace.
#[derive(Default)]
pub struct LocalCounters {
    counters: Mutex<HashMap<WorkspaceId, Arc<AtomicUsize>>>,
}

impl LocalCounters {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, workspace: WorkspaceId) -> Result<Arc<AtomicUsize>> {
        let mut map = self
            .counters
            .lock()
            .map_err(|_| Error::Backend("quota counter map poisoned".into()))?;
        Ok(Arc::clone(map.entry(workspace).or_default()))
    }
}

/// Compare-and-swap increment bounded by `ceiling`.
pub fn cas_increment(counter: &AtomicUsize, ceiling: usize) -> Option<usize> {
    loop {
        let cur = counter.load(Ordering::Relaxed);
        if cur >= ceiling {
            return None;
        }
        if counter
            .compare_exchange(cur, cur + 1, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            return Some(cur + 1);
        }
    }
}

/// Compare-and-swap decrement that refuses to cross zero.
pub fn cas_decrement(counter: &AtomicUsize) -> Option<usize> {
    loop {
        let cur = counter.load(Ordering::Relaxed);
        if cur == 0 {
            return None;
        }
        if counter
            .compare_exchange(cur, cur - 1, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            return Some(cur - 1);
        }
    }
}

impl CounterStore for LocalCounters {
    fn try_increment(&self, workspace: WorkspaceId, ceiling: usize) -> Result<Option<usize>> {
        Ok(cas_increment(&*self.counter(workspace)?, ceiling))
    }

    fn decrement(&self, workspace: WorkspaceId) -> Result<usize> {
        cas_decrement(&*self.counter(workspace)?).ok_or(Error::Underflow(workspace))
    }

    fn current(&self, workspace: WorkspaceId) -> Result<usize> {
        Ok(self.counter(workspace)?.load(Ordering::Relaxed))
    }
}

/// Shared inner state for the manager.
struct ManagerInner {
    store: Arc<dyn CounterStore>,
    ceiling: usize,
    peak: PeakTracker,
}

impl ManagerInner {
    fn release(&self, workspace: WorkspaceId, stage: &'static str) {
        match self.store.decrement(workspace) {
            Ok(left) => {
                tracing::debug!(%workspace, stage, in_flight = left, "quota slot released");
            }
            Err(e) => {
                tracing::error!(%workspace, stage, error = %e, "quota release failed");
            }
        }
    }
}

/// Concrete quota gate used by the pipeline.
#[derive(Clone)]
pub struct QuotaManager {
    inner: Arc<ManagerInner>,
}

impl QuotaManager {
    pub fn new(store: Arc<dyn CounterStore>, ceiling: usize) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                store,
                ceiling,
                peak: PeakTracker::new(),
            }),
        }
    }

    /// Manager over fresh in-process counters.
    pub fn local(ceiling: usize) -> Self {
        Self::new(Arc::new(LocalCounters::new()), ceiling)
    }

    /// Take a slot or explain why not.
    pub fn admit(&self, workspace: WorkspaceId, stage: &'static str) -> Result<SlotGuard> {
        let inc = self.inner.store.try_increment(workspace, self.inner.ceiling)?;
        match inc {
            Some(in_flight) => {
                self.inner.peak.record(in_flight);
                tracing::debug!(%workspace, stage, in_flight, "quota slot admitted");
                Ok(SlotGuard {
                    inner: Arc::clone(&self.inner),
                    workspace,
                    stage,
                    armed: true,
                })
            }
            None => Err(Error::Exceeded {
                workspace,
                in_flight: self.in_flight(workspace),
                ceiling: self.inner.ceiling,
            }),
        }
    }

    /// Highest in-flight value any workspace reached through this manager.
    pub fn peak_in_flight(&self) -> usize {
        self.inner.peak.peak()
    }
}

impl QuotaGate for QuotaManager {
    type Slot = SlotGuard;

    fn try_admit(&self, workspace: WorkspaceId, stage: &'static str) -> Admission<SlotGuard> {
        match self.admit(workspace, stage) {
            Ok(slot) => Admission::Granted(slot),
            Err(Error::Exceeded {
                in_flight, ceiling, ..
            }) => Admission::Denied { in_flight, ceiling },
            Err(e) => Admission::Unavailable(e.to_string()),
        }
    }

    fn ceiling(&self) -> usize {
        self.inner.ceiling
    }

    fn in_flight(&self, workspace: WorkspaceId) -> usize {
        self.inner.store.current(workspace).unwrap_or(0)
    }
}

/// RAII slot. Dropping it decrements the workspace counter exactly once.
pub struct SlotGuard {
    inner: Arc<ManagerInner>,
    workspace: WorkspaceId,
    stage: &'static str,
    armed: bool,
}

impl SlotGuard {
    /// Give the slot back before the end of scope. Consumes the guard, so a
    /// second release cannot be expressed.
    pub fn release(mut self) {
        self.disarm_and_release();
    }

    fn disarm_and_release(&mut self) {
        if self.armed {
            self.armed = false;
            self.inner.release(self.workspace, self.stage);
        }
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.disarm_and_release();
    }
}

impl std::fmt::Debug for SlotGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotGuard")
            .field("workspace", &self.workspace)
            .field("stage", &self.stage)
            .field("armed", &self.armed)
            .finish()
    }
}

// ----- trait impls -----

impl QuotaSlot for SlotGuard {
    fn workspace(&self) -> WorkspaceId {
        self.workspace
    }
    fn stage(&self) -> &'static str {
        self.stage
    }
}
