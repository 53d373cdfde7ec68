#![forbid(unsafe_code)]
//! adpack-quota: per-workspace admission control.
//!
//! This crate provides the concrete implementation of the *interfaces* defined
//! in `adpack-core::quota`. Every pipeline stage that talks to an external
//! service runs inside a slot taken here; dropping the slot gives it back.
//!
//! The counter itself lives behind [`CounterStore`] so the relational store can
//! own it (implemented by `adpack-io`). [`LocalCounters`] is the in-process
//! backend.

pub mod error;
pub mod guard;
pub mod tracking;

pub use error::{Error, Result};
pub use guard::{cas_decrement, cas_increment, CounterStore, LocalCounters, QuotaManager, SlotGuard};
pub use tracking::PeakTracker;
