//! vdx-reconcile
//!
//! Fault-history reconciliation and incremental collection selection.
//!
//! Architectural decisions:
//! - EA1 records are event-sourced: identity is (code, local timestamp);
//!   a record survives, actioned or not, until a newer same-code event
//!   supersedes it.
//! - MA5 records are level-triggered: identity is code alone; a fresh
//!   capture's code list replaces MA5 state wholesale, preserving only the
//!   actioned flag for codes that persist.
//! - An unactioned error is never silently dropped.
//! - Reconcile is idempotent: feeding its own output back with the same
//!   capture yields the same output.
//! - Selection is watermark-based: fetch only records newer than the
//!   machine's latest observed capture timestamp.
//!
//! Deterministic, pure logic. No IO. No portal calls.

mod engine;
mod selector;
mod types;
mod watermark;

pub use engine::{ea1_candidates, ma5_candidates, reconcile};
pub use selector::select_records_to_fetch;
pub use types::*;
pub use watermark::{CaptureFreshness, CaptureWatermark};
