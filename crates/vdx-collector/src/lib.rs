//! vdx-collector
//!
//! Collection-cycle orchestration: per scheduled run, walk companies
//! sequentially, pull the upstream DEX metadata listing, select the delta
//! since the last run, fetch/parse/reconcile each new capture, and persist
//! per-machine state.
//!
//! Failure isolation rules:
//! - A failed record fetch skips that record (and the rest of that machine's
//!   queue for this cycle, so its watermark never jumps a gap); other
//!   machines continue.
//! - A credential or login failure fails that company only.
//! - The cycle itself never errors: the [`CycleReport`] carries per-company
//!   success or failure.
//!
//! No shared mutable state exists between machines; each machine's
//! reconciliation reads its own stored errors and writes its own state, and
//! store writes are idempotent upserts.

mod credentials;
mod cycle;
mod store;

pub use credentials::{CredentialSource, EnvCredentials};
pub use cycle::{run_cycle, CycleOptions, CyclePhase};
pub use store::{Company, Machine, NewDexCapture, StateStore};
