//! Store seam for the collection cycle.
//!
//! The cycle programs against [`StateStore`] so it can run over the Postgres
//! store in production and an in-memory store in tests. `vdx-db` provides
//! the Postgres implementation.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use vdx_dex::{KeyValueGroups, Summary};
use vdx_reconcile::{ErrorRecord, MachineDexState};

/// A tenant whose machines are collected together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
}

/// A provisioned vending machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine {
    pub id: Uuid,
    pub case_serial: String,
    pub latest_dex_timestamp: Option<DateTime<Utc>>,
}

/// One ingested capture, stored verbatim alongside its derived data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDexCapture {
    pub machine_id: Uuid,
    pub dex_id: i64,
    pub created_at: DateTime<Utc>,
    pub raw: String,
    pub summary: Summary,
    pub groups: KeyValueGroups,
}

/// Persistence operations the cycle needs. All writes are per-machine
/// upserts and safe to retry.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn companies(&self) -> Result<Vec<Company>>;

    async fn machines_for_company(&self, company_id: Uuid) -> Result<Vec<Machine>>;

    /// Stored error list alone, for callers that do not need full state.
    async fn errors_for_machine(&self, machine_id: Uuid) -> Result<Vec<ErrorRecord>>;

    /// Full stored DEX state, `None` for a machine never collected.
    async fn dex_state_for_machine(&self, machine_id: Uuid) -> Result<Option<MachineDexState>>;

    async fn upsert_machine_dex_state(
        &self,
        machine_id: Uuid,
        state: &MachineDexState,
    ) -> Result<()>;

    async fn insert_dex_capture(&self, capture: &NewDexCapture) -> Result<()>;
}
