//! [`StateStore`] over Postgres.
//!
//! History, summary, and error documents are stored as JSONB in the shapes
//! the reconciliation layer serializes; this module never interprets them
//! beyond (de)serialization.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;
use vdx_collector::{Company, Machine, NewDexCapture, StateStore};
use vdx_reconcile::{ErrorRecord, MachineDexState};

/// Postgres-backed store for the collection cycle.
#[derive(Debug, Clone)]
pub struct PgStateStore {
    pool: PgPool,
}

impl PgStateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StateStore for PgStateStore {
    async fn companies(&self) -> Result<Vec<Company>> {
        let rows: Vec<(Uuid, String)> =
            sqlx::query_as("select id, name from companies order by name")
                .fetch_all(&self.pool)
                .await
                .context("listing companies failed")?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| Company { id, name })
            .collect())
    }

    async fn machines_for_company(&self, company_id: Uuid) -> Result<Vec<Machine>> {
        let rows: Vec<(Uuid, String, Option<DateTime<Utc>>)> = sqlx::query_as(
            r#"
            select m.id, m.case_serial, s.latest_dex_timestamp
            from machines m
            left join machine_dex_state s on s.machine_id = m.id
            where m.company_id = $1
            order by m.case_serial
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .context("listing machines failed")?;

        Ok(rows
            .into_iter()
            .map(|(id, case_serial, latest_dex_timestamp)| Machine {
                id,
                case_serial,
                latest_dex_timestamp,
            })
            .collect())
    }

    async fn errors_for_machine(&self, machine_id: Uuid) -> Result<Vec<ErrorRecord>> {
        let row: Option<(Value,)> =
            sqlx::query_as("select latest_errors from machine_dex_state where machine_id = $1")
                .bind(machine_id)
                .fetch_optional(&self.pool)
                .await
                .context("loading machine errors failed")?;

        match row {
            None => Ok(Vec::new()),
            Some((errors,)) => {
                serde_json::from_value(errors).context("stored error list is malformed")
            }
        }
    }

    async fn dex_state_for_machine(&self, machine_id: Uuid) -> Result<Option<MachineDexState>> {
        let row: Option<(String, Option<DateTime<Utc>>, Value, Option<Value>, Value)> =
            sqlx::query_as(
                r#"
                select case_serial, latest_dex_timestamp, dex_history,
                       latest_summary, latest_errors
                from machine_dex_state
                where machine_id = $1
                "#,
            )
            .bind(machine_id)
            .fetch_optional(&self.pool)
            .await
            .context("loading machine state failed")?;

        let Some((case_serial, latest_dex_timestamp, history, summary, errors)) = row else {
            return Ok(None);
        };

        Ok(Some(MachineDexState {
            case_serial,
            latest_dex_timestamp,
            dex_history: serde_json::from_value(history)
                .context("stored capture history is malformed")?,
            latest_summary: summary
                .map(serde_json::from_value)
                .transpose()
                .context("stored summary is malformed")?,
            latest_errors: serde_json::from_value(errors)
                .context("stored error list is malformed")?,
        }))
    }

    async fn upsert_machine_dex_state(
        &self,
        machine_id: Uuid,
        state: &MachineDexState,
    ) -> Result<()> {
        sqlx::query(
            r#"
            insert into machine_dex_state (
              machine_id, case_serial, latest_dex_timestamp, dex_history,
              latest_summary, latest_errors, updated_at
            ) values (
              $1, $2, $3, $4, $5, $6, now()
            )
            on conflict (machine_id) do update set
              case_serial          = excluded.case_serial,
              latest_dex_timestamp = excluded.latest_dex_timestamp,
              dex_history          = excluded.dex_history,
              latest_summary       = excluded.latest_summary,
              latest_errors        = excluded.latest_errors,
              updated_at           = now()
            "#,
        )
        .bind(machine_id)
        .bind(&state.case_serial)
        .bind(state.latest_dex_timestamp)
        .bind(serde_json::to_value(&state.dex_history)?)
        .bind(
            state
                .latest_summary
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?,
        )
        .bind(serde_json::to_value(&state.latest_errors)?)
        .execute(&self.pool)
        .await
        .context("upserting machine state failed")?;

        Ok(())
    }

    async fn insert_dex_capture(&self, capture: &NewDexCapture) -> Result<()> {
        sqlx::query(
            r#"
            insert into dex_captures (
              machine_id, dex_id, created_at, raw, summary, key_groups
            ) values (
              $1, $2, $3, $4, $5, $6
            )
            on conflict (machine_id, dex_id) do nothing
            "#,
        )
        .bind(capture.machine_id)
        .bind(capture.dex_id)
        .bind(capture.created_at)
        .bind(&capture.raw)
        .bind(serde_json::to_value(&capture.summary)?)
        .bind(serde_json::to_value(&capture.groups)?)
        .execute(&self.pool)
        .await
        .context("inserting capture failed")?;

        Ok(())
    }
}
