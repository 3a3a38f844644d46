//! Postgres persistence: pool setup, embedded migrations, provisioning
//! queries, and the [`PgStateStore`] implementation of the collection
//! cycle's store seam.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

mod store;

pub use store::PgStateStore;

pub const ENV_DB_URL: &str = "VDX_DATABASE_URL";

/// Connect to Postgres using VDX_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url =
        std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Simple status query (connectivity + schema presence).
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;
    let ok = one == 1;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='machines'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok,
        has_machines_table: exists,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_machines_table: bool,
}

/// Insert a company, no-op if the name already exists. Returns the id in
/// either case.
pub async fn upsert_company(pool: &PgPool, name: &str) -> Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as::<_, (Uuid,)>(
        r#"
        insert into companies (id, name)
        values ($1, $2)
        on conflict (name) do update set name = excluded.name
        returning id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .fetch_one(pool)
    .await
    .context("upsert_company failed")?;

    Ok(id)
}

/// Provision a machine under a company, keyed by case serial.
pub async fn upsert_machine(pool: &PgPool, company_id: Uuid, case_serial: &str) -> Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as::<_, (Uuid,)>(
        r#"
        insert into machines (id, company_id, case_serial)
        values ($1, $2, $3)
        on conflict (case_serial) do update set company_id = excluded.company_id
        returning id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(company_id)
    .bind(case_serial)
    .fetch_one(pool)
    .await
    .context("upsert_machine failed")?;

    Ok(id)
}

#[derive(Debug, Clone)]
pub struct CaptureRow {
    pub dex_id: i64,
    pub created_at: DateTime<Utc>,
    pub raw: String,
}

/// Most recent captures for a machine, newest first.
pub async fn recent_captures(pool: &PgPool, machine_id: Uuid, limit: i64) -> Result<Vec<CaptureRow>> {
    let rows: Vec<(i64, DateTime<Utc>, String)> = sqlx::query_as(
        r#"
        select dex_id, created_at, raw
        from dex_captures
        where machine_id = $1
        order by created_at desc
        limit $2
        "#,
    )
    .bind(machine_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("recent_captures failed")?;

    Ok(rows
        .into_iter()
        .map(|(dex_id, created_at, raw)| CaptureRow {
            dex_id,
            created_at,
            raw,
        })
        .collect())
}
