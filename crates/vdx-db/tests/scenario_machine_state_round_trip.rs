//! Machine state upserts replace the row and read back exactly what was
//! written; capture inserts are idempotent on (machine_id, dex_id).
//!
//! DB-backed test, skipped if VDX_DATABASE_URL is not set.

use chrono::Utc;
use uuid::Uuid;
use vdx_collector::{NewDexCapture, StateStore};
use vdx_db::PgStateStore;
use vdx_dex::{KeyValueGroups, Summary};
use vdx_reconcile::{DexHistoryEntry, ErrorRecord, MachineDexState};

#[tokio::test]
async fn machine_state_round_trip_and_idempotent_captures() -> anyhow::Result<()> {
    let url = match std::env::var(vdx_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: VDX_DATABASE_URL not set");
            return Ok(());
        }
    };

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await?;
    vdx_db::migrate(&pool).await?;

    // Unique names so the test can rerun against a dirty database.
    let suffix = Uuid::new_v4().simple().to_string();
    let company_id = vdx_db::upsert_company(&pool, &format!("roundtrip-{suffix}")).await?;
    let case_serial = format!("CAN{suffix}");
    let machine_id = vdx_db::upsert_machine(&pool, company_id, &case_serial).await?;

    let store = PgStateStore::new(pool.clone());
    assert!(store.dex_state_for_machine(machine_id).await?.is_none());

    let captured_at = Utc::now();
    let mut state = MachineDexState::new(&case_serial);
    state.latest_dex_timestamp = Some(captured_at);
    state.push_history(DexHistoryEntry {
        dex_id: 7,
        created: captured_at,
    });
    state.latest_summary = Some(Summary::default());
    state.latest_errors = vec![ErrorRecord::ma5("EJ", captured_at)];

    store.upsert_machine_dex_state(machine_id, &state).await?;
    store.upsert_machine_dex_state(machine_id, &state).await?;

    let loaded = store
        .dex_state_for_machine(machine_id)
        .await?
        .expect("state row written");
    assert_eq!(loaded.case_serial, state.case_serial);
    assert_eq!(loaded.dex_history, state.dex_history);
    assert_eq!(loaded.latest_summary, state.latest_summary);
    assert_eq!(loaded.latest_errors, state.latest_errors);

    let errors = store.errors_for_machine(machine_id).await?;
    assert_eq!(errors, state.latest_errors);

    let capture = NewDexCapture {
        machine_id,
        dex_id: 7,
        created_at: captured_at,
        raw: "DXS*CAN*VA*V1*1\nVA1*100*1\nDXE*1*1\n".to_string(),
        summary: Summary::default(),
        groups: KeyValueGroups::default(),
    };
    store.insert_dex_capture(&capture).await?;
    store.insert_dex_capture(&capture).await?;

    let captures = vdx_db::recent_captures(&pool, machine_id, 10).await?;
    assert_eq!(captures.len(), 1);
    assert_eq!(captures[0].dex_id, 7);

    Ok(())
}
