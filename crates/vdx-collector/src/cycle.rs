//! The collection cycle itself.
//!
//! One call to [`run_cycle`] walks every company sequentially: log in to the
//! portal, list the upstream DEX metadata, select the per-machine delta,
//! then fetch, parse, reconcile, and persist each selected capture in
//! chronological order. Output is a [`CycleReport`]; the cycle never raises
//! to its caller.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use tracing::{debug, error, info, warn};
use vdx_dex::{extract, format_groups, summarize, tokenize};
use vdx_portal::PortalClient;
use vdx_reconcile::{
    reconcile, select_records_to_fetch, CaptureWatermark, DexHistoryEntry, MachineDexState,
};
use vdx_schemas::{CompanyCycleResult, CycleReport, UpstreamDexRecord};

use crate::credentials::CredentialSource;
use crate::store::{Company, Machine, NewDexCapture, StateStore};

/// Tuning for one cycle run.
#[derive(Debug, Clone)]
pub struct CycleOptions {
    /// Pause between companies, to avoid hammering the shared portal.
    pub inter_company_delay: Duration,
}

impl Default for CycleOptions {
    fn default() -> Self {
        Self {
            inter_company_delay: Duration::from_secs(5),
        }
    }
}

/// Where a company's run is, for log lines and status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Authenticating,
    FetchingMetadata,
    Selecting,
    FetchingRaw,
    Parsing,
    Reconciling,
    Persisting,
}

impl CyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Authenticating => "authenticating",
            CyclePhase::FetchingMetadata => "fetching_metadata",
            CyclePhase::Selecting => "selecting",
            CyclePhase::FetchingRaw => "fetching_raw",
            CyclePhase::Parsing => "parsing",
            CyclePhase::Reconciling => "reconciling",
            CyclePhase::Persisting => "persisting",
        }
    }
}

/// Run one full collection cycle over every company in the store.
///
/// Companies are processed sequentially with `inter_company_delay` between
/// them. A company failure (credentials, login, metadata listing) is recorded
/// in the report and the cycle moves on; it never aborts the run.
pub async fn run_cycle(
    store: &dyn StateStore,
    portal: &dyn PortalClient,
    credentials: &dyn CredentialSource,
    options: &CycleOptions,
) -> CycleReport {
    let started_at = Utc::now();
    let mut results = Vec::new();

    let companies = match store.companies().await {
        Ok(companies) => companies,
        Err(err) => {
            error!(error = %err, "could not list companies; cycle produces empty report");
            Vec::new()
        }
    };
    info!(companies = companies.len(), portal = portal.name(), "collection cycle starting");

    for (index, company) in companies.iter().enumerate() {
        if index > 0 && !options.inter_company_delay.is_zero() {
            tokio::time::sleep(options.inter_company_delay).await;
        }

        let result = match collect_company(store, portal, credentials, company).await {
            Ok(records) => {
                info!(company = %company.name, records, "company collected");
                CompanyCycleResult::ok(company.id, &company.name, records)
            }
            Err(err) => {
                warn!(company = %company.name, error = %err, "company failed this cycle");
                CompanyCycleResult::failed(company.id, &company.name, err.to_string())
            }
        };
        results.push(result);
    }

    let report = CycleReport {
        started_at,
        finished_at: Utc::now(),
        companies: results,
    };
    info!(
        records = report.records_collected(),
        all_succeeded = report.all_succeeded(),
        "collection cycle finished"
    );
    report
}

/// Collect one company. Errors here fail the company, not the cycle.
async fn collect_company(
    store: &dyn StateStore,
    portal: &dyn PortalClient,
    credentials: &dyn CredentialSource,
    company: &Company,
) -> Result<u32> {
    debug!(company = %company.name, phase = CyclePhase::Authenticating.as_str(), "company run");
    let creds = credentials
        .credentials_for(company)
        .with_context(|| format!("credentials for company {}", company.name))?;
    portal
        .login(&creds)
        .await
        .map_err(|err| anyhow!("portal login failed: {err}"))?;

    let machines = store
        .machines_for_company(company.id)
        .await
        .context("listing machines")?;
    if machines.is_empty() {
        debug!(company = %company.name, "no machines provisioned");
        return Ok(0);
    }

    debug!(company = %company.name, phase = CyclePhase::FetchingMetadata.as_str(), "company run");
    let upstream = portal
        .fetch_dex_metadata()
        .await
        .map_err(|err| anyhow!("portal metadata listing failed: {err}"))?;

    debug!(company = %company.name, phase = CyclePhase::Selecting.as_str(), "company run");
    let machine_state: BTreeMap<String, _> = machines
        .iter()
        .map(|m| (m.case_serial.clone(), m.latest_dex_timestamp))
        .collect();
    let selected = select_records_to_fetch(&upstream, &machine_state);
    debug!(
        company = %company.name,
        upstream = upstream.len(),
        selected = selected.len(),
        "delta selected"
    );

    // Group per machine, oldest first, so the watermark never advances past
    // a record that has not been ingested.
    let mut queues: BTreeMap<String, Vec<UpstreamDexRecord>> = BTreeMap::new();
    for record in selected {
        queues.entry(record.case_serial.clone()).or_default().push(record);
    }
    for queue in queues.values_mut() {
        queue.sort_by_key(|r| r.created_at);
    }

    let mut collected = 0u32;
    for machine in &machines {
        let Some(queue) = queues.get(&machine.case_serial) else {
            continue;
        };
        match collect_machine(store, portal, machine, queue).await {
            Ok(records) => collected += records,
            Err(err) => {
                // The machine's watermark only moved for records already
                // persisted, so the remainder is re-selected next cycle.
                warn!(
                    case_serial = %machine.case_serial,
                    error = %err,
                    "machine skipped for the rest of this cycle"
                );
            }
        }
    }
    Ok(collected)
}

/// Ingest one machine's queue of selected records, oldest first.
///
/// Stops at the first record that cannot be fetched; everything after it in
/// the queue stays newer than the watermark and is picked up next cycle.
async fn collect_machine(
    store: &dyn StateStore,
    portal: &dyn PortalClient,
    machine: &Machine,
    queue: &[UpstreamDexRecord],
) -> Result<u32> {
    let mut state = store
        .dex_state_for_machine(machine.id)
        .await
        .context("loading machine state")?
        .unwrap_or_else(|| MachineDexState::new(&machine.case_serial));
    let mut watermark = CaptureWatermark::from_stored(state.latest_dex_timestamp);

    let mut collected = 0u32;
    for record in queue {
        debug!(
            case_serial = %machine.case_serial,
            dex_id = record.dex_id,
            phase = CyclePhase::FetchingRaw.as_str(),
            "ingesting capture"
        );
        let raw = match portal.fetch_raw_dex(record.dex_id).await {
            Ok(raw) => raw,
            Err(err) if err.is_fatal_for_company() => {
                return Err(anyhow!("portal session lost mid-machine: {err}"));
            }
            Err(err) => {
                warn!(
                    case_serial = %machine.case_serial,
                    dex_id = record.dex_id,
                    error = %err,
                    "raw fetch failed; leaving record and the rest of the queue for next cycle"
                );
                break;
            }
        };

        // Parsing never fails: unrecognized segments simply contribute
        // nothing to the map.
        debug!(dex_id = record.dex_id, phase = CyclePhase::Parsing.as_str(), "ingesting capture");
        let segments = tokenize(&raw);
        let map = extract(&segments);
        let summary = summarize(&map);
        let groups = format_groups(&map);

        debug!(dex_id = record.dex_id, phase = CyclePhase::Reconciling.as_str(), "ingesting capture");
        let merged = reconcile(&state.latest_errors, &map, record.created_at);

        if !watermark.accept(record.created_at).is_fresh() {
            // Queue is sorted ascending, so this only fires on a record
            // older than the stored watermark; the selector should have
            // excluded it.
            debug!(
                case_serial = %machine.case_serial,
                dex_id = record.dex_id,
                "stale capture skipped"
            );
            continue;
        }
        debug!(dex_id = record.dex_id, phase = CyclePhase::Persisting.as_str(), "ingesting capture");
        state.latest_dex_timestamp = watermark.last_accepted();
        state.push_history(DexHistoryEntry {
            dex_id: record.dex_id,
            created: record.created_at,
        });
        state.latest_summary = Some(summary.clone());
        state.latest_errors = merged;

        store
            .insert_dex_capture(&NewDexCapture {
                machine_id: machine.id,
                dex_id: record.dex_id,
                created_at: record.created_at,
                raw,
                summary,
                groups,
            })
            .await
            .context("inserting capture")?;
        store
            .upsert_machine_dex_state(machine.id, &state)
            .await
            .context("upserting machine state")?;
        collected += 1;
    }
    Ok(collected)
}
