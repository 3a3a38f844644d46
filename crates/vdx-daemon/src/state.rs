//! Shared runtime state for vdx-daemon.
//!
//! All types here are `Clone`-able (via `Arc` or copy). Handlers receive
//! `State<Arc<AppState>>` from Axum; this module owns nothing async itself.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{info, warn};
use vdx_collector::{run_cycle, CredentialSource, CycleOptions, StateStore};
use vdx_portal::PortalClient;
use vdx_schemas::CycleReport;

// ---------------------------------------------------------------------------
// BusMsg — SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Status(StatusSnapshot),
    CycleFinished(CycleReport),
    LogLine { level: String, msg: String },
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time snapshot of daemon state, returned by GET /v1/status and
/// carried inside SSE `status` events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    /// "idle" | "collecting"
    pub state: String,
    pub cycles_run: u64,
    pub last_cycle: Option<CycleReport>,
}

// ---------------------------------------------------------------------------
// CollectorHandle
// ---------------------------------------------------------------------------

/// The collection dependencies the daemon drives: the store, the portal
/// client, the credential source, and cycle tuning.
pub struct CollectorHandle {
    pub store: Arc<dyn StateStore>,
    pub portal: Arc<dyn PortalClient>,
    pub credentials: Arc<dyn CredentialSource>,
    pub options: CycleOptions,
}

impl CollectorHandle {
    pub async fn run_once(&self) -> CycleReport {
        run_cycle(
            self.store.as_ref(),
            self.portal.as_ref(),
            self.credentials.as_ref(),
            &self.options,
        )
        .await
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    /// Static build metadata.
    pub build: BuildInfo,
    /// Mutable daemon status.
    pub status: Arc<RwLock<StatusSnapshot>>,
    /// Collection dependencies.
    pub collector: Arc<CollectorHandle>,
    /// Held for the duration of a cycle; `try_lock` failure means one is
    /// already in flight.
    pub collect_gate: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(collector: Arc<CollectorHandle>) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);

        let initial_status = StatusSnapshot {
            daemon_uptime_secs: uptime_secs(),
            state: "idle".to_string(),
            cycles_run: 0,
            last_cycle: None,
        };

        Self {
            bus,
            build: BuildInfo {
                service: "vdx-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            status: Arc::new(RwLock::new(initial_status)),
            collector,
            collect_gate: Arc::new(Mutex::new(())),
        }
    }
}

/// Run one collection cycle if none is in flight; `None` means a cycle was
/// already running and nothing happened.
pub async fn run_collect(state: &Arc<AppState>) -> Option<CycleReport> {
    let Ok(_guard) = state.collect_gate.try_lock() else {
        return None;
    };

    {
        let mut s = state.status.write().await;
        s.state = "collecting".to_string();
        s.daemon_uptime_secs = uptime_secs();
        let _ = state.bus.send(BusMsg::Status(s.clone()));
    }

    let report = state.collector.run_once().await;

    let snap = {
        let mut s = state.status.write().await;
        s.state = "idle".to_string();
        s.cycles_run += 1;
        s.last_cycle = Some(report.clone());
        s.daemon_uptime_secs = uptime_secs();
        s.clone()
    };
    let _ = state.bus.send(BusMsg::CycleFinished(report.clone()));
    let _ = state.bus.send(BusMsg::Status(snap));

    Some(report)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

/// Spawn the scheduled collector: one cycle immediately, then one per
/// `interval`. A tick that lands while a manual cycle is still running is
/// skipped, never queued.
pub fn spawn_scheduler(state: Arc<AppState>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match run_collect(&state).await {
                Some(report) => {
                    info!(
                        records = report.records_collected(),
                        all_succeeded = report.all_succeeded(),
                        "scheduled cycle finished"
                    );
                }
                None => {
                    warn!("scheduled cycle skipped; another cycle is in flight");
                }
            }
        }
    });
}
