use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use vdx_dex::Summary;

/// Bound on the per-machine capture history (newest first).
pub const DEX_HISTORY_LIMIT: usize = 100;

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// A machine-local timestamp with no UTC offset.
///
/// EA1 events carry the vending machine's own clock reading (`YYMMDD` +
/// `HHMM`). That clock has no known zone and must never be coerced to UTC;
/// keeping it a distinct type makes the coercion unrepresentable rather than
/// a convention enforced by comment.
///
/// Serializes as `YYYY-MM-DDTHH:MM:SS` (chrono's offset-less ISO form).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalTimestamp(pub NaiveDateTime);

impl std::fmt::Display for LocalTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%S"))
    }
}

/// Timestamp of an error record: machine-local for EA1, capture-time UTC for
/// MA5. Untagged serde keeps the stored JSON a plain ISO string either way;
/// the offset-less form deserializes as `Local`, the suffixed form as `Utc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorTimestamp {
    Local(LocalTimestamp),
    Utc(DateTime<Utc>),
}

impl std::fmt::Display for ErrorTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorTimestamp::Local(t) => write!(f, "{t}"),
            ErrorTimestamp::Utc(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

// ---------------------------------------------------------------------------
// Error records
// ---------------------------------------------------------------------------

/// The two fault-code families with different persistence semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Timestamped historical event (event-sourced).
    #[serde(rename = "EA1")]
    Ea1,
    /// Currently-active machine condition (level-triggered).
    #[serde(rename = "MA5")]
    Ma5,
}

/// One fault code observed on a machine, with operator acknowledgement state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub code: String,
    pub timestamp: ErrorTimestamp,
    /// Operator has reviewed/handled this error.
    pub actioned: bool,
    pub actioned_at: Option<DateTime<Utc>>,
}

impl ErrorRecord {
    /// Fresh EA1 candidate (not yet actioned).
    pub fn ea1(code: impl Into<String>, at: NaiveDateTime) -> Self {
        Self {
            kind: ErrorKind::Ea1,
            code: code.into(),
            timestamp: ErrorTimestamp::Local(LocalTimestamp(at)),
            actioned: false,
            actioned_at: None,
        }
    }

    /// Fresh MA5 candidate stamped with the capture's own creation time.
    pub fn ma5(code: impl Into<String>, captured_at: DateTime<Utc>) -> Self {
        Self {
            kind: ErrorKind::Ma5,
            code: code.into(),
            timestamp: ErrorTimestamp::Utc(captured_at),
            actioned: false,
            actioned_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Persisted machine state
// ---------------------------------------------------------------------------

/// One entry of a machine's bounded capture history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DexHistoryEntry {
    pub dex_id: i64,
    pub created: DateTime<Utc>,
}

/// Per-machine state written once per successful collection cycle.
///
/// Owned by the external store; this crate only computes the next value.
/// Never deleted here — machine removal is a device-management operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineDexState {
    pub case_serial: String,
    pub latest_dex_timestamp: Option<DateTime<Utc>>,
    /// Newest first, bounded to [`DEX_HISTORY_LIMIT`].
    pub dex_history: Vec<DexHistoryEntry>,
    pub latest_summary: Option<Summary>,
    pub latest_errors: Vec<ErrorRecord>,
}

impl MachineDexState {
    pub fn new(case_serial: impl Into<String>) -> Self {
        Self {
            case_serial: case_serial.into(),
            latest_dex_timestamp: None,
            dex_history: Vec::new(),
            latest_summary: None,
            latest_errors: Vec::new(),
        }
    }

    /// Prepend a capture to the history, keeping newest-first order and the
    /// size bound.
    pub fn push_history(&mut self, entry: DexHistoryEntry) {
        self.dex_history.insert(0, entry);
        self.dex_history.truncate(DEX_HISTORY_LIMIT);
    }
}
