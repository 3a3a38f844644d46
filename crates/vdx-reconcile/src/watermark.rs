//! Capture monotonicity watermark.
//!
//! A machine's `latest_dex_timestamp` must never move backwards: regressing
//! it would make the next cycle's selector re-fetch and re-parse captures
//! that were already ingested. The watermark tracks the newest accepted
//! capture timestamp and refuses older ones.
//!
//! # Invariants
//!
//! - **Non-decreasing**: a capture is accepted only if its `created_at` is
//!   ≥ the last accepted capture's.
//! - **Watermark advances only on acceptance**: rejections do not move it.
//! - **Pure, no IO**: the caller provides timestamps and decides what to do
//!   with the result.

use chrono::{DateTime, Utc};

/// Result of checking a capture timestamp against the watermark.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureFreshness {
    /// Timestamp is ≥ the watermark; on `accept` the watermark advanced.
    Fresh,
    /// Timestamp is strictly older than the last accepted capture.
    /// Fields carry the evidence for logging.
    Stale {
        watermark: DateTime<Utc>,
        got: DateTime<Utc>,
    },
}

impl CaptureFreshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, CaptureFreshness::Fresh)
    }
}

/// Tracks the newest accepted capture timestamp for one machine.
///
/// Seed with [`CaptureWatermark::from_stored`] using the machine's persisted
/// `latest_dex_timestamp`; a machine that has never been collected accepts
/// anything.
#[derive(Clone, Debug, Default)]
pub struct CaptureWatermark {
    last_accepted: Option<DateTime<Utc>>,
}

impl CaptureWatermark {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_stored(latest: Option<DateTime<Utc>>) -> Self {
        Self {
            last_accepted: latest,
        }
    }

    /// Check freshness without advancing the watermark.
    pub fn check(&self, created_at: DateTime<Utc>) -> CaptureFreshness {
        match self.last_accepted {
            Some(watermark) if created_at < watermark => CaptureFreshness::Stale {
                watermark,
                got: created_at,
            },
            _ => CaptureFreshness::Fresh,
        }
    }

    /// Check freshness and advance the watermark on acceptance.
    pub fn accept(&mut self, created_at: DateTime<Utc>) -> CaptureFreshness {
        let result = self.check(created_at);
        if result.is_fresh() {
            self.last_accepted = Some(created_at);
        }
        result
    }

    /// The newest accepted capture timestamp, if any.
    pub fn last_accepted(&self) -> Option<DateTime<Utc>> {
        self.last_accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn fresh_watermark_accepts_anything() {
        let mut wm = CaptureWatermark::new();
        assert!(wm.accept(ts("2024-01-01T00:00:00Z")).is_fresh());
        assert_eq!(wm.last_accepted(), Some(ts("2024-01-01T00:00:00Z")));
    }

    #[test]
    fn older_capture_is_rejected_and_watermark_holds() {
        let mut wm = CaptureWatermark::from_stored(Some(ts("2024-01-02T00:00:00Z")));
        let got = wm.accept(ts("2024-01-01T00:00:00Z"));
        assert_eq!(
            got,
            CaptureFreshness::Stale {
                watermark: ts("2024-01-02T00:00:00Z"),
                got: ts("2024-01-01T00:00:00Z"),
            }
        );
        assert_eq!(wm.last_accepted(), Some(ts("2024-01-02T00:00:00Z")));
    }

    #[test]
    fn equal_timestamp_is_fresh_for_idempotent_reingest() {
        let mut wm = CaptureWatermark::from_stored(Some(ts("2024-01-02T00:00:00Z")));
        assert!(wm.accept(ts("2024-01-02T00:00:00Z")).is_fresh());
    }

    #[test]
    fn check_does_not_advance() {
        let wm = CaptureWatermark::new();
        assert!(wm.check(ts("2024-01-01T00:00:00Z")).is_fresh());
        assert_eq!(wm.last_accepted(), None);
    }
}
