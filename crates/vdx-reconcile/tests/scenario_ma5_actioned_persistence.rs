//! MA5 records are level-triggered: identity is the code alone. While the
//! condition persists the acknowledgement survives; once the code disappears
//! from a fresh capture the record vanishes entirely.

use chrono::{DateTime, Utc};
use vdx_dex::{extract, tokenize};
use vdx_reconcile::{reconcile, ErrorKind, ErrorTimestamp};

fn ts(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

#[test]
fn scenario_persisting_ma5_code_keeps_actioned_flag() {
    let first = extract(&tokenize("MA5*ERROR*dS"));
    let mut stored = reconcile(&[], &first, ts("2024-01-01T00:00:00Z"));
    stored[0].actioned = true;
    stored[0].actioned_at = Some(ts("2024-01-01T08:00:00Z"));

    // Next capture still reports dS.
    let fresh = extract(&tokenize("MA5*ERROR*dS"));
    let merged = reconcile(&stored, &fresh, ts("2024-01-02T00:00:00Z"));

    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].kind, ErrorKind::Ma5);
    assert_eq!(merged[0].code, "dS");
    assert!(merged[0].actioned);
    assert_eq!(merged[0].actioned_at, Some(ts("2024-01-01T08:00:00Z")));
    // Timestamp tracks the newest capture, not the acknowledgement.
    assert_eq!(
        merged[0].timestamp,
        ErrorTimestamp::Utc(ts("2024-01-02T00:00:00Z"))
    );
}

#[test]
fn scenario_cleared_ma5_code_disappears_from_output() {
    let first = extract(&tokenize("MA5*ERROR*dS"));
    let mut stored = reconcile(&[], &first, ts("2024-01-01T00:00:00Z"));
    stored[0].actioned = true;

    // dS no longer reported.
    let fresh = extract(&tokenize("MA5*ERROR*bH"));
    let merged = reconcile(&stored, &fresh, ts("2024-01-02T00:00:00Z"));

    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].code, "bH");
    assert!(!merged[0].actioned);
}
