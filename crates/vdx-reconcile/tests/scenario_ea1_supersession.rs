//! A newer EA1 event with the same code supersedes the stored record — even
//! an actioned one. The acknowledgement applied to the old occurrence must
//! not leak onto the new alert.

use chrono::{DateTime, Utc};
use vdx_dex::{extract, tokenize};
use vdx_reconcile::{reconcile, ErrorKind};

#[test]
fn scenario_newer_same_code_event_drops_stale_actioned_record() {
    let captured_at: DateTime<Utc> = "2024-01-02T10:00:00Z".parse().unwrap();

    // Stored: actioned EGS at 2024-01-01T10:00.
    let old_map = extract(&tokenize("EA1*EGS*240101*1000"));
    let mut stored = reconcile(&[], &old_map, captured_at);
    stored[0].actioned = true;
    stored[0].actioned_at = Some(captured_at);

    // Fresh capture: new EGS occurrence at 2024-01-02T09:00.
    let fresh_map = extract(&tokenize("EA1*EGS*240102*0900"));
    let merged = reconcile(&stored, &fresh_map, captured_at);

    assert_eq!(merged.len(), 1);
    let rec = &merged[0];
    assert_eq!(rec.kind, ErrorKind::Ea1);
    assert_eq!(rec.code, "EGS");
    assert_eq!(rec.timestamp.to_string(), "2024-01-02T09:00:00");
    assert!(!rec.actioned, "old acknowledgement must not resurrect");
    assert_eq!(rec.actioned_at, None);
}

#[test]
fn scenario_ea1_local_timestamps_carry_no_offset() {
    let captured_at: DateTime<Utc> = "2024-01-02T10:00:00Z".parse().unwrap();
    let map = extract(&tokenize("EA1*EGS*240102*0900"));
    let merged = reconcile(&[], &map, captured_at);

    // Machine-local time, rendered without a timezone suffix.
    let json = serde_json::to_value(&merged[0]).unwrap();
    assert_eq!(json["timestamp"], "2024-01-02T09:00:00");
}
