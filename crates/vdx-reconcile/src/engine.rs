//! Fault-history merge between a fresh capture and stored error records.
//!
//! The two code families carry different lifecycles (see `lib.rs`); the
//! merge below is exhaustive over both so an unactioned record can never be
//! silently lost and an actioned EA1 can never resurrect once superseded.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use vdx_dex::KeyValueMap;

use crate::types::{ErrorKind, ErrorRecord, ErrorTimestamp, LocalTimestamp};

// ---------------------------------------------------------------------------
// Candidate extraction
// ---------------------------------------------------------------------------

/// Decode an EA1 `YYMMDD` date plus `HHMM` time into a machine-local
/// timestamp. Two-digit years are 2000-based; the DEX portals this feeds
/// from postdate 2000 by a wide margin.
fn decode_ea1_timestamp(date: &str, time: &str) -> Option<NaiveDateTime> {
    if date.len() != 6 || time.len() != 4 {
        return None;
    }
    let num = |s: &str| s.parse::<u32>().ok();
    let (yy, mo, dd) = (num(&date[0..2])?, num(&date[2..4])?, num(&date[4..6])?);
    let (hh, mi) = (num(&time[0..2])?, num(&time[2..4])?);

    NaiveDate::from_ymd_opt(2000 + yy as i32, mo, dd)?.and_hms_opt(hh, mi, 0)
}

/// Build EA1 candidates from a fresh capture's key-value map.
///
/// Every `ea1_event_{code}_date` key with a decodable paired `_time` yields
/// one unactioned candidate. Undecodable date/time pairs are skipped, same
/// tolerance as the extractor itself.
pub fn ea1_candidates(map: &KeyValueMap) -> Vec<ErrorRecord> {
    map.iter()
        .filter_map(|(key, date)| {
            let code = key
                .strip_prefix("ea1_event_")?
                .strip_suffix("_date")?
                .to_string();
            let time = map.get(&format!("ea1_event_{code}_time"))?;
            let at = decode_ea1_timestamp(date, time)?;
            Some(ErrorRecord::ea1(code, at))
        })
        .collect()
}

/// Build MA5 candidates from `ma5_error_codes`, each stamped with the
/// capture's own creation time (MA5 rows carry no timestamp of their own).
pub fn ma5_candidates(map: &KeyValueMap, captured_at: DateTime<Utc>) -> Vec<ErrorRecord> {
    let Some(joined) = map.get("ma5_error_codes") else {
        return Vec::new();
    };
    joined
        .split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(|code| ErrorRecord::ma5(code, captured_at))
        .collect()
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// EA1 identity is the exact (code, local timestamp) pair; MA5 identity is
/// code alone — a persisting MA5 condition keeps its acknowledgement even as
/// capture timestamps move.
fn matches_existing(candidate: &ErrorRecord, existing: &ErrorRecord) -> bool {
    if candidate.kind != existing.kind || candidate.code != existing.code {
        return false;
    }
    match candidate.kind {
        ErrorKind::Ea1 => ea1_key(candidate) == ea1_key(existing),
        ErrorKind::Ma5 => true,
    }
}

fn ea1_key(rec: &ErrorRecord) -> Option<LocalTimestamp> {
    match rec.timestamp {
        ErrorTimestamp::Local(t) => Some(t),
        ErrorTimestamp::Utc(_) => None,
    }
}

// ---------------------------------------------------------------------------
// Reconcile
// ---------------------------------------------------------------------------

/// Merge fresh capture data into a machine's stored error list.
///
/// Steps:
/// 1. Extract EA1 and MA5 candidates from `map`.
/// 2. Candidates matching an existing record inherit its
///    `actioned`/`actioned_at`.
/// 3. Stored EA1 records with no candidate sharing their code are preserved
///    as-is: unactioned ones are never silently dropped, actioned ones stay
///    until a newer same-code event supersedes them.
/// 4. Stored EA1 records whose code reappears with a different timestamp are
///    dropped (superseded — an actioned record never resurrects). Unmatched
///    MA5 records are dropped (condition cleared).
///
/// Output order is candidates-then-preserved; callers sort for display.
/// Idempotent: `reconcile(reconcile(e, m, t), m, t) == reconcile(e, m, t)`.
pub fn reconcile(
    existing: &[ErrorRecord],
    map: &KeyValueMap,
    captured_at: DateTime<Utc>,
) -> Vec<ErrorRecord> {
    let mut candidates = ea1_candidates(map);
    candidates.extend(ma5_candidates(map, captured_at));

    // Inherit acknowledgement state from matching stored records.
    for candidate in &mut candidates {
        if let Some(prior) = existing.iter().find(|e| matches_existing(candidate, e)) {
            candidate.actioned = prior.actioned;
            candidate.actioned_at = prior.actioned_at;
        }
    }

    // Keep stored EA1 records only while no fresh occurrence of the same
    // code exists; a same-code event supersedes them (exact matches were
    // already absorbed into their candidate above).
    let preserved: Vec<ErrorRecord> = existing
        .iter()
        .filter(|old| {
            old.kind == ErrorKind::Ea1
                && !candidates
                    .iter()
                    .any(|c| c.kind == ErrorKind::Ea1 && c.code == old.code)
        })
        .cloned()
        .collect();

    candidates.extend(preserved);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use vdx_dex::{extract, tokenize};

    fn capture_ts() -> DateTime<Utc> {
        "2024-01-05T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn decode_ea1_timestamp_valid_and_invalid() {
        let at = decode_ea1_timestamp("240102", "0930").unwrap();
        assert_eq!(at.to_string(), "2024-01-02 09:30:00");

        assert!(decode_ea1_timestamp("2401", "0930").is_none());
        assert!(decode_ea1_timestamp("241402", "0930").is_none());
        assert!(decode_ea1_timestamp("240102", "2560").is_none());
        assert!(decode_ea1_timestamp("24010x", "0930").is_none());
    }

    #[test]
    fn candidates_extracted_from_fresh_map() {
        let map = extract(&tokenize("EA1*EGS*240102*0930\nMA5*ERROR*dS*bH"));

        let ea1 = ea1_candidates(&map);
        assert_eq!(ea1.len(), 1);
        assert_eq!(ea1[0].code, "EGS");
        assert_eq!(ea1[0].timestamp.to_string(), "2024-01-02T09:30:00");
        assert!(!ea1[0].actioned);

        let ma5 = ma5_candidates(&map, capture_ts());
        assert_eq!(ma5.len(), 2);
        assert_eq!(ma5[0].code, "dS");
        assert_eq!(ma5[1].code, "bH");
    }

    #[test]
    fn exact_ea1_match_inherits_actioned_state() {
        let map = extract(&tokenize("EA1*EGS*240102*0930"));
        let mut prior = ea1_candidates(&map);
        prior[0].actioned = true;
        prior[0].actioned_at = Some(capture_ts());

        let merged = reconcile(&prior, &map, capture_ts());
        assert_eq!(merged.len(), 1);
        assert!(merged[0].actioned);
        assert_eq!(merged[0].actioned_at, Some(capture_ts()));
    }

    #[test]
    fn unmatched_unactioned_ea1_is_superseded_by_newer_event() {
        // Old unactioned EGS at 09:30; fresh capture has EGS at a new time.
        let old_map = extract(&tokenize("EA1*EGS*240101*1000"));
        let old = reconcile(&[], &old_map, capture_ts());

        let fresh_map = extract(&tokenize("EA1*EGS*240102*0900"));
        let merged = reconcile(&old, &fresh_map, capture_ts());

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].timestamp.to_string(), "2024-01-02T09:00:00");
        assert!(!merged[0].actioned);
    }

    #[test]
    fn stale_actioned_ea1_kept_when_code_absent_from_capture() {
        let old_map = extract(&tokenize("EA1*EGS*240101*1000"));
        let mut old = reconcile(&[], &old_map, capture_ts());
        old[0].actioned = true;

        // Fresh capture has a different code entirely.
        let fresh_map = extract(&tokenize("EA1*EJK*240102*0900"));
        let merged = reconcile(&old, &fresh_map, capture_ts());

        assert_eq!(merged.len(), 2);
        assert!(merged.iter().any(|r| r.code == "EJK" && !r.actioned));
        assert!(merged.iter().any(|r| r.code == "EGS" && r.actioned));
    }

    #[test]
    fn ma5_code_disappearance_drops_record_even_if_actioned() {
        let old_map = extract(&tokenize("MA5*ERROR*dS"));
        let mut old = reconcile(&[], &old_map, capture_ts());
        old[0].actioned = true;

        let fresh_map = extract(&tokenize("MA5*ERROR*bH"));
        let merged = reconcile(&old, &fresh_map, capture_ts());

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].code, "bH");
        assert!(!merged[0].actioned);
    }

    #[test]
    fn reconcile_with_empty_capture_keeps_ea1_drops_ma5() {
        let old_map = extract(&tokenize("EA1*EGS*240101*1000\nMA5*ERROR*dS"));
        let old = reconcile(&[], &old_map, capture_ts());
        assert_eq!(old.len(), 2);

        // Empty capture: the unactioned EA1 survives (never silently drop an
        // unactioned error), the MA5 condition clears.
        let merged = reconcile(&old, &KeyValueMap::new(), capture_ts());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].kind, ErrorKind::Ea1);
        assert_eq!(merged[0].code, "EGS");
        assert!(!merged[0].actioned);
    }
}
