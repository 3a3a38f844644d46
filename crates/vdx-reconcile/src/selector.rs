//! Incremental collection selection.
//!
//! Runs once per scheduled cycle, upstream of any raw-DEX fetch: given the
//! portal's full metadata listing and the locally stored latest-capture
//! timestamp per machine, pick the minimal set of records worth fetching.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::warn;
use vdx_schemas::UpstreamDexRecord;

/// Select the upstream records that must be fetched and parsed.
///
/// A record is included iff its case serial belongs to a known machine AND
/// the machine has no stored watermark OR the record is strictly newer than
/// it. Unknown case serials are excluded with a warning — the portal lists
/// machines for the whole account, not just the ones provisioned here.
pub fn select_records_to_fetch(
    upstream: &[UpstreamDexRecord],
    machine_state: &BTreeMap<String, Option<DateTime<Utc>>>,
) -> Vec<UpstreamDexRecord> {
    upstream
        .iter()
        .filter(|record| {
            let Some(latest) = machine_state.get(&record.case_serial) else {
                warn!(
                    case_serial = %record.case_serial,
                    dex_id = record.dex_id,
                    "skipping DEX record for unknown machine"
                );
                return false;
            };
            match latest {
                None => true,
                Some(watermark) => record.created_at > *watermark,
            }
        })
        .cloned()
        .collect()
}
