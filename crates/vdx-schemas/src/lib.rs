//! Shared wire shapes crossing crate boundaries: the upstream portal's
//! metadata record and the per-cycle result report surfaced by the daemon.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One row of the upstream portal's DEX metadata listing.
///
/// `created_at` is the capture's creation time as reported upstream (UTC).
/// `parsed` is the portal's own flag; vendex tracks ingestion independently
/// via per-machine watermarks and does not trust it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamDexRecord {
    pub case_serial: String,
    pub customer_name: String,
    pub dex_id: i64,
    pub created_at: DateTime<Utc>,
    pub firmware: Option<String>,
    pub parsed: bool,
}

/// Outcome of one company's slice of a collection cycle.
///
/// Exactly one of `records_collected` / `error` is set, keyed by `success`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyCycleResult {
    pub company_id: Uuid,
    pub company_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records_collected: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompanyCycleResult {
    pub fn ok(company_id: Uuid, company_name: impl Into<String>, records: u32) -> Self {
        Self {
            company_id,
            company_name: company_name.into(),
            success: true,
            records_collected: Some(records),
            error: None,
        }
    }

    pub fn failed(company_id: Uuid, company_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            company_id,
            company_name: company_name.into(),
            success: false,
            records_collected: None,
            error: Some(error.into()),
        }
    }
}

/// Externally observable output of one collection cycle.
///
/// The cycle never raises to its caller; partial failure is expressed as
/// per-company entries with `success = false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub companies: Vec<CompanyCycleResult>,
}

impl CycleReport {
    /// Total records collected across successful companies.
    pub fn records_collected(&self) -> u32 {
        self.companies
            .iter()
            .filter_map(|c| c.records_collected)
            .sum()
    }

    pub fn all_succeeded(&self) -> bool {
        self.companies.iter().all(|c| c.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn company_result_serializes_one_sided() {
        let ok = CompanyCycleResult::ok(Uuid::nil(), "Acme Vending", 3);
        let v = serde_json::to_value(&ok).unwrap();
        assert_eq!(v["records_collected"], 3);
        assert!(v.get("error").is_none());

        let failed = CompanyCycleResult::failed(Uuid::nil(), "Acme Vending", "credential failure");
        let v = serde_json::to_value(&failed).unwrap();
        assert_eq!(v["error"], "credential failure");
        assert!(v.get("records_collected").is_none());
    }

    #[test]
    fn cycle_report_tallies_successes_only() {
        let now = Utc::now();
        let report = CycleReport {
            started_at: now,
            finished_at: now,
            companies: vec![
                CompanyCycleResult::ok(Uuid::nil(), "A", 2),
                CompanyCycleResult::failed(Uuid::nil(), "B", "portal down"),
                CompanyCycleResult::ok(Uuid::nil(), "C", 5),
            ],
        };
        assert_eq!(report.records_collected(), 7);
        assert!(!report.all_succeeded());
    }
}
