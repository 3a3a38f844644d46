//! Concrete Cantaloupe portal client.
//!
//! The portal has no published API; the endpoints and payload shapes below
//! were observed from the web dashboard's own traffic. Sessions are cookie
//! based, so the underlying reqwest client carries a cookie store and
//! `login` must succeed before the fetch calls.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::debug;
use vdx_schemas::UpstreamDexRecord;

use crate::{PortalClient, PortalCredentials, PortalError};

/// Cantaloupe-backed [`PortalClient`].
#[derive(Debug, Clone)]
pub struct CantaloupeClient {
    http: reqwest::Client,
    base_url: String,
}

impl CantaloupeClient {
    /// Build a client against the given portal base URL.
    ///
    /// The base URL is configurable (rather than hardcoded) so tests can
    /// point at a local stub server.
    pub fn new(base_url: impl Into<String>) -> Result<Self, PortalError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| PortalError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl PortalClient for CantaloupeClient {
    fn name(&self) -> &'static str {
        "cantaloupe"
    }

    async fn login(&self, credentials: &PortalCredentials) -> Result<(), PortalError> {
        let resp = self
            .http
            .post(self.url("/login"))
            .form(&[
                ("email", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PortalError::Transport(e.to_string()))?;

        // The portal answers 200 with the dashboard on success and 200 with
        // the login form again on bad credentials; a missing session cookie
        // is the only reliable failure signal.
        if !resp.status().is_success() && !resp.status().is_redirection() {
            return Err(PortalError::Auth(format!(
                "login rejected with status {}",
                resp.status().as_u16()
            )));
        }
        if resp.cookies().next().is_none() {
            return Err(PortalError::Auth("no session cookie issued".to_string()));
        }

        debug!(portal = self.name(), "portal session established");
        Ok(())
    }

    async fn fetch_dex_metadata(&self) -> Result<Vec<UpstreamDexRecord>, PortalError> {
        let resp = self
            .http
            .get(self.url("/dex"))
            .query(&[("sorts[created]", "-1")])
            .send()
            .await
            .map_err(|e| PortalError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PortalError::Api {
                status: status.as_u16(),
                message: "dex metadata listing failed".to_string(),
            });
        }

        let body: DexListResponse = resp
            .json()
            .await
            .map_err(|e| PortalError::Decode(e.to_string()))?;

        let mut records = Vec::new();
        for row in body.records.unwrap_or_default() {
            records.push(UpstreamDexRecord {
                created_at: parse_portal_timestamp(&row.created)?,
                case_serial: row.case_serial,
                customer_name: row.customer.unwrap_or_default(),
                dex_id: row.dex_id,
                firmware: row.firmware,
                parsed: row.parsed.unwrap_or(false),
            });
        }
        Ok(records)
    }

    async fn fetch_raw_dex(&self, dex_id: i64) -> Result<String, PortalError> {
        let resp = self
            .http
            .get(self.url("/dex/raw"))
            .query(&[("dexId", dex_id.to_string())])
            .send()
            .await
            .map_err(|e| PortalError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PortalError::Api {
                status: status.as_u16(),
                message: format!("raw dex fetch failed for dexId={dex_id}"),
            });
        }

        resp.text()
            .await
            .map_err(|e| PortalError::Decode(e.to_string()))
    }
}

/// Portal timestamps come back either ISO-8601 with an offset or as a bare
/// `YYYY-MM-DD HH:MM:SS` string; the portal reports UTC in both cases.
fn parse_portal_timestamp(raw: &str) -> Result<DateTime<Utc>, PortalError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|_| PortalError::Decode(format!("unparseable portal timestamp: {raw}")))
}

#[derive(Debug, Clone, Deserialize)]
struct DexListResponse {
    records: Option<Vec<DexListRow>>,
}

#[derive(Debug, Clone, Deserialize)]
struct DexListRow {
    #[serde(rename = "dexId")]
    dex_id: i64,
    #[serde(rename = "caseSerial")]
    case_serial: String,
    customer: Option<String>,
    created: String,
    firmware: Option<String>,
    parsed: Option<bool>,
}

// -----------------
// Tests (no network)
// -----------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portal_timestamp_accepts_both_observed_shapes() {
        let a = parse_portal_timestamp("2024-01-01T00:20:00Z").unwrap();
        let b = parse_portal_timestamp("2024-01-01 00:20:00").unwrap();
        assert_eq!(a, b);

        assert!(parse_portal_timestamp("01/01/2024").is_err());
    }

    #[test]
    fn list_row_decodes_portal_field_names() {
        let json = r#"{
            "records": [{
                "dexId": 1234,
                "caseSerial": "CAN0001234",
                "customer": "Acme Vending",
                "created": "2024-01-01 00:20:00",
                "firmware": "G2.1",
                "parsed": true
            }]
        }"#;
        let body: DexListResponse = serde_json::from_str(json).unwrap();
        let rows = body.records.unwrap();
        assert_eq!(rows[0].dex_id, 1234);
        assert_eq!(rows[0].case_serial, "CAN0001234");
        assert_eq!(rows[0].parsed, Some(true));
    }

    #[test]
    fn url_joins_without_double_slash() {
        let client = CantaloupeClient::new("http://localhost:8080/").unwrap();
        assert_eq!(client.url("/dex"), "http://localhost:8080/dex");
    }
}
