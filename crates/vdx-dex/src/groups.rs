//! Group partitioning and summary projection over an extracted key-value map.

use serde::{Deserialize, Serialize};

use crate::extract::KeyValueMap;

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

/// Partition of a [`KeyValueMap`] by key prefix. Derived, never stored on
/// its own; keys with unrecognized prefixes stay in the flat map only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValueGroups {
    /// `pa1_` / `pa2_` — selection prices and per-selection sales.
    pub products: KeyValueMap,
    /// `va1_` / `ca17_` — grand totals and coin-tube cash levels.
    pub sales: KeyValueMap,
    /// `ma5_` — machine condition: fault codes and temperatures.
    pub diagnostics: KeyValueMap,
    /// `ea1_` / `ea2_` — event log entries and counters.
    pub events: KeyValueMap,
}

/// Partition `map` into semantic groups by key prefix.
pub fn format_groups(map: &KeyValueMap) -> KeyValueGroups {
    let mut groups = KeyValueGroups::default();

    for (key, value) in map {
        let bucket = if key.starts_with("pa1_") || key.starts_with("pa2_") {
            &mut groups.products
        } else if key.starts_with("va1_") || key.starts_with("ca17_") {
            &mut groups.sales
        } else if key.starts_with("ma5_") {
            &mut groups.diagnostics
        } else if key.starts_with("ea1_") || key.starts_with("ea2_") {
            &mut groups.events
        } else {
            continue;
        };
        bucket.insert(key.clone(), value.clone());
    }

    groups
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Compact per-document projection used for dashboard rows and stored as the
/// machine's latest parsed state.
///
/// Money and temperature stay decimal strings end to end; they were produced
/// by integer conversion in the extractor and nothing downstream does
/// arithmetic on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// `va1_total_sales_value`, defaults to `"0.00"`.
    pub total_sales: String,
    /// `va1_total_sales_count`, defaults to `"0"`.
    pub total_vends: String,
    /// Whether the document carried any MA5 fault codes.
    pub has_errors: bool,
    /// Detected cabinet temperature, one decimal, if reported.
    pub temperature: Option<String>,
    pub temperature_unit: Option<String>,
    /// Desired (set-point) temperature, if reported.
    pub desired_temperature: Option<String>,
    /// Comma-joined MA5 fault codes, if any.
    pub error_codes: Option<String>,
    /// Whether any EA1/EA2 event keys are present.
    pub has_events: bool,
}

impl Default for Summary {
    fn default() -> Self {
        Self {
            total_sales: "0.00".to_string(),
            total_vends: "0".to_string(),
            has_errors: false,
            temperature: None,
            temperature_unit: None,
            desired_temperature: None,
            error_codes: None,
            has_events: false,
        }
    }
}

/// Project a [`Summary`] from fixed keys of the flat map.
pub fn summarize(map: &KeyValueMap) -> Summary {
    let error_codes = map.get("ma5_error_codes").cloned();

    Summary {
        total_sales: map
            .get("va1_total_sales_value")
            .cloned()
            .unwrap_or_else(|| "0.00".to_string()),
        total_vends: map
            .get("va1_total_sales_count")
            .cloned()
            .unwrap_or_else(|| "0".to_string()),
        has_errors: error_codes.is_some(),
        temperature: map.get("ma5_detected_temperature").cloned(),
        temperature_unit: map.get("ma5_detected_temperature_unit").cloned(),
        desired_temperature: map.get("ma5_desired_temperature").cloned(),
        error_codes,
        has_events: map
            .keys()
            .any(|k| k.starts_with("ea1_") || k.starts_with("ea2_")),
    }
}
