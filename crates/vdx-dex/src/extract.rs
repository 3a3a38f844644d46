//! Key-value extraction from tokenized DEX segments.
//!
//! `extract` is total: it never fails. Segments that do not parse are
//! skipped, not reported. Upstream machines emit wildly inconsistent data
//! and partial decode is the contract.
//!
//! Internally each known segment family parses into a typed [`FamilyRecord`]
//! first; the flat string-keyed map is produced only at the boundary because
//! downstream consumers (dashboard rendering, stored summaries) rely on the
//! per-key shape, e.g. `ca17_tube_0_denomination`.
//!
//! All money and temperature conversion is integer arithmetic. No floats.

use std::collections::BTreeMap;

use crate::segment::Segment;

/// Flat mapping of semantic keys to decoded string values, one per document.
///
/// Key uniqueness is not guaranteed by upstream data; last-write-wins.
pub type KeyValueMap = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Typed per-family records (internal)
// ---------------------------------------------------------------------------

/// Where an MA5 temperature reading routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TempTarget {
    Detected,
    Desired,
}

impl TempTarget {
    fn key_stem(self) -> &'static str {
        match self {
            TempTarget::Detected => "ma5_detected_temperature",
            TempTarget::Desired => "ma5_desired_temperature",
        }
    }
}

/// One decoded segment, before flattening into the key-value map.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FamilyRecord {
    /// CA17: one coin-tube row.
    CoinTube {
        row: String,
        denomination_cents: i64,
        count: i64,
        total_cents: i64,
    },
    /// PA1: price of one selection.
    SelectionPrice { selection: String, price_cents: i64 },
    /// PA2: sales for the selection of the *preceding* PA1.
    SelectionSales {
        selection: String,
        count: String,
        value_cents: i64,
    },
    /// VA1: document grand totals.
    GrandTotal { value_cents: i64, count: String },
    /// EA1: timestamped event; date/time kept raw (`YYMMDD` / `HHMM`).
    /// Decoding into a timestamp is the reconciler's job, not ours.
    Event {
        code: String,
        date: String,
        time: String,
    },
    /// EA2: event occurrence count and value.
    EventCount {
        code: String,
        count: String,
        value: String,
    },
    /// MA5 ERROR row: currently-active fault codes.
    ErrorCodes { codes: Vec<String> },
    /// MA5 *TEMP* row: decoded temperature in tenths of a degree.
    Temperature {
        target: TempTarget,
        tenths: i64,
        unit: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Unit conversion helpers
// ---------------------------------------------------------------------------

/// Render an integer cent amount as a dollar string with two decimals.
pub(crate) fn cents_to_dollars(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// Decode a raw MA5 temperature value into tenths of a degree.
///
/// Upstream encodes either hundredths (raw > 100, e.g. `355` = 3.55°) or
/// tenths (raw <= 100, e.g. `35` = 3.5°). The hundredths path rounds half
/// away from zero so `355` lands on `36` tenths (3.6°).
fn temperature_tenths(raw: i64) -> i64 {
    if raw > 100 {
        (raw + 5) / 10
    } else {
        raw
    }
}

/// Render tenths of a degree as a one-decimal string.
fn tenths_to_string(tenths: i64) -> String {
    let sign = if tenths < 0 { "-" } else { "" };
    let abs = tenths.unsigned_abs();
    format!("{sign}{}.{}", abs / 10, abs % 10)
}

fn parse_i64(s: &str) -> Option<i64> {
    s.trim().parse::<i64>().ok()
}

// ---------------------------------------------------------------------------
// Per-family decode
// ---------------------------------------------------------------------------

/// Decode one segment into a typed record.
///
/// `current_selection` carries the most recent PA1 selection id so PA2 (which
/// has no selection of its own) can be associated positionally in a single
/// linear pass.
fn decode(segment: &Segment, current_selection: &mut Option<String>) -> Option<FamilyRecord> {
    match segment.code.as_str() {
        "CA17" => {
            let row = segment.field(0)?.to_string();
            let denomination_cents = parse_i64(segment.field(1)?)?;
            let count = parse_i64(segment.field(2)?)?;
            // A total that overflows i64 is garbage data; skip the row like
            // any other unparseable segment.
            let total_cents = denomination_cents.checked_mul(count)?;
            Some(FamilyRecord::CoinTube {
                row,
                denomination_cents,
                count,
                total_cents,
            })
        }
        "PA1" => {
            let selection = segment.field(0)?.to_string();
            let price_cents = parse_i64(segment.field(1)?)?;
            *current_selection = Some(selection.clone());
            Some(FamilyRecord::SelectionPrice {
                selection,
                price_cents,
            })
        }
        "PA2" => {
            // Positional association: PA2 refers to the previous PA1.
            let selection = current_selection.clone()?;
            let count = segment.field(0)?.to_string();
            let value_cents = parse_i64(segment.field(1)?)?;
            Some(FamilyRecord::SelectionSales {
                selection,
                count,
                value_cents,
            })
        }
        "VA1" => {
            let value_cents = parse_i64(segment.field(0)?)?;
            let count = segment.field(1)?.to_string();
            Some(FamilyRecord::GrandTotal { value_cents, count })
        }
        "EA1" => {
            let code = segment.field(0)?.to_string();
            let date = segment.field(1)?.to_string();
            let time = segment.field(2).unwrap_or_default().to_string();
            Some(FamilyRecord::Event { code, date, time })
        }
        "EA2" => {
            let code = segment.field(0)?.to_string();
            let count = segment.field(1).unwrap_or_default().to_string();
            let value = segment.field(2).unwrap_or_default().to_string();
            Some(FamilyRecord::EventCount { code, count, value })
        }
        "MA5" => decode_ma5(segment),
        // Unknown segment codes are ignored; upstream adds fields freely.
        _ => None,
    }
}

fn decode_ma5(segment: &Segment) -> Option<FamilyRecord> {
    let name = segment.field(0)?;

    if name == "ERROR" {
        let codes: Vec<String> = segment.fields[1..]
            .iter()
            .filter(|f| !f.trim().is_empty())
            .map(|f| f.trim().to_string())
            .collect();
        if codes.is_empty() {
            return None;
        }
        return Some(FamilyRecord::ErrorCodes { codes });
    }

    let upper = name.to_ascii_uppercase();
    if upper.contains("TEMP") {
        let raw = parse_i64(segment.field(1)?)?;
        let target = if upper.contains("DESIRED") {
            TempTarget::Desired
        } else {
            // DETECTED or anything unnamed routes to detected.
            TempTarget::Detected
        };
        let unit = segment
            .field(2)
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string);
        return Some(FamilyRecord::Temperature {
            target,
            tenths: temperature_tenths(raw),
            unit,
        });
    }

    None
}

// ---------------------------------------------------------------------------
// Flattening
// ---------------------------------------------------------------------------

fn emit(record: FamilyRecord, map: &mut KeyValueMap) {
    match record {
        FamilyRecord::CoinTube {
            row,
            denomination_cents,
            count,
            total_cents,
        } => {
            map.insert(
                format!("ca17_tube_{row}_denomination"),
                cents_to_dollars(denomination_cents),
            );
            map.insert(format!("ca17_tube_{row}_count"), count.to_string());
            map.insert(
                format!("ca17_tube_{row}_total_value"),
                cents_to_dollars(total_cents),
            );
        }
        FamilyRecord::SelectionPrice {
            selection,
            price_cents,
        } => {
            map.insert(
                format!("pa1_selection_{selection}_price"),
                cents_to_dollars(price_cents),
            );
        }
        FamilyRecord::SelectionSales {
            selection,
            count,
            value_cents,
        } => {
            map.insert(format!("pa2_selection_{selection}_sales_count"), count);
            map.insert(
                format!("pa2_selection_{selection}_sales_value"),
                cents_to_dollars(value_cents),
            );
        }
        FamilyRecord::GrandTotal { value_cents, count } => {
            map.insert(
                "va1_total_sales_value".to_string(),
                cents_to_dollars(value_cents),
            );
            map.insert("va1_total_sales_count".to_string(), count);
        }
        FamilyRecord::Event { code, date, time } => {
            map.insert(format!("ea1_event_{code}_date"), date);
            map.insert(format!("ea1_event_{code}_time"), time);
        }
        FamilyRecord::EventCount { code, count, value } => {
            map.insert(format!("ea2_event_{code}_count"), count);
            map.insert(format!("ea2_event_{code}_value"), value);
        }
        FamilyRecord::ErrorCodes { codes } => {
            map.insert("ma5_error_codes".to_string(), codes.join(","));
            for (n, code) in codes.into_iter().enumerate() {
                map.insert(format!("ma5_error_{n}"), code);
            }
        }
        FamilyRecord::Temperature {
            target,
            tenths,
            unit,
        } => {
            map.insert(target.key_stem().to_string(), tenths_to_string(tenths));
            if let Some(unit) = unit {
                map.insert(format!("{}_unit", target.key_stem()), unit);
            }
        }
    }
}

/// Extract a flat key-value map from tokenized segments.
///
/// Single linear pass; PA2 segments use the selection id of the most recent
/// PA1 carried in the fold accumulator.
pub fn extract(segments: &[Segment]) -> KeyValueMap {
    let mut map = KeyValueMap::new();
    let mut current_selection: Option<String> = None;

    for segment in segments {
        if let Some(record) = decode(segment, &mut current_selection) {
            emit(record, &mut map);
        }
    }

    map
}
