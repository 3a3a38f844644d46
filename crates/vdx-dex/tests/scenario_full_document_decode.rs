//! End-to-end decode of a synthetic document containing one of each known
//! segment family, checking exact keys and unit-converted values.

use vdx_dex::{extract, format_groups, summarize, tokenize};

const RAW: &str = "DXS*CAN0001234*VA*V0/6*1\r\n\
ST*001*0001\r\n\
CA17*0*25*4\r\n\
PA1*10*150\r\n\
PA2*3*450\r\n\
VA1*100*4\r\n\
EA1*EGS*240102*0930\r\n\
EA2*EJK*4*1200\r\n\
MA5*ERROR*EGS*dS\r\n\
MA5*DETECTED TEMPERATURE*355*F\r\n\
G85*01AB\r\n\
SE*12*0001\r\n";

#[test]
fn scenario_full_document_decode_yields_documented_keys() {
    let map = extract(&tokenize(RAW));

    assert_eq!(map["ca17_tube_0_denomination"], "0.25");
    assert_eq!(map["ca17_tube_0_count"], "4");
    assert_eq!(map["ca17_tube_0_total_value"], "1.00");

    assert_eq!(map["pa1_selection_10_price"], "1.50");
    assert_eq!(map["pa2_selection_10_sales_count"], "3");
    assert_eq!(map["pa2_selection_10_sales_value"], "4.50");

    assert_eq!(map["va1_total_sales_value"], "1.00");
    assert_eq!(map["va1_total_sales_count"], "4");

    assert_eq!(map["ea1_event_EGS_date"], "240102");
    assert_eq!(map["ea1_event_EGS_time"], "0930");
    assert_eq!(map["ea2_event_EJK_count"], "4");
    assert_eq!(map["ea2_event_EJK_value"], "1200");

    assert_eq!(map["ma5_error_codes"], "EGS,dS");
    assert_eq!(map["ma5_detected_temperature"], "3.6");
    assert_eq!(map["ma5_detected_temperature_unit"], "F");

    // Envelope segments (DXS/ST/G85/SE) contribute no keys.
    assert!(map.keys().all(|k| {
        k.starts_with("ca17_")
            || k.starts_with("pa1_")
            || k.starts_with("pa2_")
            || k.starts_with("va1_")
            || k.starts_with("ea1_")
            || k.starts_with("ea2_")
            || k.starts_with("ma5_")
    }));
}

#[test]
fn scenario_full_document_summary_and_groups_agree() {
    let map = extract(&tokenize(RAW));
    let summary = summarize(&map);
    let groups = format_groups(&map);

    assert_eq!(summary.total_sales, "1.00");
    assert_eq!(summary.total_vends, "4");
    assert!(summary.has_errors);
    assert!(summary.has_events);
    assert_eq!(summary.error_codes.as_deref(), Some("EGS,dS"));
    assert_eq!(summary.temperature.as_deref(), Some("3.6"));

    assert_eq!(groups.diagnostics["ma5_error_codes"], "EGS,dS");
    assert!(groups.events.contains_key("ea1_event_EGS_date"));

    // Re-tokenizing the same blob is a pure function: identical output.
    assert_eq!(map, extract(&tokenize(RAW)));
}
