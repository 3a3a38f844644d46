//! Re-running reconcile with its own prior output as the stored list must
//! yield the same result — collection cycles can re-process a capture after
//! a partial failure without corrupting acknowledgement state.

use chrono::{DateTime, Utc};
use vdx_dex::{extract, tokenize};
use vdx_reconcile::reconcile;

#[test]
fn scenario_reconcile_is_idempotent_over_its_own_output() {
    let map = extract(&tokenize(
        "EA1*EGS*240102*0930\nEA1*EJK*240103*1415\nMA5*ERROR*dS*bH",
    ));
    let captured_at: DateTime<Utc> = "2024-01-05T12:00:00Z".parse().unwrap();

    let once = reconcile(&[], &map, captured_at);
    let twice = reconcile(&once, &map, captured_at);
    let thrice = reconcile(&twice, &map, captured_at);

    assert_eq!(once, twice);
    assert_eq!(twice, thrice);
}

#[test]
fn scenario_reconcile_is_idempotent_with_actioned_records() {
    let map = extract(&tokenize("EA1*EGS*240102*0930\nMA5*ERROR*dS"));
    let captured_at: DateTime<Utc> = "2024-01-05T12:00:00Z".parse().unwrap();

    let mut stored = reconcile(&[], &map, captured_at);
    for rec in &mut stored {
        rec.actioned = true;
        rec.actioned_at = Some(captured_at);
    }

    let once = reconcile(&stored, &map, captured_at);
    let twice = reconcile(&once, &map, captured_at);

    assert_eq!(once, twice);
    assert!(once.iter().all(|r| r.actioned));
}
