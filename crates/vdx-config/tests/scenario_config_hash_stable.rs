use vdx_config::load_layered_yaml_from_strings;

#[test]
fn scenario_config_hash_stable_across_loads() {
    let base = "collector:\n  schedule_minutes: 20\nportal:\n  base_url: http://localhost:8080\n";
    let site = "collector:\n  inter_company_delay_secs: 2\n";

    let a = load_layered_yaml_from_strings(&[base, site]).unwrap();
    let b = load_layered_yaml_from_strings(&[base, site]).unwrap();

    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn scenario_config_hash_changes_when_any_layer_changes() {
    let base = "collector:\n  schedule_minutes: 20\n";
    let a = load_layered_yaml_from_strings(&[base]).unwrap();
    let b = load_layered_yaml_from_strings(&[base, "collector:\n  schedule_minutes: 10\n"]).unwrap();

    assert_ne!(a.config_hash, b.config_hash);
}
