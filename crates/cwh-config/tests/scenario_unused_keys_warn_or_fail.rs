//! Unused keys are detected; Warn reports them, Fail errors.

use cwh_config::{load_defaults, load_layered_yaml_from_strings, report_unused_keys, UnusedKeyPolicy};

#[test]
fn defaults_are_fully_consumed() {
    let loaded = load_defaults().unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
    assert!(report.is_clean());
}

#[test]
fn typo_section_is_reported_in_warn_mode() {
    let yaml = r#"
backfil:
  days: 30
  top_coins: 5
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/backfil/days".to_string(), "/backfil/top_coins".to_string()]
    );
    // the typo did not reach the typed value
    assert_eq!(loaded.config.backfill.days, 90);
}

#[test]
fn fail_mode_errors_on_unused_keys() {
    let yaml = "db:\n  pool_size: 9\n";
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let err = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap_err();
    assert!(format!("{err}").contains("CONFIG_UNUSED_KEYS"));
}

#[test]
fn retry_subtree_is_consumed_as_a_whole() {
    let yaml = "upstream:\n  retry:\n    max_attempts: 2\n";
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
    assert!(report.is_clean());
}
