//! Config hash stability.
//!
//! GREEN when:
//! - the same layers hash identically across calls;
//! - reordering keys within YAML does not change the hash;
//! - different values produce different hashes;
//! - later layers override earlier ones.

use cwh_config::{load_defaults, load_layered_yaml_from_strings};

const BASE_YAML: &str = r#"
upstream:
  timeout_secs: 15
  retry:
    max_attempts: 5
    max_wait_secs: 30
backfill:
  days: 30
  top_coins: 10
"#;

const BASE_YAML_REORDERED: &str = r#"
backfill:
  top_coins: 10
  days: 30
upstream:
  retry:
    max_wait_secs: 30
    max_attempts: 5
  timeout_secs: 15
"#;

const OVERLAY_YAML: &str = r#"
backfill:
  days: 7
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
}

#[test]
fn different_values_produce_different_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let d = load_defaults().unwrap();
    assert_ne!(a.config_hash, d.config_hash);
    assert_eq!(a.config_hash.len(), 64);
}

#[test]
fn overlay_overrides_only_named_leaves() {
    let merged = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(merged.config.backfill.days, 7);
    assert_eq!(merged.config.backfill.top_coins, 10);
    assert_eq!(merged.config.upstream.retry.max_attempts, 5);
    // untouched leaves keep their defaults
    assert_eq!(merged.config.upstream.retry.rate_limit_step_secs, 3);
    assert_eq!(merged.config.backfill.vs_currency, "usd");
}
