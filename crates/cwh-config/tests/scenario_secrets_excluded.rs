//! The config may name env vars but never carry credential values.

use cwh_config::{load_layered_yaml_from_strings, resolve_database_url};

#[test]
fn token_like_literal_is_rejected() {
    let yaml = r#"
exports:
  root: "ghp_abcdefghijklmnop"
"#;
    let err = load_layered_yaml_from_strings(&[yaml]).unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("CONFIG_SECRET_DETECTED"));
    assert!(msg.contains("/exports/root"));
    assert!(!msg.contains("ghp_abcdefghijklmnop"), "value must be redacted");
}

#[test]
fn env_var_name_is_accepted() {
    let yaml = r#"
db:
  url_env: "WAREHOUSE_URL"
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    assert_eq!(loaded.config.db.url_env, "WAREHOUSE_URL");
}

#[test]
fn unset_url_var_errors_with_name_only() {
    let yaml = r#"
db:
  url_env: "CWH_TEST_URL_THAT_IS_NEVER_SET_4242"
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let err = resolve_database_url(&loaded.config.db).unwrap_err();
    assert!(format!("{err}").contains("CWH_TEST_URL_THAT_IS_NEVER_SET_4242"));
}
