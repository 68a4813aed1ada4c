//! Config layering, hashing and typed view.
//!
//! GREEN when:
//! - Same input produces the same hash; reordered keys do not change it.
//! - Overlays override only the keys they name.
//! - An empty config yields the documented defaults.
//! - Invalid values are refused by `AppConfig::from_loaded`.
//! - Files on disk load the same as strings.

use rxd_config::{load_layered_yaml, load_layered_yaml_from_strings, AppConfig};

const BASE_YAML: &str = r#"
server:
  bind_addr: "0.0.0.0:8080"
database:
  url_env: "RXD_DATABASE_URL"
  max_connections: 5
stock:
  default_reorder_level: 25
"#;

const BASE_YAML_REORDERED: &str = r#"
stock:
  default_reorder_level: 25
database:
  max_connections: 5
  url_env: "RXD_DATABASE_URL"
server:
  bind_addr: "0.0.0.0:8080"
"#;

const OVERLAY_YAML: &str = r#"
stock:
  allow_approval_shortfall: true
orders:
  number_prefix: "SO"
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
    assert_eq!(
        a.config_hash, b.config_hash,
        "reordering keys must not change the hash"
    );
}

#[test]
fn overlay_overrides_only_named_keys() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    let cfg = AppConfig::from_loaded(&loaded).unwrap();

    assert_eq!(cfg.server.bind_addr, "0.0.0.0:8080");
    assert_eq!(cfg.database.max_connections, 5);
    assert_eq!(cfg.stock.default_reorder_level, 25);
    assert!(cfg.stock.allow_approval_shortfall);
    assert_eq!(cfg.orders.number_prefix, "SO");
    assert_eq!(cfg.orders.max_items, 100, "untouched key keeps its default");

    let base_only = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_ne!(base_only.config_hash, loaded.config_hash);
}

#[test]
fn empty_config_yields_defaults() {
    let loaded = load_layered_yaml_from_strings(&[]).unwrap();
    let cfg = AppConfig::from_loaded(&loaded).unwrap();
    assert_eq!(cfg, AppConfig::default());
    assert_eq!(cfg.database.url_env, "RXD_DATABASE_URL");
    assert!(!cfg.stock.allow_approval_shortfall);
}

#[test]
fn invalid_values_are_refused() {
    let loaded = load_layered_yaml_from_strings(&["orders:\n  max_items: 0\n"]).unwrap();
    let err = AppConfig::from_loaded(&loaded).unwrap_err();
    assert!(err.to_string().contains("CONFIG_INVALID"), "got: {err}");

    let loaded =
        load_layered_yaml_from_strings(&["stock:\n  default_reorder_level: \"many\"\n"]).unwrap();
    assert!(AppConfig::from_loaded(&loaded).is_err());
}

#[test]
fn files_load_like_strings() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.yaml");
    let overlay = dir.path().join("prod.yaml");
    std::fs::write(&base, BASE_YAML).unwrap();
    std::fs::write(&overlay, OVERLAY_YAML).unwrap();

    let from_files = load_layered_yaml(&[
        base.to_str().unwrap(),
        overlay.to_str().unwrap(),
    ])
    .unwrap();
    let from_strings = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(from_files.config_hash, from_strings.config_hash);
}

#[test]
fn missing_file_names_the_path() {
    let err = load_layered_yaml(&["/definitely/not/here.yaml"]).unwrap_err();
    assert!(err.to_string().contains("/definitely/not/here.yaml"));
}
