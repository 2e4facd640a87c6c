//! Layered config: later documents override earlier ones, the hash is
//! stable under key reordering, and the typed view picks up overrides.

use std::io::Write;

use usy_config::{load_layered_yaml, load_layered_yaml_from_strings};

const BASE_YAML: &str = r#"
ledger:
  cache_path: "data/players.json"
  refresh_interval_secs: 300
feeds:
  balance_url: "https://example.org/balances.txt"
remote_store:
  repo: "club/ledger"
  token_env: "GITHUB_TOKEN"
"#;

const BASE_YAML_REORDERED: &str = r#"
remote_store:
  token_env: "GITHUB_TOKEN"
  repo: "club/ledger"
feeds:
  balance_url: "https://example.org/balances.txt"
ledger:
  refresh_interval_secs: 300
  cache_path: "data/players.json"
"#;

const OVERLAY_YAML: &str = r#"
ledger:
  refresh_interval_secs: 60
feeds:
  trophy_url: "https://example.org/trophies.txt"
daemon:
  addr: "127.0.0.1:8080"
"#;

#[test]
fn key_order_does_not_change_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
    assert_eq!(a.config_hash.len(), 64);
}

#[test]
fn overlay_changes_hash_and_typed_values() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let layered = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(base.config_hash, layered.config_hash);

    let cfg = layered.typed().unwrap();
    // Overridden
    assert_eq!(cfg.ledger.refresh_interval_secs, 60);
    assert_eq!(cfg.daemon.addr, "127.0.0.1:8080");
    // Kept from base
    assert_eq!(cfg.ledger.cache_path.to_str(), Some("data/players.json"));
    let feeds = cfg.feeds.unwrap();
    assert_eq!(feeds.balance_url, "https://example.org/balances.txt");
    assert_eq!(
        feeds.trophy_url.as_deref(),
        Some("https://example.org/trophies.txt")
    );
    // Defaults filled in
    let store = cfg.remote_store.unwrap();
    assert_eq!(store.branch, "main");
    assert_eq!(store.path, "players.json");
    assert_eq!(cfg.ledger.http_timeout_secs, 20);
}

#[test]
fn files_load_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let base_path = dir.path().join("base.yaml");
    let overlay_path = dir.path().join("overlay.yaml");
    std::fs::File::create(&base_path)
        .unwrap()
        .write_all(BASE_YAML.as_bytes())
        .unwrap();
    std::fs::File::create(&overlay_path)
        .unwrap()
        .write_all(OVERLAY_YAML.as_bytes())
        .unwrap();

    let from_files = load_layered_yaml(&[
        base_path.to_str().unwrap(),
        overlay_path.to_str().unwrap(),
    ])
    .unwrap();
    let from_strings = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(from_files.config_hash, from_strings.config_hash);
}

#[test]
fn missing_file_is_an_error() {
    let err = load_layered_yaml(&["/definitely/not/here.yaml"]).unwrap_err();
    assert!(err.to_string().contains("failed to read yaml path"));
}

#[test]
fn custom_ranks_and_seed_are_used() {
    let yaml = r#"
ranks:
  - { min: 0, name: Rookie, class: wood }
  - { min: 100, name: Pro, class: gold }
seed:
  - { username: Zed, balance: 7 }
"#;
    let cfg = load_layered_yaml_from_strings(&[yaml]).unwrap().typed().unwrap();
    let table = cfg.rank_table().unwrap();
    assert_eq!(table.classify(150).name, "Pro");
    assert_eq!(table.classify(-5).name, "Rookie");
    let seed = cfg.seed_records();
    assert_eq!(seed.len(), 1);
    assert_eq!(seed[0].username, "Zed");
}
