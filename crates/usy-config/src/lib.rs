//! usy-config
//!
//! Layered YAML configuration for the ledger service.
//!
//! YAML documents are merged in order (earlier = base, later = override),
//! converted to JSON, checked for literal secrets, canonicalized and hashed.
//! The typed view is [`UsyConfig`]. Secrets are never stored in YAML; the
//! config only names the env vars that hold them (see [`secrets`]).

pub mod secrets;

pub use secrets::{resolve_secrets, resolve_secrets_with, RemoteStoreStatus, ResolvedSecrets};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;
use usy_schemas::{PlayerRecord, RankBand, RankTable};

/// Known secret-like prefixes. If any leaf string value in the effective
/// config starts with one of these, loading aborts with CONFIG_SECRET_DETECTED.
const SECRET_PREFIXES: &[&str] = &[
    "ghp_",        // GitHub PAT (classic)
    "gho_",        // GitHub OAuth
    "ghs_",        // GitHub app installation token
    "github_pat_", // GitHub fine-grained PAT
    "glpat-",      // GitLab PAT
    "sk-",         // OpenAI style
    "xoxb-",       // Slack bot token
    "-----BEGIN",  // PEM private keys
];

// ---------------------------------------------------------------------------
// Typed config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UsyConfig {
    #[serde(default)]
    pub ledger: LedgerSection,
    /// Raw snapshot feeds (fallback tier 2). Absent = tier disabled.
    #[serde(default)]
    pub feeds: Option<FeedsSection>,
    /// Remote versioned store (fallback tier 1 + remote persistence).
    #[serde(default)]
    pub remote_store: Option<RemoteStoreSection>,
    /// Rank bands; absent = the club default table.
    #[serde(default)]
    pub ranks: Option<Vec<RankBand>>,
    /// Built-in seed (fallback tier 4); absent = the club default seed.
    #[serde(default)]
    pub seed: Option<Vec<PlayerRecord>>,
    #[serde(default)]
    pub daemon: DaemonSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LedgerSection {
    pub cache_path: PathBuf,
    pub refresh_interval_secs: u64,
    pub http_timeout_secs: u64,
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::from("players.json"),
            refresh_interval_secs: 300,
            http_timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedsSection {
    /// Mandatory balance feed.
    pub balance_url: String,
    /// Optional trophy feed.
    #[serde(default)]
    pub trophy_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteStoreSection {
    /// `owner/repo`
    pub repo: String,
    #[serde(default = "default_store_path")]
    pub path: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// NAME of the env var holding the access token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

fn default_store_path() -> String {
    "players.json".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DaemonSection {
    pub addr: String,
    /// NAME of the env var holding comma-separated admin ids.
    pub admin_ids_env: String,
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:10000".to_string(),
            admin_ids_env: "ADMIN_IDS".to_string(),
        }
    }
}

impl UsyConfig {
    pub fn rank_table(&self) -> Result<RankTable> {
        match &self.ranks {
            Some(bands) => RankTable::new(bands.clone()).context("invalid ranks section"),
            None => Ok(RankTable::club_default()),
        }
    }

    pub fn seed_records(&self) -> Vec<PlayerRecord> {
        self.seed.clone().unwrap_or_else(default_seed)
    }
}

/// Built-in seed used when every other source is unavailable.
pub fn default_seed() -> Vec<PlayerRecord> {
    vec![
        PlayerRecord::new("atemmax", 660),
        PlayerRecord::new("loloky", 76),
        PlayerRecord::new("hentera", 1200),
        PlayerRecord::new("chessmaster", 200),
        PlayerRecord::new("grandpaw", 1800),
    ]
}

// ---------------------------------------------------------------------------
// Layered loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    pub fn typed(&self) -> Result<UsyConfig> {
        serde_json::from_value(self.config_json.clone()).context("config does not match schema")
    }
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        // An empty document contributes nothing.
        if v_json.is_null() {
            continue;
        }
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let canonical = sort_keys(&merged);
    let canonical_json =
        serde_json::to_string(&canonical).context("canonical json serialize failed")?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut out = serde_json::Map::new();
            for k in keys {
                out.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(out)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn collect_leaf_strings<'a>(v: &'a Value, prefix: String, out: &mut Vec<(String, &'a str)>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map {
                collect_leaf_strings(vv, format!("{prefix}/{k}"), out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                collect_leaf_strings(vv, format!("{prefix}/{i}"), out);
            }
        }
        Value::String(s) => out.push((prefix, s.as_str())),
        _ => {}
    }
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    collect_leaf_strings(v, String::new(), &mut leaves);

    for (ptr, s) in leaves {
        if looks_like_secret(s) {
            bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
        }
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}
