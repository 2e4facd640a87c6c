//! Runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only **env var NAMES** (e.g. `"GITHUB_TOKEN"`).
//! - Callers invoke [`resolve_secrets`] once at startup and pass the result
//!   into constructors.
//! - `Debug` impls **redact** values; error and log text name the env var only.
//!
//! The remote store is enabled only when both the repository and its access
//! token are present. Anything in between is reported so the operator can see
//! why the service runs without remote persistence.

use tracing::warn;

use crate::{RemoteStoreSection, UsyConfig};

/// Fallback admin list variable when the configured one is unset.
const ADMIN_ID_FALLBACK_VAR: &str = "ADMIN_ID";

/// Secrets resolved from the environment. **Values are redacted in `Debug`.**
#[derive(Clone, Default)]
pub struct ResolvedSecrets {
    /// Remote store access token. `None` if the named env var is absent or blank.
    pub store_token: Option<String>,
    /// Identities allowed to run admin operations. Empty = everyone allowed.
    pub admin_ids: Vec<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("store_token", &self.store_token.as_ref().map(|_| "<REDACTED>"))
            .field("admin_ids", &self.admin_ids.len())
            .finish()
    }
}

/// Whether the remote versioned store should be used.
#[derive(Clone)]
pub enum RemoteStoreStatus {
    Enabled {
        section: RemoteStoreSection,
        token: String,
    },
    /// Repository configured but its token env var is empty.
    MissingToken { repo: String, token_env: String },
    /// Token present but no repository configured.
    MissingRepo,
    Disabled,
}

impl std::fmt::Debug for RemoteStoreStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteStoreStatus::Enabled { section, .. } => f
                .debug_struct("Enabled")
                .field("section", section)
                .field("token", &"<REDACTED>")
                .finish(),
            RemoteStoreStatus::MissingToken { repo, token_env } => f
                .debug_struct("MissingToken")
                .field("repo", repo)
                .field("token_env", token_env)
                .finish(),
            RemoteStoreStatus::MissingRepo => f.write_str("MissingRepo"),
            RemoteStoreStatus::Disabled => f.write_str("Disabled"),
        }
    }
}

impl ResolvedSecrets {
    /// Decide whether remote persistence is on, logging partial setups.
    pub fn remote_store_status(&self, cfg: &UsyConfig) -> RemoteStoreStatus {
        let section = cfg
            .remote_store
            .as_ref()
            .filter(|s| !s.repo.trim().is_empty());

        match (section, &self.store_token) {
            (Some(section), Some(token)) => RemoteStoreStatus::Enabled {
                section: section.clone(),
                token: token.clone(),
            },
            (Some(section), None) => {
                warn!(
                    repo = %section.repo,
                    token_env = %section.token_env,
                    "remote store configured but token env var is empty; remote persistence disabled"
                );
                RemoteStoreStatus::MissingToken {
                    repo: section.repo.clone(),
                    token_env: section.token_env.clone(),
                }
            }
            (None, Some(_)) => {
                warn!("store token present but no remote_store.repo configured; remote persistence disabled");
                RemoteStoreStatus::MissingRepo
            }
            (None, None) => RemoteStoreStatus::Disabled,
        }
    }
}

/// Resolve secrets from the process environment.
pub fn resolve_secrets(cfg: &UsyConfig) -> ResolvedSecrets {
    resolve_secrets_with(cfg, |name| std::env::var(name).ok())
}

/// Resolve secrets through `lookup` (env var name -> value).
pub fn resolve_secrets_with<F>(cfg: &UsyConfig, lookup: F) -> ResolvedSecrets
where
    F: Fn(&str) -> Option<String>,
{
    let non_blank = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    let token_env = cfg
        .remote_store
        .as_ref()
        .map(|s| s.token_env.as_str())
        .unwrap_or("GITHUB_TOKEN");
    let store_token = non_blank(token_env).map(|v| v.trim().to_string());

    let admin_raw = non_blank(&cfg.daemon.admin_ids_env)
        .or_else(|| non_blank(ADMIN_ID_FALLBACK_VAR))
        .unwrap_or_default();
    let admin_ids = admin_raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    ResolvedSecrets {
        store_token,
        admin_ids,
    }
}
