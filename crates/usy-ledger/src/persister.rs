//! Durable persistence: local cache first, then the remote store if one is
//! configured. Remote trouble is reported, never raised.
//!
//! The two halves are separate calls so the ledger can write the cache
//! while it still holds its state lock and push to the remote after
//! releasing it.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use usy_schemas::PlayerMap;
use usy_store::{LocalCache, StoreError, TrackedStore};

use crate::error::PersistenceFailure;

/// What happened on the remote side of one persist call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RemoteOutcome {
    Disabled,
    Written { token: String },
    /// Stale or missing version token. Abandoned for this call, no retry.
    Conflict { message: String },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistReport {
    pub players: usize,
    pub remote: RemoteOutcome,
}

pub struct Persister {
    cache: LocalCache,
    remote: Option<Arc<TrackedStore>>,
}

impl Persister {
    pub fn new(cache: LocalCache, remote: Option<Arc<TrackedStore>>) -> Self {
        Self { cache, remote }
    }

    /// Write the full map to the local cache and return the serialized map
    /// for [`Persister::write_remote`]. Concurrent callers must serialize
    /// these calls in mutation order.
    pub fn write_local(&self, map: &PlayerMap) -> Result<String, PersistenceFailure> {
        let json = map.to_pretty_json().map_err(usy_store::CacheError::from)?;
        if let Err(e) = self.cache.store_raw(&json) {
            error!(path = %self.cache.path().display(), error = %e, "local cache write failed");
            return Err(e.into());
        }
        info!(path = %self.cache.path().display(), players = map.len(), "local cache written");
        Ok(json)
    }

    /// Conditional write to the remote store, if one is configured. Runs
    /// only after a successful local write. Never raises.
    pub async fn write_remote(&self, map: &PlayerMap, json: &str) -> RemoteOutcome {
        let Some(store) = &self.remote else {
            return RemoteOutcome::Disabled;
        };
        let message = commit_message(map);
        match store.save(json, &message).await {
            Ok(token) => {
                info!(store = store.name(), token = token.short(), "remote store written");
                RemoteOutcome::Written {
                    token: token.to_string(),
                }
            }
            Err(e @ StoreError::Conflict { .. }) => {
                warn!(store = store.name(), error = %e, "remote write conflict; keeping local state");
                RemoteOutcome::Conflict {
                    message: e.to_string(),
                }
            }
            Err(e) => {
                error!(store = store.name(), error = %e, "remote write failed");
                RemoteOutcome::Failed {
                    message: e.to_string(),
                }
            }
        }
    }
}

pub fn commit_message(map: &PlayerMap) -> String {
    format!(
        "Update players.json: {} players, total {} usy",
        map.len(),
        map.total_balance()
    )
}
