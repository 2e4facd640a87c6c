//! Build a [`Ledger`] from typed config and resolved secrets.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use usy_config::{RemoteStoreStatus, ResolvedSecrets, UsyConfig};
use usy_schemas::PlayerMap;
use usy_store::{GitHubContentsStore, GitHubLocation, HttpTextFeed, LocalCache, TextFeed, TrackedStore};

use crate::ledger::Ledger;
use crate::loader::{FallbackLoader, LocalCacheAttempt, RawFeedAttempt, RemoteStoreAttempt};
use crate::persister::Persister;

pub fn build_ledger(cfg: &UsyConfig, secrets: &ResolvedSecrets) -> Result<Ledger> {
    let timeout = Duration::from_secs(cfg.ledger.http_timeout_secs);
    let cache = LocalCache::new(cfg.ledger.cache_path.clone());
    let seed = PlayerMap::from_records(cfg.seed_records());
    let ranks = cfg.rank_table()?;

    let remote = match secrets.remote_store_status(cfg) {
        RemoteStoreStatus::Enabled { section, token } => {
            let location = GitHubLocation {
                api_base: section.api_base,
                repo: section.repo,
                path: section.path,
                branch: section.branch,
            };
            info!(repo = %location.repo, path = %location.path, branch = %location.branch, "remote store enabled");
            let store = GitHubContentsStore::new(location, token, timeout)
                .context("failed to build remote store client")?;
            Some(Arc::new(TrackedStore::new(Arc::new(store))))
        }
        _ => None,
    };

    let mut loader = FallbackLoader::new(cache.clone(), seed)
        .with_attempt(LocalCacheAttempt::new(cache.clone()));
    if let Some(store) = &remote {
        loader = loader.with_attempt(RemoteStoreAttempt::new(store.clone()));
    }
    if let Some(feeds) = &cfg.feeds {
        let balance: Arc<dyn TextFeed> = Arc::new(
            HttpTextFeed::new(feeds.balance_url.clone(), timeout)
                .context("failed to build balance feed client")?,
        );
        let trophy: Option<Arc<dyn TextFeed>> = match &feeds.trophy_url {
            Some(url) => {
                let feed: Arc<dyn TextFeed> = Arc::new(
                    HttpTextFeed::new(url.clone(), timeout)
                        .context("failed to build trophy feed client")?,
                );
                Some(feed)
            }
            None => None,
        };
        loader = loader.with_attempt(RawFeedAttempt::new(balance, trophy));
    }

    info!(tiers = ?loader.tiers(), cache = %cache.path().display(), "fallback chain configured");
    Ok(Ledger::new(loader, Persister::new(cache, remote), ranks))
}
