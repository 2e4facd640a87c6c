//! Fallback loader: an ordered list of load attempts, first success wins.
//!
//! Tiers are never merged with each other. The winning map is written to the
//! local cache unless the cache itself won. The seed is held outside the
//! attempt list, so a pass always ends with a map.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use usy_reconcile::{merge, parse_text, LineGrammar, TaggedSource};
use usy_schemas::PlayerMap;
use usy_store::{LocalCache, StoreError, TextFeed, TrackedStore};

use crate::error::SourceUnavailable;

/// Fallback tiers in priority order (`Ord` follows priority).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadTier {
    RemoteStore,
    RawFeed,
    LocalCache,
    Seed,
}

impl LoadTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadTier::RemoteStore => "remote_store",
            LoadTier::RawFeed => "raw_feed",
            LoadTier::LocalCache => "local_cache",
            LoadTier::Seed => "seed",
        }
    }
}

impl fmt::Display for LoadTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One candidate data source in the chain.
#[async_trait::async_trait]
pub trait LoadAttempt: Send + Sync {
    fn tier(&self) -> LoadTier;

    async fn try_load(&self) -> Result<PlayerMap, SourceUnavailable>;
}

// ---------------------------------------------------------------------------
// Attempts
// ---------------------------------------------------------------------------

/// Tier 1: the remote versioned store. A successful read also refreshes the
/// version token used by the next remote write.
pub struct RemoteStoreAttempt {
    store: Arc<TrackedStore>,
}

impl RemoteStoreAttempt {
    pub fn new(store: Arc<TrackedStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl LoadAttempt for RemoteStoreAttempt {
    fn tier(&self) -> LoadTier {
        LoadTier::RemoteStore
    }

    async fn try_load(&self) -> Result<PlayerMap, SourceUnavailable> {
        let snap = match self.store.load().await {
            Ok(snap) => snap,
            Err(StoreError::NotFound) => {
                return Err(SourceUnavailable::absent(
                    self.tier(),
                    "players file not found in remote store",
                ))
            }
            Err(e) => return Err(SourceUnavailable::failed(self.tier(), e)),
        };
        let map = serde_json::from_str::<PlayerMap>(&snap.content)
            .map_err(|e| SourceUnavailable::failed(self.tier(), format!("bad content: {e}")))?;
        info!(
            store = self.store.name(),
            token = snap.version_token.short(),
            players = map.len(),
            "remote store read"
        );
        Ok(map)
    }
}

/// Tier 2: raw text feeds. The balance feed is mandatory; a failing trophy
/// feed only costs the trophies.
pub struct RawFeedAttempt {
    balance: Arc<dyn TextFeed>,
    trophy: Option<Arc<dyn TextFeed>>,
}

impl RawFeedAttempt {
    pub fn new(balance: Arc<dyn TextFeed>, trophy: Option<Arc<dyn TextFeed>>) -> Self {
        Self { balance, trophy }
    }
}

#[async_trait::async_trait]
impl LoadAttempt for RawFeedAttempt {
    fn tier(&self) -> LoadTier {
        LoadTier::RawFeed
    }

    async fn try_load(&self) -> Result<PlayerMap, SourceUnavailable> {
        let trophy_fetch = async {
            match &self.trophy {
                Some(feed) => Some((feed.describe(), feed.fetch().await)),
                None => None,
            }
        };
        let (balance_res, trophy_res) = tokio::join!(self.balance.fetch(), trophy_fetch);

        let balance_text = balance_res.map_err(|e| match e {
            StoreError::NotFound => SourceUnavailable::absent(
                self.tier(),
                format!("{} not found", self.balance.describe()),
            ),
            other => SourceUnavailable::failed(
                self.tier(),
                format!("{}: {other}", self.balance.describe()),
            ),
        })?;

        let balances = parse_text(&balance_text, LineGrammar::Balance);
        if balances.skipped > 0 {
            info!(feed = %self.balance.describe(), skipped = balances.skipped, "balance feed lines skipped");
        }
        if balances.is_empty() {
            warn!(feed = %self.balance.describe(), "balance feed has no entries");
        }

        let mut sources = vec![TaggedSource::balance(balances)];
        match trophy_res {
            Some((_, Ok(text))) => {
                let trophies = parse_text(&text, LineGrammar::Trophy);
                sources.push(TaggedSource::trophy(trophies));
            }
            Some((feed, Err(e))) => {
                warn!(feed = %feed, error = %e, "trophy feed unavailable; using balances only");
            }
            None => {}
        }

        let report = merge(&sources);
        info!(
            balance_entries = report.balance_entries,
            trophy_entries = report.trophy_entries,
            trophy_only = report.trophy_only,
            "raw feeds merged"
        );
        Ok(report.map)
    }
}

/// Tier 3: the last persisted map.
pub struct LocalCacheAttempt {
    cache: LocalCache,
}

impl LocalCacheAttempt {
    pub fn new(cache: LocalCache) -> Self {
        Self { cache }
    }
}

#[async_trait::async_trait]
impl LoadAttempt for LocalCacheAttempt {
    fn tier(&self) -> LoadTier {
        LoadTier::LocalCache
    }

    async fn try_load(&self) -> Result<PlayerMap, SourceUnavailable> {
        match self.cache.load() {
            Ok(Some(map)) => Ok(map),
            Ok(None) => Err(SourceUnavailable::absent(
                self.tier(),
                format!("{} does not exist", self.cache.path().display()),
            )),
            Err(e) => Err(SourceUnavailable::failed(self.tier(), e)),
        }
    }
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// The winning tier of a pass before it is propagated.
#[derive(Debug, Clone)]
pub struct Selection {
    pub pass_id: Uuid,
    pub tier: LoadTier,
    pub map: PlayerMap,
    pub fell_through: Vec<LoadTier>,
}

#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub pass_id: Uuid,
    pub tier: LoadTier,
    pub map: PlayerMap,
    /// Tiers that were tried and fell through, in order.
    pub fell_through: Vec<LoadTier>,
    /// `false` when the cache write after a non-cache win failed.
    pub cache_written: bool,
}

pub struct FallbackLoader {
    attempts: Vec<Box<dyn LoadAttempt>>,
    cache: LocalCache,
    seed: PlayerMap,
}

impl FallbackLoader {
    /// A loader with only the seed. Add tiers with [`FallbackLoader::with_attempt`].
    pub fn new(cache: LocalCache, seed: PlayerMap) -> Self {
        Self {
            attempts: Vec::new(),
            cache,
            seed,
        }
    }

    /// Attempts are kept in tier priority order regardless of call order.
    pub fn with_attempt(mut self, attempt: impl LoadAttempt + 'static) -> Self {
        self.attempts.push(Box::new(attempt));
        self.attempts.sort_by_key(|a| a.tier());
        self
    }

    pub fn tiers(&self) -> Vec<LoadTier> {
        let mut tiers: Vec<_> = self.attempts.iter().map(|a| a.tier()).collect();
        tiers.push(LoadTier::Seed);
        tiers
    }

    /// Run one pass and propagate the winner to the local cache. Never
    /// fails: the seed is the last resort.
    pub async fn reconcile(&self, pass_id: Uuid) -> ReconcileOutcome {
        let selection = self.select(pass_id).await;
        self.propagate(selection)
    }

    /// Walk the tiers and pick the first map, without touching the cache.
    pub async fn select(&self, pass_id: Uuid) -> Selection {
        let mut fell_through = Vec::new();

        for attempt in &self.attempts {
            let tier = attempt.tier();
            match attempt.try_load().await {
                Ok(map) => {
                    return Selection {
                        pass_id,
                        tier,
                        map,
                        fell_through,
                    }
                }
                Err(e @ SourceUnavailable::Absent { .. }) => {
                    info!(%pass_id, %tier, reason = %e, "fallback tier absent");
                }
                Err(e) => {
                    warn!(%pass_id, %tier, error = %e, "fallback tier failed");
                }
            }
            fell_through.push(tier);
        }

        warn!(%pass_id, "all fallback tiers unavailable; using built-in seed");
        Selection {
            pass_id,
            tier: LoadTier::Seed,
            map: self.seed.clone(),
            fell_through,
        }
    }

    /// Write the selected map to the local cache unless it came from there.
    pub fn propagate(&self, selection: Selection) -> ReconcileOutcome {
        let Selection {
            pass_id,
            tier,
            map,
            fell_through,
        } = selection;
        let cache_written = if tier == LoadTier::LocalCache {
            true
        } else {
            match self.cache.store(&map) {
                Ok(()) => true,
                Err(e) => {
                    error!(%pass_id, %tier, error = %e, "failed to propagate map to local cache");
                    false
                }
            }
        };

        info!(%pass_id, %tier, players = map.len(), "reconciliation tier selected");
        ReconcileOutcome {
            pass_id,
            tier,
            map,
            fell_through,
            cache_written,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(LoadTier, Option<PlayerMap>);

    #[async_trait::async_trait]
    impl LoadAttempt for Fixed {
        fn tier(&self) -> LoadTier {
            self.0
        }

        async fn try_load(&self) -> Result<PlayerMap, SourceUnavailable> {
            self.1
                .clone()
                .ok_or_else(|| SourceUnavailable::failed(self.0, "fixture"))
        }
    }

    #[test]
    fn attempts_sorted_by_priority() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FallbackLoader::new(LocalCache::new(dir.path().join("p.json")), PlayerMap::new())
            .with_attempt(Fixed(LoadTier::LocalCache, None))
            .with_attempt(Fixed(LoadTier::RemoteStore, None))
            .with_attempt(Fixed(LoadTier::RawFeed, None));
        assert_eq!(
            loader.tiers(),
            vec![
                LoadTier::RemoteStore,
                LoadTier::RawFeed,
                LoadTier::LocalCache,
                LoadTier::Seed
            ]
        );
    }

    #[tokio::test]
    async fn first_success_wins_and_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path().join("p.json"));
        let remote = PlayerMap::from_records(vec![usy_schemas::PlayerRecord::new("r", 1)]);
        let raw = PlayerMap::from_records(vec![usy_schemas::PlayerRecord::new("w", 2)]);
        let loader = FallbackLoader::new(cache.clone(), PlayerMap::new())
            .with_attempt(Fixed(LoadTier::RawFeed, Some(raw)))
            .with_attempt(Fixed(LoadTier::RemoteStore, Some(remote.clone())));

        let out = loader.reconcile(Uuid::new_v4()).await;
        assert_eq!(out.tier, LoadTier::RemoteStore);
        assert_eq!(out.map, remote);
        assert!(out.fell_through.is_empty());
        assert_eq!(cache.load().unwrap(), Some(remote));
    }
}
