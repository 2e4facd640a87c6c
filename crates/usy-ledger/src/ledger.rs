//! The ledger state cell.
//!
//! One `RwLock` guards the canonical map. Readers clone the `Arc` and drop the
//! lock. Mutations copy-on-write under the write lock and write the local
//! cache before releasing it, so the cache always holds the newest map. The
//! remote write happens after the lock is released.
//!
//! A reconciliation pass loads without holding the lock and swaps the map in
//! wholesale when it finishes, so a delta applied while a pass is still
//! loading is overwritten by that pass.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use usy_schemas::{PlayerMap, PlayerRecord, RankTable};

use crate::error::{MutationError, PersistenceFailure, ValidationError};
use crate::loader::{FallbackLoader, LoadTier, ReconcileOutcome};
use crate::mutator::{self, DeltaOutcome};
use crate::persister::{PersistReport, Persister};

#[derive(Debug, Clone)]
pub struct LedgerState {
    pub map: Arc<PlayerMap>,
    /// Tier of the last reconciliation; `None` before the first pass.
    pub origin: Option<LoadTier>,
    /// Bumped on every swap or mutation.
    pub generation: u64,
    pub last_reconciled_at: Option<DateTime<Utc>>,
}

/// A record with its rank attached, as served to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedPlayer {
    pub username: String,
    pub balance: i64,
    pub trophies: Vec<String>,
    pub rank: String,
    pub rank_class: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerStatus {
    pub players: usize,
    pub total_balance: i64,
    pub origin: Option<LoadTier>,
    pub generation: u64,
    pub last_reconciled_at: Option<DateTime<Utc>>,
}

/// Outcome of a mutation plus what persistence did with it. A persistence
/// failure does not undo the mutation.
#[derive(Debug)]
pub struct Applied<T> {
    pub outcome: T,
    pub persisted: Result<PersistReport, PersistenceFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplaceOutcome {
    pub previous_players: usize,
    pub players: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetOutcome {
    pub players: usize,
    pub changed: usize,
}

pub struct Ledger {
    state: RwLock<LedgerState>,
    loader: FallbackLoader,
    persister: Persister,
    ranks: RankTable,
}

impl Ledger {
    /// Starts empty; run [`Ledger::reconcile`] before serving.
    pub fn new(loader: FallbackLoader, persister: Persister, ranks: RankTable) -> Self {
        Self {
            state: RwLock::new(LedgerState {
                map: Arc::new(PlayerMap::new()),
                origin: None,
                generation: 0,
                last_reconciled_at: None,
            }),
            loader,
            persister,
            ranks,
        }
    }

    /// Run one fallback pass and swap its map in.
    pub async fn reconcile(&self) -> ReconcileOutcome {
        let pass_id = Uuid::new_v4();
        let selection = self.loader.select(pass_id).await;

        let mut st = self.state.write().await;
        let outcome = self.loader.propagate(selection);
        st.map = Arc::new(outcome.map.clone());
        st.origin = Some(outcome.tier);
        st.generation += 1;
        st.last_reconciled_at = Some(Utc::now());
        info!(
            %pass_id,
            tier = %outcome.tier,
            players = st.map.len(),
            generation = st.generation,
            "canonical map swapped"
        );
        outcome
    }

    pub async fn snapshot(&self) -> Arc<PlayerMap> {
        self.state.read().await.map.clone()
    }

    pub async fn state(&self) -> LedgerState {
        self.state.read().await.clone()
    }

    pub async fn lookup(&self, username: &str) -> Option<RankedPlayer> {
        let map = self.snapshot().await;
        map.get(username).map(|rec| self.ranked(rec))
    }

    /// Leaderboard order: balance descending, ties keep map order.
    pub async fn ranked_players(&self) -> Vec<RankedPlayer> {
        let map = self.snapshot().await;
        let mut players: Vec<_> = map.iter().map(|rec| self.ranked(rec)).collect();
        players.sort_by(|a, b| b.balance.cmp(&a.balance));
        players
    }

    pub fn ranked(&self, rec: &PlayerRecord) -> RankedPlayer {
        let band = self.ranks.classify(rec.balance);
        RankedPlayer {
            username: rec.username.clone(),
            balance: rec.balance,
            trophies: rec.trophies.clone(),
            rank: band.name.clone(),
            rank_class: band.class.clone(),
        }
    }

    pub async fn status(&self) -> LedgerStatus {
        let st = self.state.read().await;
        LedgerStatus {
            players: st.map.len(),
            total_balance: st.map.total_balance(),
            origin: st.origin,
            generation: st.generation,
            last_reconciled_at: st.last_reconciled_at,
        }
    }

    pub async fn apply_delta(
        &self,
        username: &str,
        delta: i64,
    ) -> Result<Applied<DeltaOutcome>, MutationError> {
        let (outcome, map, local) = {
            let mut st = self.state.write().await;
            let mut next = (*st.map).clone();
            let outcome = mutator::apply_delta(&mut next, &self.ranks, username, delta)?;
            let local = self.persister.write_local(&next);
            st.map = Arc::new(next);
            st.generation += 1;
            (outcome, st.map.clone(), local)
        };

        info!(
            username = %outcome.username,
            delta,
            balance = outcome.new_balance,
            created = outcome.created,
            "balance updated"
        );
        if let Some(change) = outcome.change {
            info!(
                username = %outcome.username,
                from = outcome.previous_tier.as_deref().unwrap_or(""),
                to = %outcome.new_tier,
                ?change,
                "tier changed"
            );
        }

        let persisted = self.push_remote(&map, local).await;
        Ok(Applied { outcome, persisted })
    }

    /// Validate `input` and swap it in as the whole map. On a validation
    /// error the current map is left untouched.
    pub async fn replace_all(
        &self,
        input: &serde_json::Value,
    ) -> Result<Applied<ReplaceOutcome>, ValidationError> {
        let replacement = mutator::validate_replacement(input)?;
        self.install(replacement).await
    }

    /// Same as [`Ledger::replace_all`] for raw JSON text.
    pub async fn replace_all_json(
        &self,
        text: &str,
    ) -> Result<Applied<ReplaceOutcome>, ValidationError> {
        let replacement = mutator::parse_replacement(text)?;
        self.install(replacement).await
    }

    async fn install(
        &self,
        replacement: PlayerMap,
    ) -> Result<Applied<ReplaceOutcome>, ValidationError> {
        let (outcome, map, local) = {
            let mut st = self.state.write().await;
            let outcome = ReplaceOutcome {
                previous_players: st.map.len(),
                players: replacement.len(),
            };
            let local = self.persister.write_local(&replacement);
            st.map = Arc::new(replacement);
            st.generation += 1;
            (outcome, st.map.clone(), local)
        };
        info!(
            previous = outcome.previous_players,
            players = outcome.players,
            "canonical map replaced"
        );

        let persisted = self.push_remote(&map, local).await;
        Ok(Applied { outcome, persisted })
    }

    pub async fn reset_balances(&self) -> Applied<ResetOutcome> {
        let (outcome, map, local) = {
            let mut st = self.state.write().await;
            let map = Arc::make_mut(&mut st.map);
            let changed = mutator::reset_balances(map);
            let outcome = ResetOutcome {
                players: map.len(),
                changed,
            };
            let local = self.persister.write_local(map);
            st.generation += 1;
            (outcome, st.map.clone(), local)
        };
        info!(players = outcome.players, changed = outcome.changed, "balances reset");

        let persisted = self.push_remote(&map, local).await;
        Applied { outcome, persisted }
    }

    /// Remote half of persistence, outside the lock. Skipped when the local
    /// write failed.
    async fn push_remote(
        &self,
        map: &PlayerMap,
        local: Result<String, PersistenceFailure>,
    ) -> Result<PersistReport, PersistenceFailure> {
        let json = local?;
        let remote = self.persister.write_remote(map, &json).await;
        Ok(PersistReport {
            players: map.len(),
            remote,
        })
    }
}
