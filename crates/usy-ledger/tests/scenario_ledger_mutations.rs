use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use usy_ledger::*;
use usy_schemas::{PlayerMap, RankTable};
use usy_store::{LocalCache, TrackedStore, VersionedStore};
use usy_testkit::{players, MemoryVersionedStore, StaticFeed, StoreFailure};

struct Fixture {
    _dir: tempfile::TempDir,
    cache: LocalCache,
    memory: Arc<MemoryVersionedStore>,
    tracked: Arc<TrackedStore>,
    ledger: Arc<Ledger>,
}

/// Ledger whose only real tier is the remote store, already holding `initial`.
async fn fixture(initial: PlayerMap) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let cache = LocalCache::new(dir.path().join("players.json"));
    let memory = Arc::new(MemoryVersionedStore::with_content(
        initial.to_pretty_json().unwrap(),
    ));
    let inner: Arc<dyn VersionedStore> = memory.clone();
    let tracked = Arc::new(TrackedStore::new(inner));
    let loader = FallbackLoader::new(cache.clone(), PlayerMap::new())
        .with_attempt(RemoteStoreAttempt::new(tracked.clone()))
        .with_attempt(LocalCacheAttempt::new(cache.clone()));
    let persister = Persister::new(cache.clone(), Some(tracked.clone()));
    let ledger = Arc::new(Ledger::new(loader, persister, RankTable::club_default()));
    ledger.reconcile().await;
    Fixture {
        _dir: dir,
        cache,
        memory,
        tracked,
        ledger,
    }
}

#[tokio::test]
async fn scenario_delta_is_case_insensitive_and_persisted() {
    let fx = fixture(PlayerMap::new()).await;

    let a = fx.ledger.apply_delta("A", 50).await.unwrap();
    assert!(a.outcome.created);
    assert!(matches!(
        a.persisted.as_ref().unwrap().remote,
        RemoteOutcome::Written { .. }
    ));

    let b = fx.ledger.apply_delta("a", -20).await.unwrap();
    assert_eq!(b.outcome.username, "A");
    assert_eq!(b.outcome.new_balance, 30);

    let snap = fx.ledger.snapshot().await;
    assert_eq!(*snap, players(&[("A", 30)]));
    assert_eq!(fx.cache.load().unwrap().as_ref(), Some(&*snap));
    assert_eq!(
        fx.memory.content().unwrap(),
        snap.to_pretty_json().unwrap()
    );
    assert_eq!(
        fx.memory.commit_messages().last().unwrap(),
        "Update players.json: 1 players, total 30 usy"
    );
}

#[tokio::test]
async fn scenario_tier_change_reported_on_promotion() {
    let fx = fixture(players(&[("hentera", 990)])).await;

    let applied = fx.ledger.apply_delta("Hentera", 10).await.unwrap();
    assert!(applied.outcome.tier_changed);
    assert_eq!(applied.outcome.previous_tier.as_deref(), Some("Bronze"));
    assert_eq!(applied.outcome.new_tier, "Silver");

    let view = fx.ledger.lookup("HENTERA").await.unwrap();
    assert_eq!(view.rank, "Silver");
    assert_eq!(view.rank_class, "silver");
}

#[tokio::test]
async fn scenario_replace_all_rejects_non_sequence_and_keeps_map() {
    let fx = fixture(players(&[("a", 1), ("b", 2)])).await;
    let before = fx.ledger.snapshot().await;
    let gen_before = fx.ledger.state().await.generation;
    let writes_before = fx.memory.writes_attempted();

    let err = fx
        .ledger
        .replace_all(&json!({"username": "c", "balance": 3}))
        .await
        .unwrap_err();
    assert!(matches!(err, ValidationError::NotASequence(_)));

    let after = fx.ledger.snapshot().await;
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(fx.ledger.state().await.generation, gen_before);
    assert_eq!(fx.memory.writes_attempted(), writes_before);
}

#[tokio::test]
async fn scenario_replace_all_overwrites_everything() {
    let fx = fixture(players(&[("a", 1), ("b", 2)])).await;

    let applied = fx
        .ledger
        .replace_all_json(r#"[{"username":"c","balance":3,"trophies":["cup"]}]"#)
        .await
        .unwrap();
    assert_eq!(applied.outcome.previous_players, 2);
    assert_eq!(applied.outcome.players, 1);

    let snap = fx.ledger.snapshot().await;
    assert!(snap.get("a").is_none());
    assert_eq!(snap.get("C").unwrap().trophies, vec!["cup"]);
}

#[tokio::test]
async fn scenario_stale_token_conflict_keeps_local_cache() {
    let fx = fixture(players(&[("a", 1)])).await;
    fx.ledger.apply_delta("a", 1).await.unwrap();
    let token_after_success = fx.tracked.version_token().await;

    // Another writer commits; our token is now stale.
    fx.memory.external_write("[]");

    let applied = fx.ledger.apply_delta("a", 4).await.unwrap();
    assert!(matches!(
        applied.persisted.unwrap().remote,
        RemoteOutcome::Conflict { .. }
    ));

    // No retry, no token change, remote content untouched.
    assert_eq!(fx.tracked.version_token().await, token_after_success);
    assert_eq!(fx.memory.content().as_deref(), Some("[]"));

    // Memory and cache keep the mutation; the conflict did not touch them.
    let snap = fx.ledger.snapshot().await;
    assert_eq!(snap.get("a").unwrap().balance, 6);
    assert_eq!(
        std::fs::read_to_string(fx.cache.path()).unwrap(),
        snap.to_pretty_json().unwrap()
    );
}

#[tokio::test]
async fn scenario_remote_failure_is_reported_not_raised() {
    let fx = fixture(players(&[("a", 1)])).await;
    fx.memory.fail_writes(Some(StoreFailure::Server));

    let applied = fx.ledger.apply_delta("a", 1).await.unwrap();
    assert!(matches!(
        applied.persisted.unwrap().remote,
        RemoteOutcome::Failed { .. }
    ));
    assert_eq!(fx.ledger.snapshot().await.get("a").unwrap().balance, 2);
}

#[tokio::test]
async fn scenario_reset_zeroes_balances() {
    let fx = fixture(players(&[("a", 10), ("b", -3), ("c", 0)])).await;
    let applied = fx.ledger.reset_balances().await;
    assert_eq!(applied.outcome.players, 3);
    assert_eq!(applied.outcome.changed, 2);
    assert_eq!(fx.ledger.status().await.total_balance, 0);
}

/// A pass that is still fetching when a delta lands swaps its own map in
/// afterwards, so the delta is lost. This is the documented behaviour.
#[tokio::test]
async fn scenario_in_flight_reconcile_overwrites_concurrent_delta() {
    let dir = tempfile::tempdir().unwrap();
    let cache = LocalCache::new(dir.path().join("players.json"));
    let (feed, gate) = StaticFeed::gated("volt", "a: 100\n");
    let feed = Arc::new(feed);
    let loader = FallbackLoader::new(cache.clone(), PlayerMap::new())
        .with_attempt(RawFeedAttempt::new(feed.clone(), None));
    let ledger = Arc::new(Ledger::new(
        loader,
        Persister::new(cache.clone(), None),
        RankTable::club_default(),
    ));

    let pass = tokio::spawn({
        let ledger = ledger.clone();
        async move { ledger.reconcile().await }
    });

    // Wait until the pass is blocked inside the fetch.
    for _ in 0..200 {
        if feed.fetches() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(feed.fetches(), 1);

    let applied = ledger.apply_delta("a", 7).await.unwrap();
    assert_eq!(applied.outcome.new_balance, 7);
    assert_eq!(ledger.snapshot().await.get("a").unwrap().balance, 7);

    gate.notify_one();
    let outcome = pass.await.unwrap();
    assert_eq!(outcome.tier, LoadTier::RawFeed);
    assert_eq!(ledger.snapshot().await.get("a").unwrap().balance, 100);
}
