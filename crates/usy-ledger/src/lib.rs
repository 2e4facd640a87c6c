//! usy-ledger
//!
//! The reconciliation and persistence engine:
//! - [`loader`]: fallback chain (remote store, raw feeds, local cache, seed)
//! - [`mutator`]: balance deltas, bulk replacement, balance reset
//! - [`persister`]: local cache then conditional remote write
//! - [`ledger`]: the state cell tying them together
//!
//! Callers (daemon, CLI) hold one [`Ledger`] and call `reconcile`,
//! `apply_delta`, `replace_all` and friends.

pub mod error;
pub mod ledger;
pub mod loader;
pub mod mutator;
pub mod persister;
mod wiring;

pub use error::{MutationError, PersistenceFailure, SourceUnavailable, ValidationError};
pub use ledger::{
    Applied, Ledger, LedgerState, LedgerStatus, RankedPlayer, ReplaceOutcome, ResetOutcome,
};
pub use loader::{
    FallbackLoader, LoadAttempt, LoadTier, LocalCacheAttempt, RawFeedAttempt, ReconcileOutcome,
    RemoteStoreAttempt, Selection,
};
pub use mutator::DeltaOutcome;
pub use persister::{commit_message, PersistReport, Persister, RemoteOutcome};
pub use wiring::build_ledger;
