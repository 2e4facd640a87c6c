use usy_store::CacheError;

use crate::loader::LoadTier;

/// A fallback tier could not produce a map. Never fatal: the loader moves
/// on to the next tier.
#[derive(Debug, thiserror::Error)]
pub enum SourceUnavailable {
    /// Not configured, or the source reported "not found".
    #[error("{tier} absent: {reason}")]
    Absent { tier: LoadTier, reason: String },
    #[error("{tier} failed: {reason}")]
    Failed { tier: LoadTier, reason: String },
}

impl SourceUnavailable {
    pub fn absent(tier: LoadTier, reason: impl Into<String>) -> Self {
        SourceUnavailable::Absent {
            tier,
            reason: reason.into(),
        }
    }

    pub fn failed(tier: LoadTier, reason: impl std::fmt::Display) -> Self {
        SourceUnavailable::Failed {
            tier,
            reason: reason.to_string(),
        }
    }
}

/// Bulk replacement input was rejected; the canonical map is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("input is not valid JSON: {0}")]
    Malformed(String),
    #[error("expected a JSON array of player records, got {0}")]
    NotASequence(&'static str),
    #[error("entry {index} is not a player record: {reason}")]
    BadEntry { index: usize, reason: String },
    #[error("entry {index} has an empty username")]
    EmptyUsername { index: usize },
    #[error("entry {index} repeats username {username:?}")]
    DuplicateUsername { index: usize, username: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    #[error("username must not be empty")]
    EmptyUsername,
    #[error("balance of {username} would overflow ({balance} + {delta})")]
    Overflow {
        username: String,
        balance: i64,
        delta: i64,
    },
}

/// The local cache write failed. The in-memory mutation stays applied.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceFailure {
    #[error("local cache write failed: {0}")]
    LocalCache(#[from] CacheError),
}
