//! usy-store
//!
//! Storage boundary for the club ledger:
//! - a remote versioned content store (GitHub contents API) with
//!   optimistic concurrency through version tokens,
//! - plain-text raw feeds (balance / trophy files),
//! - the local JSON cache file.
//!
//! This crate moves bytes and tracks version tokens. It does not parse
//! directives or decide which source wins; `usy-ledger` does that.

pub mod cache;
pub mod error;
pub mod feed;
pub mod github;
pub mod versioned;

pub use cache::LocalCache;
pub use error::{CacheError, StoreError};
pub use feed::{HttpTextFeed, TextFeed};
pub use github::{GitHubContentsStore, GitHubLocation};
pub use versioned::{TrackedStore, VersionToken, VersionedSnapshot, VersionedStore};

/// Sent with every request; the GitHub API rejects requests without one.
pub const USER_AGENT: &str = concat!("usy-ledger/", env!("CARGO_PKG_VERSION"));
