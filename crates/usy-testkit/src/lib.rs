//! In-memory fakes for scenario tests.
//!
//! No network, no clocks. Every fake counts its calls so tests can assert
//! which fallback tiers were touched.

mod feeds;
mod memory_store;

pub use feeds::{FailingFeed, StaticFeed};
pub use memory_store::{MemoryVersionedStore, StoreFailure};

use usy_schemas::{PlayerMap, PlayerRecord};

/// Build a canonical map from `(username, balance)` pairs.
pub fn players(pairs: &[(&str, i64)]) -> PlayerMap {
    PlayerMap::from_records(
        pairs
            .iter()
            .map(|(name, balance)| PlayerRecord::new(*name, *balance)),
    )
}
