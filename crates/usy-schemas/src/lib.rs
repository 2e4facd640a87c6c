//! usy-schemas
//!
//! Shared data model for the club ledger: player records, the canonical
//! player map and the rank table. No I/O lives here.

pub mod rank;

pub use rank::{RankBand, RankTable, RankTableError, TierChange};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Normalized lookup key for a username (trimmed, lowercase).
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

/// One player entry as stored in the cache file and the remote store.
///
/// `trophies` is omitted from JSON when empty so files written before
/// trophies existed round-trip byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub username: String,
    pub balance: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trophies: Vec<String>,
}

impl PlayerRecord {
    pub fn new(username: impl Into<String>, balance: i64) -> Self {
        Self {
            username: username.into(),
            balance,
            trophies: Vec::new(),
        }
    }

    pub fn with_trophies(mut self, trophies: Vec<String>) -> Self {
        self.trophies = trophies;
        self
    }

    pub fn key(&self) -> String {
        normalize_username(&self.username)
    }
}

/// The canonical map: exactly one record per normalized username.
///
/// Records keep insertion order (first-seen order) and the casing of the
/// first occurrence. Serializes as a plain JSON array of records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<PlayerRecord>", into = "Vec<PlayerRecord>")]
pub struct PlayerMap {
    records: Vec<PlayerRecord>,
    index: HashMap<String, usize>,
}

impl PlayerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from records. A later record with the same normalized
    /// username overwrites balance and trophies of the earlier one; the
    /// earlier casing and position are kept.
    pub fn from_records(records: impl IntoIterator<Item = PlayerRecord>) -> Self {
        let mut map = Self::new();
        for rec in records {
            match map.get_mut(&rec.username) {
                Some(existing) => {
                    existing.balance = rec.balance;
                    existing.trophies = rec.trophies;
                }
                None => map.push_new(rec),
            }
        }
        map
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, username: &str) -> bool {
        self.index.contains_key(&normalize_username(username))
    }

    pub fn get(&self, username: &str) -> Option<&PlayerRecord> {
        let idx = *self.index.get(&normalize_username(username))?;
        self.records.get(idx)
    }

    pub fn get_mut(&mut self, username: &str) -> Option<&mut PlayerRecord> {
        let idx = *self.index.get(&normalize_username(username))?;
        self.records.get_mut(idx)
    }

    /// Insert a record that is known to be absent. Callers check
    /// [`PlayerMap::contains`] first.
    fn push_new(&mut self, rec: PlayerRecord) {
        self.index.insert(rec.key(), self.records.len());
        self.records.push(rec);
    }

    /// Return the record for `username`, creating it with `balance = 0` and
    /// no trophies if it is absent. Second element is `true` when created.
    pub fn entry_or_create(&mut self, username: &str) -> (&mut PlayerRecord, bool) {
        let key = normalize_username(username);
        let created = match self.index.get(&key) {
            Some(_) => false,
            None => {
                self.push_new(PlayerRecord::new(username.trim(), 0));
                true
            }
        };
        let idx = self.index[&key];
        (&mut self.records[idx], created)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PlayerRecord> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, PlayerRecord> {
        self.records.iter_mut()
    }

    pub fn records(&self) -> &[PlayerRecord] {
        &self.records
    }

    /// Sum of all balances (saturating).
    pub fn total_balance(&self) -> i64 {
        self.records
            .iter()
            .fold(0i64, |acc, r| acc.saturating_add(r.balance))
    }

    /// Pretty JSON (2-space indent), the on-disk and remote representation.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.records)
    }
}

impl From<Vec<PlayerRecord>> for PlayerMap {
    fn from(records: Vec<PlayerRecord>) -> Self {
        Self::from_records(records)
    }
}

impl From<PlayerMap> for Vec<PlayerRecord> {
    fn from(map: PlayerMap) -> Self {
        map.records
    }
}

impl<'a> IntoIterator for &'a PlayerMap {
    type Item = &'a PlayerRecord;
    type IntoIter = std::slice::Iter<'a, PlayerRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive_and_keeps_first_casing() {
        let map = PlayerMap::from_records(vec![
            PlayerRecord::new("AtemMax", 660),
            PlayerRecord::new("atemmax", 700),
        ]);
        assert_eq!(map.len(), 1);
        let rec = map.get("ATEMMAX").unwrap();
        assert_eq!(rec.username, "AtemMax");
        assert_eq!(rec.balance, 700);
    }

    #[test]
    fn entry_or_create_creates_once() {
        let mut map = PlayerMap::new();
        let (rec, created) = map.entry_or_create("Loloky");
        assert!(created);
        rec.balance = 5;
        let (rec, created) = map.entry_or_create("LOLOKY");
        assert!(!created);
        assert_eq!(rec.balance, 5);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn legacy_json_without_trophies_round_trips_exactly() {
        let raw = "[\n  {\n    \"username\": \"atemmax\",\n    \"balance\": 660\n  },\n  {\n    \"username\": \"hentera\",\n    \"balance\": 1200\n  }\n]";
        let map: PlayerMap = serde_json::from_str(raw).unwrap();
        assert_eq!(map.to_pretty_json().unwrap(), raw);
    }

    #[test]
    fn trophies_serialize_when_present() {
        let map = PlayerMap::from_records(vec![
            PlayerRecord::new("a", 1).with_trophies(vec!["cup".into()]),
        ]);
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json[0]["trophies"][0], "cup");
        let back: PlayerMap = serde_json::from_value(json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn total_balance_sums_signed_values() {
        let map = PlayerMap::from_records(vec![
            PlayerRecord::new("a", 100),
            PlayerRecord::new("b", -30),
        ]);
        assert_eq!(map.total_balance(), 70);
    }
}
