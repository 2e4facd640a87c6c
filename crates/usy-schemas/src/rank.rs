//! Rank classification: balance -> named tier through ordered threshold bands.

use serde::{Deserialize, Serialize};

/// One threshold band. A balance belongs to the band when `balance >= min`
/// and no higher band matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankBand {
    pub min: i64,
    pub name: String,
    /// Presentation class used by the leaderboard page.
    pub class: String,
}

impl RankBand {
    pub fn new(min: i64, name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            min,
            name: name.into(),
            class: class.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RankTableError {
    #[error("rank table must contain at least one band")]
    Empty,
    #[error("rank table lowest band must have min 0, got {0}")]
    NoCatchAll(i64),
    #[error("rank table has duplicate threshold {0}")]
    DuplicateThreshold(i64),
}

/// Direction of a tier change, by band order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierChange {
    Promotion,
    Demotion,
}

/// Bands held in descending threshold order. The last band has min 0 and
/// catches every balance below the other thresholds, negatives included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankTable {
    bands: Vec<RankBand>,
}

impl RankTable {
    pub fn new(mut bands: Vec<RankBand>) -> Result<Self, RankTableError> {
        if bands.is_empty() {
            return Err(RankTableError::Empty);
        }
        bands.sort_by(|a, b| b.min.cmp(&a.min));
        for pair in bands.windows(2) {
            if pair[0].min == pair[1].min {
                return Err(RankTableError::DuplicateThreshold(pair[0].min));
            }
        }
        let lowest = bands[bands.len() - 1].min;
        if lowest != 0 {
            return Err(RankTableError::NoCatchAll(lowest));
        }
        Ok(Self { bands })
    }

    /// The club's standing table.
    pub fn club_default() -> Self {
        Self {
            bands: vec![
                RankBand::new(1500, "Gold", "gold"),
                RankBand::new(1000, "Silver", "silver"),
                RankBand::new(500, "Bronze", "bronze"),
                RankBand::new(250, "Metal", "metal"),
                RankBand::new(100, "Wood", "wood"),
                RankBand::new(0, "Novice", "wood"),
            ],
        }
    }

    pub fn bands(&self) -> &[RankBand] {
        &self.bands
    }

    /// Total: every balance resolves to a band.
    pub fn classify(&self, balance: i64) -> &RankBand {
        self.position(balance).map_or_else(
            || &self.bands[self.bands.len() - 1],
            |idx| &self.bands[idx],
        )
    }

    /// Compare tiers by name; `None` when the name is unchanged.
    pub fn tier_change(&self, before: i64, after: i64) -> Option<TierChange> {
        let old = self.classify(before);
        let new = self.classify(after);
        if old.name == new.name {
            return None;
        }
        if new.min > old.min {
            Some(TierChange::Promotion)
        } else {
            Some(TierChange::Demotion)
        }
    }

    fn position(&self, balance: i64) -> Option<usize> {
        self.bands.iter().position(|b| balance >= b.min)
    }
}

impl Default for RankTable {
    fn default() -> Self {
        Self::club_default()
    }
}
