use crate::directive::{DirectiveSet, Payload};
use usy_schemas::PlayerMap;

/// Role of a parsed feed in the merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// Defines balances. Creates records; later balance sources overwrite.
    Balance,
    /// Defines trophy lists. Replaces trophies; creates zero-balance records.
    Trophy,
}

#[derive(Clone, Debug)]
pub struct TaggedSource {
    pub kind: SourceKind,
    pub set: DirectiveSet,
}

impl TaggedSource {
    pub fn balance(set: DirectiveSet) -> Self {
        Self {
            kind: SourceKind::Balance,
            set,
        }
    }

    pub fn trophy(set: DirectiveSet) -> Self {
        Self {
            kind: SourceKind::Trophy,
            set,
        }
    }
}

/// Merge output plus counters for logging.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeReport {
    pub map: PlayerMap,
    pub balance_entries: usize,
    pub trophy_entries: usize,
    /// Records created by a trophy source alone (balance 0).
    pub trophy_only: usize,
}

/// Merge tagged sources in order into one canonical map.
///
/// Record order is first-seen across the sources in the order given; the
/// result does not depend on anything but the inputs.
pub fn merge(sources: &[TaggedSource]) -> MergeReport {
    let mut map = PlayerMap::new();
    let mut balance_entries = 0;
    let mut trophy_entries = 0;
    let mut trophy_only = 0;

    for src in sources {
        for entry in src.set.entries() {
            let (rec, created) = map.entry_or_create(&entry.username);
            match (src.kind, &entry.payload) {
                (SourceKind::Balance, payload) => {
                    rec.balance = payload.balance();
                    balance_entries += 1;
                }
                (SourceKind::Trophy, Payload::Trophies(tokens)) => {
                    rec.trophies = tokens.clone();
                    trophy_entries += 1;
                    if created {
                        trophy_only += 1;
                    }
                }
                // A trophy source parsed with the balance grammar carries no
                // trophy list; the record still exists with its balance.
                (SourceKind::Trophy, Payload::Balance(_)) => {
                    trophy_entries += 1;
                    if created {
                        trophy_only += 1;
                    }
                }
            }
        }
    }

    MergeReport {
        map,
        balance_entries,
        trophy_entries,
        trophy_only,
    }
}
