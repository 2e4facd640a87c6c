//! Pure ledger mutations. Callers own locking and persistence.

use serde::Serialize;
use serde_json::Value;
use usy_schemas::{PlayerMap, PlayerRecord, RankTable, TierChange};

use crate::error::{MutationError, ValidationError};

/// Result of one `apply_delta`.
///
/// For a newly created record the delta is its initial balance; there is
/// no previous balance or tier, and no tier change is reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeltaOutcome {
    /// Stored casing of the username.
    pub username: String,
    pub delta: i64,
    pub created: bool,
    pub previous_balance: Option<i64>,
    pub new_balance: i64,
    pub previous_tier: Option<String>,
    pub new_tier: String,
    pub tier_changed: bool,
    pub change: Option<TierChange>,
}

pub fn apply_delta(
    map: &mut PlayerMap,
    ranks: &RankTable,
    username: &str,
    delta: i64,
) -> Result<DeltaOutcome, MutationError> {
    let name = username.trim();
    if name.is_empty() {
        return Err(MutationError::EmptyUsername);
    }

    let Some(rec) = map.get_mut(name) else {
        map.entry_or_create(name).0.balance = delta;
        return Ok(DeltaOutcome {
            username: name.to_string(),
            delta,
            created: true,
            previous_balance: None,
            new_balance: delta,
            previous_tier: None,
            new_tier: ranks.classify(delta).name.clone(),
            tier_changed: false,
            change: None,
        });
    };

    let before = rec.balance;
    let after = before
        .checked_add(delta)
        .ok_or_else(|| MutationError::Overflow {
            username: rec.username.clone(),
            balance: before,
            delta,
        })?;
    rec.balance = after;

    let previous_tier = ranks.classify(before).name.clone();
    let new_tier = ranks.classify(after).name.clone();
    let change = ranks.tier_change(before, after);
    Ok(DeltaOutcome {
        username: rec.username.clone(),
        delta,
        created: false,
        previous_balance: Some(before),
        new_balance: after,
        tier_changed: previous_tier != new_tier,
        previous_tier: Some(previous_tier),
        new_tier,
        change,
    })
}

/// Validate a bulk replacement. The input must be an array of record
/// objects with unique (case-insensitive) non-empty usernames.
pub fn validate_replacement(input: &Value) -> Result<PlayerMap, ValidationError> {
    let entries = match input {
        Value::Array(entries) => entries,
        other => return Err(ValidationError::NotASequence(json_kind(other))),
    };

    let mut map = PlayerMap::new();
    for (index, entry) in entries.iter().enumerate() {
        if !entry.is_object() {
            return Err(ValidationError::BadEntry {
                index,
                reason: format!("expected an object, got {}", json_kind(entry)),
            });
        }
        let rec: PlayerRecord =
            serde_json::from_value(entry.clone()).map_err(|e| ValidationError::BadEntry {
                index,
                reason: e.to_string(),
            })?;
        if rec.username.trim().is_empty() {
            return Err(ValidationError::EmptyUsername { index });
        }
        if map.contains(&rec.username) {
            return Err(ValidationError::DuplicateUsername {
                index,
                username: rec.username,
            });
        }
        let (slot, _) = map.entry_or_create(&rec.username);
        *slot = rec;
    }
    Ok(map)
}

/// Parse and validate raw JSON text for a bulk replacement.
pub fn parse_replacement(text: &str) -> Result<PlayerMap, ValidationError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ValidationError::Malformed(e.to_string()))?;
    validate_replacement(&value)
}

/// Zero every balance. Returns how many records changed.
pub fn reset_balances(map: &mut PlayerMap) -> usize {
    let mut changed = 0;
    for rec in map.iter_mut() {
        if rec.balance != 0 {
            rec.balance = 0;
            changed += 1;
        }
    }
    changed
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
