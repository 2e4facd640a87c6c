use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use usy_schemas::normalize_username;

/// Which payload grammar applies to the text after the `:` separator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineGrammar {
    /// `username: +10 -3 2`: signed integer deltas up to the next `:`.
    Balance,
    /// `username: cup medal`: whitespace-separated trophy tokens.
    Trophy,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    Balance(Vec<i64>),
    Trophies(Vec<String>),
}

impl Payload {
    /// Effective balance contribution: the sum of the line's deltas.
    /// Trophy payloads contribute nothing.
    pub fn balance(&self) -> i64 {
        match self {
            Payload::Balance(deltas) => deltas.iter().fold(0i64, |acc, d| acc.saturating_add(*d)),
            Payload::Trophies(_) => 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    Blank,
    NoSeparator,
    EmptyIdentifier,
}

/// Result of parsing one line. Skips are values, not errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineOutcome {
    Directive { username: String, payload: Payload },
    Skip(SkipReason),
}

/// Split a line into `(identifier, rest)` at the first `:`.
///
/// Returns `None` for lines without a separator or with an empty identifier.
pub fn split_directive(line: &str) -> Option<(&str, &str)> {
    let (ident, rest) = line.trim().split_once(':')?;
    let ident = ident.trim();
    if ident.is_empty() {
        return None;
    }
    Some((ident, rest))
}

/// Every `[+-]?digits` run in the balance field, in order.
///
/// The field ends at the next `:`. Runs need no separators (`+10-3` is two
/// deltas) and surrounding text is ignored, as are values that overflow `i64`.
pub fn parse_balance_payload(rest: &str) -> Vec<i64> {
    let Some(re) = delta_regex() else {
        return Vec::new();
    };
    let field = rest.split(':').next().unwrap_or_default();
    re.find_iter(field)
        .filter_map(|m| m.as_str().parse::<i64>().ok())
        .collect()
}

fn delta_regex() -> Option<&'static Regex> {
    static DELTA: OnceLock<Option<Regex>> = OnceLock::new();
    DELTA
        .get_or_init(|| Regex::new(r"[+-]?\d+").ok())
        .as_ref()
}

pub fn parse_trophy_payload(rest: &str) -> Vec<String> {
    rest.split_whitespace().map(str::to_string).collect()
}

pub fn parse_line(line: &str, grammar: LineGrammar) -> LineOutcome {
    if line.trim().is_empty() {
        return LineOutcome::Skip(SkipReason::Blank);
    }
    if !line.contains(':') {
        return LineOutcome::Skip(SkipReason::NoSeparator);
    }
    let Some((ident, rest)) = split_directive(line) else {
        return LineOutcome::Skip(SkipReason::EmptyIdentifier);
    };

    let payload = match grammar {
        LineGrammar::Balance => Payload::Balance(parse_balance_payload(rest)),
        LineGrammar::Trophy => Payload::Trophies(parse_trophy_payload(rest)),
    };

    LineOutcome::Directive {
        username: ident.to_string(),
        payload,
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DirectiveEntry {
    /// Casing of the first line that named this user.
    pub username: String,
    pub payload: Payload,
}

/// Parsed feed: one entry per normalized username, in first-seen order.
///
/// A repeated username keeps its first position and casing; the later
/// line's payload replaces the earlier one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DirectiveSet {
    pub grammar: LineGrammar,
    entries: Vec<DirectiveEntry>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    /// Number of lines dropped as malformed (blank lines are not counted).
    pub skipped: usize,
}

impl DirectiveSet {
    pub fn new(grammar: LineGrammar) -> Self {
        Self {
            grammar,
            entries: Vec::new(),
            index: HashMap::new(),
            skipped: 0,
        }
    }

    pub fn insert(&mut self, username: String, payload: Payload) {
        let key = normalize_username(&username);
        match self.index.get(&key) {
            Some(&idx) => self.entries[idx].payload = payload,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(DirectiveEntry { username, payload });
            }
        }
    }

    pub fn get(&self, username: &str) -> Option<&DirectiveEntry> {
        let idx = *self.index.get(&normalize_username(username))?;
        self.entries.get(idx)
    }

    pub fn entries(&self) -> &[DirectiveEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse a whole feed. Never fails: malformed lines are counted and dropped.
pub fn parse_text(text: &str, grammar: LineGrammar) -> DirectiveSet {
    let mut set = DirectiveSet::new(grammar);
    for line in text.lines() {
        match parse_line(line, grammar) {
            LineOutcome::Directive { username, payload } => set.insert(username, payload),
            LineOutcome::Skip(SkipReason::Blank) => {}
            LineOutcome::Skip(_) => set.skipped += 1,
        }
    }
    set
}
