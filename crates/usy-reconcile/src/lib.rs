//! usy-reconcile
//!
//! Directive parsing and source merging for the club ledger.
//!
//! Architectural decisions:
//! - Feeds are line-oriented text: `username: payload`
//! - Malformed lines are skipped, never fatal
//! - Balance lines sum their deltas; trophy lines replace the trophy list
//! - Merge output is deterministic: first-seen insertion order
//!
//! Deterministic, pure logic. No IO.

mod directive;
mod merge;

pub use directive::{
    parse_balance_payload, parse_line, parse_text, parse_trophy_payload, split_directive,
    DirectiveEntry, DirectiveSet, LineGrammar, LineOutcome, Payload, SkipReason,
};
pub use merge::{merge, MergeReport, SourceKind, TaggedSource};
