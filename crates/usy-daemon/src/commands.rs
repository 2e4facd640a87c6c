//! Chat commands, independent of the chat transport.
//!
//! The transport posts `{from_id, text}`; [`parse_command`] recognises the
//! command and [`execute`] runs it against the ledger and returns the reply
//! text. Everything except `/bal` and `/com` is admin-only.

use usy_ledger::{DeltaOutcome, PersistReport, PersistenceFailure};
use usy_schemas::TierChange;

use crate::state::{AppState, BusMsg};

/// Longest JSON dump sent back into the chat.
pub const JSON_VIEW_LIMIT: usize = 4000;

const UPDATE_PREFIX: &str = "Update balance lichess ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Balance { username: String },
    UpdateBalance { username: String, delta: i64 },
    JsonView,
    JsonEdit { raw: String },
    ResetBalances,
    Help,
    /// Recognised command with bad arguments.
    Usage { admin_only: bool, usage: &'static str },
}

impl Command {
    pub fn admin_only(&self) -> bool {
        match self {
            Command::Balance { .. } | Command::Help => false,
            Command::Usage { admin_only, .. } => *admin_only,
            Command::UpdateBalance { .. }
            | Command::JsonView
            | Command::JsonEdit { .. }
            | Command::ResetBalances => true,
        }
    }
}

/// `None` for ordinary chat text.
pub fn parse_command(text: &str) -> Option<Command> {
    let text = text.trim();

    if let Some(rest) = text.strip_prefix(UPDATE_PREFIX) {
        return Some(parse_update(rest).unwrap_or(Command::Usage {
            admin_only: true,
            usage: "Update balance lichess <name> +100",
        }));
    }

    let (head, rest) = match text.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (text, ""),
    };
    match head.to_ascii_lowercase().as_str() {
        "/bal" => Some(match rest.split_whitespace().next() {
            Some(name) if is_word(name) => Command::Balance {
                username: name.to_string(),
            },
            _ => Command::Usage {
                admin_only: false,
                usage: "/bal <name>",
            },
        }),
        "/json" => {
            let (sub, raw) = match rest.split_once(char::is_whitespace) {
                Some((sub, raw)) => (sub, raw.trim()),
                None => (rest, ""),
            };
            Some(match sub.to_ascii_lowercase().as_str() {
                "view" => Command::JsonView,
                "edit" if !raw.is_empty() => Command::JsonEdit {
                    raw: raw.to_string(),
                },
                _ => Command::Usage {
                    admin_only: true,
                    usage: "/json view | /json edit [...]",
                },
            })
        }
        "/nule" => Some(Command::ResetBalances),
        "/com" => Some(Command::Help),
        _ => None,
    }
}

/// `<name> <[+-]digits>` and nothing else.
fn parse_update(rest: &str) -> Option<Command> {
    let mut parts = rest.split_whitespace();
    let (name, delta, None) = (parts.next()?, parts.next()?, parts.next()) else {
        return None;
    };
    if !is_word(name) {
        return None;
    }
    let digits = delta.strip_prefix(['+', '-']).unwrap_or(delta);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(Command::UpdateBalance {
        username: name.to_string(),
        delta: delta.parse().ok()?,
    })
}

fn is_word(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

/// Run `cmd` on behalf of `from_id` and return the reply text.
pub async fn execute(st: &AppState, from_id: &str, cmd: Command) -> String {
    let is_admin = st.admins.allows(Some(from_id));
    if cmd.admin_only() && !is_admin {
        tracing::warn!(from_id, ?cmd, "admin command refused");
        return "Access denied: admin only.".to_string();
    }

    match cmd {
        Command::Usage { usage, .. } => format!("Usage: {usage}"),
        Command::Balance { username } => match st.ledger.lookup(&username).await {
            Some(p) => format!(
                "Player: {}\nBalance: {} usy\nRank: {}",
                p.username, p.balance, p.rank
            ),
            None => format!("Player \"{username}\" not found."),
        },
        Command::UpdateBalance { username, delta } => {
            match st.ledger.apply_delta(&username, delta).await {
                Ok(applied) => {
                    if let Some(msg) = BusMsg::from_delta(&applied.outcome) {
                        st.publish(msg);
                    }
                    let mut reply = delta_reply(&applied.outcome);
                    push_save_warning(&mut reply, &applied.persisted);
                    reply
                }
                Err(e) => format!("Update refused: {e}"),
            }
        }
        Command::JsonView => {
            let map = st.ledger.snapshot().await;
            match map.to_pretty_json() {
                Ok(json) if json.chars().count() > JSON_VIEW_LIMIT => format!(
                    "JSON too large ({} chars). See the website.",
                    json.chars().count()
                ),
                Ok(json) => format!("```json\n{json}\n```"),
                Err(e) => format!("Failed to render JSON: {e}"),
            }
        }
        Command::JsonEdit { raw } => match st.ledger.replace_all_json(&raw).await {
            Ok(applied) => {
                let mut reply = format!("JSON updated. Players: {}", applied.outcome.players);
                push_save_warning(&mut reply, &applied.persisted);
                reply
            }
            Err(e) => format!("Invalid player list: {e}"),
        },
        Command::ResetBalances => {
            let applied = st.ledger.reset_balances().await;
            let mut reply = format!(
                "Balances of all {} players reset to 0.",
                applied.outcome.players
            );
            push_save_warning(&mut reply, &applied.persisted);
            reply
        }
        Command::Help => help_text(is_admin),
    }
}

fn delta_reply(o: &DeltaOutcome) -> String {
    let Some(before) = o.previous_balance else {
        return format!("Added: {} ({} usy)", o.username, o.new_balance);
    };
    let sign = if o.delta > 0 { "+" } else { "" };
    let mut reply = format!(
        "{}: {} -> {} usy ({sign}{})",
        o.username, before, o.new_balance, o.delta
    );
    if let (Some(change), Some(from)) = (o.change, &o.previous_tier) {
        let label = match change {
            TierChange::Promotion => "Promotion!",
            TierChange::Demotion => "Demotion.",
        };
        reply.push_str(&format!("\n{label} {from} -> {}", o.new_tier));
    }
    reply
}

fn push_save_warning(reply: &mut String, persisted: &Result<PersistReport, PersistenceFailure>) {
    if persisted.is_err() {
        reply.push_str("\nWarning: saving to disk failed; the change is kept in memory.");
    }
}

fn help_text(is_admin: bool) -> String {
    let mut text = String::from(
        "Bot commands:\n\n\
         Update balance lichess <name> +100\n  Update a player's balance\n\n\
         /bal <name>\n  Show a player's balance\n",
    );
    if is_admin {
        text.push_str(
            "\nAdmin commands:\n\n\
             /json view\n  Show the player JSON\n\n\
             /json edit [...]\n  Replace all players\n\n\
             /nule\n  Reset every balance to 0\n\n\
             /com\n  Show this help\n",
        );
    }
    text
}
