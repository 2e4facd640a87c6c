//! Request and response types for the usy-daemon HTTP endpoints.
//!
//! No business logic lives here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use usy_ledger::{DeltaOutcome, PersistReport, PersistenceFailure, RemoteOutcome};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// /v1/health  /v1/status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub daemon_uptime_secs: u64,
    pub players: usize,
    pub total_balance: i64,
    /// Tier of the last reconciliation ("remote_store" | "raw_feed" | "local_cache" | "seed").
    pub origin: Option<String>,
    pub generation: u64,
    pub last_reconciled_at: Option<DateTime<Utc>>,
    pub admin_gate_open: bool,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body of a 403 from the admin gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateRefusedResponse {
    pub error: String,
    pub gate: String,
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct DeltaRequest {
    pub delta: i64,
}

/// Where a mutation ended up. A failed save does not undo the mutation.
#[derive(Debug, Clone, Serialize)]
pub struct PersistSummary {
    pub local_ok: bool,
    pub local_error: Option<String>,
    pub remote: Option<RemoteOutcome>,
}

impl From<&Result<PersistReport, PersistenceFailure>> for PersistSummary {
    fn from(res: &Result<PersistReport, PersistenceFailure>) -> Self {
        match res {
            Ok(report) => PersistSummary {
                local_ok: true,
                local_error: None,
                remote: Some(report.remote.clone()),
            },
            Err(e) => PersistSummary {
                local_ok: false,
                local_error: Some(e.to_string()),
                remote: None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeltaResponse {
    #[serde(flatten)]
    pub outcome: DeltaOutcome,
    pub persist: PersistSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplaceResponse {
    pub previous_players: usize,
    pub players: usize,
    pub persist: PersistSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileResponse {
    pub pass_id: Uuid,
    pub tier: String,
    pub players: usize,
    pub fell_through: Vec<String>,
}

// ---------------------------------------------------------------------------
// /v1/command
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    /// Sender identity from the chat transport.
    pub from_id: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    /// `false` when the text is not a command; the transport stays silent.
    pub handled: bool,
    pub reply: Option<String>,
}
