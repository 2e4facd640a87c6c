//! Axum router and all HTTP handlers for usy-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Tests compose the bare router directly.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use crate::{
    api_types::{
        CommandRequest, CommandResponse, DeltaRequest, DeltaResponse, ErrorResponse,
        GateRefusedResponse, HealthResponse, PersistSummary, ReconcileResponse, ReplaceResponse,
        StatusResponse,
    },
    commands,
    state::{uptime_secs, AppState, BusMsg},
};

/// Header carrying the caller's admin identity.
pub const ADMIN_HEADER: &str = "x-admin-id";

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/stream", get(stream))
        .route("/v1/reconcile", post(reconcile_now))
        .route("/v1/command", post(command))
        .route("/api/players", get(list_players).put(replace_players))
        .route("/api/players/:username", get(get_player))
        .route("/api/leaderboard", get(leaderboard))
        .route("/api/players/:username/delta", post(apply_delta))
        .with_state(state)
}

/// `Err` carries the 403 response.
fn require_admin(st: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let id = headers.get(ADMIN_HEADER).and_then(|v| v.to_str().ok());
    if st.admins.allows(id) {
        return Ok(());
    }
    warn!(admin_id = id.unwrap_or("<none>"), "admin gate refused request");
    Err((
        StatusCode::FORBIDDEN,
        Json(GateRefusedResponse {
            error: "GATE_REFUSED: admin identity required".to_string(),
            gate: "admin".to_string(),
        }),
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// GET /v1/health  /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let s = st.ledger.status().await;
    (
        StatusCode::OK,
        Json(StatusResponse {
            daemon_uptime_secs: uptime_secs(),
            players: s.players,
            total_balance: s.total_balance,
            origin: s.origin.map(|t| t.to_string()),
            generation: s.generation,
            last_reconciled_at: s.last_reconciled_at,
            admin_gate_open: st.admins.is_open(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /api/players  /api/players/:username  /api/leaderboard
// ---------------------------------------------------------------------------

pub(crate) async fn list_players(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let map = st.ledger.snapshot().await;
    (StatusCode::OK, Json(map.records().to_vec()))
}

pub(crate) async fn leaderboard(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(st.ledger.ranked_players().await))
}

pub(crate) async fn get_player(
    State(st): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Response {
    match st.ledger.lookup(&username).await {
        Some(player) => (StatusCode::OK, Json(player)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("player {username:?} not found"),
            }),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// POST /api/players/:username/delta
// ---------------------------------------------------------------------------

pub(crate) async fn apply_delta(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(username): Path<String>,
    Json(req): Json<DeltaRequest>,
) -> Response {
    if let Err(refused) = require_admin(&st, &headers) {
        return refused;
    }

    match st.ledger.apply_delta(&username, req.delta).await {
        Ok(applied) => {
            if let Some(msg) = BusMsg::from_delta(&applied.outcome) {
                st.publish(msg);
            }
            let persist = PersistSummary::from(&applied.persisted);
            (
                StatusCode::OK,
                Json(DeltaResponse {
                    outcome: applied.outcome,
                    persist,
                }),
            )
                .into_response()
        }
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// PUT /api/players
// ---------------------------------------------------------------------------

/// Body is taken as raw text so malformed JSON gets the same 422 as a
/// wrongly shaped list.
pub(crate) async fn replace_players(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    if let Err(refused) = require_admin(&st, &headers) {
        return refused;
    }

    match st.ledger.replace_all_json(&body).await {
        Ok(applied) => {
            info!(players = applied.outcome.players, "players replaced over http");
            let persist = PersistSummary::from(&applied.persisted);
            (
                StatusCode::OK,
                Json(ReplaceResponse {
                    previous_players: applied.outcome.previous_players,
                    players: applied.outcome.players,
                    persist,
                }),
            )
                .into_response()
        }
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/reconcile
// ---------------------------------------------------------------------------

pub(crate) async fn reconcile_now(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    if let Err(refused) = require_admin(&st, &headers) {
        return refused;
    }

    let outcome = st.reconcile().await;
    (
        StatusCode::OK,
        Json(ReconcileResponse {
            pass_id: outcome.pass_id,
            tier: outcome.tier.to_string(),
            players: outcome.map.len(),
            fell_through: outcome.fell_through.iter().map(|t| t.to_string()).collect(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// POST /v1/command
// ---------------------------------------------------------------------------

pub(crate) async fn command(
    State(st): State<Arc<AppState>>,
    Json(req): Json<CommandRequest>,
) -> impl IntoResponse {
    let Some(cmd) = commands::parse_command(&req.text) else {
        return (
            StatusCode::OK,
            Json(CommandResponse {
                handled: false,
                reply: None,
            }),
        );
    };

    let reply = commands::execute(&st, &req.from_id, cmd).await;
    (
        StatusCode::OK,
        Json(CommandResponse {
            handled: true,
            reply: Some(reply),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(m.event_name()).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
