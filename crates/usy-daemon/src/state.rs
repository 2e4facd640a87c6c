//! Shared runtime state for usy-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The ledger owns the
//! canonical map; this module only adds the event bus, the admin policy and
//! the background timers.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::info;
use usy_ledger::{DeltaOutcome, Ledger, LoadTier, ReconcileOutcome};
use usy_schemas::TierChange;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat {
        ts_millis: i64,
    },
    Reconciled {
        pass_id: Uuid,
        tier: String,
        players: usize,
    },
    TierChanged {
        username: String,
        from: String,
        to: String,
        change: TierChange,
    },
    LogLine {
        level: String,
        msg: String,
    },
}

impl BusMsg {
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::Reconciled { .. } => "reconciled",
            BusMsg::TierChanged { .. } => "tier_changed",
            BusMsg::LogLine { .. } => "log",
        }
    }

    /// `None` unless the delta moved the player across a tier boundary.
    pub fn from_delta(outcome: &DeltaOutcome) -> Option<Self> {
        let change = outcome.change?;
        Some(BusMsg::TierChanged {
            username: outcome.username.clone(),
            from: outcome.previous_tier.clone().unwrap_or_default(),
            to: outcome.new_tier.clone(),
            change,
        })
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AdminPolicy
// ---------------------------------------------------------------------------

/// Who may run admin operations. An empty list lets everyone through.
#[derive(Clone, Debug, Default)]
pub struct AdminPolicy {
    ids: Vec<String>,
}

impl AdminPolicy {
    pub fn new(ids: Vec<String>) -> Self {
        Self { ids }
    }

    pub fn is_open(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn allows(&self, id: Option<&str>) -> bool {
        if self.is_open() {
            return true;
        }
        id.map(str::trim)
            .is_some_and(|id| self.ids.iter().any(|a| a == id))
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub ledger: Arc<Ledger>,
    pub admins: AdminPolicy,
}

impl AppState {
    pub fn new(ledger: Arc<Ledger>, admins: AdminPolicy) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        Self {
            bus,
            build: BuildInfo {
                service: "usy-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            ledger,
            admins,
        }
    }

    pub fn publish(&self, msg: BusMsg) {
        // No subscribers is fine.
        let _ = self.bus.send(msg);
    }

    /// Run one reconciliation pass and announce it on the bus.
    pub async fn reconcile(&self) -> ReconcileOutcome {
        let outcome = self.ledger.reconcile().await;
        self.publish(BusMsg::Reconciled {
            pass_id: outcome.pass_id,
            tier: outcome.tier.to_string(),
            players: outcome.map.len(),
        });
        if outcome.tier == LoadTier::Seed {
            self.publish(BusMsg::LogLine {
                level: "WARN".to_string(),
                msg: "all data sources unavailable; serving built-in seed".to_string(),
            });
        }
        outcome
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

/// Spawn the periodic refresh timer.
///
/// Every tick starts its own reconciliation task and does not wait for it,
/// so a hung pass never delays the next one. The first tick fires one
/// `interval` after start; startup runs its own pass.
pub fn spawn_refresh(state: Arc<AppState>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let st = Arc::clone(&state);
            tokio::spawn(async move {
                let outcome = st.reconcile().await;
                info!(pass_id = %outcome.pass_id, tier = %outcome.tier, "periodic refresh done");
            });
        }
    });
}
