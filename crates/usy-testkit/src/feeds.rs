use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use usy_store::{StoreError, TextFeed};

/// Serves fixed text. A gated feed holds every fetch until the gate is
/// notified, which lets a test land a mutation while a pass is in flight.
pub struct StaticFeed {
    name: String,
    text: String,
    gate: Option<Arc<Notify>>,
    fetches: AtomicUsize,
}

impl StaticFeed {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            gate: None,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn gated(name: impl Into<String>, text: impl Into<String>) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let mut feed = Self::new(name, text);
        feed.gate = Some(gate.clone());
        (feed, gate)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl TextFeed for StaticFeed {
    fn describe(&self) -> String {
        format!("static:{}", self.name)
    }

    async fn fetch(&self) -> Result<String, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(self.text.clone())
    }
}

/// Always fails: `not_found()` or a transport error.
pub struct FailingFeed {
    name: String,
    not_found: bool,
    fetches: AtomicUsize,
}

impl FailingFeed {
    pub fn unreachable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            not_found: false,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn not_found(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            not_found: true,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl TextFeed for FailingFeed {
    fn describe(&self) -> String {
        format!("failing:{}", self.name)
    }

    async fn fetch(&self) -> Result<String, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.not_found {
            Err(StoreError::NotFound)
        } else {
            Err(StoreError::Transport(format!("{} unreachable", self.name)))
        }
    }
}
