//! Versioned store held in memory.
//!
//! Behaves like the GitHub contents API: not found until the first write,
//! every write yields a fresh token, and a write whose token is missing (for
//! an existing file) or stale is refused with a conflict.

use std::sync::Mutex;

use usy_store::{StoreError, VersionToken, VersionedSnapshot, VersionedStore};

/// Injected failure for the next reads or writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreFailure {
    Transport,
    Auth,
    Server,
}

impl StoreFailure {
    fn to_error(self) -> StoreError {
        match self {
            StoreFailure::Transport => StoreError::Transport("injected transport failure".into()),
            StoreFailure::Auth => StoreError::Auth {
                status: 401,
                message: "Bad credentials".into(),
            },
            StoreFailure::Server => StoreError::Http {
                status: 500,
                message: "injected server failure".into(),
            },
        }
    }
}

#[derive(Default)]
struct Inner {
    content: Option<String>,
    token: Option<VersionToken>,
    next_rev: u64,
    reads: usize,
    writes_attempted: usize,
    commit_messages: Vec<String>,
    fail_reads: Option<StoreFailure>,
    fail_writes: Option<StoreFailure>,
}

impl Inner {
    fn bump(&mut self, content: String) -> VersionToken {
        self.next_rev += 1;
        let token = VersionToken::new(format!("rev{:04}", self.next_rev));
        self.content = Some(content);
        self.token = Some(token.clone());
        token
    }
}

#[derive(Default)]
pub struct MemoryVersionedStore {
    inner: Mutex<Inner>,
}

impl MemoryVersionedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `content` at revision 1.
    pub fn with_content(content: impl Into<String>) -> Self {
        let store = Self::new();
        store.lock().bump(content.into());
        store
    }

    /// Simulate another writer committing behind our back.
    pub fn external_write(&self, content: impl Into<String>) -> VersionToken {
        self.lock().bump(content.into())
    }

    pub fn fail_reads(&self, failure: Option<StoreFailure>) {
        self.lock().fail_reads = failure;
    }

    pub fn fail_writes(&self, failure: Option<StoreFailure>) {
        self.lock().fail_writes = failure;
    }

    pub fn content(&self) -> Option<String> {
        self.lock().content.clone()
    }

    pub fn current_token(&self) -> Option<VersionToken> {
        self.lock().token.clone()
    }

    pub fn reads(&self) -> usize {
        self.lock().reads
    }

    pub fn writes_attempted(&self) -> usize {
        self.lock().writes_attempted
    }

    pub fn commit_messages(&self) -> Vec<String> {
        self.lock().commit_messages.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A panicking test thread must not hide the store from the others.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait::async_trait]
impl VersionedStore for MemoryVersionedStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn read(&self) -> Result<VersionedSnapshot, StoreError> {
        let mut inner = self.lock();
        inner.reads += 1;
        if let Some(f) = inner.fail_reads {
            return Err(f.to_error());
        }
        match (&inner.content, &inner.token) {
            (Some(content), Some(token)) => Ok(VersionedSnapshot {
                content: content.clone(),
                version_token: token.clone(),
            }),
            _ => Err(StoreError::NotFound),
        }
    }

    async fn write(
        &self,
        content: &str,
        token: Option<&VersionToken>,
        message: &str,
    ) -> Result<VersionToken, StoreError> {
        let mut inner = self.lock();
        inner.writes_attempted += 1;
        if let Some(f) = inner.fail_writes {
            return Err(f.to_error());
        }
        match (&inner.token, token) {
            (None, None) => {}
            (Some(current), Some(given)) if current == given => {}
            (Some(_), None) => {
                return Err(StoreError::Conflict {
                    status: 422,
                    message: "\"sha\" wasn't supplied.".into(),
                })
            }
            _ => {
                return Err(StoreError::Conflict {
                    status: 409,
                    message: "players.json does not match".into(),
                })
            }
        }
        inner.commit_messages.push(message.to_string());
        Ok(inner.bump(content.to_string()))
    }
}
