//! Versioned store contract and the version-token tracking handle.

use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StoreError;

/// Opaque revision identifier returned by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 7 characters, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..7).unwrap_or(&self.0)
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decoded content of one stored revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedSnapshot {
    pub content: String,
    pub version_token: VersionToken,
}

/// Remote content store with optimistic concurrency.
///
/// `write` must fail with [`StoreError::Conflict`] when `token` is absent for
/// an existing file or does not match the stored revision. It must never
/// overwrite silently.
#[async_trait::async_trait]
pub trait VersionedStore: Send + Sync {
    fn name(&self) -> &'static str;

    async fn read(&self) -> Result<VersionedSnapshot, StoreError>;

    async fn write(
        &self,
        content: &str,
        token: Option<&VersionToken>,
        message: &str,
    ) -> Result<VersionToken, StoreError>;
}

/// A store handle that remembers the version token of the last confirmed
/// read or write. The token only changes on success.
pub struct TrackedStore {
    inner: Arc<dyn VersionedStore>,
    token: Mutex<Option<VersionToken>>,
}

impl TrackedStore {
    pub fn new(inner: Arc<dyn VersionedStore>) -> Self {
        Self {
            inner,
            token: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    pub async fn version_token(&self) -> Option<VersionToken> {
        self.token.lock().await.clone()
    }

    /// Read the current revision and remember its token.
    pub async fn load(&self) -> Result<VersionedSnapshot, StoreError> {
        let snap = self.inner.read().await?;
        *self.token.lock().await = Some(snap.version_token.clone());
        debug!(store = self.name(), token = snap.version_token.short(), "version token refreshed by read");
        Ok(snap)
    }

    /// Conditional write carrying the last known token.
    ///
    /// The token is read before the write and replaced only after the store
    /// confirms it. Concurrent saves may both carry the same token; the
    /// loser gets a conflict.
    pub async fn save(&self, content: &str, message: &str) -> Result<VersionToken, StoreError> {
        let current = self.version_token().await;
        let next = self.inner.write(content, current.as_ref(), message).await?;
        *self.token.lock().await = Some(next.clone());
        Ok(next)
    }
}

impl fmt::Debug for TrackedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedStore")
            .field("store", &self.inner.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_token_truncates_to_seven() {
        assert_eq!(VersionToken::new("0123456789abcdef").short(), "0123456");
        assert_eq!(VersionToken::new("abc").short(), "abc");
    }
}
