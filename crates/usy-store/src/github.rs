//! GitHub contents API as a versioned store.
//!
//! The file's blob `sha` is the version token. GitHub refuses a PUT whose
//! `sha` is stale (409) or missing for an existing file (422); both map to
//! [`StoreError::Conflict`].
//!
//! The access token is passed in by the caller; do not log it.

use std::fmt;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::versioned::{VersionToken, VersionedSnapshot, VersionedStore};
use crate::USER_AGENT;

const ACCEPT: &str = "application/vnd.github.v3+json";

/// Which file in which repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubLocation {
    pub api_base: String,
    /// `owner/repo`
    pub repo: String,
    pub path: String,
    pub branch: String,
}

impl GitHubLocation {
    pub fn new(repo: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            repo: repo.into(),
            path: path.into(),
            branch: "main".to_string(),
        }
    }

    fn contents_url(&self) -> String {
        format!(
            "{}/repos/{}/contents/{}",
            self.api_base.trim_end_matches('/'),
            self.repo.trim_matches('/'),
            self.path.trim_start_matches('/')
        )
    }
}

#[derive(Clone)]
pub struct GitHubContentsStore {
    http: Client,
    location: GitHubLocation,
    access_token: String,
}

impl GitHubContentsStore {
    pub fn new(
        location: GitHubLocation,
        access_token: String,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| StoreError::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            location,
            access_token,
        })
    }

    fn auth_header(&self) -> String {
        format!("token {}", self.access_token)
    }
}

impl fmt::Debug for GitHubContentsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubContentsStore")
            .field("location", &self.location)
            .field("access_token", &"<REDACTED>")
            .finish()
    }
}

#[async_trait::async_trait]
impl VersionedStore for GitHubContentsStore {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn read(&self) -> Result<VersionedSnapshot, StoreError> {
        let resp = self
            .http
            .get(self.location.contents_url())
            .header("Authorization", self.auth_header())
            .header("Accept", ACCEPT)
            .query(&[("ref", self.location.branch.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(status_error(status, error_message(resp).await, Op::Read));
        }

        let body: ContentsResponse = resp.json().await?;
        let content = decode_content(&body.content)?;
        Ok(VersionedSnapshot {
            content,
            version_token: VersionToken::new(body.sha),
        })
    }

    async fn write(
        &self,
        content: &str,
        token: Option<&VersionToken>,
        message: &str,
    ) -> Result<VersionToken, StoreError> {
        let req = PutContentsRequest {
            message,
            content: general_purpose::STANDARD.encode(content.as_bytes()),
            branch: &self.location.branch,
            sha: token.map(VersionToken::as_str),
        };

        let resp = self
            .http
            .put(self.location.contents_url())
            .header("Authorization", self.auth_header())
            .header("Accept", ACCEPT)
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(status_error(status, error_message(resp).await, Op::Write));
        }

        let body: PutContentsResponse = resp.json().await?;
        Ok(VersionToken::new(body.content.sha))
    }
}

// *************** Wire types ***************

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    /// Base64, wrapped with newlines by GitHub.
    content: String,
    sha: String,
}

#[derive(Debug, Serialize)]
struct PutContentsRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PutContentsResponse {
    content: PutContentMeta,
}

#[derive(Debug, Deserialize)]
struct PutContentMeta {
    sha: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Op {
    Read,
    Write,
}

// *************** Helpers ***************

/// Decode GitHub's base64 payload (newline-wrapped) into UTF-8 text.
pub(crate) fn decode_content(raw: &str) -> Result<String, StoreError> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| StoreError::Decode(format!("content is not base64: {e}")))?;
    String::from_utf8(bytes).map_err(|e| StoreError::Decode(format!("content is not utf-8: {e}")))
}

fn status_error(status: StatusCode, message: String, op: Op) -> StoreError {
    let code = status.as_u16();
    match (code, op) {
        (404, Op::Read) => StoreError::NotFound,
        (401 | 403, _) => StoreError::Auth {
            status: code,
            message,
        },
        (409 | 422, Op::Write) => StoreError::Conflict {
            status: code,
            message,
        },
        _ => StoreError::Http {
            status: code,
            message,
        },
    }
}

/// GitHub error bodies look like `{"message": "..."}`; fall back to raw text.
async fn error_message(resp: Response) -> String {
    let body = resp.text().await.unwrap_or_default();
    serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_content_accepts_wrapped_base64() {
        let encoded = general_purpose::STANDARD.encode("[{\"username\":\"a\",\"balance\":1}]");
        let (head, tail) = encoded.split_at(10);
        let wrapped = format!("{head}\n{tail}\n");
        assert_eq!(
            decode_content(&wrapped).unwrap(),
            "[{\"username\":\"a\",\"balance\":1}]"
        );
    }

    #[test]
    fn decode_content_rejects_garbage() {
        assert!(matches!(
            decode_content("!!!not base64"),
            Err(StoreError::Decode(_))
        ));
    }

    #[test]
    fn status_mapping_distinguishes_conflict_and_not_found() {
        assert!(status_error(StatusCode::NOT_FOUND, String::new(), Op::Read).is_not_found());
        assert!(status_error(StatusCode::CONFLICT, String::new(), Op::Write).is_conflict());
        assert!(
            status_error(StatusCode::UNPROCESSABLE_ENTITY, String::new(), Op::Write).is_conflict()
        );
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, String::new(), Op::Write),
            StoreError::Http { status: 404, .. }
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, String::new(), Op::Read),
            StoreError::Auth { status: 403, .. }
        ));
    }

    #[test]
    fn contents_url_joins_without_double_slashes() {
        let mut loc = GitHubLocation::new("owner/repo", "/data/players.json");
        loc.api_base = "http://localhost:1234/".to_string();
        assert_eq!(
            loc.contents_url(),
            "http://localhost:1234/repos/owner/repo/contents/data/players.json"
        );
    }

    #[test]
    fn debug_redacts_access_token() {
        let store = GitHubContentsStore::new(
            GitHubLocation::new("o/r", "players.json"),
            "ghp_supersecretvalue".to_string(),
            Duration::from_secs(1),
        )
        .unwrap();
        let dbg = format!("{store:?}");
        assert!(!dbg.contains("supersecret"));
        assert!(dbg.contains("<REDACTED>"));
    }
}
