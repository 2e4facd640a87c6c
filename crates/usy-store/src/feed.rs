//! Plain-text raw feeds (balance file, trophy file).

use std::time::Duration;

use reqwest::Client;

use crate::error::StoreError;
use crate::USER_AGENT;

/// A line-oriented text source.
#[async_trait::async_trait]
pub trait TextFeed: Send + Sync {
    /// Human-readable identity for logs (URL, fixture name, ...).
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<String, StoreError>;
}

/// A text file served over HTTP (e.g. a raw.githubusercontent.com URL).
///
/// Each fetch appends `t=<unix millis>` so intermediate caches never serve
/// a stale copy.
#[derive(Debug, Clone)]
pub struct HttpTextFeed {
    url: String,
    http: Client,
}

impl HttpTextFeed {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, StoreError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| StoreError::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl TextFeed for HttpTextFeed {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<String, StoreError> {
        let cache_bust = chrono::Utc::now().timestamp_millis().to_string();
        let resp = self
            .http
            .get(&self.url)
            .query(&[("t", cache_bust.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(if status.as_u16() == 404 {
                StoreError::NotFound
            } else {
                StoreError::Http {
                    status: status.as_u16(),
                    message: body,
                }
            });
        }

        Ok(resp.text().await?)
    }
}
