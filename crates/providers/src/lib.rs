//! Provider abstractions for post sources and LLMs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod gemini;
pub mod nitter;
pub mod noop;
pub mod openai;
pub mod twitter;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("not implemented")]
    NotImplemented,
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("missing credentials: {0}")]
    MissingCredentials(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Upper bound on a single HTTP exchange when the caller does not configure one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("tweet-sentiment/", env!("CARGO_PKG_VERSION"));

/// A post as returned by a source, already mapped out of the provider's wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedPost {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub text: String,
    pub url: String,
    pub retweet_count: u64,
    pub favorite_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyResponse {
    /// Raw model output, not yet normalized.
    pub text: String,
    pub model: String,
}

#[async_trait::async_trait]
pub trait PostSource: Send + Sync {
    /// Returns up to `count` of the most recent posts for `handle`, newest first.
    async fn recent_posts(
        &self,
        handle: &str,
        count: usize,
    ) -> Result<Vec<FetchedPost>, ProviderError>;
}

#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn classify(&self, prompt: &str) -> Result<ClassifyResponse, ProviderError>;
}

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    sources: HashMap<String, Arc<dyn PostSource>>,
    llms: HashMap<String, Arc<dyn LlmProvider>>,
    /// Known providers that were not registered, with the variables that would enable them.
    missing: HashMap<String, String>,
    pub preferred_source: Option<String>,
    pub preferred_llm: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, name: &str, provider: Arc<dyn PostSource>) -> Self {
        self.sources.insert(name.to_string(), provider);
        self
    }

    pub fn with_llm(mut self, name: &str, provider: Arc<dyn LlmProvider>) -> Self {
        self.llms.insert(name.to_string(), provider);
        self
    }

    /// Records that `name` exists but lacks credentials, so lookups can say which ones.
    pub fn with_missing_credentials(mut self, name: &str, hint: &str) -> Self {
        self.missing.insert(name.to_string(), hint.to_string());
        self
    }

    pub fn set_preferred_source(mut self, name: &str) -> Self {
        self.preferred_source = Some(name.to_string());
        self
    }

    pub fn set_preferred_llm(mut self, name: &str) -> Self {
        self.preferred_llm = Some(name.to_string());
        self
    }

    pub fn source(&self, name: Option<&str>) -> Result<Arc<dyn PostSource>, ProviderError> {
        let key = name
            .map(str::to_string)
            .or_else(|| self.preferred_source.clone())
            .ok_or_else(|| ProviderError::UnknownProvider("no post source configured".into()))?;
        match self.sources.get(&key) {
            Some(source) => Ok(source.clone()),
            None => Err(self.not_registered(key)),
        }
    }

    pub fn llm(&self, name: Option<&str>) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let key = name
            .map(str::to_string)
            .or_else(|| self.preferred_llm.clone())
            .ok_or_else(|| ProviderError::UnknownProvider("no llm provider configured".into()))?;
        match self.llms.get(&key) {
            Some(llm) => Ok(llm.clone()),
            None => Err(self.not_registered(key)),
        }
    }

    fn not_registered(&self, key: String) -> ProviderError {
        match self.missing.get(&key) {
            Some(hint) => ProviderError::MissingCredentials(format!("{}: set {}", key, hint)),
            None => ProviderError::UnknownProvider(key),
        }
    }

    pub fn source_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sources.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn llm_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.llms.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Builds the canonical status link for a post.
pub fn status_url(handle: &str, id: &str) -> String {
    format!("https://twitter.com/{}/status/{}", handle, id)
}

/// Shared client setup: every provider gets the same user agent and a request timeout.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(request_failed)
}

/// Drops the request URL from transport errors; some providers carry credentials in it.
pub(crate) fn request_failed(err: reqwest::Error) -> ProviderError {
    ProviderError::RequestFailed(err.without_url().to_string())
}

pub(crate) async fn error_for_status(
    resp: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(ProviderError::RequestFailed(format!(
        "status {} body {:?}",
        status, body
    )))
}
