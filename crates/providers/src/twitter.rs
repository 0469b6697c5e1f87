//! Authenticated Twitter API v2 source.
//!
//! Uses an app-only bearer token. When only the consumer key and secret are
//! known, the token is obtained once through the OAuth2 client-credentials
//! grant and reused for the life of the source.

use crate::{
    error_for_status, http_client, request_failed, status_url, FetchedPost, PostSource,
    ProviderError,
};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.twitter.com";

/// The timeline endpoint rejects `max_results` outside this range.
const MIN_RESULTS: usize = 5;
const MAX_RESULTS: usize = 100;

#[derive(Clone)]
pub enum TwitterCredentials {
    Bearer(String),
    Consumer { key: String, secret: String },
}

#[derive(Clone)]
pub struct TwitterConfig {
    pub base_url: String,
    pub credentials: TwitterCredentials,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct TwitterSource {
    client: Client,
    cfg: Arc<TwitterConfig>,
    token: Arc<OnceCell<String>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    token_type: String,
    access_token: String,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Deserialize)]
struct UserLookup {
    data: Option<User>,
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Deserialize)]
struct User {
    id: String,
}

#[derive(Deserialize)]
struct Timeline {
    #[serde(default)]
    data: Vec<Tweet>,
}

#[derive(Deserialize)]
struct Tweet {
    id: String,
    text: String,
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    public_metrics: PublicMetrics,
}

#[derive(Deserialize, Default)]
struct PublicMetrics {
    #[serde(default)]
    retweet_count: u64,
    #[serde(default)]
    like_count: u64,
}

impl TwitterSource {
    pub fn new(cfg: TwitterConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(cfg.timeout)?,
            cfg: Arc::new(cfg),
            token: Arc::new(OnceCell::new()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.cfg.base_url.trim_end_matches('/'), path)
    }

    async fn bearer(&self) -> Result<&str, ProviderError> {
        let token = self
            .token
            .get_or_try_init(|| async {
                match &self.cfg.credentials {
                    TwitterCredentials::Bearer(token) => Ok(token.clone()),
                    TwitterCredentials::Consumer { key, secret } => {
                        self.exchange_token(key, secret).await
                    }
                }
            })
            .await?;
        Ok(token.as_str())
    }

    async fn exchange_token(&self, key: &str, secret: &str) -> Result<String, ProviderError> {
        let resp = self
            .client
            .post(self.url("/oauth2/token"))
            .basic_auth(key, Some(secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(request_failed)?;
        let resp = error_for_status(resp).await?;
        let parsed: TokenResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        if !parsed.token_type.eq_ignore_ascii_case("bearer") {
            return Err(ProviderError::InvalidResponse(format!(
                "unexpected token type {}",
                parsed.token_type
            )));
        }
        debug!("obtained app-only bearer token");
        Ok(parsed.access_token)
    }

    async fn user_id(&self, handle: &str) -> Result<String, ProviderError> {
        let token = self.bearer().await?;
        let resp = self
            .client
            .get(self.url(&format!("/2/users/by/username/{}", handle)))
            .bearer_auth(token)
            .send()
            .await
            .map_err(request_failed)?;
        let resp = error_for_status(resp).await?;
        let parsed: UserLookup = resp
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        match parsed.data {
            Some(user) => Ok(user.id),
            None => {
                let reason = parsed
                    .errors
                    .into_iter()
                    .next()
                    .and_then(|e| e.detail.or(e.title))
                    .unwrap_or_else(|| "user not found".to_string());
                Err(ProviderError::RequestFailed(format!("{}: {}", handle, reason)))
            }
        }
    }
}

#[async_trait::async_trait]
impl PostSource for TwitterSource {
    async fn recent_posts(
        &self,
        handle: &str,
        count: usize,
    ) -> Result<Vec<FetchedPost>, ProviderError> {
        let user_id = self.user_id(handle).await?;
        let token = self.bearer().await?;
        let max_results = count.clamp(MIN_RESULTS, MAX_RESULTS).to_string();
        let resp = self
            .client
            .get(self.url(&format!("/2/users/{}/tweets", user_id)))
            .bearer_auth(token)
            .query(&[
                ("max_results", max_results.as_str()),
                ("tweet.fields", "created_at,public_metrics"),
            ])
            .send()
            .await
            .map_err(request_failed)?;
        let resp = error_for_status(resp).await?;
        let timeline: Timeline = resp
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let posts = timeline
            .data
            .into_iter()
            .filter_map(|tweet| {
                let Some(created_at) = tweet.created_at else {
                    debug!(handle, id = %tweet.id, "skipping tweet without created_at");
                    return None;
                };
                Some(FetchedPost {
                    url: status_url(handle, &tweet.id),
                    id: tweet.id,
                    created_at,
                    text: tweet.text,
                    retweet_count: tweet.public_metrics.retweet_count,
                    favorite_count: tweet.public_metrics.like_count,
                })
            })
            .take(count)
            .collect();
        Ok(posts)
    }
}
