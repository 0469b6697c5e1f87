//! Google Gemini `generateContent` client.

use crate::{
    error_for_status, http_client, request_failed, ClassifyResponse, LlmProvider, ProviderError,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    cfg: Arc<GeminiConfig>,
}

impl GeminiProvider {
    pub fn new(cfg: GeminiConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(cfg.timeout)?,
            cfg: Arc::new(cfg),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.cfg.base_url.trim_end_matches('/'),
            self.cfg.model
        )
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait::async_trait]
impl LlmProvider for GeminiProvider {
    async fn classify(&self, prompt: &str) -> Result<ClassifyResponse, ProviderError> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.cfg.api_key.as_str())
            .json(&body)
            .send()
            .await
            .map_err(request_failed)?;
        let resp = error_for_status(resp).await?;

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        // A blocked prompt comes back with no candidates; callers treat empty text as unknown.
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        Ok(ClassifyResponse {
            text,
            model: self.cfg.model.clone(),
        })
    }
}
