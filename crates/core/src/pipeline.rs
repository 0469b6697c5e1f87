use crate::classifier::{self, ClassificationOutcome, ClassificationSettings};
use crate::collector::{self, CollectionRequest};
use crate::config::AppConfig;
use crate::models::{PostMap, SentimentMap};
use anyhow::Context;
use providers::gemini::{GeminiConfig, GeminiProvider};
use providers::nitter::{NitterConfig, NitterSource};
use providers::noop::NoopProvider;
use providers::openai::{OpenAiConfig, OpenAiProvider};
use providers::twitter::{TwitterConfig, TwitterCredentials, TwitterSource};
use providers::ProviderRegistry;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineMode {
    Collect,
    Classify,
    All,
}

impl PipelineMode {
    pub fn label(&self) -> &'static str {
        match self {
            PipelineMode::Collect => "collect",
            PipelineMode::Classify => "classify",
            PipelineMode::All => "run",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineSummary {
    pub handles: usize,
    pub posts: usize,
    pub empty_handles: Vec<String>,
    pub classified: usize,
    pub labels: BTreeMap<String, usize>,
}

impl PipelineSummary {
    fn record_posts(&mut self, posts: &PostMap) {
        self.handles = posts.len();
        self.posts = posts.values().map(Vec::len).sum();
        self.empty_handles = posts
            .iter()
            .filter(|(_, p)| p.is_empty())
            .map(|(h, _)| h.clone())
            .collect();
    }

    fn record_classification(&mut self, outcome: &ClassificationOutcome) {
        self.classified = outcome.classified;
        self.labels = outcome
            .labels
            .iter()
            .map(|(label, n)| (label.as_str().to_string(), *n))
            .collect();
    }
}

pub async fn run_with_mode(
    config: &AppConfig,
    registry: &ProviderRegistry,
    mode: PipelineMode,
) -> anyhow::Result<()> {
    let _ = run_with_mode_summary(config, registry, mode).await?;
    Ok(())
}

pub async fn run_with_mode_summary(
    config: &AppConfig,
    registry: &ProviderRegistry,
    mode: PipelineMode,
) -> anyhow::Result<PipelineSummary> {
    let mut summary = PipelineSummary::default();

    let posts = if matches!(mode, PipelineMode::Collect | PipelineMode::All) {
        info!("Starting collection phase...");
        let posts = run_collector(config, registry).await?;
        info!(
            "Collection complete. {} posts from {} handles.",
            posts.values().map(Vec::len).sum::<usize>(),
            posts.len()
        );
        posts
    } else {
        load_posts(config)?
    };
    summary.record_posts(&posts);

    if matches!(mode, PipelineMode::Classify | PipelineMode::All) {
        info!("Starting classification phase...");
        let outcome = run_classifier(config, registry, &posts).await?;
        info!("Classification complete. {} posts labeled.", outcome.classified);
        summary.record_classification(&outcome);
    }

    Ok(summary)
}

/// Collects posts for the configured handles and writes the posts file.
pub async fn run_collector(
    config: &AppConfig,
    registry: &ProviderRegistry,
) -> anyhow::Result<PostMap> {
    let source = registry
        .source(Some(config.collector.source.as_str()))
        .with_context(|| {
            format!(
                "post source '{}' is not available (registered: {})",
                config.collector.source,
                registry.source_names().join(", ")
            )
        })?;
    let req = CollectionRequest {
        handles: config.collector.handles.clone(),
        count: config.collector.count,
    };
    let posts = collector::collect(source.as_ref(), &req).await;

    let path = config.output.posts();
    storage::write_json(&path, &posts)
        .with_context(|| format!("writing posts to {}", path.display()))?;
    Ok(posts)
}

/// Classifies `posts` and writes the sentiments file.
pub async fn run_classifier(
    config: &AppConfig,
    registry: &ProviderRegistry,
    posts: &PostMap,
) -> anyhow::Result<ClassificationOutcome> {
    let llm = registry
        .llm(Some(config.classifier.provider.as_str()))
        .with_context(|| {
            format!("llm provider '{}' is not configured", config.classifier.provider)
        })?;
    let settings = ClassificationSettings {
        prompt_template: config.classifier.prompt_template.clone(),
        delay: config.classifier.delay(),
    };
    let outcome = classifier::classify_all(llm.as_ref(), posts, &settings).await;

    let path = config.output.sentiments();
    storage::write_json(&path, &outcome.results)
        .with_context(|| format!("writing sentiments to {}", path.display()))?;
    Ok(outcome)
}

pub fn load_posts(config: &AppConfig) -> anyhow::Result<PostMap> {
    let path = config.output.posts();
    storage::read_json(&path).with_context(|| {
        format!(
            "cannot load collected posts from {}; run `collect` first",
            path.display()
        )
    })
}

pub fn load_sentiments(config: &AppConfig) -> anyhow::Result<SentimentMap> {
    let path = config.output.sentiments();
    storage::read_json(&path).with_context(|| {
        format!(
            "cannot load sentiments from {}; run `classify` first",
            path.display()
        )
    })
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn twitter_credentials() -> Option<TwitterCredentials> {
    if let Some(token) = env_var("TWITTER_BEARER_TOKEN") {
        return Some(TwitterCredentials::Bearer(token));
    }
    match (env_var("TWITTER_API_KEY"), env_var("TWITTER_API_SECRET")) {
        (Some(key), Some(secret)) => Some(TwitterCredentials::Consumer { key, secret }),
        _ => None,
    }
}

/// The configured model and base URL only apply to the preferred provider.
fn model_for(config: &AppConfig, provider: &str, default: &str) -> String {
    if config.classifier.provider == provider {
        config.classifier.model.clone()
    } else {
        default.to_string()
    }
}

fn base_url_for(config: &AppConfig, provider: &str) -> Option<String> {
    if config.classifier.provider == provider {
        config.classifier.base_url.clone()
    } else {
        None
    }
}

pub fn build_registry(config: &AppConfig) -> anyhow::Result<ProviderRegistry> {
    let nitter = NitterSource::new(NitterConfig {
        instance: config.collector.nitter_instance.clone(),
        timeout: config.collector.timeout(),
    })?;
    let mut reg = ProviderRegistry::new()
        .with_source("noop", Arc::new(NoopProvider))
        .with_source("nitter", Arc::new(nitter));

    if let Some(credentials) = twitter_credentials() {
        let source = TwitterSource::new(TwitterConfig {
            base_url: config.collector.twitter_base_url.clone(),
            credentials,
            timeout: config.collector.timeout(),
        })?;
        reg = reg.with_source("twitter", Arc::new(source));
    } else {
        reg = reg.with_missing_credentials(
            "twitter",
            "TWITTER_BEARER_TOKEN or TWITTER_API_KEY and TWITTER_API_SECRET",
        );
    }

    if let Some(key) = env_var("GEMINI_API_KEY").or_else(|| env_var("API_KEY")) {
        let provider = GeminiProvider::new(GeminiConfig {
            api_key: key,
            base_url: base_url_for(config, "gemini")
                .unwrap_or_else(|| providers::gemini::DEFAULT_BASE_URL.to_string()),
            model: model_for(config, "gemini", DEFAULT_GEMINI_MODEL),
            timeout: config.classifier.timeout(),
        })?;
        reg = reg.with_llm("gemini", Arc::new(provider));
    } else {
        reg = reg.with_missing_credentials("gemini", "GEMINI_API_KEY or API_KEY");
    }

    if let Some(key) = env_var("OPENAI_API_KEY") {
        let base = env_var("OPENAI_BASE_URL")
            .or_else(|| base_url_for(config, "openai"))
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
        let provider = OpenAiProvider::new(OpenAiConfig {
            api_key: key,
            base_url: base,
            chat_model: model_for(config, "openai", DEFAULT_OPENAI_MODEL),
            timeout: config.classifier.timeout(),
        })?;
        reg = reg.with_llm("openai", Arc::new(provider));
    } else {
        reg = reg.with_missing_credentials("openai", "OPENAI_API_KEY");
    }

    debug!(
        sources = ?reg.source_names(),
        llms = ?reg.llm_names(),
        "providers registered"
    );

    Ok(reg
        .set_preferred_source(&config.collector.source)
        .set_preferred_llm(&config.classifier.provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_prefers_nitter() {
        let cfg = crate::config::load(None).unwrap();
        let reg = build_registry(&cfg).unwrap();
        assert_eq!(reg.preferred_source.as_deref(), Some("nitter"));
        assert!(reg.source(None).is_ok());
        assert!(reg.source(Some("noop")).is_ok());
    }

    #[test]
    fn configured_model_only_applies_to_preferred_llm() {
        let mut cfg = crate::config::load(None).unwrap();
        cfg.classifier.provider = "openai".into();
        cfg.classifier.model = "gpt-test".into();
        assert_eq!(model_for(&cfg, "openai", DEFAULT_OPENAI_MODEL), "gpt-test");
        assert_eq!(model_for(&cfg, "gemini", DEFAULT_GEMINI_MODEL), DEFAULT_GEMINI_MODEL);
        assert_eq!(base_url_for(&cfg, "gemini"), None);
    }
}
