use chrono::{TimeZone, Utc};
use providers::{
    ClassifyResponse, FetchedPost, LlmProvider, PostSource, ProviderError, ProviderRegistry,
};
use sentiment_core::classifier::{classify_all, ClassificationSettings};
use sentiment_core::collector::{collect, CollectionRequest};
use sentiment_core::config::{AppConfig, ClassifierConfig, CollectorConfig, OutputConfig};
use sentiment_core::models::{PostMap, SentimentLabel, SentimentMap};
use sentiment_core::pipeline::{self, PipelineMode};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Serves canned posts; handles listed in `failing` return an error.
struct FakeSource {
    posts: HashMap<String, usize>,
    failing: Vec<String>,
}

#[async_trait::async_trait]
impl PostSource for FakeSource {
    async fn recent_posts(
        &self,
        handle: &str,
        count: usize,
    ) -> Result<Vec<FetchedPost>, ProviderError> {
        if self.failing.iter().any(|h| h == handle) {
            return Err(ProviderError::RequestFailed("503 from upstream".into()));
        }
        let available = self.posts.get(handle).copied().unwrap_or(0);
        // Deliberately ignores `count` so the collector has to enforce it.
        let _ = count;
        Ok((0..available)
            .map(|i| FetchedPost {
                id: format!("{handle}-{i}"),
                created_at: Utc.with_ymd_and_hms(2024, 1, 15, 12, i as u32, 0).unwrap(),
                text: format!("{handle} says {}", ["great", "meh", "awful"][i % 3]),
                url: providers::status_url(handle, &format!("{handle}-{i}")),
                retweet_count: i as u64,
                favorite_count: 10 * i as u64,
            })
            .collect())
    }
}

/// Answers by keyword; text containing "boom" makes the call fail.
struct FakeLlm {
    calls: Mutex<Vec<Instant>>,
}

impl FakeLlm {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for FakeLlm {
    async fn classify(&self, prompt: &str) -> Result<ClassifyResponse, ProviderError> {
        self.calls.lock().unwrap().push(Instant::now());
        if prompt.contains("boom") {
            return Err(ProviderError::RequestFailed("connection reset".into()));
        }
        let text = if prompt.contains("great") {
            "Positive."
        } else if prompt.contains("awful") {
            "negative"
        } else {
            "It is hard to say"
        };
        Ok(ClassifyResponse {
            text: text.to_string(),
            model: "fake".into(),
        })
    }
}

fn test_config(dir: &Path, handles: &[&str]) -> AppConfig {
    AppConfig {
        collector: CollectorConfig {
            source: "fake".into(),
            handles: handles.iter().map(|h| h.to_string()).collect(),
            count: 2,
            nitter_instance: "http://127.0.0.1:9".into(),
            twitter_base_url: "http://127.0.0.1:9".into(),
            timeout_secs: 5,
        },
        classifier: ClassifierConfig {
            provider: "fake".into(),
            model: "fake".into(),
            base_url: None,
            delay_ms: 0,
            prompt_template: sentiment_core::config::DEFAULT_PROMPT.into(),
            timeout_secs: 5,
        },
        output: OutputConfig {
            posts_path: dir.join("tweets_data.json").to_string_lossy().into_owned(),
            sentiments_path: dir.join("sentiments.json").to_string_lossy().into_owned(),
        },
    }
}

fn registry(llm: Arc<FakeLlm>) -> ProviderRegistry {
    let source = FakeSource {
        posts: HashMap::from([("nytimes".to_string(), 3), ("CNN".to_string(), 1)]),
        failing: vec!["broken".to_string()],
    };
    ProviderRegistry::new()
        .with_source("fake", Arc::new(source))
        .with_llm("fake", llm)
}

#[tokio::test]
async fn every_handle_gets_a_key_even_without_posts() {
    let source = FakeSource {
        posts: HashMap::from([("nytimes".to_string(), 4)]),
        failing: vec!["broken".to_string()],
    };
    let req = CollectionRequest {
        handles: vec![
            "@nytimes".into(),
            "nobody".into(),
            "broken".into(),
            "nytimes".into(),
            "  ".into(),
        ],
        count: 2,
    };
    let posts = collect(&source, &req).await;

    assert_eq!(posts.len(), 3);
    assert_eq!(posts["nytimes"].len(), 2);
    assert_eq!(posts["nytimes"][0].id, "nytimes-0");
    assert!(posts["nobody"].is_empty());
    assert!(posts["broken"].is_empty());
}

#[tokio::test]
async fn classification_coerces_labels_and_marks_failures() {
    let llm = FakeLlm::new();
    let mut posts = PostMap::new();
    let source = FakeSource {
        posts: HashMap::from([("a".to_string(), 3)]),
        failing: vec![],
    };
    posts.insert(
        "a".into(),
        source
            .recent_posts("a", 3)
            .await
            .unwrap()
            .into_iter()
            .map(Into::into)
            .collect(),
    );
    let mut failing = posts["a"][0].clone();
    failing.content = "boom".into();
    posts.insert("b".into(), vec![failing]);

    let settings = ClassificationSettings {
        prompt_template: sentiment_core::config::DEFAULT_PROMPT.into(),
        delay: Duration::ZERO,
    };
    let outcome = classify_all(&llm, &posts, &settings).await;

    let labels: Vec<SentimentLabel> = outcome.results["a"].iter().map(|p| p.sentiment).collect();
    assert_eq!(
        labels,
        vec![
            SentimentLabel::Positive,
            SentimentLabel::FALLBACK,
            SentimentLabel::Negative
        ]
    );
    assert_eq!(outcome.results["b"][0].sentiment, SentimentLabel::Error);
    assert_eq!(outcome.classified, 4);
    assert_eq!(outcome.labels[&SentimentLabel::Error], 1);
    assert_eq!(outcome.results["a"][1].post, posts["a"][1]);
}

#[tokio::test]
async fn delay_applies_between_calls_only() {
    let llm = FakeLlm::new();
    let mut posts = PostMap::new();
    let source = FakeSource {
        posts: HashMap::from([("a".to_string(), 3)]),
        failing: vec![],
    };
    posts.insert(
        "a".into(),
        source
            .recent_posts("a", 3)
            .await
            .unwrap()
            .into_iter()
            .map(Into::into)
            .collect(),
    );
    let delay = Duration::from_millis(250);
    let settings = ClassificationSettings {
        prompt_template: "{text}".into(),
        delay,
    };

    let start = Instant::now();
    classify_all(&llm, &posts, &settings).await;

    let calls = llm.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 3);
    assert!(calls[0].duration_since(start) < delay);
    for pair in calls.windows(2) {
        assert!(pair[1].duration_since(pair[0]) >= delay);
    }
}

#[tokio::test]
async fn full_run_persists_both_files() {
    let temp = tempfile::tempdir().unwrap();
    let cfg = test_config(temp.path(), &["nytimes", "CNN", "broken", "nobody"]);
    let llm = Arc::new(FakeLlm::new());
    let reg = registry(llm.clone());

    let summary = pipeline::run_with_mode_summary(&cfg, &reg, PipelineMode::All)
        .await
        .unwrap();
    assert_eq!(summary.handles, 4);
    assert_eq!(summary.posts, 3);
    assert_eq!(summary.classified, 3);
    assert_eq!(summary.empty_handles, vec!["broken", "nobody"]);
    assert_eq!(summary.labels["positive"], 2);

    let posts: PostMap = storage::read_json(&cfg.output.posts()).unwrap();
    assert_eq!(posts["nytimes"].len(), 2);
    assert!(posts["broken"].is_empty());

    let sentiments = pipeline::load_sentiments(&cfg).unwrap();
    assert_eq!(sentiments.keys().collect::<Vec<_>>(), posts.keys().collect::<Vec<_>>());
    assert_eq!(sentiments["nytimes"][0].post, posts["nytimes"][0]);

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(cfg.output.sentiments()).unwrap()).unwrap();
    let first = &raw["nytimes"][0];
    for field in [
        "id",
        "date",
        "content",
        "url",
        "retweet_count",
        "favorite_count",
        "sentiment",
    ] {
        assert!(first.get(field).is_some(), "missing {field}");
    }
    assert_eq!(first["date"], "2024-01-15T12:00:00Z");
}

#[tokio::test]
async fn persisted_files_round_trip_byte_for_byte() {
    let temp = tempfile::tempdir().unwrap();
    let cfg = test_config(temp.path(), &["nytimes", "CNN"]);
    let reg = registry(Arc::new(FakeLlm::new()));
    pipeline::run_with_mode(&cfg, &reg, PipelineMode::All)
        .await
        .unwrap();

    let posts: PostMap = storage::read_json(&cfg.output.posts()).unwrap();
    let copy = temp.path().join("posts_copy.json");
    storage::write_json(&copy, &posts).unwrap();
    assert_eq!(
        std::fs::read(cfg.output.posts()).unwrap(),
        std::fs::read(&copy).unwrap()
    );

    let sentiments: SentimentMap = storage::read_json(&cfg.output.sentiments()).unwrap();
    let copy = temp.path().join("sentiments_copy.json");
    storage::write_json(&copy, &sentiments).unwrap();
    assert_eq!(
        std::fs::read(cfg.output.sentiments()).unwrap(),
        std::fs::read(&copy).unwrap()
    );
}

#[tokio::test]
async fn classify_mode_reports_missing_and_malformed_input() {
    let temp = tempfile::tempdir().unwrap();
    let cfg = test_config(temp.path(), &["nytimes"]);
    let llm = Arc::new(FakeLlm::new());
    let reg = registry(llm.clone());

    let err = pipeline::run_with_mode_summary(&cfg, &reg, PipelineMode::Classify)
        .await
        .unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("run `collect` first"), "{msg}");
    assert!(msg.contains("file not found"), "{msg}");

    std::fs::write(cfg.output.posts(), "{ not json").unwrap();
    let err = pipeline::run_with_mode_summary(&cfg, &reg, PipelineMode::Classify)
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("malformed JSON"));
    assert!(llm.calls.lock().unwrap().is_empty());
    assert!(!cfg.output.sentiments().exists());
}

#[tokio::test]
async fn missing_llm_provider_is_reported() {
    let temp = tempfile::tempdir().unwrap();
    let mut cfg = test_config(temp.path(), &["nytimes"]);
    cfg.classifier.provider = "gemini".into();
    let reg = registry(Arc::new(FakeLlm::new()))
        .with_missing_credentials("gemini", "GEMINI_API_KEY or API_KEY");

    let err = pipeline::run_with_mode_summary(&cfg, &reg, PipelineMode::All)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("llm provider 'gemini' is not configured"));
    let chain = format!("{err:#}");
    assert!(
        chain.contains("missing credentials: gemini: set GEMINI_API_KEY or API_KEY"),
        "{chain}"
    );
    // Collection still happened and was persisted.
    assert!(cfg.output.posts().exists());
}
