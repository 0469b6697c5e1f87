use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PROMPT: &str =
    "Classify sentiment in one word (positive/neutral/negative) for: {text}";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub collector: CollectorConfig,
    pub classifier: ClassifierConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Registry name of the post source: `nitter`, `twitter` or `noop`.
    pub source: String,
    pub handles: Vec<String>,
    pub count: usize,
    pub nitter_instance: String,
    pub twitter_base_url: String,
    pub timeout_secs: u64,
}

impl CollectorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Registry name of the LLM: `gemini` or `openai`.
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    pub delay_ms: u64,
    pub prompt_template: String,
    pub timeout_secs: u64,
}

impl ClassifierConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub posts_path: String,
    pub sentiments_path: String,
}

impl OutputConfig {
    pub fn posts(&self) -> PathBuf {
        PathBuf::from(&self.posts_path)
    }

    pub fn sentiments(&self) -> PathBuf {
        PathBuf::from(&self.sentiments_path)
    }
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    load_with_env(path, None)
}

/// `env` replaces the process environment when given.
fn load_with_env(
    path: Option<&str>,
    env: Option<config::Map<String, String>>,
) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder()
        .set_default(
            "collector.handles",
            vec!["elonmusk", "BarackObama", "BillGates", "nytimes", "CNN"],
        )?
        .set_default("collector.source", "nitter")?
        .set_default("collector.count", 5_i64)?
        .set_default("collector.nitter_instance", providers::nitter::DEFAULT_INSTANCE)?
        .set_default("collector.twitter_base_url", providers::twitter::DEFAULT_BASE_URL)?
        .set_default("collector.timeout_secs", 30_i64)?
        .set_default("classifier.provider", "gemini")?
        .set_default("classifier.model", "gemini-1.5-flash")?
        .set_default("classifier.delay_ms", 1500_i64)?
        .set_default("classifier.prompt_template", DEFAULT_PROMPT)?
        .set_default("classifier.timeout_secs", 60_i64)?
        .set_default("output.posts_path", "tweets_data.json")?
        .set_default("output.sentiments_path", "sentiments.json")?;
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(
        config::Environment::with_prefix("SENTIMENT")
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("collector.handles")
            .try_parsing(true)
            .source(env),
    );
    let cfg = settings.build()?;
    Ok(cfg.try_deserialize()?)
}
