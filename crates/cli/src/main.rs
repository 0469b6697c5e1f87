use anyhow::Result;
use clap::{Parser, Subcommand};
use cli::{chat, report};
use sentiment_core::config;
use sentiment_core::config::AppConfig;
use sentiment_core::pipeline;
use sentiment_core::pipeline::PipelineMode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;
    debug!(
        source = %cfg.collector.source,
        llm = %cfg.classifier.provider,
        handles = cfg.collector.handles.len(),
        "configuration loaded"
    );

    match cli.command.unwrap_or_default() {
        Commands::Collect { json } => run_pipeline(&cfg, PipelineMode::Collect, json).await,
        Commands::Classify { json } => run_pipeline(&cfg, PipelineMode::Classify, json).await,
        Commands::Run { json, no_chat } => {
            run_pipeline(&cfg, PipelineMode::All, json).await?;
            if no_chat {
                Ok(())
            } else {
                run_chat(&cfg).await
            }
        }
        Commands::Chat => run_chat(&cfg).await,
    }
}

#[derive(Parser)]
#[command(name = "tweet-sentiment")]
#[command(about = "Collect recent posts, label their sentiment with an LLM, and query the results", long_about = None)]
struct Cli {
    /// Path to config file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<String>,

    /// Defaults to `run` followed by the chat session
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Fetch recent posts for the configured handles
    Collect {
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },
    /// Label previously collected posts
    Classify {
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },
    /// Collect, classify, then open the chat session
    Run {
        /// Output JSON summary
        #[arg(long)]
        json: bool,
        /// Skip the interactive session afterwards
        #[arg(long, default_value_t = false)]
        no_chat: bool,
    },
    /// Query saved sentiments interactively
    Chat,
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Run {
            json: false,
            no_chat: false,
        }
    }
}

async fn run_pipeline(cfg: &AppConfig, mode: PipelineMode, json: bool) -> Result<()> {
    let registry = pipeline::build_registry(cfg)?;
    let summary = pipeline::run_with_mode_summary(cfg, &registry, mode).await?;
    if json {
        println!("{}", report::summary_json(mode, &summary)?);
    } else {
        println!("{}", report::summary_text(mode, &summary));
    }
    Ok(())
}

async fn run_chat(cfg: &AppConfig) -> Result<()> {
    let results = pipeline::load_sentiments(cfg)?;
    chat::chat(results).await
}
