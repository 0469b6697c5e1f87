use anyhow::Context;
use sentiment_core::models::SentimentMap;
use sentiment_core::query;
use std::io;

/// Runs the query session on stdin/stdout. Ctrl-C ends the process cleanly.
pub async fn chat(results: SentimentMap) -> anyhow::Result<()> {
    // stdout is not locked for the whole session so the interrupt branch can still print.
    let session = tokio::task::spawn_blocking(move || {
        query::run_session(&results, io::stdin().lock(), io::stdout())
    });

    tokio::select! {
        res = session => {
            res.context("chat session panicked")?.context("chat i/o")?;
            Ok(())
        }
        Ok(()) = tokio::signal::ctrl_c() => {
            println!("\nExiting chat...");
            // The blocking reader cannot be cancelled; leave without waiting for it.
            std::process::exit(0);
        }
    }
}
