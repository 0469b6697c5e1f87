use crate::models::{LabeledPost, PostMap, SentimentLabel, SentimentMap};
use providers::LlmProvider;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ClassificationSettings {
    pub prompt_template: String,
    /// Pause between consecutive model calls.
    pub delay: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct ClassificationOutcome {
    pub results: SentimentMap,
    pub classified: usize,
    pub labels: BTreeMap<SentimentLabel, usize>,
}

pub fn build_prompt(template: &str, text: &str) -> String {
    if template.contains("{text}") {
        template.replace("{text}", text)
    } else {
        format!("{} {}", template.trim_end(), text)
    }
}

/// Coerces raw model output into the closed label set.
pub fn normalize_label(raw: &str) -> SentimentLabel {
    let word = raw
        .trim()
        .trim_matches(|c: char| !c.is_alphabetic())
        .to_lowercase();
    SentimentLabel::from_model_word(&word).unwrap_or(SentimentLabel::FALLBACK)
}

pub async fn classify_text(llm: &dyn LlmProvider, template: &str, text: &str) -> SentimentLabel {
    let prompt = build_prompt(template, text);
    match llm.classify(&prompt).await {
        Ok(resp) => {
            let label = normalize_label(&resp.text);
            debug!(model = %resp.model, raw = %resp.text.trim(), %label, "classified");
            label
        }
        Err(e) => {
            warn!(error = %e, "analysis error");
            SentimentLabel::Error
        }
    }
}

/// Classifies every post, one call at a time, sleeping between calls.
pub async fn classify_all(
    llm: &dyn LlmProvider,
    posts: &PostMap,
    settings: &ClassificationSettings,
) -> ClassificationOutcome {
    let mut outcome = ClassificationOutcome::default();

    for (handle, handle_posts) in posts {
        let mut labeled = Vec::with_capacity(handle_posts.len());
        for post in handle_posts {
            if outcome.classified > 0 && !settings.delay.is_zero() {
                tokio::time::sleep(settings.delay).await;
            }
            let sentiment = classify_text(llm, &settings.prompt_template, &post.content).await;
            outcome.classified += 1;
            *outcome.labels.entry(sentiment).or_default() += 1;
            labeled.push(LabeledPost {
                post: post.clone(),
                sentiment,
            });
        }
        outcome.results.insert(handle.clone(), labeled);
    }

    outcome
}
