use chrono::{DateTime, Utc};
use providers::FetchedPost;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A collected post. The author handle is the key it is filed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub date: DateTime<Utc>,
    pub content: String,
    pub url: String,
    pub retweet_count: u64,
    pub favorite_count: u64,
}

impl From<FetchedPost> for Post {
    fn from(p: FetchedPost) -> Self {
        Self {
            id: p.id,
            date: p.created_at,
            content: p.text,
            url: p.url,
            retweet_count: p.retweet_count,
            favorite_count: p.favorite_count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
    /// The model call itself failed.
    Error,
}

impl SentimentLabel {
    /// Used when the model answers with something outside the closed set.
    pub const FALLBACK: SentimentLabel = SentimentLabel::Neutral;

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Error => "error",
        }
    }

    /// Parses one of the three model-facing labels. `error` is never accepted from a model.
    pub fn from_model_word(word: &str) -> Option<Self> {
        match word {
            "positive" => Some(SentimentLabel::Positive),
            "neutral" => Some(SentimentLabel::Neutral),
            "negative" => Some(SentimentLabel::Negative),
            _ => None,
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledPost {
    #[serde(flatten)]
    pub post: Post,
    pub sentiment: SentimentLabel,
}

/// Handle → posts, as written to the posts file.
pub type PostMap = BTreeMap<String, Vec<Post>>;

/// Handle → labeled posts, as written to the sentiments file.
pub type SentimentMap = BTreeMap<String, Vec<LabeledPost>>;
