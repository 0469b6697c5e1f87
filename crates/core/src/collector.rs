//! Fetches recent posts for each configured handle.

use crate::models::{Post, PostMap};
use providers::PostSource;
use std::collections::BTreeSet;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct CollectionRequest {
    pub handles: Vec<String>,
    pub count: usize,
}

/// Strips whitespace and a leading `@`; returns `None` for blank input.
pub fn normalize_handle(raw: &str) -> Option<String> {
    let handle = raw.trim().trim_start_matches('@').trim();
    if handle.is_empty() {
        None
    } else {
        Some(handle.to_string())
    }
}

/// Collects handle-by-handle. A failing handle gets an empty list and the batch continues.
pub async fn collect(source: &dyn PostSource, req: &CollectionRequest) -> PostMap {
    let mut seen = BTreeSet::new();
    let mut out = PostMap::new();

    for raw in &req.handles {
        let Some(handle) = normalize_handle(raw) else {
            continue;
        };
        if !seen.insert(handle.clone()) {
            continue;
        }

        let posts = match source.recent_posts(&handle, req.count).await {
            Ok(fetched) => {
                let posts: Vec<Post> = fetched
                    .into_iter()
                    .take(req.count)
                    .map(Post::from)
                    .collect();
                if posts.is_empty() {
                    info!(%handle, "no posts found");
                } else {
                    info!(%handle, count = posts.len(), "collected posts");
                }
                posts
            }
            Err(e) => {
                warn!(%handle, error = %e, "collection failed; recording empty result");
                Vec::new()
            }
        };
        out.insert(handle, posts);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_normalized() {
        assert_eq!(normalize_handle(" @nytimes ").as_deref(), Some("nytimes"));
        assert_eq!(normalize_handle("CNN").as_deref(), Some("CNN"));
        assert_eq!(normalize_handle("  @ "), None);
    }
}
