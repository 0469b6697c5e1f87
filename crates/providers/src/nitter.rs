//! Scrape-based source reading a Nitter instance's per-user RSS feed.
//!
//! The feed has no engagement counts, so posts from here always carry zeros.

use crate::{
    error_for_status, http_client, request_failed, status_url, FetchedPost, PostSource,
    ProviderError,
};
use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_INSTANCE: &str = "https://nitter.net";

#[derive(Clone)]
pub struct NitterConfig {
    pub instance: String,
    /// Public instances stall regularly; a stalled feed counts as a failed handle.
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct NitterSource {
    client: Client,
    cfg: Arc<NitterConfig>,
}

impl NitterSource {
    pub fn new(cfg: NitterConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(cfg.timeout)?,
            cfg: Arc::new(cfg),
        })
    }
}

#[async_trait::async_trait]
impl PostSource for NitterSource {
    async fn recent_posts(
        &self,
        handle: &str,
        count: usize,
    ) -> Result<Vec<FetchedPost>, ProviderError> {
        let url = format!("{}/{}/rss", self.cfg.instance.trim_end_matches('/'), handle);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(request_failed)?;
        let resp = error_for_status(resp).await?;
        let body = resp.text().await.map_err(request_failed)?;

        let mut posts = parse_feed(handle, &body)?;
        posts.truncate(count);
        Ok(posts)
    }
}

#[derive(Default)]
struct RawItem {
    title: Option<String>,
    link: Option<String>,
    guid: Option<String>,
    pub_date: Option<String>,
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Title,
    Link,
    Guid,
    PubDate,
}

/// Parses an RSS 2.0 document into posts, skipping items without a usable id or date.
pub fn parse_feed(handle: &str, xml: &str) -> Result<Vec<FetchedPost>, ProviderError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut posts = Vec::new();
    let mut item: Option<RawItem> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"item" => item = Some(RawItem::default()),
                b"title" => field = Some(Field::Title),
                b"link" => field = Some(Field::Link),
                b"guid" => field = Some(Field::Guid),
                b"pubDate" => field = Some(Field::PubDate),
                _ => field = None,
            },
            Ok(Event::Text(e)) => {
                let text = match e.unescape() {
                    Ok(t) => t.into_owned(),
                    Err(_) => String::from_utf8_lossy(&e).into_owned(),
                };
                push_text(&mut item, field, text);
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                push_text(&mut item, field, text);
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"item" {
                    if let Some(raw) = item.take() {
                        if let Some(post) = into_post(handle, raw) {
                            posts.push(post);
                        }
                    }
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ProviderError::InvalidResponse(format!(
                    "rss parse error at {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(posts)
}

fn push_text(item: &mut Option<RawItem>, field: Option<Field>, text: String) {
    let (Some(item), Some(field)) = (item.as_mut(), field) else {
        return;
    };
    let slot = match field {
        Field::Title => &mut item.title,
        Field::Link => &mut item.link,
        Field::Guid => &mut item.guid,
        Field::PubDate => &mut item.pub_date,
    };
    slot.get_or_insert_with(String::new).push_str(&text);
}

fn into_post(handle: &str, raw: RawItem) -> Option<FetchedPost> {
    let id = raw
        .guid
        .as_deref()
        .and_then(status_id)
        .or_else(|| raw.link.as_deref().and_then(status_id));
    let Some(id) = id else {
        debug!(handle, "skipping rss item without status id");
        return None;
    };
    let created_at = match raw.pub_date.as_deref().map(DateTime::parse_from_rfc2822) {
        Some(Ok(dt)) => dt.with_timezone(&Utc),
        _ => {
            debug!(handle, id = %id, "skipping rss item without valid pubDate");
            return None;
        }
    };
    // Retweets link to the original author's status, not the feed owner's.
    let author = raw.link.as_deref().and_then(status_author);
    Some(FetchedPost {
        url: status_url(author.unwrap_or(handle), &id),
        id,
        created_at,
        text: raw.title.unwrap_or_default(),
        retweet_count: 0,
        favorite_count: 0,
    })
}

/// Accepts a bare numeric id or any link containing `/status/<digits>`.
fn status_id(value: &str) -> Option<String> {
    let value = value.trim();
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        return Some(value.to_string());
    }
    let rest = &value[value.find("/status/")? + "/status/".len()..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

/// The account segment right before `/status/` in a status link.
fn status_author(link: &str) -> Option<&str> {
    let path = match link.find("://") {
        Some(i) => {
            let rest = &link[i + 3..];
            &rest[rest.find('/')?..]
        }
        None => link,
    };
    let before = &path[..path.find("/status/")?];
    let author = before.rsplit('/').next()?;
    (!author.is_empty()).then_some(author)
}
