use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::Value;

use crate::app::{ChirpError, Result};
use crate::domain::post::PROFILE_BASE;
use crate::domain::{LinkKind, LinkSpan, Post};

const TWITTER_DATE_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Entity escapes that may appear in post text.
const ESCAPES: &[&str] = &["&amp;", "&lt;", "&gt;", "&quot;", "&#39;"];

#[derive(Debug, Deserialize)]
struct RawTweet {
    id: u64,
    text: Option<String>,
    full_text: Option<String>,
    user: RawUser,
    created_at: String,
    #[serde(default)]
    entities: RawEntities,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    screen_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEntities {
    user_mentions: Vec<RawMention>,
    urls: Vec<RawUrl>,
    hashtags: Vec<RawHashtag>,
    media: Vec<RawUrl>,
}

#[derive(Debug, Deserialize)]
struct RawMention {
    screen_name: String,
    indices: [usize; 2],
}

#[derive(Debug, Deserialize)]
struct RawUrl {
    url: String,
    expanded_url: Option<String>,
    indices: [usize; 2],
}

#[derive(Debug, Deserialize)]
struct RawHashtag {
    text: String,
    indices: [usize; 2],
}

/// Posts that normalized cleanly plus the number of records skipped.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub posts: Vec<Post>,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    tz: Tz,
}

impl Normalizer {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn normalize(&self, raw: &Value) -> Result<Post> {
        normalize(raw, self.tz)
    }

    /// Normalize every record, skipping (and logging) the malformed ones.
    pub fn normalize_batch(&self, raw_items: &[Value]) -> NormalizedBatch {
        let mut batch = NormalizedBatch::default();
        for (index, raw) in raw_items.iter().enumerate() {
            match self.normalize(raw) {
                Ok(post) => batch.posts.push(post),
                Err(e) => {
                    batch.skipped += 1;
                    let id = raw.get("id").and_then(Value::as_u64);
                    tracing::warn!(index, ?id, error = %e, "Skipping timeline record");
                }
            }
        }
        batch
    }
}

/// Map one raw timeline record into a [`Post`] displayed in `tz`.
pub fn normalize(raw: &Value, tz: Tz) -> Result<Post> {
    let tweet = RawTweet::deserialize(raw).map_err(|e| ChirpError::MalformedRecord(e.to_string()))?;

    let text = tweet
        .full_text
        .or(tweet.text)
        .ok_or_else(|| malformed(tweet.id, "missing field `text`"))?;

    let created_at = parse_created_at(&tweet.created_at)
        .ok_or_else(|| malformed(tweet.id, &format!("unparseable created_at {:?}", tweet.created_at)))?
        .with_timezone(&tz);

    let links = link_spans(tweet.id, &text, tweet.entities)?;

    Ok(Post {
        id: tweet.id,
        author: tweet.user.screen_name,
        text,
        created_at,
        links,
    })
}

fn malformed(id: u64, reason: &str) -> ChirpError {
    ChirpError::MalformedRecord(format!("post {}: {}", id, reason))
}

fn parse_created_at(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(s, TWITTER_DATE_FORMAT)
        .ok()
        .or_else(|| DateTime::parse_from_rfc2822(s).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok())
}

/// Byte offset of every character the API counts when it reports entity
/// indices, plus the end of the text.
///
/// The API delivers `text` with `&`, `<` and `>` escaped but counts indices
/// on the unescaped text, so each escape sequence is one character here.
fn index_boundaries(text: &str) -> Vec<usize> {
    let mut boundaries = Vec::with_capacity(text.len() + 1);
    let mut chars = text.char_indices();
    while let Some((i, c)) = chars.next() {
        boundaries.push(i);
        if c == '&' {
            let rest = &text[i..];
            if let Some(escape) = ESCAPES.iter().find(|e| rest.starts_with(*e)) {
                // '&' has been consumed; skip the remaining ASCII bytes
                for _ in 1..escape.len() {
                    chars.next();
                }
            }
        }
    }
    boundaries.push(text.len());
    boundaries
}

fn link_spans(id: u64, text: &str, entities: RawEntities) -> Result<Vec<LinkSpan>> {
    // Entity indices count code points; spans need byte offsets.
    let boundaries = index_boundaries(text);

    let to_span = |indices: [usize; 2], target: String, kind: LinkKind| -> Result<LinkSpan> {
        let [start, end] = indices;
        if start >= end {
            return Err(malformed(id, &format!("inverted entity indices {:?}", indices)));
        }
        match (boundaries.get(start), boundaries.get(end)) {
            (Some(&s), Some(&e)) => Ok(LinkSpan::new(s, e, target, kind)),
            _ => Err(malformed(id, &format!("entity indices {:?} outside text", indices))),
        }
    };

    let mut spans = Vec::new();
    for mention in entities.user_mentions {
        let target = format!("{}/{}", PROFILE_BASE, mention.screen_name);
        spans.push(to_span(mention.indices, target, LinkKind::Mention)?);
    }
    for url in entities.urls {
        let target = url.expanded_url.unwrap_or(url.url);
        spans.push(to_span(url.indices, target, LinkKind::Url)?);
    }
    for tag in entities.hashtags {
        let target = format!("{}/hashtag/{}", PROFILE_BASE, urlencoding::encode(&tag.text));
        spans.push(to_span(tag.indices, target, LinkKind::Hashtag)?);
    }
    for media in entities.media {
        let target = media.expanded_url.unwrap_or(media.url);
        spans.push(to_span(media.indices, target, LinkKind::Media)?);
    }

    spans.sort_by_key(|span| span.start);

    let mut kept: Vec<LinkSpan> = Vec::with_capacity(spans.len());
    for span in spans {
        if let Some(prev) = kept.last() {
            if span.start < prev.end {
                tracing::warn!(
                    post_id = id,
                    kind = ?span.kind,
                    start = span.start,
                    "Dropping entity overlapping an earlier one"
                );
                continue;
            }
        }
        kept.push(span);
    }

    Ok(kept)
}
