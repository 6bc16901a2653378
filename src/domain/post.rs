use chrono::DateTime;
use chrono_tz::Tz;

pub const PROFILE_BASE: &str = "https://twitter.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Mention,
    Url,
    Hashtag,
    Media,
}

/// A byte range of post text rendered as a hyperlink.
///
/// `start` and `end` are byte offsets on UTF-8 character boundaries, `end`
/// exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSpan {
    pub start: usize,
    pub end: usize,
    pub target_url: String,
    pub kind: LinkKind,
}

impl LinkSpan {
    pub fn new(start: usize, end: usize, target_url: impl Into<String>, kind: LinkKind) -> Self {
        Self {
            start,
            end,
            target_url: target_url.into(),
            kind,
        }
    }
}

/// A normalized timeline post.
///
/// `created_at` is already converted to the display zone and is used for
/// presentation order only; `id` is the key for incremental fetching.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: u64,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Tz>,
    pub links: Vec<LinkSpan>,
}

impl Post {
    pub fn profile_url(&self) -> String {
        format!("{}/{}", PROFILE_BASE, self.author)
    }

    pub fn permalink(&self) -> String {
        format!("{}/{}/status/{}", PROFILE_BASE, self.author, self.id)
    }

    /// Weekday and 24-hour clock time, e.g. `Monday 09:05`.
    pub fn display_time(&self) -> String {
        self.created_at.format("%A %H:%M").to_string()
    }
}
