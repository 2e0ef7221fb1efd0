//! Core types for Dupcast

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A post fetched from a source account
///
/// Posts are read-only snapshots; the pipeline never mutates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    /// Short text as returned by the platform
    pub text: String,
    /// Extended text; supersedes `text` when present
    pub full_text: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Id of the post this one replies to, if any
    pub in_reply_to_id: Option<String>,
    #[serde(default)]
    pub media: Vec<Media>,
}

/// A media attachment and the range of the display text it occupies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub id: String,
    pub url: Option<String>,
    /// `[start, end)` character offsets of the auto-appended media reference
    pub indices: (usize, usize),
}

impl Post {
    pub fn new(id: impl Into<String>, text: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            full_text: None,
            created_at,
            in_reply_to_id: None,
            media: Vec::new(),
        }
    }

    pub fn with_full_text(mut self, full_text: impl Into<String>) -> Self {
        self.full_text = Some(full_text.into());
        self
    }

    pub fn with_media(mut self, media: Media) -> Self {
        self.media.push(media);
        self
    }

    pub fn in_reply_to(mut self, id: impl Into<String>) -> Self {
        self.in_reply_to_id = Some(id.into());
        self
    }

    /// The full text if present, else the short text
    pub fn display_text(&self) -> &str {
        self.full_text.as_deref().unwrap_or(&self.text)
    }

    /// Text used for duplicate detection
    ///
    /// When media is attached the display text is cut at the first media
    /// item's start offset so the appended media link is not compared.
    pub fn comparable_text(&self) -> &str {
        let text = self.display_text();
        match self.media.first() {
            Some(media) => truncate_chars(text, media.indices.0),
            None => text,
        }
    }

    pub fn is_reply(&self) -> bool {
        self.in_reply_to_id.is_some()
    }
}

/// Prefix of `text` holding at most `chars` characters
fn truncate_chars(text: &str, chars: usize) -> &str {
    match text.char_indices().nth(chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// A post created on the target account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedPost {
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub url: Option<String>,
}

/// Result of one publish attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Published {
        post: PublishedPost,
    },
    Failed {
        source_post: Post,
        error: String,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Published { .. })
    }
}

/// Parameters for a timeline request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineQuery {
    pub count: u32,
    pub exclude_replies: bool,
    pub extended_text: bool,
}

impl TimelineQuery {
    /// Most recent `count` posts, replies excluded, extended text requested
    pub fn recent(count: u32) -> Self {
        Self {
            count,
            exclude_replies: true,
            extended_text: true,
        }
    }
}
