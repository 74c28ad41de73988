use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Platform tag written on every mention.
pub const PLATFORM_TWITTER: &str = "twitter";

/// Base URL used to build stable `source_id`s.
pub const POST_URL_BASE: &str = "https://x.com";

/// Sort order accepted by the search provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchSort {
    #[default]
    Latest,
    Top,
}

impl SearchSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchSort::Latest => "Latest",
            SearchSort::Top => "Top",
        }
    }
}

impl fmt::Display for SearchSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Author block of a post as returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostAuthor {
    /// Screen name without the leading `@`.
    pub handle: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    AnimatedGif,
    Other,
}

impl MediaKind {
    /// Map the provider's media `type` string.
    pub fn from_provider(kind: &str) -> Self {
        match kind {
            "photo" => MediaKind::Photo,
            "video" => MediaKind::Video,
            "animated_gif" => MediaKind::AnimatedGif,
            _ => MediaKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub kind: MediaKind,
    /// Direct URL of the asset (for videos and GIFs, the preview image).
    pub media_url: Option<String>,
}

/// A post pulled from the search provider. Lives for one filter decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPost {
    pub id: String,
    pub author: Option<PostAuthor>,
    pub text: Option<String>,
    pub media: Vec<MediaAttachment>,
    /// Id of the original post when this one is a retweet.
    pub retweeted_id: Option<String>,
    /// Id of the parent post when this one is a reply.
    pub in_reply_to: Option<String>,
    pub is_quote: bool,
}

impl RawPost {
    /// Stable key: the canonical post URL when the author is known, else the raw id.
    pub fn source_id(&self) -> String {
        match &self.author {
            Some(author) => format!("{}/{}/status/{}", POST_URL_BASE, author.handle, self.id),
            None => self.id.clone(),
        }
    }

    /// First attachment's direct URL, if it has one.
    ///
    /// Photos, videos and GIFs are handled the same way; an attachment
    /// without a usable URL yields `None` instead of failing the post.
    pub fn media_url(&self) -> Option<String> {
        self.media
            .first()
            .and_then(|m| m.media_url.as_deref())
            .filter(|url| !url.is_empty())
            .map(str::to_string)
    }
}

/// Moderation status of a stored mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MentionStatus {
    Pending,
    Approved,
    Rejected,
}

impl MentionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MentionStatus::Pending => "PENDING",
            MentionStatus::Approved => "APPROVED",
            MentionStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for MentionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MentionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(MentionStatus::Pending),
            "APPROVED" => Ok(MentionStatus::Approved),
            "REJECTED" => Ok(MentionStatus::Rejected),
            _ => Err(format!("Unknown mention status: {}", s)),
        }
    }
}

/// DTO for inserting a new mention. Field names match the datastore columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMention {
    pub source_id: String,
    pub content: String,
    pub author_name: String,
    pub author_handle: String,
    pub avatar_url: Option<String>,
    pub media_url: Option<String>,
    pub platform: String,
    pub status: MentionStatus,
}

impl NewMention {
    /// Normalize an admitted post into its persisted shape.
    pub fn from_post(post: &RawPost) -> Self {
        let (author_name, author_handle, avatar_url) = match &post.author {
            Some(author) => (
                author.display_name.clone(),
                author.handle.clone(),
                author.avatar_url.clone(),
            ),
            None => ("Unknown".to_string(), "unknown".to_string(), None),
        };

        Self {
            source_id: post.source_id(),
            content: post.text.clone().unwrap_or_default(),
            author_name,
            author_handle,
            avatar_url,
            media_url: post.media_url(),
            platform: PLATFORM_TWITTER.to_string(),
            status: MentionStatus::Pending,
        }
    }

    /// First `max_chars` characters of the content, for log lines.
    pub fn preview(&self, max_chars: usize) -> String {
        let mut preview: String = self.content.chars().take(max_chars).collect();
        if self.content.chars().count() > max_chars {
            preview.push_str("...");
        }
        preview
    }
}

/// A mention as stored in the datastore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mention {
    /// Store-assigned row id, rendered as text.
    #[serde(deserialize_with = "deserialize_row_id")]
    pub id: String,
    pub source_id: String,
    pub content: String,
    pub author_name: String,
    pub author_handle: String,
    pub avatar_url: Option<String>,
    pub media_url: Option<String>,
    pub platform: String,
    pub status: MentionStatus,
    pub created_at: DateTime<Utc>,
}

/// Accept both text ids (UUID columns) and numeric ids (identity columns).
fn deserialize_row_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RowId {
        Text(String),
        Integer(i64),
    }

    Ok(match RowId::deserialize(deserializer)? {
        RowId::Text(id) => id,
        RowId::Integer(id) => id.to_string(),
    })
}
