use std::fmt;

use crate::models::RawPost;

/// Why a post was kept out of persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    Retweet,
    Reply,
    Quote,
    SelfMention,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Retweet => "retweet",
            RejectReason::Reply => "reply",
            RejectReason::Quote => "quote",
            RejectReason::SelfMention => "self-mention",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Admit,
    Reject(RejectReason),
}

/// Classify a post. Checks run in a fixed order and the first match wins:
/// retweet, reply, quote, then self-authored.
///
/// `self_handle` is compared case-insensitively; a leading `@` is ignored.
pub fn classify(post: &RawPost, self_handle: &str) -> Verdict {
    if post.retweeted_id.is_some() {
        return Verdict::Reject(RejectReason::Retweet);
    }
    if post.in_reply_to.is_some() {
        return Verdict::Reject(RejectReason::Reply);
    }
    if post.is_quote {
        return Verdict::Reject(RejectReason::Quote);
    }

    let self_handle = self_handle.trim_start_matches('@');
    let is_self = post
        .author
        .as_ref()
        .is_some_and(|a| !a.handle.is_empty() && a.handle.eq_ignore_ascii_case(self_handle));
    if is_self {
        return Verdict::Reject(RejectReason::SelfMention);
    }

    Verdict::Admit
}
