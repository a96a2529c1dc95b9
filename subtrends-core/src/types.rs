use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const REDDIT_PUBLIC_URL: &str = "https://reddit.com";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub body: String,
    pub score: i64,
    pub author: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub title: String,
    pub url: String,
    pub score: i64,
    pub subreddit: String,
    pub author: String,
    pub selftext: String,
    pub num_comments: u64,
    pub permalink: String,
    pub created_utc: i64,
    pub comments: Vec<Comment>,
}

impl Post {
    /// Canonical link for the post: the Reddit permalink when known, else the
    /// submitted URL.
    pub fn full_url(&self) -> String {
        if self.permalink.is_empty() {
            self.url.clone()
        } else {
            format!("{}{}", REDDIT_PUBLIC_URL, self.permalink)
        }
    }
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] r/{}: {}", self.score, self.subreddit, self.title)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceGroup {
    pub name: String,
    pub subreddits: Vec<String>,
    pub posts: Vec<Post>,
}

impl fmt::Display for SourceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} posts from {} subreddits",
            self.name,
            self.posts.len(),
            self.subreddits.len()
        )
    }
}

/// OAuth bearer token as persisted in the token file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    pub fn new(access_token: impl Into<String>, expires_in: Duration) -> Self {
        Self::issued_at(access_token, expires_in, Utc::now())
    }

    pub fn issued_at(
        access_token: impl Into<String>,
        expires_in: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let lifetime = ChronoDuration::from_std(expires_in).unwrap_or(ChronoDuration::zero());
        Self {
            access_token: access_token.into(),
            expires_at: now + lifetime,
        }
    }

    pub fn is_valid(&self, buffer: Duration) -> bool {
        self.is_valid_at(Utc::now(), buffer)
    }

    /// `now < expires_at - buffer`
    pub fn is_valid_at(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        let buffer = ChronoDuration::from_std(buffer).unwrap_or(ChronoDuration::zero());
        now < self.expires_at - buffer
    }
}
