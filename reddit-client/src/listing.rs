use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Deserializer};
use subtrends_core::{Comment, Post};
use tracing::debug;

/// Posts older than this, relative to the fetch, are dropped.
pub const POST_MAX_AGE_HOURS: i64 = 24;

const COMMENT_KIND: &str = "t1";
const TOMBSTONES: [&str; 2] = ["[deleted]", "[removed]"];
const DELETED_AUTHOR: &str = "[deleted]";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedditListing<T> {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedditListingData<T> {
    #[serde(default)]
    pub children: Vec<RedditListingChild<T>>,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedditListingChild<T> {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub data: T,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RedditPostData {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub score: i64,
    pub subreddit: Option<String>,
    pub author: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub selftext: String,
    #[serde(deserialize_with = "null_as_default")]
    pub num_comments: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub permalink: String,
    #[serde(deserialize_with = "null_as_default")]
    pub created_utc: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RedditCommentData {
    pub body: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub score: i64,
    pub author: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl RedditPostData {
    fn into_post(self, fallback_subreddit: &str) -> Post {
        Post {
            title: self.title,
            url: self.url,
            score: self.score,
            subreddit: self
                .subreddit
                .unwrap_or_else(|| fallback_subreddit.to_string()),
            author: self.author.unwrap_or_else(|| DELETED_AUTHOR.to_string()),
            selftext: self.selftext,
            num_comments: self.num_comments,
            permalink: self.permalink,
            created_utc: self.created_utc as i64,
            comments: Vec::new(),
        }
    }
}

/// Posts from a top listing that were created within the last day of `now`.
pub fn parse_posts(
    listing: RedditListing<RedditPostData>,
    fallback_subreddit: &str,
    now: DateTime<Utc>,
) -> Vec<Post> {
    let cutoff = (now - ChronoDuration::hours(POST_MAX_AGE_HOURS)).timestamp();
    let total = listing.data.children.len();

    let posts: Vec<Post> = listing
        .data
        .children
        .into_iter()
        .map(|child| child.data)
        .filter(|data| data.created_utc as i64 >= cutoff)
        .map(|data| data.into_post(fallback_subreddit))
        .collect();

    if posts.len() < total {
        debug!(
            "Skipped {} posts older than {}h in r/{}",
            total - posts.len(),
            POST_MAX_AGE_HOURS,
            fallback_subreddit
        );
    }
    posts
}

/// Comments among the first `limit` children, skipping non-comment kinds and
/// deleted or removed bodies.
pub fn parse_comments(listing: RedditListing<RedditCommentData>, limit: usize) -> Vec<Comment> {
    listing
        .data
        .children
        .into_iter()
        .take(limit)
        .filter(|child| child.kind == COMMENT_KIND)
        .filter_map(|child| {
            let body = child.data.body?;
            if body.is_empty() || TOMBSTONES.contains(&body.as_str()) {
                return None;
            }
            Some(Comment {
                body,
                score: child.data.score,
                author: child
                    .data
                    .author
                    .unwrap_or_else(|| DELETED_AUTHOR.to_string()),
            })
        })
        .collect()
}

/// The comments endpoint answers `[post_listing, comment_listing]`.
pub fn comment_listing_from_thread(
    mut thread: Vec<serde_json::Value>,
) -> Result<Option<RedditListing<RedditCommentData>>, serde_json::Error> {
    if thread.len() < 2 {
        return Ok(None);
    }
    let listing = serde_json::from_value(thread.swap_remove(1))?;
    Ok(Some(listing))
}
