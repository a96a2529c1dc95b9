use futures::future::join_all;
use reddit_client::RedditClient;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use subtrends_core::{CoreError, Post, SourceGroup};
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

/// Anything that can produce the posts (with comments) of one subreddit.
pub trait PostSource: Send + Sync + 'static {
    fn fetch_posts_with_comments(
        &self,
        subreddit: &str,
        num_posts: u32,
        num_comments: u32,
    ) -> impl Future<Output = Result<Vec<Post>, CoreError>> + Send;
}

impl PostSource for RedditClient {
    fn fetch_posts_with_comments(
        &self,
        subreddit: &str,
        num_posts: u32,
        num_comments: u32,
    ) -> impl Future<Output = Result<Vec<Post>, CoreError>> + Send {
        async move {
            Ok(RedditClient::fetch_posts_with_comments(self, subreddit, num_posts, num_comments).await)
        }
    }
}

/// Fetches every subreddit of a configured group concurrently and merges
/// the results into one score-ordered list.
pub struct NewsFetcher<S: PostSource> {
    source: Arc<S>,
    groups: BTreeMap<String, Vec<String>>,
    num_posts: u32,
    num_comments: u32,
}

impl<S: PostSource> NewsFetcher<S> {
    pub fn new(
        source: Arc<S>,
        groups: BTreeMap<String, Vec<String>>,
        num_posts: u32,
        num_comments: u32,
    ) -> Self {
        let groups = groups
            .into_iter()
            .map(|(name, subreddits)| (name.to_lowercase(), subreddits))
            .collect();

        Self {
            source,
            groups,
            num_posts,
            num_comments,
        }
    }

    /// Configured groups, sorted by name.
    pub fn available_groups(&self) -> &BTreeMap<String, Vec<String>> {
        &self.groups
    }

    pub async fn fetch_group(&self, group_name: &str) -> Result<SourceGroup, CoreError> {
        let name = group_name.trim().to_lowercase();
        let subreddits = self
            .groups
            .get(&name)
            .cloned()
            .ok_or_else(|| CoreError::NotFound {
                group: group_name.trim().to_string(),
                available: self.groups.keys().cloned().collect(),
            })?;

        let span = info_span!("fetch_group", group = %name, run_id = %Uuid::new_v4());
        self.fetch_subreddits(name, subreddits).instrument(span).await
    }

    async fn fetch_subreddits(
        &self,
        name: String,
        subreddits: Vec<String>,
    ) -> Result<SourceGroup, CoreError> {
        info!(
            "Fetching news for group '{}' from {} subreddits",
            name,
            subreddits.len()
        );

        let handles = subreddits.iter().map(|subreddit| {
            let source = Arc::clone(&self.source);
            let subreddit = subreddit.clone();
            let (num_posts, num_comments) = (self.num_posts, self.num_comments);
            tokio::spawn(
                async move {
                    debug!("Fetching from r/{}", subreddit);
                    source
                        .fetch_posts_with_comments(&subreddit, num_posts, num_comments)
                        .await
                }
                .in_current_span(),
            )
        });
        let results = join_all(handles).await;

        let mut posts: Vec<Post> = Vec::new();
        for (subreddit, result) in subreddits.iter().zip(results) {
            match result {
                Ok(Ok(fetched)) => {
                    debug!("Fetched {} posts from r/{}", fetched.len(), subreddit);
                    posts.extend(fetched);
                }
                Ok(Err(e)) => error!("Failed to fetch r/{}: {}", subreddit, e),
                Err(e) if e.is_panic() => error!("Fetch task for r/{} panicked", subreddit),
                Err(e) => error!("Fetch task for r/{} did not complete: {}", subreddit, e),
            }
        }

        // Stable: equal scores keep their source order.
        posts.sort_by(|a, b| b.score.cmp(&a.score));

        info!("Fetched total of {} posts for group '{}'", posts.len(), name);
        Ok(SourceGroup {
            name,
            subreddits,
            posts,
        })
    }
}
