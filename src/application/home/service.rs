use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::{info, warn};

use crate::application::home::aggregation::aggregate_home_feed;
use crate::application::repos::{HomeContentSource, RepoError};
use crate::cache::{CacheFill, FillError};
use crate::domain::home::{FeedSource, HomeFeed, HomeFeedCandidate, HomePost};

#[derive(Debug, Error)]
pub enum HomeFeedError {
    #[error("every home feed source failed")]
    AllSourcesFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HomeFeedPolicy {
    /// Posts requested from each source.
    pub candidate_limit: usize,
    /// Posts kept in the merged feed.
    pub feed_limit: usize,
}

impl Default for HomeFeedPolicy {
    fn default() -> Self {
        Self {
            candidate_limit: 20,
            feed_limit: 30,
        }
    }
}

#[derive(Clone)]
pub struct HomeFeedService {
    source: Arc<dyn HomeContentSource>,
    policy: HomeFeedPolicy,
}

impl HomeFeedService {
    pub fn new(source: Arc<dyn HomeContentSource>, policy: HomeFeedPolicy) -> Self {
        Self { source, policy }
    }

    pub async fn build(&self) -> Result<HomeFeed, HomeFeedError> {
        let limit = self.policy.candidate_limit;
        let (frontpage, tagged, recent) = futures::join!(
            self.source.fetch_posts(FeedSource::Frontpage, limit),
            self.source.fetch_posts(FeedSource::Tagged, limit),
            self.source.fetch_posts(FeedSource::Recent, limit),
        );

        let candidates = vec![
            candidate(FeedSource::Frontpage, frontpage),
            candidate(FeedSource::Tagged, tagged),
            candidate(FeedSource::Recent, recent),
        ];
        if candidates.iter().all(Option::is_none) {
            return Err(HomeFeedError::AllSourcesFailed);
        }

        let aggregated = aggregate_home_feed(candidates, self.policy.feed_limit);
        info!(
            target = "noa::home_feed",
            source = aggregated.source.map(FeedSource::as_str),
            posts = aggregated.posts.len(),
            "home feed built"
        );

        Ok(HomeFeed {
            source: aggregated.source,
            posts: aggregated.posts,
            generated_at: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default(),
        })
    }
}

fn candidate(
    source: FeedSource,
    fetched: Result<Vec<HomePost>, RepoError>,
) -> Option<HomeFeedCandidate> {
    match fetched {
        Ok(posts) => Some(HomeFeedCandidate::new(source, posts)),
        Err(err) => {
            warn!(
                target = "noa::home_feed",
                source = source.as_str(),
                error = %err,
                "home feed source failed"
            );
            None
        }
    }
}

#[async_trait]
impl CacheFill for HomeFeedService {
    type Value = HomeFeed;

    async fn fill(&self) -> Result<HomeFeed, FillError> {
        self.build()
            .await
            .map_err(|err| FillError::new(err.to_string()))
    }
}
