//! Home feed posts and the candidate lists they are selected from.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedSource {
    Frontpage,
    Tagged,
    Recent,
}

impl FeedSource {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedSource::Frontpage => "frontpage",
            FeedSource::Tagged => "tagged",
            FeedSource::Recent => "recent",
        }
    }

    /// Fixed priority used when ranking candidates.
    pub fn weight(self) -> i64 {
        match self {
            FeedSource::Frontpage => 1000,
            FeedSource::Tagged => 500,
            FeedSource::Recent => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomePost {
    /// Global relay id from WPGraphQL.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub database_id: Option<i64>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub featured_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeFeedCandidate {
    pub source: FeedSource,
    pub posts: Vec<HomePost>,
}

impl HomeFeedCandidate {
    pub fn new(source: FeedSource, posts: Vec<HomePost>) -> Self {
        Self { source, posts }
    }
}

/// Payload served by the home feed endpoint and stored in the edge cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeFeed {
    pub source: Option<FeedSource>,
    pub posts: Vec<HomePost>,
    pub generated_at: String,
}
