pub mod aggregation;
pub mod service;

pub use aggregation::{
    AggregatedHomeFeed, aggregate_home_feed, dedupe_home_posts, home_post_dedup_key,
    select_best_home_feed_candidate,
};
pub use service::{HomeFeedError, HomeFeedPolicy, HomeFeedService};
