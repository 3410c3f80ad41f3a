//! Picking and merging the home feed candidate lists.

use std::collections::HashSet;

use crate::domain::home::{FeedSource, HomeFeedCandidate, HomePost};

const EMPTY_CANDIDATE_SCORE: i64 = -1;

fn candidate_score(candidate: &HomeFeedCandidate) -> i64 {
    if candidate.posts.is_empty() {
        return EMPTY_CANDIDATE_SCORE;
    }
    candidate.source.weight() + candidate.posts.len() as i64
}

/// Highest scoring candidate; the first one seen wins ties.
///
/// An empty candidate scores below every non-empty one, whatever its source, so
/// an empty frontpage list never hides a populated recent list.
pub fn select_best_home_feed_candidate<I>(candidates: I) -> Option<HomeFeedCandidate>
where
    I: IntoIterator<Item = Option<HomeFeedCandidate>>,
{
    let mut best: Option<(i64, HomeFeedCandidate)> = None;
    for candidate in candidates.into_iter().flatten() {
        let score = candidate_score(&candidate);
        let replace = match &best {
            Some((best_score, _)) => score > *best_score,
            None => true,
        };
        if replace {
            best = Some((score, candidate));
        }
    }
    best.map(|(_, candidate)| candidate)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Identity used to drop the same article surfacing in several candidate lists.
pub fn home_post_dedup_key(post: &HomePost) -> String {
    if let Some(id) = non_empty(post.id.as_deref()) {
        return id.to_string();
    }

    let country = non_empty(post.country.as_deref()).unwrap_or_default();
    if let Some(database_id) = post.database_id {
        return format!("{country}:{database_id}");
    }

    let slug = non_empty(post.slug.as_deref());
    if let Some(slug) = slug {
        return format!("{country}:{slug}");
    }

    let title = non_empty(post.title.as_deref()).unwrap_or_default();
    let date = non_empty(post.date.as_deref()).unwrap_or_default();
    format!("{country}::{title}:{date}")
}

pub fn dedupe_home_posts<I>(posts: I) -> Vec<HomePost>
where
    I: IntoIterator<Item = HomePost>,
{
    let mut seen = HashSet::new();
    posts
        .into_iter()
        .filter(|post| seen.insert(home_post_dedup_key(post)))
        .collect()
}

/// Result of merging candidates: the winning source and the merged post list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedHomeFeed {
    pub source: Option<FeedSource>,
    pub posts: Vec<HomePost>,
}

/// Leads with the best candidate, then fills from the others in source priority order.
pub fn aggregate_home_feed(
    candidates: Vec<Option<HomeFeedCandidate>>,
    limit: usize,
) -> AggregatedHomeFeed {
    let Some(best) = select_best_home_feed_candidate(candidates.iter().cloned()) else {
        return AggregatedHomeFeed {
            source: None,
            posts: Vec::new(),
        };
    };

    let mut rest: Vec<HomeFeedCandidate> = candidates
        .into_iter()
        .flatten()
        .filter(|candidate| candidate.source != best.source)
        .collect();
    rest.sort_by_key(|candidate| std::cmp::Reverse(candidate.source.weight()));

    let source = best.source;
    let merged = best
        .posts
        .into_iter()
        .chain(rest.into_iter().flat_map(|candidate| candidate.posts));

    let mut posts = dedupe_home_posts(merged);
    posts.truncate(limit);

    AggregatedHomeFeed {
        source: Some(source),
        posts,
    }
}
