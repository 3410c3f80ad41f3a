//! WordPress GraphQL client supplying the home feed candidate lists.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::application::repos::{HomeContentSource, RepoError};
use crate::domain::home::{FeedSource, HomePost};

const POSTS_QUERY: &str = r#"
query HomeFeedPosts($first: Int!, $where: RootQueryToPostConnectionWhereArgs) {
  posts(first: $first, where: $where) {
    nodes {
      id
      databaseId
      slug
      title
      date
      excerpt
      featuredImage { node { sourceUrl } }
    }
  }
}
"#;

#[derive(Debug, Clone)]
pub struct WordPressSettings {
    pub endpoint: Url,
    /// Tag marking editor-picked frontpage stories.
    pub frontpage_tag: String,
    /// Tags feeding the secondary candidate list.
    pub featured_tags: Vec<String>,
    /// Edition code stamped on every post, used by the dedup key.
    pub country: Option<String>,
}

#[derive(Clone)]
pub struct WordPressSource {
    http: Client,
    settings: WordPressSettings,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<PostsData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct PostsData {
    posts: Option<PostConnection>,
}

#[derive(Debug, Deserialize)]
struct PostConnection {
    #[serde(default)]
    nodes: Vec<PostNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostNode {
    id: Option<String>,
    database_id: Option<i64>,
    slug: Option<String>,
    title: Option<String>,
    date: Option<String>,
    excerpt: Option<String>,
    featured_image: Option<FeaturedImage>,
}

#[derive(Debug, Deserialize)]
struct FeaturedImage {
    node: Option<ImageNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageNode {
    source_url: Option<String>,
}

impl PostNode {
    fn into_home_post(self, country: Option<&str>) -> HomePost {
        HomePost {
            id: self.id,
            database_id: self.database_id,
            slug: self.slug,
            title: self.title,
            date: self.date,
            excerpt: self.excerpt,
            country: country.map(str::to_string),
            featured_image: self
                .featured_image
                .and_then(|image| image.node)
                .and_then(|node| node.source_url),
        }
    }
}

impl WordPressSource {
    pub fn new(http: Client, settings: WordPressSettings) -> Self {
        Self { http, settings }
    }

    fn where_clause(&self, source: FeedSource) -> Option<serde_json::Value> {
        match source {
            FeedSource::Frontpage => Some(json!({ "tag": self.settings.frontpage_tag })),
            FeedSource::Tagged => Some(json!({ "tagSlugIn": self.settings.featured_tags })),
            FeedSource::Recent => None,
        }
    }
}

fn parse_posts(response: GraphqlResponse, country: Option<&str>) -> Result<Vec<HomePost>, RepoError> {
    if let Some(first) = response.errors.first() {
        return Err(RepoError::upstream(format!("graphql: {}", first.message)));
    }
    let nodes = response
        .data
        .and_then(|data| data.posts)
        .map(|connection| connection.nodes)
        .unwrap_or_default();
    Ok(nodes
        .into_iter()
        .map(|node| node.into_home_post(country))
        .collect())
}

#[async_trait]
impl HomeContentSource for WordPressSource {
    async fn fetch_posts(
        &self,
        source: FeedSource,
        limit: usize,
    ) -> Result<Vec<HomePost>, RepoError> {
        if source == FeedSource::Tagged && self.settings.featured_tags.is_empty() {
            return Ok(Vec::new());
        }

        let body = json!({
            "query": POSTS_QUERY,
            "variables": { "first": limit, "where": self.where_clause(source) },
        });
        let response = self
            .http
            .post(self.settings.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    RepoError::Timeout
                } else {
                    RepoError::upstream(err)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RepoError::upstream(format!("wordpress returned {status}")));
        }

        let payload: GraphqlResponse = response.json().await.map_err(RepoError::upstream)?;
        let posts = parse_posts(payload, self.settings.country.as_deref())?;
        debug!(
            target = "noa::wordpress",
            source = source.as_str(),
            posts = posts.len(),
            "fetched home feed candidates"
        );
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodes_map_to_home_posts() {
        let response: GraphqlResponse = serde_json::from_value(json!({
            "data": { "posts": { "nodes": [{
                "id": "cG9zdDox",
                "databaseId": 1,
                "slug": "lagos-rains",
                "title": "Lagos rains",
                "date": "2024-05-01T10:00:00",
                "excerpt": "<p>Flooding</p>",
                "featuredImage": { "node": { "sourceUrl": "https://cdn.example/rain.jpg" } }
            }, {
                "id": null,
                "databaseId": 2,
                "slug": null,
                "title": null,
                "date": null,
                "excerpt": null,
                "featuredImage": null
            }]}}
        }))
        .expect("response");

        let posts = parse_posts(response, Some("ng")).expect("posts");
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].featured_image.as_deref(), Some("https://cdn.example/rain.jpg"));
        assert_eq!(posts[1].country.as_deref(), Some("ng"));
        assert_eq!(posts[1].database_id, Some(2));
    }

    #[test]
    fn graphql_errors_fail_the_source() {
        let response: GraphqlResponse = serde_json::from_value(json!({
            "data": null,
            "errors": [{ "message": "Internal server error" }]
        }))
        .expect("response");
        assert!(matches!(
            parse_posts(response, None),
            Err(RepoError::Upstream(message)) if message.contains("Internal server error")
        ));
    }

    #[test]
    fn missing_connection_is_empty() {
        let response: GraphqlResponse =
            serde_json::from_value(json!({ "data": { "posts": null } })).expect("response");
        assert!(parse_posts(response, None).expect("posts").is_empty());
    }
}
