//! In-memory adapters for driving the router without Supabase or WordPress.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

use noa::application::auth::{AuthError, Authenticator};
use noa::application::bookmarks::{BookmarkPolicy, BookmarkService};
use noa::application::comments::{CommentPolicy, CommentService};
use noa::application::home::{HomeFeedPolicy, HomeFeedService};
use noa::application::rate_limit::RateLimiter;
use noa::application::repos::{
    BookmarkCountersRepo, BookmarkListQuery, BookmarkPatch, BookmarkSelector, BookmarksRepo,
    CollectionFilter, CommentListQuery, CommentsRepo, CreateBookmarkParams, CreateCommentParams,
    HomeContentSource, RepoError,
};
use noa::cache::{CacheBackend, EdgeCache, EdgeCacheConfig};
use noa::domain::bookmarks::{BookmarkCounters, BookmarkListRow, ReadState};
use noa::domain::comments::{Comment, CommentSort, CommentStatus};
use noa::domain::home::{FeedSource, HomePost};
use noa::domain::users::{AuthUser, UserRole};
use noa::infra::http::{AppState, build_router};

pub const READER_TOKEN: &str = "reader-token";
pub const OTHER_TOKEN: &str = "other-token";
pub const MODERATOR_TOKEN: &str = "moderator-token";

#[derive(Default)]
pub struct MemoryComments {
    rows: Mutex<Vec<Comment>>,
}

impl MemoryComments {
    /// Stores `comment` as is, bypassing the service.
    pub async fn seed(&self, comment: Comment) {
        self.rows.lock().await.push(comment);
    }
}

/// Column value as PostgREST would compare it; `None` is SQL `NULL`.
enum ColumnValue {
    Text(String),
    Number(f64),
    Null,
}

fn comment_column(comment: &Comment, column: &str) -> ColumnValue {
    match column {
        "created_at" => ColumnValue::Text(comment.created_at.clone()),
        "id" => ColumnValue::Text(comment.id.to_string()),
        "reaction_count" => comment
            .reaction_count
            .map_or(ColumnValue::Null, |count| ColumnValue::Number(count as f64)),
        other => panic!("comments have no `{other}` column"),
    }
}

fn bookmark_column(row: &BookmarkListRow, column: &str) -> ColumnValue {
    match column {
        "created_at" => ColumnValue::Text(row.created_at.clone()),
        "id" => ColumnValue::Text(row.id.to_string()),
        other => panic!("bookmarks have no `{other}` column"),
    }
}

/// Evaluates PostgREST keyset conditions, ORed together, against one row.
fn keyset_allows(conditions: &[String], column: impl Fn(&str) -> ColumnValue) -> bool {
    conditions.is_empty()
        || conditions.iter().any(|condition| {
            match condition
                .strip_prefix("and(")
                .and_then(|rest| rest.strip_suffix(')'))
            {
                Some(inner) => split_top_level(inner)
                    .iter()
                    .all(|predicate| predicate_holds(predicate, &column)),
                None => predicate_holds(condition, &column),
            }
        })
}

fn predicate_holds(predicate: &str, column: &impl Fn(&str) -> ColumnValue) -> bool {
    let mut parts = predicate.splitn(3, '.');
    let (Some(name), Some(op), Some(raw)) = (parts.next(), parts.next(), parts.next()) else {
        panic!("malformed predicate `{predicate}`");
    };
    let value = unquote(raw);
    let ordering = match (column(name), op) {
        (ColumnValue::Null, "is") => return value == "null",
        (_, "is") => return false,
        (ColumnValue::Null, _) => return false,
        (ColumnValue::Text(text), _) => text.as_str().cmp(value.as_str()),
        (ColumnValue::Number(number), _) => {
            let bound: f64 = value.parse().expect("numeric filter value");
            number.partial_cmp(&bound).expect("finite values")
        }
    };
    match op {
        "lt" => ordering.is_lt(),
        "gt" => ordering.is_gt(),
        "eq" => ordering.is_eq(),
        other => panic!("unsupported operator `{other}`"),
    }
}

fn split_top_level(inner: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut escaped = false;
    for ch in inner.chars() {
        match ch {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ',' if !quoted => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    parts.push(current);
    parts
}

fn unquote(raw: &str) -> String {
    let Some(inner) = raw.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')) else {
        return raw.to_string();
    };
    let mut value = String::new();
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            value.extend(chars.next());
        } else {
            value.push(ch);
        }
    }
    value
}

#[async_trait]
impl CommentsRepo for MemoryComments {
    async fn list_comments(&self, query: &CommentListQuery) -> Result<Vec<Comment>, RepoError> {
        let rows = self.rows.lock().await;
        let mut matching: Vec<Comment> = rows
            .iter()
            .filter(|comment| comment.wp_post_id == query.wp_post_id)
            .filter(|comment| comment.status == query.status)
            .filter(|comment| {
                query
                    .edition_code
                    .as_ref()
                    .is_none_or(|edition| comment.edition_code.as_ref() == Some(edition))
            })
            .filter(|comment| {
                keyset_allows(&query.cursor_conditions, |column| comment_column(comment, column))
            })
            .cloned()
            .collect();
        match query.sort {
            CommentSort::Newest => matching.sort_by(|a, b| {
                (b.created_at.as_str(), b.id).cmp(&(a.created_at.as_str(), a.id))
            }),
            CommentSort::Oldest => matching.sort_by(|a, b| {
                (a.created_at.as_str(), a.id).cmp(&(b.created_at.as_str(), b.id))
            }),
            CommentSort::Popular => matching.sort_by(|a, b| {
                a.reaction_count
                    .is_none()
                    .cmp(&b.reaction_count.is_none())
                    .then_with(|| b.reaction_count.cmp(&a.reaction_count))
                    .then_with(|| b.created_at.cmp(&a.created_at))
                    .then_with(|| b.id.cmp(&a.id))
            }),
        }
        matching.truncate(query.limit as usize);
        Ok(matching)
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<Comment>, RepoError> {
        Ok(self.rows.lock().await.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_comment(&self, params: CreateCommentParams) -> Result<Comment, RepoError> {
        let mut rows = self.rows.lock().await;
        let comment = Comment {
            id: Uuid::new_v4(),
            wp_post_id: params.wp_post_id,
            body: params.body,
            user_id: params.user_id,
            edition_code: params.edition_code,
            status: params.status,
            created_at: format!("2024-05-01T10:{:02}:00+00:00", rows.len()),
            reaction_count: Some(0),
        };
        rows.push(comment.clone());
        Ok(comment)
    }

    async fn update_comment_body(&self, id: Uuid, body: &str) -> Result<Comment, RepoError> {
        let mut rows = self.rows.lock().await;
        let comment = rows
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(RepoError::NotFound)?;
        comment.body = body.to_string();
        Ok(comment.clone())
    }

    async fn update_comment_status(
        &self,
        id: Uuid,
        status: CommentStatus,
    ) -> Result<Comment, RepoError> {
        let mut rows = self.rows.lock().await;
        let comment = rows
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(RepoError::NotFound)?;
        comment.status = status;
        Ok(comment.clone())
    }
}

#[derive(Default)]
pub struct MemoryBookmarks {
    rows: Mutex<Vec<BookmarkListRow>>,
    counters: Mutex<HashMap<Uuid, BookmarkCounters>>,
    inserted: AtomicUsize,
}

impl MemoryBookmarks {
    pub async fn counters_for(&self, user_id: Uuid) -> Option<BookmarkCounters> {
        self.counters.lock().await.get(&user_id).cloned()
    }
}

#[async_trait]
impl BookmarksRepo for MemoryBookmarks {
    async fn list_bookmarks(
        &self,
        user_id: Uuid,
        query: &BookmarkListQuery,
    ) -> Result<Vec<BookmarkListRow>, RepoError> {
        let rows = self.rows.lock().await;
        let mut matching: Vec<BookmarkListRow> = rows
            .iter()
            .filter(|row| row.user_id == user_id)
            .filter(|row| match query.collection {
                Some(CollectionFilter::Uncollected) => row.collection_id.is_none(),
                Some(CollectionFilter::Collection(id)) => row.collection_id == Some(id),
                None => true,
            })
            .filter(|row| query.read_state.is_none_or(|state| row.read_state == state))
            .filter(|row| {
                keyset_allows(&query.cursor_conditions, |column| bookmark_column(row, column))
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| (b.created_at.as_str(), b.id).cmp(&(a.created_at.as_str(), a.id)));
        Ok(matching
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }

    async fn find_bookmark(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<BookmarkListRow>, RepoError> {
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .find(|row| row.user_id == user_id && row.id == id)
            .cloned())
    }

    async fn insert_bookmark(
        &self,
        params: CreateBookmarkParams,
    ) -> Result<BookmarkListRow, RepoError> {
        let mut rows = self.rows.lock().await;
        if rows
            .iter()
            .any(|row| row.user_id == params.user_id && row.post_id == params.post_id)
        {
            return Err(RepoError::Duplicate {
                constraint: "bookmarks_user_id_post_id_key".to_string(),
            });
        }
        let n = self.inserted.fetch_add(1, Ordering::SeqCst);
        let row = BookmarkListRow {
            id: Uuid::new_v4(),
            user_id: params.user_id,
            post_id: params.post_id,
            collection_id: params.collection_id,
            read_state: ReadState::Unread,
            created_at: format!("2024-05-01T10:{n:02}:00+00:00"),
            slug: params.slug,
            title: params.title,
            edition_code: params.edition_code,
            featured_image: params.featured_image,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn update_bookmark(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: &BookmarkPatch,
    ) -> Result<BookmarkListRow, RepoError> {
        let mut rows = self.rows.lock().await;
        let row = rows
            .iter_mut()
            .find(|row| row.user_id == user_id && row.id == id)
            .ok_or(RepoError::NotFound)?;
        if let Some(state) = patch.read_state {
            row.read_state = state;
        }
        if let Some(collection) = patch.collection_id {
            row.collection_id = collection;
        }
        Ok(row.clone())
    }

    async fn delete_bookmarks(
        &self,
        user_id: Uuid,
        selector: &BookmarkSelector,
    ) -> Result<Vec<BookmarkListRow>, RepoError> {
        let mut rows = self.rows.lock().await;
        let selected = |row: &BookmarkListRow| {
            row.user_id == user_id
                && match selector {
                    BookmarkSelector::Ids(ids) => ids.contains(&row.id),
                    BookmarkSelector::PostId(post_id) => &row.post_id == post_id,
                }
        };
        let removed: Vec<BookmarkListRow> = rows.iter().filter(|row| selected(row)).cloned().collect();
        rows.retain(|row| !selected(row));
        Ok(removed)
    }
}

#[async_trait]
impl BookmarkCountersRepo for MemoryBookmarks {
    async fn load_counters(&self, user_id: Uuid) -> Result<Option<BookmarkCounters>, RepoError> {
        Ok(self.counters.lock().await.get(&user_id).cloned())
    }

    async fn save_counters(&self, counters: &BookmarkCounters) -> Result<(), RepoError> {
        self.counters
            .lock()
            .await
            .insert(counters.user_id, counters.clone());
        Ok(())
    }
}

pub struct StaticAuthenticator {
    users: HashMap<&'static str, AuthUser>,
}

impl StaticAuthenticator {
    pub fn new(users: &TestUsers) -> Self {
        let mut map = HashMap::new();
        map.insert(READER_TOKEN, users.reader.clone());
        map.insert(OTHER_TOKEN, users.other.clone());
        map.insert(MODERATOR_TOKEN, users.moderator.clone());
        Self { users: map }
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<AuthUser, AuthError> {
        self.users
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}

/// Serves fixed candidates and counts how often each source is fetched.
pub struct FixedSource {
    pub frontpage: Result<Vec<HomePost>, ()>,
    pub tagged: Result<Vec<HomePost>, ()>,
    pub recent: Result<Vec<HomePost>, ()>,
    pub calls: AtomicUsize,
}

impl FixedSource {
    pub fn new(frontpage: Vec<HomePost>, recent: Vec<HomePost>) -> Self {
        Self {
            frontpage: Ok(frontpage),
            tagged: Ok(Vec::new()),
            recent: Ok(recent),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            frontpage: Err(()),
            tagged: Err(()),
            recent: Err(()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HomeContentSource for FixedSource {
    async fn fetch_posts(
        &self,
        source: FeedSource,
        limit: usize,
    ) -> Result<Vec<HomePost>, RepoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let list = match source {
            FeedSource::Frontpage => &self.frontpage,
            FeedSource::Tagged => &self.tagged,
            FeedSource::Recent => &self.recent,
        };
        match list {
            Ok(posts) => Ok(posts.iter().take(limit).cloned().collect()),
            Err(()) => Err(RepoError::upstream("wordpress unavailable")),
        }
    }
}

pub fn post(id: i64, slug: &str) -> HomePost {
    HomePost {
        id: Some(format!("post-{id}")),
        database_id: Some(id),
        slug: Some(slug.to_string()),
        title: Some(slug.replace('-', " ")),
        date: Some("2024-05-01T10:00:00".to_string()),
        excerpt: None,
        country: Some("ng".to_string()),
        featured_image: None,
    }
}

pub struct TestUsers {
    pub reader: AuthUser,
    pub other: AuthUser,
    pub moderator: AuthUser,
}

impl Default for TestUsers {
    fn default() -> Self {
        Self {
            reader: AuthUser::reader(Uuid::new_v4()),
            other: AuthUser::reader(Uuid::new_v4()),
            moderator: AuthUser {
                id: Uuid::new_v4(),
                email: Some("desk@newsonafrica.com".to_string()),
                role: UserRole::Moderator,
            },
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub users: TestUsers,
    pub comments: Arc<MemoryComments>,
    pub bookmarks: Arc<MemoryBookmarks>,
    pub source: Arc<FixedSource>,
}

pub struct TestAppBuilder {
    source: FixedSource,
    backend: Option<Arc<dyn CacheBackend>>,
    cache_config: EdgeCacheConfig,
    comment_limit: u32,
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self {
            source: FixedSource::new(vec![post(1, "lagos-rains")], vec![post(2, "nairobi-budget")]),
            backend: None,
            cache_config: EdgeCacheConfig::default(),
            comment_limit: 10,
        }
    }
}

impl TestAppBuilder {
    pub fn source(mut self, source: FixedSource) -> Self {
        self.source = source;
        self
    }

    pub fn backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn cache_config(mut self, config: EdgeCacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    pub fn comment_limit(mut self, limit: u32) -> Self {
        self.comment_limit = limit;
        self
    }

    pub fn build(self) -> TestApp {
        let users = TestUsers::default();
        let comments = Arc::new(MemoryComments::default());
        let bookmarks = Arc::new(MemoryBookmarks::default());
        let source = Arc::new(self.source);

        let home_service = HomeFeedService::new(source.clone(), HomeFeedPolicy::default());
        let state = AppState {
            comments: Arc::new(CommentService::new(
                comments.clone(),
                CommentPolicy::default(),
            )),
            bookmarks: Arc::new(BookmarkService::new(
                bookmarks.clone(),
                bookmarks.clone(),
                BookmarkPolicy::default(),
            )),
            home_feed: EdgeCache::new(self.backend, Arc::new(home_service), self.cache_config),
            authenticator: Arc::new(StaticAuthenticator::new(&users)),
            comment_limiter: RateLimiter::new(Duration::from_secs(60), self.comment_limit),
        };

        TestApp {
            router: build_router(state),
            users,
            comments,
            bookmarks,
            source,
        }
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    request("GET", uri, token, None)
}

pub fn request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).expect("request")
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}
