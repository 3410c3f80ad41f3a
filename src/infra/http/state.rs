use std::sync::Arc;

use crate::application::auth::Authenticator;
use crate::application::bookmarks::BookmarkService;
use crate::application::comments::CommentService;
use crate::application::home::HomeFeedService;
use crate::application::rate_limit::RateLimiter;
use crate::cache::EdgeCache;

#[derive(Clone)]
pub struct AppState {
    pub comments: Arc<CommentService>,
    pub bookmarks: Arc<BookmarkService>,
    pub home_feed: EdgeCache<HomeFeedService>,
    pub authenticator: Arc<dyn Authenticator>,
    /// Keyed by user id; guards comment creation.
    pub comment_limiter: RateLimiter,
}
