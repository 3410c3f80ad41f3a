pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

pub use state::AppState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, patch, post},
};

use middleware::{log_responses, require_user, set_request_context};

pub const RATE_LIMITED_METRIC: &str = "noa_rate_limited_total";

/// Public routes plus the bearer-authenticated comment and bookmark routes.
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/home-feed", get(handlers::home_feed))
        .route("/api/comments", get(handlers::list_comments));

    let authenticated = Router::new()
        .route("/api/comments", post(handlers::create_comment))
        .route(
            "/api/comments/{id}",
            patch(handlers::edit_comment).delete(handlers::delete_comment),
        )
        .route(
            "/api/comments/{id}/status",
            post(handlers::moderate_comment),
        )
        .route(
            "/api/bookmarks",
            get(handlers::list_bookmarks)
                .post(handlers::create_bookmark)
                .delete(handlers::remove_bookmarks),
        )
        .route("/api/bookmarks/stats", get(handlers::bookmark_stats))
        .route("/api/bookmarks/{id}", patch(handlers::update_bookmark))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_user,
        ));

    public
        .merge(authenticated)
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
