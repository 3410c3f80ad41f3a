use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::application::error::ErrorReport;
use crate::cache::{CacheStatus, EdgeCacheConfig};
use crate::infra::http::error::{ApiError, codes};
use crate::infra::http::state::AppState;

pub const CACHE_STATUS_HEADER: &str = "x-cache";

pub async fn home_feed(State(state): State<AppState>) -> Response {
    match state.home_feed.get().await {
        Ok(cached) => {
            let headers = cache_headers(cached.status, state.home_feed.config());
            (headers, Json(cached.value)).into_response()
        }
        Err(err) => {
            let mut response = ApiError::new(
                StatusCode::BAD_GATEWAY,
                codes::UPSTREAM,
                "Home feed unavailable",
                None,
            )
            .into_response();
            ErrorReport::from_error("infra::http::home_feed", StatusCode::BAD_GATEWAY, &err)
                .attach(&mut response);
            response
        }
    }
}

fn cache_headers(status: CacheStatus, config: &EdgeCacheConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        CACHE_STATUS_HEADER,
        HeaderValue::from_static(status.as_header()),
    );

    let cache_control = if status.is_cacheable() {
        format!(
            "public, max-age=0, s-maxage={}, stale-while-revalidate={}",
            config.ttl.as_secs(),
            config.stale_window_secs()
        )
    } else {
        "no-store".to_string()
    };
    if let Ok(value) = HeaderValue::from_str(&cache_control) {
        headers.insert(header::CACHE_CONTROL, value);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bypass_is_not_stored_downstream() {
        let headers = cache_headers(CacheStatus::Bypass, &EdgeCacheConfig::default());
        assert_eq!(headers[header::CACHE_CONTROL], "no-store");
        assert_eq!(headers[CACHE_STATUS_HEADER], "BYPASS");
    }

    #[test]
    fn cached_responses_advertise_swr() {
        let headers = cache_headers(CacheStatus::HitRefresh, &EdgeCacheConfig::default());
        assert_eq!(
            headers[header::CACHE_CONTROL],
            "public, max-age=0, s-maxage=45, stale-while-revalidate=45"
        );
        assert_eq!(headers[CACHE_STATUS_HEADER], "HIT-REFRESH");
    }
}
