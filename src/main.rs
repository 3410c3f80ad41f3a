use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use noa::{
    application::{
        auth::Authenticator,
        bookmarks::{BookmarkPolicy, BookmarkService},
        comments::{CommentPolicy, CommentService},
        error::AppError,
        home::{HomeFeedPolicy, HomeFeedService},
        rate_limit::RateLimiter,
        repos::HomeContentSource,
    },
    cache::{CacheBackend, EdgeCache, EdgeCacheConfig, MemoryCacheBackend},
    config::{self, CacheBackendKind},
    infra::{
        error::InfraError,
        http::{self, AppState},
        redis::RedisCacheBackend,
        supabase::{PostgrestClient, SupabaseAuth, SupabaseBookmarksRepo, SupabaseCommentsRepo},
        telemetry,
        wordpress::{self, WordPressSource},
    },
};
use reqwest::Client;
use tokio::sync::oneshot;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::WarmHomeFeed(_) => run_warm_home_feed(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let state = build_app_state(&settings)?;

    let sweeper = spawn_rate_limit_sweeper(
        state.comment_limiter.clone(),
        settings.rate_limit.sweep_interval,
    );

    let result = serve_http(&settings, state).await;

    sweeper.abort();
    let _ = sweeper.await;

    result
}

async fn run_warm_home_feed(settings: config::Settings) -> Result<(), AppError> {
    let home_feed = build_home_feed_cache(&settings)?;
    let cached = home_feed
        .warm()
        .await
        .map_err(|err| AppError::from(InfraError::upstream("wordpress", err.to_string())))?;

    let summary = serde_json::json!({
        "key": home_feed.config().key,
        "status": cached.status.as_header(),
        "source": cached.value.source,
        "posts": cached.value.posts.len(),
        "generatedAt": cached.value.generated_at,
    });
    info!(
        target = "noa::cli",
        status = cached.status.as_header(),
        posts = cached.value.posts.len(),
        "home feed warmed"
    );
    println!("{summary}");
    Ok(())
}

fn build_app_state(settings: &config::Settings) -> Result<AppState, AppError> {
    let supabase = &settings.supabase;
    let supabase_url = supabase
        .url
        .as_ref()
        .ok_or_else(|| AppError::validation("supabase.url must be configured"))?;
    let anon_key = supabase
        .anon_key
        .as_deref()
        .ok_or_else(|| AppError::validation("supabase.anon_key must be configured"))?;
    let rest_key = supabase.service_role_key.as_deref().unwrap_or(anon_key);

    let http_client = build_http_client(supabase.request_timeout)?;
    let postgrest = PostgrestClient::new(http_client.clone(), supabase_url, rest_key)?;
    let authenticator: Arc<dyn Authenticator> =
        Arc::new(SupabaseAuth::new(http_client, supabase_url, anon_key)?);

    let comments = CommentService::new(
        Arc::new(SupabaseCommentsRepo::new(postgrest.clone())),
        CommentPolicy::from(&settings.comments),
    );
    let bookmarks_repo = Arc::new(SupabaseBookmarksRepo::new(postgrest));
    let bookmarks = BookmarkService::new(
        bookmarks_repo.clone(),
        bookmarks_repo,
        BookmarkPolicy::from(&settings.bookmarks),
    );

    let comment_limiter = RateLimiter::new(
        settings.rate_limit.window(),
        settings.rate_limit.max_requests.get(),
    );

    Ok(AppState {
        comments: Arc::new(comments),
        bookmarks: Arc::new(bookmarks),
        home_feed: build_home_feed_cache(settings)?,
        authenticator,
        comment_limiter,
    })
}

fn build_home_feed_cache(
    settings: &config::Settings,
) -> Result<EdgeCache<HomeFeedService>, AppError> {
    let wp = &settings.wordpress;
    let endpoint = wp
        .endpoint
        .clone()
        .ok_or_else(|| AppError::validation("wordpress.endpoint must be configured"))?;
    let source: Arc<dyn HomeContentSource> = Arc::new(WordPressSource::new(
        build_http_client(wp.request_timeout)?,
        wordpress::WordPressSettings {
            endpoint,
            frontpage_tag: wp.frontpage_tag.clone(),
            featured_tags: wp.featured_tags.clone(),
            country: wp.country.clone(),
        },
    ));
    let service = HomeFeedService::new(source, HomeFeedPolicy::from(wp));

    let cache_config = EdgeCacheConfig::from(&settings.cache);
    let backend = build_cache_backend(&settings.cache, &cache_config)?;
    info!(
        target = "noa::cache",
        backend = backend.as_ref().map_or("none", |backend| backend.name()),
        key = %cache_config.key,
        ttl_secs = cache_config.ttl.as_secs(),
        "home feed cache configured"
    );

    Ok(EdgeCache::new(backend, Arc::new(service), cache_config))
}

fn build_cache_backend(
    settings: &config::CacheSettings,
    cache_config: &EdgeCacheConfig,
) -> Result<Option<Arc<dyn CacheBackend>>, AppError> {
    match settings.backend {
        CacheBackendKind::None => Ok(None),
        CacheBackendKind::Memory => Ok(Some(Arc::new(MemoryCacheBackend::new()))),
        CacheBackendKind::Redis => {
            let url = settings
                .redis_url
                .as_deref()
                .ok_or_else(|| AppError::validation("cache.redis_url must be configured"))?;
            let backend = RedisCacheBackend::new(url, cache_config.operation_timeout)
                .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;
            Ok(Some(Arc::new(backend)))
        }
    }
}

fn build_http_client(timeout: Duration) -> Result<Client, AppError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("noa/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|err| {
            AppError::from(InfraError::configuration(format!(
                "failed to build http client: {err}"
            )))
        })
}

fn spawn_rate_limit_sweeper(
    limiter: RateLimiter,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            limiter.sweep();
        }
    })
}

async fn serve_http(settings: &config::Settings, state: AppState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(target = "noa::http", addr = %settings.server.addr, "listening");

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = Box::pin(
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .into_future(),
    );

    tokio::select! {
        result = &mut server => {
            return result.map_err(|err| AppError::unexpected(format!("server error: {err}")));
        }
        () = shutdown_signal() => {
            info!(target = "noa::http", "shutdown requested, draining connections");
            let _ = stop_tx.send(());
        }
    }

    match tokio::time::timeout(settings.server.graceful_shutdown, server).await {
        Ok(result) => result.map_err(|err| AppError::unexpected(format!("server error: {err}"))),
        Err(_) => {
            warn!(
                target = "noa::http",
                timeout_secs = settings.server.graceful_shutdown.as_secs(),
                "graceful shutdown timed out"
            );
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(target = "noa::http", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(target = "noa::http", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
