//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{CliArgs, Command, ServeArgs, ServeOverrides, UpstreamOverrides, WarmArgs};

use std::{net::SocketAddr, num::NonZeroU32, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::bookmarks::BookmarkPolicy;
use crate::application::comments::CommentPolicy;
use crate::application::home::HomeFeedPolicy;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "noa";
const ENV_PREFIX: &str = "NOA";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 10;
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 8;
const DEFAULT_FRONTPAGE_TAG: &str = "frontpage";
const DEFAULT_CANDIDATE_LIMIT: u64 = 20;
const DEFAULT_FEED_LIMIT: u64 = 30;
const DEFAULT_CACHE_KEY: &str = "home-feed:v1";
const DEFAULT_CACHE_TTL_SECS: u64 = 45;
const DEFAULT_CACHE_REFRESH_THRESHOLD_SECS: u64 = 10;
const DEFAULT_CACHE_REFRESH_CONCURRENCY: u64 = 4;
const DEFAULT_CACHE_OPERATION_TIMEOUT_MS: u64 = 500;
const DEFAULT_COMMENT_PAGE_SIZE: u64 = 20;
const DEFAULT_COMMENT_MAX_PAGE_SIZE: u64 = 50;
const DEFAULT_COMMENT_MAX_BODY_CHARS: u64 = 2000;
const DEFAULT_BOOKMARK_PAGE_SIZE: u64 = 20;
const DEFAULT_BOOKMARK_MAX_PAGE_SIZE: u64 = 100;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u64 = 5;
const DEFAULT_RATE_LIMIT_SWEEP_SECS: u64 = 300;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub supabase: SupabaseSettings,
    pub wordpress: WordPressSettings,
    pub cache: CacheSettings,
    pub comments: CommentSettings,
    pub bookmarks: BookmarkSettings,
    pub rate_limit: RateLimitSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

/// Supabase project access. Required by `serve`, unused by `warm-home-feed`.
#[derive(Debug, Clone)]
pub struct SupabaseSettings {
    pub url: Option<Url>,
    pub anon_key: Option<String>,
    /// Used for PostgREST calls when present; falls back to the anon key.
    pub service_role_key: Option<String>,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct WordPressSettings {
    pub endpoint: Option<Url>,
    pub frontpage_tag: String,
    pub featured_tags: Vec<String>,
    pub country: Option<String>,
    pub candidate_limit: usize,
    pub feed_limit: usize,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    None,
    Memory,
    Redis,
}

impl FromStr for CacheBackendKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "off" => Ok(Self::None),
            "memory" => Ok(Self::Memory),
            "redis" | "upstash" => Ok(Self::Redis),
            other => Err(format!("unknown cache backend `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub backend: CacheBackendKind,
    pub redis_url: Option<String>,
    pub key: String,
    pub ttl_secs: NonZeroU32,
    pub retention_secs: Option<NonZeroU32>,
    pub refresh_threshold_secs: u32,
    pub refresh_concurrency: NonZeroU32,
    pub operation_timeout_ms: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CommentSettings {
    pub default_page_size: NonZeroU32,
    pub max_page_size: NonZeroU32,
    pub max_body_chars: NonZeroU32,
    pub require_moderation: bool,
}

#[derive(Debug, Clone)]
pub struct BookmarkSettings {
    pub default_page_size: NonZeroU32,
    pub max_page_size: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub window_seconds: NonZeroU32,
    pub max_requests: NonZeroU32,
    pub sweep_interval: Duration,
}

impl From<&CommentSettings> for CommentPolicy {
    fn from(settings: &CommentSettings) -> Self {
        Self {
            default_page_size: settings.default_page_size.get(),
            max_page_size: settings.max_page_size.get(),
            max_body_chars: settings.max_body_chars.get() as usize,
            require_moderation: settings.require_moderation,
        }
    }
}

impl From<&BookmarkSettings> for BookmarkPolicy {
    fn from(settings: &BookmarkSettings) -> Self {
        Self {
            default_page_size: settings.default_page_size.get(),
            max_page_size: settings.max_page_size.get(),
        }
    }
}

impl From<&WordPressSettings> for HomeFeedPolicy {
    fn from(settings: &WordPressSettings) -> Self {
        Self {
            candidate_limit: settings.candidate_limit,
            feed_limit: settings.feed_limit,
        }
    }
}

impl RateLimitSettings {
    pub fn window(&self) -> Duration {
        Duration::from_secs(u64::from(self.window_seconds.get()))
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("wordpress.featured_tags")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::WarmHomeFeed(args)) => raw.apply_upstream_overrides(&args.upstream),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    supabase: RawSupabaseSettings,
    wordpress: RawWordPressSettings,
    cache: RawCacheSettings,
    comments: RawCommentSettings,
    bookmarks: RawBookmarkSettings,
    rate_limit: RawRateLimitSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.supabase_url.as_ref() {
            self.supabase.url = Some(url.clone());
        }
        if let Some(window) = overrides.rate_limit_window_seconds {
            self.rate_limit.window_seconds = Some(window);
        }
        if let Some(max) = overrides.rate_limit_max_requests {
            self.rate_limit.max_requests = Some(max);
        }
        self.apply_upstream_overrides(&overrides.upstream);
    }

    fn apply_upstream_overrides(&mut self, overrides: &UpstreamOverrides) {
        if let Some(endpoint) = overrides.wordpress_endpoint.as_ref() {
            self.wordpress.endpoint = Some(endpoint.clone());
        }
        if let Some(backend) = overrides.cache_backend.as_ref() {
            self.cache.backend = Some(backend.clone());
        }
        if let Some(url) = overrides.redis_url.as_ref() {
            self.cache.redis_url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            supabase,
            wordpress,
            cache,
            comments,
            bookmarks,
            rate_limit,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            supabase: build_supabase_settings(supabase)?,
            wordpress: build_wordpress_settings(wordpress)?,
            cache: build_cache_settings(cache)?,
            comments: build_comment_settings(comments)?,
            bookmarks: build_bookmark_settings(bookmarks)?,
            rate_limit: build_rate_limit_settings(rate_limit)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }
    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };
    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    Ok(LoggingSettings { level, format })
}

fn build_supabase_settings(supabase: RawSupabaseSettings) -> Result<SupabaseSettings, LoadError> {
    let url = non_empty(supabase.url)
        .map(|value| parse_base_url(&value, "supabase.url"))
        .transpose()?;
    let timeout_secs = supabase
        .request_timeout_seconds
        .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS);
    Ok(SupabaseSettings {
        url,
        anon_key: non_empty(supabase.anon_key),
        service_role_key: non_empty(supabase.service_role_key),
        request_timeout: Duration::from_secs(u64::from(
            non_zero_u32(timeout_secs, "supabase.request_timeout_seconds")?.get(),
        )),
    })
}

fn build_wordpress_settings(
    wordpress: RawWordPressSettings,
) -> Result<WordPressSettings, LoadError> {
    let endpoint = non_empty(wordpress.endpoint)
        .map(|value| {
            Url::parse(&value)
                .map_err(|err| LoadError::invalid("wordpress.endpoint", err.to_string()))
        })
        .transpose()?;
    let frontpage_tag =
        non_empty(wordpress.frontpage_tag).unwrap_or_else(|| DEFAULT_FRONTPAGE_TAG.to_string());
    let featured_tags = wordpress
        .featured_tags
        .unwrap_or_default()
        .into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect();
    let candidate_limit = non_zero_u32(
        wordpress.candidate_limit.unwrap_or(DEFAULT_CANDIDATE_LIMIT),
        "wordpress.candidate_limit",
    )?;
    let feed_limit = non_zero_u32(
        wordpress.feed_limit.unwrap_or(DEFAULT_FEED_LIMIT),
        "wordpress.feed_limit",
    )?;
    let timeout_secs = non_zero_u32(
        wordpress
            .request_timeout_seconds
            .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        "wordpress.request_timeout_seconds",
    )?;

    Ok(WordPressSettings {
        endpoint,
        frontpage_tag,
        featured_tags,
        country: non_empty(wordpress.country).map(|code| code.to_ascii_lowercase()),
        candidate_limit: candidate_limit.get() as usize,
        feed_limit: feed_limit.get() as usize,
        request_timeout: Duration::from_secs(u64::from(timeout_secs.get())),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let backend = cache
        .backend
        .as_deref()
        .map(CacheBackendKind::from_str)
        .transpose()
        .map_err(|reason| LoadError::invalid("cache.backend", reason))?
        .unwrap_or(CacheBackendKind::None);
    let redis_url = non_empty(cache.redis_url);
    if backend == CacheBackendKind::Redis && redis_url.is_none() {
        return Err(LoadError::invalid(
            "cache.redis_url",
            "required when cache.backend is redis",
        ));
    }

    let key = non_empty(cache.key).unwrap_or_else(|| DEFAULT_CACHE_KEY.to_string());
    let ttl_secs = non_zero_u32(
        cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS),
        "cache.ttl_seconds",
    )?;
    let retention_secs = cache
        .retention_seconds
        .map(|secs| non_zero_u32(secs, "cache.retention_seconds"))
        .transpose()?;
    if retention_secs.is_some_and(|retention| retention <= ttl_secs) {
        return Err(LoadError::invalid(
            "cache.retention_seconds",
            "must be longer than cache.ttl_seconds",
        ));
    }

    let refresh_threshold_secs = u32::try_from(
        cache
            .refresh_threshold_seconds
            .unwrap_or(DEFAULT_CACHE_REFRESH_THRESHOLD_SECS),
    )
    .map_err(|_| {
        LoadError::invalid(
            "cache.refresh_threshold_seconds",
            "value exceeds supported range for u32",
        )
    })?;
    if refresh_threshold_secs >= ttl_secs.get() {
        return Err(LoadError::invalid(
            "cache.refresh_threshold_seconds",
            "must be shorter than cache.ttl_seconds",
        ));
    }

    Ok(CacheSettings {
        backend,
        redis_url,
        key,
        ttl_secs,
        retention_secs,
        refresh_threshold_secs,
        refresh_concurrency: non_zero_u32(
            cache
                .refresh_concurrency
                .unwrap_or(DEFAULT_CACHE_REFRESH_CONCURRENCY),
            "cache.refresh_concurrency",
        )?,
        operation_timeout_ms: non_zero_u32(
            cache
                .operation_timeout_ms
                .unwrap_or(DEFAULT_CACHE_OPERATION_TIMEOUT_MS),
            "cache.operation_timeout_ms",
        )?,
    })
}

fn build_comment_settings(comments: RawCommentSettings) -> Result<CommentSettings, LoadError> {
    let default_page_size = non_zero_u32(
        comments.default_page_size.unwrap_or(DEFAULT_COMMENT_PAGE_SIZE),
        "comments.default_page_size",
    )?;
    let max_page_size = non_zero_u32(
        comments
            .max_page_size
            .unwrap_or(DEFAULT_COMMENT_MAX_PAGE_SIZE),
        "comments.max_page_size",
    )?;
    if default_page_size > max_page_size {
        return Err(LoadError::invalid(
            "comments.default_page_size",
            "must not exceed comments.max_page_size",
        ));
    }
    Ok(CommentSettings {
        default_page_size,
        max_page_size,
        max_body_chars: non_zero_u32(
            comments
                .max_body_chars
                .unwrap_or(DEFAULT_COMMENT_MAX_BODY_CHARS),
            "comments.max_body_chars",
        )?,
        require_moderation: comments.require_moderation.unwrap_or(false),
    })
}

fn build_bookmark_settings(bookmarks: RawBookmarkSettings) -> Result<BookmarkSettings, LoadError> {
    let default_page_size = non_zero_u32(
        bookmarks
            .default_page_size
            .unwrap_or(DEFAULT_BOOKMARK_PAGE_SIZE),
        "bookmarks.default_page_size",
    )?;
    let max_page_size = non_zero_u32(
        bookmarks
            .max_page_size
            .unwrap_or(DEFAULT_BOOKMARK_MAX_PAGE_SIZE),
        "bookmarks.max_page_size",
    )?;
    if default_page_size > max_page_size {
        return Err(LoadError::invalid(
            "bookmarks.default_page_size",
            "must not exceed bookmarks.max_page_size",
        ));
    }
    Ok(BookmarkSettings {
        default_page_size,
        max_page_size,
    })
}

fn build_rate_limit_settings(
    rate_limit: RawRateLimitSettings,
) -> Result<RateLimitSettings, LoadError> {
    let window_seconds = non_zero_u32(
        rate_limit
            .window_seconds
            .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECS),
        "rate_limit.window_seconds",
    )?;
    let max_requests = non_zero_u32(
        rate_limit
            .max_requests
            .unwrap_or(DEFAULT_RATE_LIMIT_MAX_REQUESTS),
        "rate_limit.max_requests",
    )?;
    let sweep_seconds = non_zero_u32(
        rate_limit
            .sweep_interval_seconds
            .unwrap_or(DEFAULT_RATE_LIMIT_SWEEP_SECS),
        "rate_limit.sweep_interval_seconds",
    )?;
    Ok(RateLimitSettings {
        window_seconds,
        max_requests,
        sweep_interval: Duration::from_secs(u64::from(sweep_seconds.get())),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSupabaseSettings {
    url: Option<String>,
    anon_key: Option<String>,
    service_role_key: Option<String>,
    request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawWordPressSettings {
    endpoint: Option<String>,
    frontpage_tag: Option<String>,
    featured_tags: Option<Vec<String>>,
    country: Option<String>,
    candidate_limit: Option<u64>,
    feed_limit: Option<u64>,
    request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    backend: Option<String>,
    redis_url: Option<String>,
    key: Option<String>,
    ttl_seconds: Option<u64>,
    retention_seconds: Option<u64>,
    refresh_threshold_seconds: Option<u64>,
    refresh_concurrency: Option<u64>,
    operation_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCommentSettings {
    default_page_size: Option<u64>,
    max_page_size: Option<u64>,
    max_body_chars: Option<u64>,
    require_moderation: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBookmarkSettings {
    default_page_size: Option<u64>,
    max_page_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRateLimitSettings {
    window_seconds: Option<u64>,
    max_requests: Option<u64>,
    sweep_interval_seconds: Option<u64>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// Parses a base URL and ensures a trailing slash so `Url::join` keeps the path.
fn parse_base_url(value: &str, key: &'static str) -> Result<Url, LoadError> {
    let normalized = if value.ends_with('/') {
        value.to_string()
    } else {
        format!("{value}/")
    };
    Url::parse(&normalized).map_err(|err| LoadError::invalid(key, err.to_string()))
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
