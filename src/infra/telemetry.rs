use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::edge::{CACHE_OUTCOME_METRIC, FILL_FAILURE_METRIC, REFRESH_SKIPPED_METRIC};
use crate::config::{LogFormat, LoggingSettings};
use crate::infra::http::RATE_LIMITED_METRIC;

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install the global tracing subscriber described by `logging`.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| InfraError::telemetry(format!("failed to install tracing subscriber: {err}")))
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            CACHE_OUTCOME_METRIC,
            Unit::Count,
            "Home feed requests by cache outcome."
        );
        describe_counter!(
            REFRESH_SKIPPED_METRIC,
            Unit::Count,
            "Background home feed refreshes skipped because one was in flight or the pool was full."
        );
        describe_counter!(
            FILL_FAILURE_METRIC,
            Unit::Count,
            "Home feed fills that failed upstream."
        );
        describe_counter!(
            RATE_LIMITED_METRIC,
            Unit::Count,
            "Requests rejected by the rate limiter."
        );
    });
}
