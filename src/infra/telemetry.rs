use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::notify::{
    METRIC_NOTIFICATION_DROPPED, METRIC_NOTIFICATION_FAILED, METRIC_NOTIFICATION_PUBLISHED,
};
use crate::cache::metric_names::{
    METRIC_CACHE_ERROR, METRIC_CACHE_EVICT, METRIC_CACHE_HIT, METRIC_CACHE_MISS,
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_CACHE_HIT,
            Unit::Count,
            "Total number of record cache hits."
        );
        describe_counter!(
            METRIC_CACHE_MISS,
            Unit::Count,
            "Total number of record cache misses, including degraded lookups."
        );
        describe_counter!(
            METRIC_CACHE_EVICT,
            Unit::Count,
            "Total number of record cache evictions due to capacity."
        );
        describe_counter!(
            METRIC_CACHE_ERROR,
            Unit::Count,
            "Total number of cache backend or codec failures swallowed as misses."
        );
        describe_counter!(
            METRIC_NOTIFICATION_PUBLISHED,
            Unit::Count,
            "Total number of notifications accepted by the broker."
        );
        describe_counter!(
            METRIC_NOTIFICATION_FAILED,
            Unit::Count,
            "Total number of notifications that could not be delivered."
        );
        describe_counter!(
            METRIC_NOTIFICATION_DROPPED,
            Unit::Count,
            "Total number of notifications dropped because the queue was full or closed."
        );
    });
}
