use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
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
            "bookstore_cache_hit_total",
            Unit::Count,
            "Book reads served from the response cache."
        );
        describe_counter!(
            "bookstore_cache_miss_total",
            Unit::Count,
            "Book reads that fell through to the database."
        );
        describe_counter!(
            "bookstore_admission_rejected_total",
            Unit::Count,
            "Requests refused by admission control."
        );
        describe_counter!(
            "bookstore_auth_rejected_total",
            Unit::Count,
            "Requests refused for a missing or unknown bearer token."
        );
        describe_counter!(
            "bookstore_tokens_issued_total",
            Unit::Count,
            "Session tokens issued by sign-up or login."
        );
        describe_counter!(
            "bookstore_store_swept_total",
            Unit::Count,
            "Expired entries removed by the background sweepers."
        );
        describe_counter!(
            "bookstore_lock_poisoned_total",
            Unit::Count,
            "Store locks reclaimed after a panicking holder poisoned them."
        );
    });
}
