use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

pub const RENDER_TOTAL: &str = "pdfrelay_render_total";
pub const RENDER_MS: &str = "pdfrelay_render_ms";
pub const BROWSER_LAUNCH_TOTAL: &str = "pdfrelay_browser_launch_total";
pub const REGISTRY_INIT_TOTAL: &str = "pdfrelay_registry_init_total";

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

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            RENDER_TOTAL,
            Unit::Count,
            "Total number of render requests, labelled by outcome."
        );
        describe_histogram!(
            RENDER_MS,
            Unit::Milliseconds,
            "End-to-end render latency in milliseconds."
        );
        describe_counter!(
            BROWSER_LAUNCH_TOTAL,
            Unit::Count,
            "Total number of browser launches, labelled by outcome."
        );
        describe_counter!(
            REGISTRY_INIT_TOTAL,
            Unit::Count,
            "Total number of plugin registry initialization attempts, labelled by outcome."
        );
    });
}
