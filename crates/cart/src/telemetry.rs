//! Logging and error tracking setup.
//!
//! Installs a `tracing` subscriber with an `EnvFilter` and, when a DSN is
//! configured, Sentry error tracking. Call once at application start and keep
//! the returned guard alive for the lifetime of the process.

use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::CartConfig;

/// Default filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "rocketshoes_cart=info";

/// Keeps Sentry flushing until dropped.
#[must_use = "dropping the guard stops error reporting"]
pub struct TelemetryGuard {
    _sentry: Option<sentry::ClientInitGuard>,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CartConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Install the global tracing subscriber and Sentry client.
///
/// Defaults to info level for this crate if `RUST_LOG` is not set.
///
/// # Errors
///
/// Returns an error if a global subscriber has already been installed.
pub fn init(config: &CartConfig) -> Result<TelemetryGuard, tracing_subscriber::util::TryInitError> {
    // Must be done before the tracing subscriber so the layer has a client
    let sentry = init_sentry(config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_FILTER.into());

    let (json, plain) = if config.log_json {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json)
        .with(plain)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .try_init()?;

    Ok(TelemetryGuard { _sentry: sentry })
}
