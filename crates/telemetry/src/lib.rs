//! Logging bootstrap and query timing.
//!
//! Datastore calls are timed through [`QueryObserver`] rather than printed
//! inline, so the sink can be swapped (tests record into memory, the service
//! emits structured `tracing` events).

use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::Context;
use libreria_kernel::settings::{LogFormat, TelemetrySettings};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when present.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let registry = tracing_subscriber::registry().with(build_env_filter(settings));

    let installed = match settings.log_format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init(),
    };
    installed.context("failed to install tracing subscriber")?;

    Ok(())
}

fn build_env_filter(settings: &TelemetrySettings) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{},tower_http=info,mongodb=warn",
            settings.log_level
        ))
    })
}

/// Sink for datastore call timings.
pub trait QueryObserver: Send + Sync {
    /// Record one finished datastore call.
    fn record(&self, query: &'static str, elapsed: Duration, ok: bool);
}

/// Emits one structured event per datastore call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl QueryObserver for TracingObserver {
    fn record(&self, query: &'static str, elapsed: Duration, ok: bool) {
        tracing::info!(
            target: "libreria::query",
            query,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            ok,
            "query finished"
        );
    }
}

/// Run `fut`, reporting its duration and outcome to `observer` under `query`.
pub async fn timed<F, T, E>(observer: &dyn QueryObserver, query: &'static str, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    let started = Instant::now();
    let result = fut.await;
    observer.record(query, started.elapsed(), result.is_ok());
    result
}
