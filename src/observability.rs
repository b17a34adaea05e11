// Observability Infrastructure
// Structured logging setup plus the trace-id wrapper the poller and CLI put
// around multi-step operations.

use std::time::Instant;

use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Initialize the logging and tracing infrastructure.
/// This should be called once at application startup.
pub fn init_logging() -> Result<()> {
    init_logging_with_level(false, false)
}

/// Initialize logging with configurable verbosity.
pub fn init_logging_with_level(verbose: bool, quiet: bool) -> Result<()> {
    // Determine the filter level based on flags
    let filter_level = if quiet {
        // In quiet mode, suppress everything except errors
        EnvFilter::new("error")
    } else if verbose {
        // In verbose mode, show debug info for saodb and info for others
        EnvFilter::new("saodb=debug,info")
    } else {
        // Default: warnings and errors for saodb, only errors for
        // dependencies. Users can enable more with --verbose or RUST_LOG.
        EnvFilter::new("saodb=warn,error")
    };

    // Quiet takes precedence over the environment variable so that --quiet
    // ALWAYS suppresses logs regardless of RUST_LOG.
    let env_filter = if quiet {
        EnvFilter::new("error")
    } else if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::try_from_default_env().unwrap_or(filter_level)
    } else {
        filter_level
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(!quiet)
        .with_ansi(true);

    match tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
    {
        Ok(()) => Ok(()),
        Err(_) => {
            // Already initialized, which is fine in test environments
            Ok(())
        }
    }
}

/// Execute a future with a trace id logged at its start and end.
pub async fn with_trace_id<F, T>(operation: &str, f: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    let trace_id = Uuid::new_v4();

    info!(
        trace_id = %trace_id,
        "Starting operation: {}", operation
    );

    let start = Instant::now();
    let result = f.await;
    let elapsed = start.elapsed();

    match &result {
        Ok(_) => {
            info!(
                trace_id = %trace_id,
                elapsed_ms = elapsed.as_millis(),
                "Operation completed successfully: {}", operation
            );
        }
        Err(e) => {
            error!(
                trace_id = %trace_id,
                elapsed_ms = elapsed.as_millis(),
                error = %e,
                "Operation failed: {}", operation
            );
        }
    }

    result
}
