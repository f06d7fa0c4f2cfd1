use std::io::{self, IsTerminal};
use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::TelemetryError;

static TRACING_INITIALISED: OnceLock<Result<(), TelemetryError>> = OnceLock::new();

/// Initialises structured logging on stderr.
///
/// Logs stay off stdout so machine-readable command output is never
/// interleaved with diagnostics.
pub(crate) fn initialise_tracing(
    interactive_terminal: bool,
    level_override: Option<LevelFilter>,
) -> Result<(), &'static TelemetryError> {
    TRACING_INITIALISED
        .get_or_init(|| initialise_tracing_once(interactive_terminal, level_override))
        .as_ref()
        .copied()
}

fn initialise_tracing_once(
    interactive_terminal: bool,
    level_override: Option<LevelFilter>,
) -> Result<(), TelemetryError> {
    let log_filter = match level_override {
        Some(level) => EnvFilter::default().add_directive(level.into()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    let is_interactive = interactive_terminal && io::stderr().is_terminal();

    if is_interactive {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(false)
                    .with_writer(io::stderr)
                    .with_filter(log_filter),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .json()
                    .with_target(false)
                    .with_writer(io::stderr)
                    .with_filter(log_filter),
            )
            .try_init()?;
    }

    Ok(())
}
