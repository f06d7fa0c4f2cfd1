use std::io::{self, IsTerminal};

use anyhow::Result;
use tracing::instrument;

use crate::cli::{Command, FakeArgs, LogLevel, OutputFormat};
use crate::error::{InteractionError, ProtocolError};
use crate::hw::{HardwareBackend, HardwareClient, hardware_client_from_backend};
use crate::kettle::{Kettle, KettleConfig};
use crate::telemetry;

/// Creates a hardware client backed by the real BLE transport.
///
/// # Errors
///
/// Returns an error when the platform BLE stack cannot be initialised.
pub async fn real_hardware_client() -> Result<Box<dyn HardwareClient>, InteractionError> {
    hardware_client_from_backend(HardwareBackend::Real).await
}

/// Creates a hardware client backed by the fake in-memory kettle.
///
/// # Errors
///
/// Returns an error when the fake backend cannot be constructed.
pub async fn fake_hardware_client(
    fake_args: FakeArgs,
) -> Result<Box<dyn HardwareClient>, InteractionError> {
    hardware_client_from_backend(HardwareBackend::Fake(fake_args.into_backend_config())).await
}

/// App-level helper binding a hardware client to a session configuration.
pub struct KettleConnector {
    hardware_client: Box<dyn HardwareClient>,
    config: KettleConfig,
}

impl KettleConnector {
    /// Creates a connector for one kettle.
    ///
    /// ```
    /// # async fn demo() -> anyhow::Result<()> {
    /// let config = g200s::KettleConfig::builder()
    ///     .address("E7:6C:1D:02:0A:F0")
    ///     .build();
    /// let connector = g200s::KettleConnector::new(g200s::real_hardware_client().await?, config);
    /// let _ = connector;
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn new(hardware_client: Box<dyn HardwareClient>, config: KettleConfig) -> Self {
        Self {
            hardware_client,
            config,
        }
    }

    /// Connects to the configured kettle and runs the session handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery, connection, or the handshake fails.
    #[instrument(skip(self), level = "info", fields(address = %self.config.address()))]
    pub async fn connect(self) -> Result<Kettle, ProtocolError> {
        let link = self.hardware_client.connect(self.config.address()).await?;
        Kettle::establish(link, &self.config).await
    }
}

/// Runs a CLI command with an injected hardware client and default options.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// let args = g200s::Args::try_parse_from(["g200s", "--fake", "status"])?;
/// let (config, command, maybe_fake_args) = args.into_parts()?;
/// let hardware_client = match maybe_fake_args {
///     Some(fake_args) => g200s::fake_hardware_client(fake_args).await?,
///     None => g200s::real_hardware_client().await?,
/// };
/// let mut out = Vec::new();
/// g200s::run(command, &mut out, hardware_client, config).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, BLE interaction fails,
/// or output writing fails.
pub async fn run<W>(
    command: Command,
    out: &mut W,
    hardware_client: Box<dyn HardwareClient>,
    config: KettleConfig,
) -> Result<()>
where
    W: io::Write,
{
    run_with_options(command, out, hardware_client, config, None, OutputFormat::Pretty).await
}

/// Runs a CLI command with explicit telemetry and output settings.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// let args = g200s::Args::try_parse_from([
///     "g200s",
///     "--log-level",
///     "debug",
///     "--fake",
///     "status",
/// ])?;
/// let log_level = args.log_level();
/// let (config, command, maybe_fake_args) = args.into_parts()?;
/// let hardware_client = match maybe_fake_args {
///     Some(fake_args) => g200s::fake_hardware_client(fake_args).await?,
///     None => g200s::real_hardware_client().await?,
/// };
/// let mut out = Vec::new();
/// g200s::run_with_options(
///     command,
///     &mut out,
///     hardware_client,
///     config,
///     log_level,
///     g200s::OutputFormat::Json,
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, BLE interaction fails,
/// or output writing fails.
#[instrument(
    skip(out, hardware_client, config),
    level = "info",
    fields(command = %command_name(&command), ?log_level, ?output_format)
)]
pub async fn run_with_options<W>(
    command: Command,
    out: &mut W,
    hardware_client: Box<dyn HardwareClient>,
    config: KettleConfig,
    log_level: Option<LogLevel>,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    telemetry::initialise_tracing(
        io::stderr().is_terminal(),
        log_level.map(LogLevel::as_level_filter),
    )?;

    let connector = KettleConnector::new(hardware_client, config);
    match command {
        Command::Status => crate::cli::status::run(connector, out, output_format).await,
        Command::Control(args) => crate::cli::control::run(connector, &args, out, output_format).await,
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Status => "status",
        Command::Control(_args) => "control",
    }
}
