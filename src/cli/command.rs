use std::time::Duration;

use bon::Builder;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::filter::LevelFilter;

use crate::cli::control::ControlArgs;
use crate::error::{CliConfigError, FixtureError};
use crate::hw::{DeviceFixture, FakeKettleConfig, FoundDevice, StatusFixture, VersionFixture};
use crate::kettle::{AccessKey, KettleConfig};

/// Command-line options for the SkyKettle control tool.
#[derive(Debug, Parser)]
#[command(name = "g200s", about = "Control a Redmond SkyKettle G200S over BLE.")]
pub struct Args {
    /// Link-layer address of the kettle, e.g. `E7:6C:1D:02:0A:F0`.
    #[arg(long, global = true)]
    address: Option<String>,
    /// Pairing key as 16 hexadecimal characters.
    #[arg(long, global = true)]
    key: Option<AccessKey>,
    /// How long to wait for each reply notification (e.g. `500ms`, `2s`).
    #[arg(long, global = true, value_parser = parse_duration)]
    notify_timeout: Option<Duration>,
    /// Log verbosity override.
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,
    /// Output format. Defaults to pretty on a terminal and JSON otherwise.
    #[arg(long, global = true, value_enum)]
    output: Option<OutputFormat>,
    /// Uses the fake in-memory kettle instead of real hardware.
    #[arg(long, global = true)]
    fake: bool,
    /// Fake device identity in the form `address|name|rssi`.
    #[arg(long, global = true, requires = "fake")]
    fake_device: Option<DeviceFixture>,
    /// Fake firmware version in the form `major.minor`.
    #[arg(long, global = true, requires = "fake")]
    fake_firmware: Option<VersionFixture>,
    /// Fake initial status in the form `mode|target|current|state`.
    #[arg(long, global = true, requires = "fake")]
    fake_status: Option<StatusFixture>,
    /// Key the fake device accepts, as 16 hexadecimal characters.
    #[arg(long, global = true, requires = "fake")]
    fake_key: Option<AccessKey>,
    #[command(subcommand)]
    command: Command,
}

impl Args {
    /// Creates argument values directly without CLI parsing.
    ///
    /// ```
    /// use g200s::{Args, Command};
    ///
    /// let status = Args::new(Command::Status);
    /// let _ = status;
    /// ```
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            address: None,
            key: None,
            notify_timeout: None,
            log_level: None,
            output: None,
            fake: false,
            fake_device: None,
            fake_firmware: None,
            fake_status: None,
            fake_key: None,
            command,
        }
    }

    /// Enables fake backend mode with pre-parsed fake configuration.
    #[must_use]
    pub fn with_fake(mut self, fake: FakeArgs) -> Self {
        let FakeArgs {
            device,
            firmware,
            status,
            accepted_key,
        } = fake;

        self.fake = true;
        self.fake_device = device;
        self.fake_firmware = firmware;
        self.fake_status = status;
        self.fake_key = accepted_key;
        self
    }

    /// Returns the requested log verbosity override.
    #[must_use]
    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    /// Returns the requested output format override.
    #[must_use]
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.output
    }

    /// Splits parsed CLI arguments into session configuration, command, and
    /// optional fake-client settings.
    ///
    /// Without `--address`, fake mode borrows the fixture device's address so
    /// `--fake` alone is a complete invocation.
    ///
    /// # Errors
    ///
    /// Returns an error if CLI backend configuration is invalid.
    pub fn into_parts(self) -> anyhow::Result<(KettleConfig, Command, Option<FakeArgs>)> {
        let Args {
            address,
            key,
            notify_timeout,
            log_level: _,
            output: _,
            fake,
            fake_device,
            fake_firmware,
            fake_status,
            fake_key,
            command,
        } = self;

        let fake_args = if fake {
            Some(FakeArgs {
                device: fake_device,
                firmware: fake_firmware,
                status: fake_status,
                accepted_key: fake_key,
            })
        } else {
            None
        };

        let address = match (address, &fake_args) {
            (Some(address), _) => address,
            (None, Some(fake_args)) => fake_args.device_address(),
            (None, None) => return Err(CliConfigError::MissingDeviceAddress.into()),
        };

        let config = KettleConfig::builder()
            .address(address)
            .maybe_key(key)
            .maybe_notify_timeout(notify_timeout)
            .build();

        Ok((config, command, fake_args))
    }
}

/// Fake backend arguments for programmatic runs.
#[derive(Debug, Builder)]
pub struct FakeArgs {
    #[builder(with = |value: &str| -> std::result::Result<_, FixtureError> { value.parse() })]
    device: Option<DeviceFixture>,
    #[builder(with = |value: &str| -> std::result::Result<_, FixtureError> { value.parse() })]
    firmware: Option<VersionFixture>,
    #[builder(with = |value: &str| -> std::result::Result<_, FixtureError> { value.parse() })]
    status: Option<StatusFixture>,
    accepted_key: Option<AccessKey>,
}

impl FakeArgs {
    pub(crate) fn into_backend_config(self) -> FakeKettleConfig {
        let Self {
            device,
            firmware,
            status,
            accepted_key,
        } = self;

        FakeKettleConfig::builder()
            .maybe_device(device)
            .maybe_firmware(firmware)
            .maybe_status(status)
            .maybe_accepted_key(accepted_key)
            .build()
    }

    fn device_address(&self) -> String {
        let fixture = self.device.clone().unwrap_or_default();
        let device: FoundDevice = fixture.into();
        device.address().to_owned()
    }
}

/// Supported CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect, authenticate, and print firmware version and device status.
    Status,
    /// Connect, authenticate, then apply one control action.
    Control(ControlArgs),
}

/// Requested log verbosity.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub(crate) fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Trace => LevelFilter::TRACE,
            Self::Debug => LevelFilter::DEBUG,
            Self::Info => LevelFilter::INFO,
            Self::Warn => LevelFilter::WARN,
            Self::Error => LevelFilter::ERROR,
        }
    }
}

/// Requested command output rendering.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines.
    Pretty,
    /// One pretty-printed JSON document per command.
    Json,
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value).map_err(|error| error.to_string())
}
