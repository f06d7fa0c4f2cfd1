use std::io;

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use tracing::instrument;

use crate::app::KettleConnector;
use crate::cli::{OutputFormat, describe_status, write_json_line};
use crate::kettle::Kettle;
use crate::notification::KettleStatus;

/// JSON result emitted by a `control` action.
#[derive(Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ControlResult {
    Boil {
        status: KettleStatus,
    },
    Heat {
        target_temperature: u8,
        status: KettleStatus,
    },
    Lamp {
        status: KettleStatus,
    },
    Run {
        status: KettleStatus,
    },
    Stop {
        status: KettleStatus,
    },
}

/// Arguments for the `control` command.
#[derive(Debug, Args)]
pub struct ControlArgs {
    #[command(subcommand)]
    action: ControlAction,
}

impl ControlArgs {
    /// Creates control arguments for one action.
    ///
    /// ```
    /// use g200s::{ControlAction, ControlArgs, HeatArgs};
    ///
    /// let args = ControlArgs::new(ControlAction::Heat(HeatArgs::new(60)));
    /// let _ = args;
    /// ```
    #[must_use]
    pub fn new(action: ControlAction) -> Self {
        Self { action }
    }
}

/// Action performed by the `control` command.
#[derive(Debug, Subcommand)]
pub enum ControlAction {
    /// Switch to the boiling programme and start it.
    Boil,
    /// Switch to heating towards a target temperature and start it.
    Heat(HeatArgs),
    /// Switch to the backlight lamp programme and start it.
    Lamp,
    /// Start whichever programme is currently configured.
    Run,
    /// Stop the running programme.
    Stop,
}

/// Arguments for `control heat`.
#[derive(Debug, Args)]
pub struct HeatArgs {
    /// Target water temperature in degrees Celsius.
    target_temperature: u8,
}

impl HeatArgs {
    /// Creates heat-control arguments.
    ///
    /// ```
    /// use g200s::HeatArgs;
    ///
    /// let args = HeatArgs::new(60);
    /// assert_eq!(60, args.target_temperature());
    /// ```
    #[must_use]
    pub fn new(target_temperature: u8) -> Self {
        Self { target_temperature }
    }

    /// Returns the requested target temperature.
    #[must_use]
    pub fn target_temperature(&self) -> u8 {
        self.target_temperature
    }
}

/// Executes the `control` command.
#[instrument(skip(connector, args, out), level = "info", fields(action = ?args.action, ?output_format))]
pub(crate) async fn run<W>(
    connector: KettleConnector,
    args: &ControlArgs,
    out: &mut W,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let mut kettle = connector.connect().await?;

    let command_result = run_with_kettle(&mut kettle, args, out, output_format).await;
    let close_result = kettle.close().await;

    if let Err(error) = close_result {
        if command_result.is_ok() {
            return Err(error.into());
        }
        tracing::trace!(?error, "failed to close kettle session cleanly");
    }

    command_result
}

#[instrument(skip(kettle, args, out), level = "debug", fields(action = ?args.action, ?output_format))]
async fn run_with_kettle<W>(
    kettle: &mut Kettle,
    args: &ControlArgs,
    out: &mut W,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    match &args.action {
        ControlAction::Boil => {
            let status = kettle.set_boiling().await?;
            match output_format {
                OutputFormat::Pretty => {
                    writeln!(out, "Boiling started: {}", describe_status(&status))?;
                }
                OutputFormat::Json => {
                    write_json_line(out, &ControlResult::Boil { status })?;
                }
            }
        }
        ControlAction::Heat(heat_args) => {
            let status = kettle.set_heating(heat_args.target_temperature()).await?;
            match output_format {
                OutputFormat::Pretty => {
                    writeln!(
                        out,
                        "Heating to {}°C started: {}",
                        heat_args.target_temperature(),
                        describe_status(&status),
                    )?;
                }
                OutputFormat::Json => {
                    write_json_line(
                        out,
                        &ControlResult::Heat {
                            target_temperature: heat_args.target_temperature(),
                            status,
                        },
                    )?;
                }
            }
        }
        ControlAction::Lamp => {
            let status = kettle.set_lamp().await?;
            match output_format {
                OutputFormat::Pretty => {
                    writeln!(out, "Lamp started: {}", describe_status(&status))?;
                }
                OutputFormat::Json => {
                    write_json_line(out, &ControlResult::Lamp { status })?;
                }
            }
        }
        ControlAction::Run => {
            let status = kettle.run().await?;
            match output_format {
                OutputFormat::Pretty => {
                    writeln!(out, "Programme started: {}", describe_status(&status))?;
                }
                OutputFormat::Json => {
                    write_json_line(out, &ControlResult::Run { status })?;
                }
            }
        }
        ControlAction::Stop => {
            let status = kettle.stop().await?;
            match output_format {
                OutputFormat::Pretty => {
                    writeln!(out, "Programme stopped: {}", describe_status(&status))?;
                }
                OutputFormat::Json => {
                    write_json_line(out, &ControlResult::Stop { status })?;
                }
            }
        }
    }

    Ok(())
}
