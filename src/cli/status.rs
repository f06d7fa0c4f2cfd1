use std::io;

use anyhow::Result;
use serde::Serialize;
use tracing::instrument;

use crate::app::KettleConnector;
use crate::cli::{OutputFormat, describe_status, write_json_line};
use crate::hw::FoundDevice;
use crate::notification::{FirmwareVersion, KettleStatus};

/// JSON result emitted by the `status` command.
#[derive(Serialize)]
struct StatusReport {
    device: FoundDevice,
    authenticated: bool,
    firmware: Option<FirmwareVersion>,
    status: Option<KettleStatus>,
}

/// Executes the `status` command.
#[instrument(skip(connector, out), level = "info", fields(?output_format))]
pub(crate) async fn run<W>(
    connector: KettleConnector,
    out: &mut W,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let kettle = connector.connect().await?;
    let report = StatusReport {
        device: kettle.device().clone(),
        authenticated: kettle.is_authenticated(),
        firmware: kettle.version(),
        status: kettle.status(),
    };

    let render_result = render(&report, out, output_format);
    let close_result = kettle.close().await;

    if let Err(error) = close_result {
        if render_result.is_ok() {
            return Err(error.into());
        }
        tracing::trace!(?error, "failed to close kettle session cleanly");
    }

    render_result
}

fn render<W>(report: &StatusReport, out: &mut W, output_format: OutputFormat) -> Result<()>
where
    W: io::Write,
{
    match output_format {
        OutputFormat::Pretty => {
            writeln!(out, "Kettle: {}", report.device.summary())?;
            match report.firmware {
                Some(firmware) => writeln!(out, "Firmware: {firmware}")?,
                None => writeln!(out, "Firmware: unknown")?,
            }
            match &report.status {
                Some(status) => writeln!(out, "Status: {}", describe_status(status))?,
                None => writeln!(out, "Status: unknown")?,
            }
        }
        OutputFormat::Json => {
            write_json_line(out, report)?;
        }
    }

    Ok(())
}
