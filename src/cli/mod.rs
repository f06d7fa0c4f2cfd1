use std::io;

use anyhow::Result;
use serde::Serialize;

use crate::notification::KettleStatus;

pub(crate) mod command;
pub(crate) mod control;
pub(crate) mod status;

pub use self::command::{Args, Command, FakeArgs, LogLevel, OutputFormat};
pub use self::control::{ControlAction, ControlArgs, HeatArgs};

pub(crate) fn write_json_line(out: &mut impl io::Write, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

pub(crate) fn describe_status(status: &KettleStatus) -> String {
    format!(
        "mode {mode}, target {target}°C, water {current}°C, {state}",
        mode = status.mode(),
        target = status.target_temperature(),
        current = status.current_temperature(),
        state = status.state(),
    )
}
