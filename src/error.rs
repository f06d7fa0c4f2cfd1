use derive_more::From;
use thiserror::Error;

use crate::handlers::FrameCodecError;
use crate::kettle::CommandError;
use crate::notification::NotificationDecodeError;
use crate::protocol::{EndpointId, endpoint_metadata};

/// Errors returned by BLE interaction operations.
#[derive(Debug, Error)]
pub enum InteractionError {
    #[error("BLE operation failed")]
    Ble(#[from] btleplug::Error),
    #[error("no BLE adapters were found")]
    NoAdapters,
    #[error("no kettle with address `{address}` was found")]
    DeviceNotFound { address: String },
    #[error(
        "required endpoint `{name}` ({uuid}) was not found on the connected device",
        name = endpoint_metadata(*endpoint).name(),
        uuid = endpoint_metadata(*endpoint).uuid()
    )]
    MissingEndpoint { endpoint: EndpointId },
    #[error("the notification stream closed while a reply was outstanding")]
    NotificationStreamClosed,
    #[error(transparent)]
    Fixture(#[from] FixtureError),
}

/// Errors returned when parsing fake device fixtures.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("fixture records must contain {expected} pipe-delimited fields")]
    InvalidRecordFieldCount { expected: usize },
    #[error("fixture records cannot contain empty mandatory fields")]
    EmptyRecordField,
    #[error("failed to parse a numeric fixture field")]
    InvalidNumber(#[from] std::num::ParseIntError),
    #[error("fixture mode `{value}` is not a known device mode")]
    InvalidMode { value: String },
    #[error("fixture run state `{value}` is not a known run state")]
    InvalidRunState { value: String },
    #[error("firmware version fixtures must be formatted as `major.minor`")]
    InvalidVersion,
}

/// Errors returned when validating runtime backend options.
#[derive(Debug, Error)]
pub(crate) enum CliConfigError {
    #[error("missing device address; pass --address or enable --fake")]
    MissingDeviceAddress,
}

/// Errors returned by telemetry initialisation.
#[derive(Debug, Error)]
pub(crate) enum TelemetryError {
    #[error("failed to install tracing subscriber")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Top-level protocol errors wrapping module-specific error types.
#[derive(Debug, Error, From)]
pub enum ProtocolError {
    #[error(transparent)]
    #[from(NotificationDecodeError, Box<NotificationDecodeError>)]
    Notification(Box<NotificationDecodeError>),
    #[error(transparent)]
    #[from(FrameCodecError, Box<FrameCodecError>)]
    FrameCodec(Box<FrameCodecError>),
    #[error(transparent)]
    #[from(CommandError, Box<CommandError>)]
    Command(Box<CommandError>),
    #[error(transparent)]
    #[from(InteractionError, Box<InteractionError>)]
    Interaction(Box<InteractionError>),
}
