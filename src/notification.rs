use serde::Serialize;
use serde_with::SerializeDisplay;
use thiserror::Error;
use tracing::instrument;

use crate::handlers::{FrameCodec, FrameCodecError};
use crate::protocol::{Method, Mode, RunState};

const ACK_STATUS_OFFSET: usize = 0;
const ACK_MIN_PAYLOAD_LEN: usize = 1;
pub(crate) const ACK_ACCEPTED: u8 = 0x01;
const VERSION_MAJOR_OFFSET: usize = 0;
const VERSION_MINOR_OFFSET: usize = 1;
const VERSION_MIN_PAYLOAD_LEN: usize = 2;
pub(crate) const STATUS_MODE_OFFSET: usize = 0;
pub(crate) const STATUS_TARGET_OFFSET: usize = 2;
pub(crate) const STATUS_CURRENT_OFFSET: usize = 5;
pub(crate) const STATUS_STATE_OFFSET: usize = 8;
const STATUS_MIN_PAYLOAD_LEN: usize = 9;

/// Firmware version reported by the VERSION reply.
#[derive(Debug, Clone, Copy, Eq, PartialEq, derive_more::Display, SerializeDisplay)]
#[display("{major}.{minor}")]
pub struct FirmwareVersion {
    major: u8,
    minor: u8,
}

impl FirmwareVersion {
    /// Creates a version from its two payload bytes.
    ///
    /// ```
    /// use g200s::FirmwareVersion;
    ///
    /// assert_eq!("3.8", FirmwareVersion::new(3, 8).to_string());
    /// ```
    #[must_use]
    pub fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Major version byte.
    #[must_use]
    pub fn major(self) -> u8 {
        self.major
    }

    /// Minor version byte.
    #[must_use]
    pub fn minor(self) -> u8 {
        self.minor
    }
}

/// Last-observed operating status decoded from a GET_MODE reply.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct KettleStatus {
    mode: Mode,
    target_temperature: u8,
    current_temperature: u8,
    state: RunState,
}

impl KettleStatus {
    /// Creates a status snapshot.
    #[must_use]
    pub fn new(mode: Mode, target_temperature: u8, current_temperature: u8, state: RunState) -> Self {
        Self {
            mode,
            target_temperature,
            current_temperature,
            state,
        }
    }

    /// Configured operating mode.
    #[must_use]
    pub fn mode(self) -> Mode {
        self.mode
    }

    /// Target temperature in device units; zero for boiling and lamp.
    #[must_use]
    pub fn target_temperature(self) -> u8 {
        self.target_temperature
    }

    /// Water temperature in device units.
    #[must_use]
    pub fn current_temperature(self) -> u8 {
        self.current_temperature
    }

    /// Whether the configured programme is running.
    #[must_use]
    pub fn state(self) -> RunState {
        self.state
    }
}

/// Accept/reject outcome of a SET_MODE, RUN, or STOP command.
///
/// Rejections keep the complete raw frame so callers can inspect what the
/// device actually said.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CommandAck {
    accepted: bool,
    frame: Vec<u8>,
}

impl CommandAck {
    /// Whether the device accepted the command.
    #[must_use]
    pub fn accepted(&self) -> bool {
        self.accepted
    }

    /// Raw notification frame the acknowledgement arrived in.
    #[must_use]
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    /// Consumes the acknowledgement, yielding the raw frame.
    #[must_use]
    pub fn into_frame(self) -> Vec<u8> {
        self.frame
    }
}

/// Typed notification events emitted by the kettle.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum NotifyEvent {
    /// AUTH reply: whether the device accepted the shared key.
    Auth { accepted: bool },
    /// VERSION reply carrying the firmware version.
    Version(FirmwareVersion),
    /// SET_MODE acknowledgement.
    SetModeAck(CommandAck),
    /// RUN acknowledgement.
    RunAck(CommandAck),
    /// STOP acknowledgement.
    StopAck(CommandAck),
    /// GET_MODE reply carrying a full status snapshot.
    Status(KettleStatus),
}

impl NotifyEvent {
    /// The method this event answers.
    #[must_use]
    pub fn method(&self) -> Method {
        match self {
            Self::Auth { .. } => Method::Auth,
            Self::Version(_) => Method::Version,
            Self::SetModeAck(_) => Method::SetMode,
            Self::RunAck(_) => Method::Run,
            Self::StopAck(_) => Method::Stop,
            Self::Status(_) => Method::GetMode,
        }
    }
}

/// Errors returned while decoding notification frames.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum NotificationDecodeError {
    /// The envelope itself is malformed.
    #[error(transparent)]
    Frame(#[from] FrameCodecError),
    /// The method tag is outside the known protocol table.
    #[error("unknown method tag {method:#04x} in notification")]
    UnknownMethod { method: u8 },
    /// The method tag is known but this client has no reply semantics for it.
    #[error("notification method `{method}` has no reply semantics in this client")]
    UnhandledMethod { method: Method },
    /// The payload is too short for the method's fixed field offsets.
    #[error("truncated `{method}` payload: expected at least {expected} bytes, got {actual}")]
    TruncatedPayload {
        method: Method,
        expected: usize,
        actual: usize,
    },
    /// GET_MODE reported a mode byte outside the known mode table.
    #[error("unknown mode byte {value:#04x} in status reply")]
    UnknownMode { value: u8 },
    /// GET_MODE reported a state byte outside the known run-state table.
    #[error("unknown run-state byte {value:#04x} in status reply")]
    UnknownRunState { value: u8 },
}

/// Decodes raw kettle notification frames into typed events.
pub struct NotificationHandler;

impl NotificationHandler {
    /// Decodes one notification frame.
    ///
    /// Dispatch is a closed match over the known method table: tags outside
    /// the table and known tags without reply semantics both fail loudly
    /// instead of being dropped.
    ///
    /// # Errors
    ///
    /// Returns an error when the envelope is malformed, the method tag is
    /// unknown or unhandled, or the payload is too short for the method.
    ///
    /// ```
    /// use g200s::{NotificationHandler, NotifyEvent};
    ///
    /// let event = NotificationHandler::decode(&[0x55, 0x00, 0xFF, 0x01, 0xAA])?;
    /// assert_eq!(NotifyEvent::Auth { accepted: true }, event);
    /// # Ok::<(), g200s::NotificationDecodeError>(())
    /// ```
    #[instrument(skip(frame), level = "trace", fields(frame_len = frame.len()))]
    pub fn decode(frame: &[u8]) -> Result<NotifyEvent, NotificationDecodeError> {
        let parsed = FrameCodec::decode(frame)?;
        let method = Method::from_byte(parsed.method()).ok_or(
            NotificationDecodeError::UnknownMethod {
                method: parsed.method(),
            },
        )?;
        let payload = parsed.payload();

        match method {
            Method::Auth => {
                let status = payload_byte(method, payload, ACK_STATUS_OFFSET, ACK_MIN_PAYLOAD_LEN)?;
                Ok(NotifyEvent::Auth {
                    accepted: status == ACK_ACCEPTED,
                })
            }
            Method::Version => {
                let major =
                    payload_byte(method, payload, VERSION_MAJOR_OFFSET, VERSION_MIN_PAYLOAD_LEN)?;
                let minor =
                    payload_byte(method, payload, VERSION_MINOR_OFFSET, VERSION_MIN_PAYLOAD_LEN)?;
                Ok(NotifyEvent::Version(FirmwareVersion::new(major, minor)))
            }
            Method::SetMode => Ok(NotifyEvent::SetModeAck(decode_ack(method, frame, payload)?)),
            Method::Run => Ok(NotifyEvent::RunAck(decode_ack(method, frame, payload)?)),
            Method::Stop => Ok(NotifyEvent::StopAck(decode_ack(method, frame, payload)?)),
            Method::GetMode => Ok(NotifyEvent::Status(decode_status(method, payload)?)),
            unhandled => Err(NotificationDecodeError::UnhandledMethod { method: unhandled }),
        }
    }
}

fn decode_ack(
    method: Method,
    frame: &[u8],
    payload: &[u8],
) -> Result<CommandAck, NotificationDecodeError> {
    let status = payload_byte(method, payload, ACK_STATUS_OFFSET, ACK_MIN_PAYLOAD_LEN)?;
    Ok(CommandAck {
        accepted: status == ACK_ACCEPTED,
        frame: frame.to_vec(),
    })
}

fn decode_status(method: Method, payload: &[u8]) -> Result<KettleStatus, NotificationDecodeError> {
    let mode_byte = payload_byte(method, payload, STATUS_MODE_OFFSET, STATUS_MIN_PAYLOAD_LEN)?;
    let target = payload_byte(method, payload, STATUS_TARGET_OFFSET, STATUS_MIN_PAYLOAD_LEN)?;
    let current = payload_byte(method, payload, STATUS_CURRENT_OFFSET, STATUS_MIN_PAYLOAD_LEN)?;
    let state_byte = payload_byte(method, payload, STATUS_STATE_OFFSET, STATUS_MIN_PAYLOAD_LEN)?;

    let mode = Mode::from_byte(mode_byte)
        .ok_or(NotificationDecodeError::UnknownMode { value: mode_byte })?;
    let state = RunState::from_byte(state_byte)
        .ok_or(NotificationDecodeError::UnknownRunState { value: state_byte })?;

    Ok(KettleStatus::new(mode, target, current, state))
}

fn payload_byte(
    method: Method,
    payload: &[u8],
    offset: usize,
    expected: usize,
) -> Result<u8, NotificationDecodeError> {
    payload
        .get(offset)
        .copied()
        .ok_or(NotificationDecodeError::TruncatedPayload {
            method,
            expected,
            actual: payload.len(),
        })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0x01, true)]
    #[case(0x00, false)]
    #[case(0x02, false)]
    fn decode_maps_auth_status_byte(#[case] status: u8, #[case] accepted: bool) {
        let event = NotificationHandler::decode(&[0x55, 0x00, 0xFF, status, 0xAA])
            .expect("auth reply should decode");
        assert_eq!(NotifyEvent::Auth { accepted }, event);
    }

    #[test]
    fn decode_builds_version_from_two_bytes() {
        let event = NotificationHandler::decode(&[0x55, 0x01, 0x01, 0x03, 0x08, 0xAA])
            .expect("version reply should decode");

        assert_eq!(NotifyEvent::Version(FirmwareVersion::new(3, 8)), event);
        assert_eq!("3.8", FirmwareVersion::new(3, 8).to_string());
    }

    #[test]
    fn decode_reads_status_fields_from_fixed_offsets() {
        // Frame offsets 3, 5, 8, 11 carry mode, target, current, state.
        let frame = [
            0x55, 0x04, 0x06, 0x01, 0x00, 0x07, 0x00, 0x00, 0x02, 0x00, 0x00, 0x02, 0xAA,
        ];
        let event = NotificationHandler::decode(&frame).expect("status reply should decode");

        assert_eq!(
            NotifyEvent::Status(KettleStatus::new(Mode::Heat, 7, 2, RunState::Running)),
            event
        );
    }

    #[rstest]
    #[case(0x05)]
    #[case(0x03)]
    #[case(0x04)]
    fn decode_preserves_raw_frame_in_rejected_acks(#[case] method_byte: u8) {
        let frame = [0x55, 0x09, method_byte, 0x00, 0xAA];
        let event = NotificationHandler::decode(&frame).expect("ack reply should decode");

        let ack = match event {
            NotifyEvent::SetModeAck(ack) | NotifyEvent::RunAck(ack) | NotifyEvent::StopAck(ack) => {
                ack
            }
            other => panic!("expected an ack event, got {other:?}"),
        };
        assert!(!ack.accepted());
        assert_eq!(&frame[..], ack.frame());
    }

    #[test]
    fn decode_rejects_unknown_method_tag() {
        let result = NotificationHandler::decode(&[0x55, 0x00, 0x42, 0x01, 0xAA]);
        assert_matches!(
            result,
            Err(NotificationDecodeError::UnknownMethod { method: 0x42 })
        );
    }

    #[test]
    fn decode_fails_loudly_on_known_but_unhandled_method() {
        // TIME_SYNC is protocol vocabulary without reply semantics here.
        let result = NotificationHandler::decode(&[0x55, 0x00, 110, 0x01, 0xAA]);
        assert_matches!(
            result,
            Err(NotificationDecodeError::UnhandledMethod {
                method: Method::TimeSync
            })
        );
    }

    #[test]
    fn decode_rejects_truncated_status_payload() {
        let result = NotificationHandler::decode(&[0x55, 0x00, 0x06, 0x01, 0x00, 0x07, 0xAA]);
        assert_matches!(
            result,
            Err(NotificationDecodeError::TruncatedPayload {
                method: Method::GetMode,
                expected: STATUS_MIN_PAYLOAD_LEN,
                actual: 3,
            })
        );
    }

    #[test]
    fn decode_rejects_empty_ack_payload() {
        let result = NotificationHandler::decode(&[0x55, 0x00, 0xFF, 0xAA]);
        assert_matches!(
            result,
            Err(NotificationDecodeError::TruncatedPayload {
                method: Method::Auth,
                expected: ACK_MIN_PAYLOAD_LEN,
                actual: 0,
            })
        );
    }

    #[test]
    fn decode_rejects_unknown_mode_byte() {
        let frame = [
            0x55, 0x00, 0x06, 0x02, 0x00, 0x07, 0x00, 0x00, 0x02, 0x00, 0x00, 0x02, 0xAA,
        ];
        let result = NotificationHandler::decode(&frame);
        assert_matches!(result, Err(NotificationDecodeError::UnknownMode { value: 0x02 }));
    }

    #[test]
    fn decode_rejects_unknown_run_state_byte() {
        let frame = [
            0x55, 0x00, 0x06, 0x01, 0x00, 0x07, 0x00, 0x00, 0x02, 0x00, 0x00, 0x01, 0xAA,
        ];
        let result = NotificationHandler::decode(&frame);
        assert_matches!(
            result,
            Err(NotificationDecodeError::UnknownRunState { value: 0x01 })
        );
    }

    #[test]
    fn decode_propagates_envelope_errors() {
        let result = NotificationHandler::decode(&[0x54, 0x00, 0x06, 0xAA]);
        assert_matches!(
            result,
            Err(NotificationDecodeError::Frame(FrameCodecError::BadStartMarker { actual: 0x54 }))
        );
    }
}
