use thiserror::Error;
use tracing::instrument;

use crate::protocol::{Method, Mode};

/// First byte of every command and notification frame.
pub const FRAME_START: u8 = 0x55;
/// Final byte of every command and notification frame.
pub const FRAME_END: u8 = 0xAA;

const ENVELOPE_LEN: usize = 4;
const SET_MODE_PAYLOAD_LEN: usize = 16;
pub(crate) const SET_MODE_MODE_OFFSET: usize = 0;
pub(crate) const SET_MODE_TARGET_OFFSET: usize = 2;
const SET_MODE_FLAG_OFFSET: usize = 13;
const SET_MODE_FLAG: u8 = 0x80;

/// Errors returned by frame decoding.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum FrameCodecError {
    /// The frame has fewer than the mandatory 4 envelope bytes.
    #[error("frame is too short: expected at least 4 bytes, got {actual}")]
    TooShort { actual: usize },
    /// The frame does not begin with the `0x55` start marker.
    #[error("frame start marker is invalid: expected 0x55, got {actual:#04x}")]
    BadStartMarker { actual: u8 },
    /// The frame does not end with the `0xAA` end marker.
    #[error("frame end marker is invalid: expected 0xAA, got {actual:#04x}")]
    BadEndMarker { actual: u8 },
}

/// One parsed notification frame borrowed from raw inbound bytes.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct NotificationFrame<'a> {
    sequence: u8,
    method: u8,
    payload: &'a [u8],
}

impl<'a> NotificationFrame<'a> {
    /// Sequence byte echoed by the device.
    ///
    /// Replies are correlated by one-at-a-time command ordering, never by
    /// this value; it is surfaced for diagnostics only.
    #[must_use]
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Raw method tag from byte offset 2.
    #[must_use]
    pub fn method(&self) -> u8 {
        self.method
    }

    /// Method-specific payload between the method tag and the end marker.
    #[must_use]
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }
}

/// Builds and parses the fixed `0x55 .. 0xAA` frame envelope.
pub struct FrameCodec;

impl FrameCodec {
    /// Encodes one command frame.
    ///
    /// ```
    /// use g200s::{FrameCodec, Method};
    ///
    /// let frame = FrameCodec::encode(0x00, Method::GetMode, &[]);
    /// assert_eq!(vec![0x55, 0x00, 0x06, 0xAA], frame);
    /// ```
    #[must_use]
    pub fn encode(sequence: u8, method: Method, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(ENVELOPE_LEN + payload.len());
        frame.push(FRAME_START);
        frame.push(sequence);
        frame.push(method.as_byte());
        frame.extend_from_slice(payload);
        frame.push(FRAME_END);
        frame
    }

    /// Decodes and validates one frame envelope.
    ///
    /// Method tags are returned raw; mapping them to known methods is the
    /// notification decoder's concern.
    ///
    /// # Errors
    ///
    /// Returns an error when the frame is shorter than 4 bytes or either
    /// envelope marker is missing.
    ///
    /// ```
    /// use g200s::FrameCodec;
    ///
    /// let frame = FrameCodec::decode(&[0x55, 0x2A, 0xFF, 0x01, 0xAA])?;
    /// assert_eq!(0x2A, frame.sequence());
    /// assert_eq!(0xFF, frame.method());
    /// assert_eq!(&[0x01], frame.payload());
    /// # Ok::<(), g200s::FrameCodecError>(())
    /// ```
    #[instrument(skip(frame), level = "trace", fields(frame_len = frame.len()))]
    pub fn decode(frame: &[u8]) -> Result<NotificationFrame<'_>, FrameCodecError> {
        if frame.len() < ENVELOPE_LEN {
            return Err(FrameCodecError::TooShort {
                actual: frame.len(),
            });
        }
        if frame[0] != FRAME_START {
            return Err(FrameCodecError::BadStartMarker { actual: frame[0] });
        }
        let last = frame[frame.len() - 1];
        if last != FRAME_END {
            return Err(FrameCodecError::BadEndMarker { actual: last });
        }

        Ok(NotificationFrame {
            sequence: frame[1],
            method: frame[2],
            payload: &frame[3..frame.len() - 1],
        })
    }

    /// Builds the fixed 16-byte SET_MODE payload.
    ///
    /// Layout: mode byte, zero, target temperature, ten zero bytes, the
    /// `0x80` flag, two zero bytes. Boiling and lamp programmes carry a zero
    /// target.
    ///
    /// ```
    /// use g200s::{FrameCodec, Mode};
    ///
    /// let payload = FrameCodec::set_mode_payload(Mode::Heat, 60);
    /// assert_eq!(0x01, payload[0]);
    /// assert_eq!(60, payload[2]);
    /// assert_eq!(0x80, payload[13]);
    /// ```
    #[must_use]
    pub fn set_mode_payload(mode: Mode, target_temperature: u8) -> [u8; SET_MODE_PAYLOAD_LEN] {
        let mut payload = [0x00; SET_MODE_PAYLOAD_LEN];
        payload[SET_MODE_MODE_OFFSET] = mode.as_byte();
        payload[SET_MODE_TARGET_OFFSET] = target_temperature;
        payload[SET_MODE_FLAG_OFFSET] = SET_MODE_FLAG;
        payload
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Method::Auth, 0x00, vec![0x01; 8])]
    #[case(Method::Version, 0x07, vec![])]
    #[case(Method::Run, 0x63, vec![])]
    #[case(Method::Stop, 0x64, vec![])]
    #[case(Method::SetMode, 0x10, FrameCodec::set_mode_payload(Mode::Boiling, 0).to_vec())]
    #[case(Method::GetMode, 0x01, vec![])]
    fn encode_wraps_payload_in_envelope(
        #[case] method: Method,
        #[case] sequence: u8,
        #[case] payload: Vec<u8>,
    ) {
        let frame = FrameCodec::encode(sequence, method, &payload);

        assert_eq!(Some(&FRAME_START), frame.first());
        assert_eq!(Some(&FRAME_END), frame.last());
        assert_eq!(sequence, frame[1]);
        assert_eq!(method.as_byte(), frame[2]);
        assert_eq!(payload.as_slice(), &frame[3..frame.len() - 1]);
    }

    #[test]
    fn encode_auth_matches_expected_bytes() {
        let frame = FrameCodec::encode(0x05, Method::Auth, &[0xFF; 8]);
        assert_eq!(
            vec![
                0x55, 0x05, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xAA,
            ],
            frame
        );
    }

    #[test]
    fn decode_returns_envelope_fields() {
        let frame = FrameCodec::decode(&[0x55, 0x2A, 0x06, 0x01, 0x00, 0x3C, 0xAA])
            .expect("well-formed frame should decode");

        assert_eq!(0x2A, frame.sequence());
        assert_eq!(0x06, frame.method());
        assert_eq!(&[0x01, 0x00, 0x3C], frame.payload());
    }

    #[test]
    fn decode_accepts_empty_payload() {
        let frame = FrameCodec::decode(&[0x55, 0x00, 0x04, 0xAA])
            .expect("minimal envelope should decode");
        assert_eq!(0x04, frame.method());
        assert!(frame.payload().is_empty());
    }

    #[test]
    fn decode_rejects_short_input() {
        let result = FrameCodec::decode(&[0x55, 0x00, 0x06]);
        assert_matches!(result, Err(FrameCodecError::TooShort { actual: 3 }));
    }

    #[test]
    fn decode_rejects_bad_start_marker() {
        let result = FrameCodec::decode(&[0x54, 0x00, 0x06, 0xAA]);
        assert_matches!(result, Err(FrameCodecError::BadStartMarker { actual: 0x54 }));
    }

    #[test]
    fn decode_rejects_bad_end_marker() {
        let result = FrameCodec::decode(&[0x55, 0x00, 0x06, 0x01, 0xAB]);
        assert_matches!(result, Err(FrameCodecError::BadEndMarker { actual: 0xAB }));
    }

    #[test]
    fn set_mode_payload_matches_expected_bytes() {
        let payload = FrameCodec::set_mode_payload(Mode::Heat, 60);
        assert_eq!(
            [
                0x01, 0x00, 0x3C, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                0x80, 0x00, 0x00,
            ],
            payload
        );
    }

    #[rstest]
    #[case(Mode::Boiling, 0x00)]
    #[case(Mode::Lamp, 0x03)]
    fn set_mode_payload_carries_zero_target_for_unheated_modes(
        #[case] mode: Mode,
        #[case] mode_byte: u8,
    ) {
        let payload = FrameCodec::set_mode_payload(mode, 0);
        assert_eq!(mode_byte, payload[0]);
        assert_eq!(0x00, payload[2]);
    }
}
