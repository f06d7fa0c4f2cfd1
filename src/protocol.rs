use std::collections::HashMap;
use std::sync::LazyLock;

use serde_with::SerializeDisplay;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

/// Known SkyKettle protocol endpoints.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display)]
pub enum EndpointId {
    /// UART-style control service carrying the command channel.
    #[strum(to_string = "control_service")]
    ControlService,
    /// Characteristic that accepts command frames.
    #[strum(to_string = "write_characteristic")]
    WriteCharacteristic,
    /// Characteristic that delivers reply notifications.
    #[strum(to_string = "notify_characteristic")]
    NotifyCharacteristic,
}

/// Descriptive metadata for one protocol endpoint.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct EndpointMetadata {
    name: &'static str,
    uuid: &'static str,
}

impl EndpointMetadata {
    /// Human-readable endpoint name.
    pub(crate) fn name(self) -> &'static str {
        self.name
    }

    /// Endpoint UUID as a lowercase string.
    pub(crate) fn uuid(self) -> &'static str {
        self.uuid
    }
}

/// Endpoint metadata keyed by typed endpoint IDs.
pub(crate) static ENDPOINTS_BY_ID: LazyLock<HashMap<EndpointId, EndpointMetadata>> =
    LazyLock::new(|| {
        EndpointId::iter()
            .map(|endpoint| (endpoint, metadata_for(endpoint)))
            .collect()
    });

/// Returns metadata for one endpoint.
pub(crate) fn endpoint_metadata(endpoint: EndpointId) -> EndpointMetadata {
    *ENDPOINTS_BY_ID
        .get(&endpoint)
        .unwrap_or(&metadata_for(endpoint))
}

fn metadata_for(endpoint: EndpointId) -> EndpointMetadata {
    match endpoint {
        EndpointId::ControlService => EndpointMetadata {
            name: "SkyKettle control service",
            uuid: "6e400001-b5a3-f393-e0a9-e50e24dcca9e",
        },
        EndpointId::WriteCharacteristic => EndpointMetadata {
            name: "SkyKettle command write",
            uuid: "6e400002-b5a3-f393-e0a9-e50e24dcca9e",
        },
        EndpointId::NotifyCharacteristic => EndpointMetadata {
            name: "SkyKettle reply notify",
            uuid: "6e400003-b5a3-f393-e0a9-e50e24dcca9e",
        },
    }
}

/// Numeric operation tags carried in byte 2 of every frame.
///
/// The six core methods drive the control surface; the remaining tags are
/// known protocol vocabulary the kettle may emit but this client does not
/// act on (see [`crate::NotificationDecodeError::UnhandledMethod`]).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display)]
pub enum Method {
    /// Session authentication with the shared 8-byte key.
    #[strum(to_string = "auth")]
    Auth,
    /// Firmware version query.
    #[strum(to_string = "version")]
    Version,
    /// Start the currently configured mode.
    #[strum(to_string = "run")]
    Run,
    /// Stop the running mode.
    #[strum(to_string = "stop")]
    Stop,
    /// Configure mode and target temperature.
    #[strum(to_string = "set_mode")]
    SetMode,
    /// Query mode, temperatures, and run state.
    #[strum(to_string = "get_mode")]
    GetMode,
    /// Device clock synchronisation.
    #[strum(to_string = "time_sync")]
    TimeSync,
    /// Energy statistics report.
    #[strum(to_string = "stat_watts")]
    StatWatts,
    /// Usage statistics report.
    #[strum(to_string = "stat_times")]
    StatTimes,
    /// Standby backlight colour control.
    #[strum(to_string = "standby_color")]
    StandbyColor,
    /// Lamp palette write.
    #[strum(to_string = "set_palette")]
    SetPalette,
    /// Lamp palette read.
    #[strum(to_string = "get_palette")]
    GetPalette,
}

impl Method {
    /// Wire byte for this method.
    #[must_use]
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Auth => 255,
            Self::Version => 1,
            Self::Run => 3,
            Self::Stop => 4,
            Self::SetMode => 5,
            Self::GetMode => 6,
            Self::TimeSync => 110,
            Self::StatWatts => 71,
            Self::StatTimes => 80,
            Self::StandbyColor => 55,
            Self::SetPalette => 50,
            Self::GetPalette => 51,
        }
    }

    /// Maps a wire byte back to a known method tag.
    #[must_use]
    pub fn from_byte(value: u8) -> Option<Self> {
        Self::iter().find(|method| method.as_byte() == value)
    }

    /// Whether this client implements reply semantics for the method.
    #[must_use]
    pub fn is_handled(self) -> bool {
        matches!(
            self,
            Self::Auth | Self::Version | Self::Run | Self::Stop | Self::SetMode | Self::GetMode
        )
    }
}

/// Kettle operating mode.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display, EnumString, SerializeDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum Mode {
    /// Heat to boiling and switch off.
    Boiling,
    /// Heat to a target temperature and hold.
    Heat,
    /// Backlight-only lamp mode.
    Lamp,
}

impl Mode {
    /// Wire byte for this mode.
    #[must_use]
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Boiling => 0,
            Self::Heat => 1,
            Self::Lamp => 3,
        }
    }

    /// Maps a wire byte back to a mode.
    #[must_use]
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Boiling),
            1 => Some(Self::Heat),
            3 => Some(Self::Lamp),
            _ => None,
        }
    }
}

/// Kettle run state.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display, EnumString, SerializeDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum RunState {
    /// No programme is active.
    Stopped,
    /// The configured programme is active.
    Running,
}

impl RunState {
    /// Wire byte for this run state.
    #[must_use]
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Stopped => 0,
            Self::Running => 2,
        }
    }

    /// Maps a wire byte back to a run state.
    #[must_use]
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Stopped),
            2 => Some(Self::Running),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn endpoint_metadata_contains_expected_uuids() {
        let service = endpoint_metadata(EndpointId::ControlService);
        assert_eq!("6e400001-b5a3-f393-e0a9-e50e24dcca9e", service.uuid());

        let write = endpoint_metadata(EndpointId::WriteCharacteristic);
        assert_eq!("6e400002-b5a3-f393-e0a9-e50e24dcca9e", write.uuid());

        let notify = endpoint_metadata(EndpointId::NotifyCharacteristic);
        assert_eq!("6e400003-b5a3-f393-e0a9-e50e24dcca9e", notify.uuid());
    }

    #[rstest]
    #[case(Method::Auth, 255)]
    #[case(Method::Version, 1)]
    #[case(Method::Run, 3)]
    #[case(Method::Stop, 4)]
    #[case(Method::SetMode, 5)]
    #[case(Method::GetMode, 6)]
    #[case(Method::TimeSync, 110)]
    #[case(Method::StatWatts, 71)]
    #[case(Method::StatTimes, 80)]
    #[case(Method::StandbyColor, 55)]
    #[case(Method::SetPalette, 50)]
    #[case(Method::GetPalette, 51)]
    fn method_bytes_match_protocol_table(#[case] method: Method, #[case] byte: u8) {
        assert_eq!(byte, method.as_byte());
        assert_eq!(Some(method), Method::from_byte(byte));
    }

    #[test]
    fn method_bytes_are_unique() {
        for left in Method::iter() {
            for right in Method::iter() {
                if left != right {
                    assert_ne!(left.as_byte(), right.as_byte());
                }
            }
        }
    }

    #[test]
    fn from_byte_rejects_unknown_tags() {
        assert_eq!(None, Method::from_byte(0x42));
        assert_eq!(None, Mode::from_byte(2));
        assert_eq!(None, RunState::from_byte(1));
    }

    #[rstest]
    #[case(Mode::Boiling, 0)]
    #[case(Mode::Heat, 1)]
    #[case(Mode::Lamp, 3)]
    fn mode_bytes_match_protocol_table(#[case] mode: Mode, #[case] byte: u8) {
        assert_eq!(byte, mode.as_byte());
        assert_eq!(Some(mode), Mode::from_byte(byte));
    }

    #[rstest]
    #[case(RunState::Stopped, 0)]
    #[case(RunState::Running, 2)]
    fn run_state_bytes_match_protocol_table(#[case] state: RunState, #[case] byte: u8) {
        assert_eq!(byte, state.as_byte());
        assert_eq!(Some(state), RunState::from_byte(byte));
    }

    #[rstest]
    #[case("boiling", Mode::Boiling)]
    #[case("heat", Mode::Heat)]
    #[case("lamp", Mode::Lamp)]
    fn mode_parses_from_fixture_names(#[case] text: &str, #[case] expected: Mode) {
        assert_eq!(Ok(expected), text.parse());
    }
}
