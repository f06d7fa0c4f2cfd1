use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bon::Builder;
use tokio::time::sleep;
use tracing::{debug, instrument, trace};

use super::hardware::DeviceLink;
use super::model::FoundDevice;
use crate::error::{FixtureError, InteractionError};
use crate::handlers::{FrameCodec, SET_MODE_MODE_OFFSET, SET_MODE_TARGET_OFFSET};
use crate::kettle::AccessKey;
use crate::notification::{
    ACK_ACCEPTED, FirmwareVersion, KettleStatus, STATUS_CURRENT_OFFSET, STATUS_MODE_OFFSET,
    STATUS_STATE_OFFSET, STATUS_TARGET_OFFSET,
};
use crate::protocol::{Method, Mode, RunState};

const ACK_REFUSED: u8 = 0x00;
const STATUS_REPLY_PAYLOAD_LEN: usize = 16;

const DEVICE_FIXTURE_FIELDS: usize = 3;
const STATUS_FIXTURE_FIELDS: usize = 4;

const DEFAULT_DEVICE_ADDRESS: &str = "E7:6C:1D:02:0A:F0";
const DEFAULT_DEVICE_NAME: &str = "RK-G200S";
const DEFAULT_DEVICE_RSSI: i16 = -59;

/// Parsed fake device identity, `address|name|rssi` with `-` for absent
/// optional fields.
#[derive(Debug, Clone, derive_more::Into)]
pub struct DeviceFixture {
    device: FoundDevice,
}

impl Default for DeviceFixture {
    fn default() -> Self {
        Self {
            device: FoundDevice::new(
                DEFAULT_DEVICE_ADDRESS.to_owned(),
                Some(DEFAULT_DEVICE_NAME.to_owned()),
                Some(DEFAULT_DEVICE_RSSI),
            ),
        }
    }
}

impl FromStr for DeviceFixture {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = value.split('|').map(str::trim).collect();
        if fields.len() != DEVICE_FIXTURE_FIELDS {
            return Err(FixtureError::InvalidRecordFieldCount {
                expected: DEVICE_FIXTURE_FIELDS,
            });
        }
        if fields.iter().any(|field| field.is_empty()) {
            return Err(FixtureError::EmptyRecordField);
        }

        let local_name = if fields[1] == "-" {
            None
        } else {
            Some(fields[1].to_owned())
        };
        let rssi = if fields[2] == "-" {
            None
        } else {
            Some(fields[2].parse::<i16>()?)
        };

        Ok(Self {
            device: FoundDevice::new(fields[0].to_owned(), local_name, rssi),
        })
    }
}

/// Parsed fake firmware version, `major.minor`.
#[derive(Debug, Clone, Copy, derive_more::Into)]
pub struct VersionFixture {
    version: FirmwareVersion,
}

impl Default for VersionFixture {
    fn default() -> Self {
        Self {
            version: FirmwareVersion::new(3, 8),
        }
    }
}

impl FromStr for VersionFixture {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let Some((major, minor)) = value.split_once('.') else {
            return Err(FixtureError::InvalidVersion);
        };
        if major.is_empty() || minor.is_empty() {
            return Err(FixtureError::InvalidVersion);
        }

        Ok(Self {
            version: FirmwareVersion::new(major.trim().parse()?, minor.trim().parse()?),
        })
    }
}

/// Parsed fake initial device status, `mode|target|current|state`.
#[derive(Debug, Clone, Copy, derive_more::Into)]
pub struct StatusFixture {
    status: KettleStatus,
}

impl Default for StatusFixture {
    fn default() -> Self {
        Self {
            status: KettleStatus::new(Mode::Boiling, 0, 23, RunState::Stopped),
        }
    }
}

impl FromStr for StatusFixture {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = value.split('|').map(str::trim).collect();
        if fields.len() != STATUS_FIXTURE_FIELDS {
            return Err(FixtureError::InvalidRecordFieldCount {
                expected: STATUS_FIXTURE_FIELDS,
            });
        }
        if fields.iter().any(|field| field.is_empty()) {
            return Err(FixtureError::EmptyRecordField);
        }

        let mode: Mode = fields[0].parse().map_err(|_| FixtureError::InvalidMode {
            value: fields[0].to_owned(),
        })?;
        let state: RunState = fields[3]
            .parse()
            .map_err(|_| FixtureError::InvalidRunState {
                value: fields[3].to_owned(),
            })?;

        Ok(Self {
            status: KettleStatus::new(mode, fields[1].parse()?, fields[2].parse()?, state),
        })
    }
}

/// How the fake device answers one command kind.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum ReplyAction {
    /// Answer according to the modelled device rules.
    #[default]
    Respond,
    /// Refuse the command regardless of device state.
    Reject,
    /// Send no reply at all.
    Silent,
}

/// Per-command reply overrides for exercising failure paths.
#[derive(Debug, Clone, Copy, Default, Builder)]
pub struct FakeScenario {
    #[builder(default)]
    auth: ReplyAction,
    #[builder(default)]
    set_mode: ReplyAction,
    #[builder(default)]
    run: ReplyAction,
    #[builder(default)]
    stop: ReplyAction,
}

impl FakeScenario {
    fn auth(&self) -> ReplyAction {
        self.auth
    }

    fn set_mode(&self) -> ReplyAction {
        self.set_mode
    }

    fn run(&self) -> ReplyAction {
        self.run
    }

    fn stop(&self) -> ReplyAction {
        self.stop
    }
}

/// Settings for constructing a fake kettle.
#[derive(Debug, Clone, Builder)]
pub struct FakeKettleConfig {
    #[builder(default)]
    device: DeviceFixture,
    #[builder(default)]
    firmware: VersionFixture,
    #[builder(default)]
    status: StatusFixture,
    #[builder(default)]
    accepted_key: AccessKey,
    #[builder(default)]
    scenario: FakeScenario,
    #[builder(default)]
    reply_delay: Duration,
}

/// Shared record of every command frame the fake device received, in write
/// order.
#[derive(Debug, Clone, Default)]
pub struct CommandJournal {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl CommandJournal {
    fn record(&self, frame: &[u8]) {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(frame.to_vec());
    }

    /// Returns a copy of all recorded frames.
    #[must_use]
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of frames written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns whether no frame has been written yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fake backend used in tests and non-hardware environments.
#[derive(Debug)]
pub(crate) struct FakeBackend {
    config: FakeKettleConfig,
}

impl FakeBackend {
    /// Creates a fake backend from explicit settings.
    pub(crate) fn new(config: FakeKettleConfig) -> Self {
        Self { config }
    }

    /// Connects to the fixture device, mirroring the real backend's
    /// address-matching contract.
    pub(crate) fn connect_device(
        self,
        address: &str,
    ) -> Result<FakeDeviceLink, InteractionError> {
        let link = FakeDeviceLink::new(self.config);
        if !link.device().address().eq_ignore_ascii_case(address) {
            return Err(InteractionError::DeviceNotFound {
                address: address.to_owned(),
            });
        }
        Ok(link)
    }
}

/// In-memory kettle simulator speaking the real wire protocol.
///
/// Replies echo the command sequence number, the access key gates every
/// non-AUTH command, and SET_MODE is refused while a programme is running.
#[derive(Debug)]
pub struct FakeDeviceLink {
    device: FoundDevice,
    firmware: FirmwareVersion,
    status: KettleStatus,
    accepted_key: AccessKey,
    authorized: bool,
    scenario: FakeScenario,
    reply_delay: Duration,
    journal: CommandJournal,
    pending: VecDeque<Vec<u8>>,
}

impl FakeDeviceLink {
    /// Creates a fake device from explicit settings.
    #[must_use]
    pub fn new(config: FakeKettleConfig) -> Self {
        Self {
            device: config.device.into(),
            firmware: config.firmware.into(),
            status: config.status.into(),
            accepted_key: config.accepted_key,
            authorized: false,
            scenario: config.scenario,
            reply_delay: config.reply_delay,
            journal: CommandJournal::default(),
            pending: VecDeque::new(),
        }
    }

    /// Returns a shared handle to the frames written so far.
    #[must_use]
    pub fn journal(&self) -> CommandJournal {
        self.journal.clone()
    }

    /// Queues a raw notification frame ahead of any reply the device would
    /// produce, simulating a late arrival from an earlier reply window.
    pub fn inject_notification(&mut self, frame: Vec<u8>) {
        self.pending.push_back(frame);
    }

    fn dispatch(&mut self, method: Method, payload: &[u8]) -> Option<Vec<u8>> {
        match method {
            Method::Auth => self.handle_auth(payload),
            _ if !self.authorized => {
                debug!(%method, "dropping command sent before key exchange");
                None
            }
            Method::Version => Some(vec![self.firmware.major(), self.firmware.minor()]),
            Method::GetMode => Some(self.status_payload().to_vec()),
            Method::SetMode => self.handle_set_mode(payload),
            Method::Run => self.handle_run(),
            Method::Stop => self.handle_stop(),
            unhandled => {
                debug!(method = %unhandled, "no device behaviour modelled for method");
                None
            }
        }
    }

    fn handle_auth(&mut self, payload: &[u8]) -> Option<Vec<u8>> {
        let accepted = match self.scenario.auth() {
            ReplyAction::Respond => payload == self.accepted_key.as_bytes().as_slice(),
            ReplyAction::Reject => false,
            ReplyAction::Silent => return None,
        };
        if accepted {
            self.authorized = true;
        }
        trace!(accepted, "answering key exchange");
        Some(vec![if accepted { ACK_ACCEPTED } else { ACK_REFUSED }])
    }

    fn handle_set_mode(&mut self, payload: &[u8]) -> Option<Vec<u8>> {
        match self.scenario.set_mode() {
            ReplyAction::Respond => {}
            ReplyAction::Reject => return Some(vec![ACK_REFUSED]),
            ReplyAction::Silent => return None,
        }

        // A running programme must be stopped before it can be reconfigured.
        if self.status.state() == RunState::Running {
            return Some(vec![ACK_REFUSED]);
        }

        let mode = payload
            .get(SET_MODE_MODE_OFFSET)
            .copied()
            .and_then(Mode::from_byte);
        let target = payload.get(SET_MODE_TARGET_OFFSET).copied();
        let (Some(mode), Some(target)) = (mode, target) else {
            return Some(vec![ACK_REFUSED]);
        };

        self.status = KettleStatus::new(
            mode,
            target,
            self.status.current_temperature(),
            RunState::Stopped,
        );
        Some(vec![ACK_ACCEPTED])
    }

    fn handle_run(&mut self) -> Option<Vec<u8>> {
        match self.scenario.run() {
            ReplyAction::Respond => {
                self.status = KettleStatus::new(
                    self.status.mode(),
                    self.status.target_temperature(),
                    self.status.current_temperature(),
                    RunState::Running,
                );
                Some(vec![ACK_ACCEPTED])
            }
            ReplyAction::Reject => Some(vec![ACK_REFUSED]),
            ReplyAction::Silent => None,
        }
    }

    fn handle_stop(&mut self) -> Option<Vec<u8>> {
        match self.scenario.stop() {
            ReplyAction::Respond => {
                self.status = KettleStatus::new(
                    self.status.mode(),
                    self.status.target_temperature(),
                    self.status.current_temperature(),
                    RunState::Stopped,
                );
                Some(vec![ACK_ACCEPTED])
            }
            ReplyAction::Reject => Some(vec![ACK_REFUSED]),
            ReplyAction::Silent => None,
        }
    }

    fn status_payload(&self) -> [u8; STATUS_REPLY_PAYLOAD_LEN] {
        let mut payload = [0x00; STATUS_REPLY_PAYLOAD_LEN];
        payload[STATUS_MODE_OFFSET] = self.status.mode().as_byte();
        payload[STATUS_TARGET_OFFSET] = self.status.target_temperature();
        payload[STATUS_CURRENT_OFFSET] = self.status.current_temperature();
        payload[STATUS_STATE_OFFSET] = self.status.state().as_byte();
        payload
    }
}

#[async_trait]
impl DeviceLink for FakeDeviceLink {
    fn device(&self) -> &FoundDevice {
        &self.device
    }

    #[instrument(skip(self, frame), level = "trace", fields(frame_len = frame.len()))]
    async fn write_command(&mut self, frame: &[u8]) -> Result<(), InteractionError> {
        self.journal.record(frame);

        let Ok(decoded) = FrameCodec::decode(frame) else {
            debug!("ignoring command frame with a bad envelope");
            return Ok(());
        };
        let sequence = decoded.sequence();
        let Some(method) = Method::from_byte(decoded.method()) else {
            debug!(method = decoded.method(), "ignoring command with unknown method");
            return Ok(());
        };

        if let Some(payload) = self.dispatch(method, decoded.payload()) {
            self.pending
                .push_back(FrameCodec::encode(sequence, method, &payload));
        }
        Ok(())
    }

    async fn await_notification(
        &mut self,
        window: Duration,
    ) -> Result<Option<Vec<u8>>, InteractionError> {
        match self.pending.front() {
            Some(_) if self.reply_delay < window => {
                if !self.reply_delay.is_zero() {
                    sleep(self.reply_delay).await;
                }
                Ok(self.pending.pop_front())
            }
            // A reply slower than the window stays queued for a later wait.
            _ => {
                sleep(window).await;
                Ok(None)
            }
        }
    }

    async fn close(self: Box<Self>) -> Result<(), InteractionError> {
        Ok(())
    }
}
