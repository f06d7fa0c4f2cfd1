mod app;
mod cli;
mod error;
mod handlers;
mod hw;
mod kettle;
mod notification;
mod protocol;
mod telemetry;

pub use app::{KettleConnector, fake_hardware_client, real_hardware_client, run, run_with_options};
pub use cli::{
    Args, Command, ControlAction, ControlArgs, FakeArgs, HeatArgs, LogLevel, OutputFormat,
};
pub use error::{FixtureError, InteractionError, ProtocolError};
pub use handlers::{
    CommandSequence, FRAME_END, FRAME_START, FrameCodec, FrameCodecError, NotificationFrame,
    SEQUENCE_MAX,
};
pub use hw::{
    CommandJournal, DeviceFixture, DeviceLink, FakeDeviceLink, FakeKettleConfig, FakeScenario,
    FoundDevice, HardwareClient, ReplyAction, StatusFixture, VersionFixture,
};
pub use kettle::{
    AccessKey, AccessKeyError, CommandError, DEFAULT_ACCESS_KEY, DEFAULT_NOTIFY_TIMEOUT, Kettle,
    KettleConfig,
};
pub use notification::{
    CommandAck, FirmwareVersion, KettleStatus, NotificationDecodeError, NotificationHandler,
    NotifyEvent,
};
pub use protocol::{EndpointId, Method, Mode, RunState};
