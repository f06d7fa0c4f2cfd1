mod btleplug_backend;
mod fake_backend;
mod hardware;
mod model;

pub use self::fake_backend::{
    CommandJournal, DeviceFixture, FakeDeviceLink, FakeKettleConfig, FakeScenario, ReplyAction,
    StatusFixture, VersionFixture,
};
pub use self::hardware::{DeviceLink, HardwareClient};
pub(crate) use self::hardware::{HardwareBackend, hardware_client_from_backend};
pub use self::model::FoundDevice;
