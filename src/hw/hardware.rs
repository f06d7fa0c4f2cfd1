use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::btleplug_backend::BtleplugBackend;
use super::fake_backend::{FakeBackend, FakeKettleConfig};
use super::model::FoundDevice;
use crate::error::InteractionError;

/// Runtime BLE backend selection.
#[derive(Debug)]
pub(crate) enum HardwareBackend {
    Real,
    Fake(FakeKettleConfig),
}

/// Builds an injected hardware client for the selected runtime backend.
pub(crate) async fn hardware_client_from_backend(
    backend: HardwareBackend,
) -> Result<Box<dyn HardwareClient>, InteractionError> {
    let client: Box<dyn HardwareClient> = match backend {
        HardwareBackend::Real => Box::new(RealHardwareClient::new().await?),
        HardwareBackend::Fake(config) => {
            info!("using fake BLE backend");
            Box::new(FakeHardwareClient::new(config))
        }
    };

    Ok(client)
}

#[async_trait]
pub trait HardwareClient: Send + Sync {
    /// Connects to the kettle with the given link-layer address and returns
    /// a link ready for command traffic, with notifications subscribed.
    async fn connect(self: Box<Self>, address: &str) -> Result<Box<dyn DeviceLink>, InteractionError>;
}

/// One live connection to a kettle.
///
/// Write and await both take `&mut self`: the transport carries one
/// conversation and callers interleave writes with reply waits.
#[async_trait]
pub trait DeviceLink: Send + fmt::Debug {
    /// Returns details for the connected device.
    fn device(&self) -> &FoundDevice;

    /// Writes one command frame without waiting for a link-layer response.
    async fn write_command(&mut self, frame: &[u8]) -> Result<(), InteractionError>;

    /// Waits up to `timeout` for the next notification frame.
    ///
    /// Returns `Ok(None)` when the window elapses without a frame.
    async fn await_notification(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, InteractionError>;

    /// Disconnects from the device.
    async fn close(self: Box<Self>) -> Result<(), InteractionError>;
}

#[derive(Debug)]
struct RealHardwareClient {
    backend: BtleplugBackend,
}

impl RealHardwareClient {
    async fn new() -> Result<Self, InteractionError> {
        Ok(Self {
            backend: BtleplugBackend::new().await?,
        })
    }
}

#[async_trait]
impl HardwareClient for RealHardwareClient {
    async fn connect(
        self: Box<Self>,
        address: &str,
    ) -> Result<Box<dyn DeviceLink>, InteractionError> {
        let link = self.backend.connect_device(address).await?;

        Ok(Box::new(link))
    }
}

#[derive(Debug)]
struct FakeHardwareClient {
    backend: FakeBackend,
}

impl FakeHardwareClient {
    fn new(config: FakeKettleConfig) -> Self {
        Self {
            backend: FakeBackend::new(config),
        }
    }
}

#[async_trait]
impl HardwareClient for FakeHardwareClient {
    async fn connect(
        self: Box<Self>,
        address: &str,
    ) -> Result<Box<dyn DeviceLink>, InteractionError> {
        let Self { backend } = *self;
        let link = backend.connect_device(address)?;

        Ok(Box::new(link))
    }
}
