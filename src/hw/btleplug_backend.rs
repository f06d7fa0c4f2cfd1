use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, ValueNotification,
    WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio::time::sleep;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, instrument, trace};

use super::hardware::DeviceLink;
use super::model::FoundDevice;
use crate::error::InteractionError;
use crate::protocol::{EndpointId, endpoint_metadata};

const SCAN_SWEEP_INTERVAL_MS: u64 = 250;
const SCAN_SWEEP_LIMIT: usize = 40;

type NotificationStream = Pin<Box<dyn Stream<Item = ValueNotification> + Send>>;

/// Hardware backend backed by `btleplug`.
#[derive(Debug)]
pub(crate) struct BtleplugBackend {
    manager: Manager,
}

impl BtleplugBackend {
    /// Creates the real BLE backend.
    pub(crate) async fn new() -> Result<Self, InteractionError> {
        let manager = Manager::new().await?;
        Ok(Self { manager })
    }

    /// Scans until the peripheral with `address` appears, connects, resolves
    /// the kettle endpoints, and subscribes to notifications.
    #[instrument(skip(self), level = "debug")]
    pub(crate) async fn connect_device(
        self,
        address: &str,
    ) -> Result<RealDeviceLink, InteractionError> {
        let connected = self.find_and_connect(address).await?;

        let write_characteristic =
            match resolve_characteristic(&connected.peripheral, EndpointId::WriteCharacteristic) {
                Ok(characteristic) => characteristic,
                Err(error) => {
                    disconnect_quietly(&connected.peripheral).await;
                    return Err(error);
                }
            };
        let notify_characteristic =
            match resolve_characteristic(&connected.peripheral, EndpointId::NotifyCharacteristic) {
                Ok(characteristic) => characteristic,
                Err(error) => {
                    disconnect_quietly(&connected.peripheral).await;
                    return Err(error);
                }
            };

        // Subscribe before the first command so no reply can be missed.
        connected.peripheral.subscribe(&notify_characteristic).await?;
        let notifications = connected.peripheral.notifications().await?;

        info!(device = %connected.device.summary(), "connected to kettle");
        Ok(RealDeviceLink {
            device: connected.device,
            peripheral: connected.peripheral,
            write_characteristic,
            notify_characteristic,
            notifications,
        })
    }

    /// Scans in bounded sweeps until the wanted address shows up.
    #[instrument(skip(self), level = "debug")]
    async fn find_and_connect(&self, address: &str) -> Result<ConnectedPeripheral, InteractionError> {
        let adapters = self.adapters().await?;
        info!(adapter_count = adapters.len(), "starting BLE scan");

        for adapter in &adapters {
            debug!(adapter = %adapter.name, "starting scan");
            adapter.adapter.start_scan(ScanFilter::default()).await?;
        }

        for _sweep in 0..SCAN_SWEEP_LIMIT {
            for adapter in &adapters {
                let peripherals = adapter.adapter.peripherals().await?;
                for peripheral in peripherals {
                    let Some(properties) = peripheral.properties().await? else {
                        continue;
                    };

                    let candidate_address = properties.address.to_string();
                    let candidate_id = peripheral.id().to_string();
                    if !is_wanted_device(&candidate_address, &candidate_id, address) {
                        continue;
                    }

                    for handle in &adapters {
                        if let Err(error) = handle.adapter.stop_scan().await {
                            debug!(?error, "failed to stop adapter scan cleanly");
                        }
                    }

                    if !peripheral.is_connected().await? {
                        peripheral.connect().await?;
                    }
                    peripheral.discover_services().await?;

                    let device = FoundDevice::new(
                        candidate_address,
                        properties.local_name,
                        properties.rssi,
                    );
                    return Ok(ConnectedPeripheral { peripheral, device });
                }
            }

            sleep(Duration::from_millis(SCAN_SWEEP_INTERVAL_MS)).await;
        }

        for handle in &adapters {
            if let Err(error) = handle.adapter.stop_scan().await {
                debug!(?error, "failed to stop adapter scan cleanly");
            }
        }

        Err(InteractionError::DeviceNotFound {
            address: address.to_owned(),
        })
    }

    #[instrument(skip(self), level = "trace")]
    async fn adapters(&self) -> Result<Vec<AdapterHandle>, InteractionError> {
        let adapters = self.manager.adapters().await?;
        if adapters.is_empty() {
            return Err(InteractionError::NoAdapters);
        }

        let mut handles = Vec::with_capacity(adapters.len());
        for adapter in adapters {
            let name = adapter.adapter_info().await?;
            handles.push(AdapterHandle { adapter, name });
        }
        Ok(handles)
    }
}

/// Live connection to a real kettle.
pub(crate) struct RealDeviceLink {
    device: FoundDevice,
    peripheral: Peripheral,
    write_characteristic: Characteristic,
    notify_characteristic: Characteristic,
    notifications: NotificationStream,
}

impl std::fmt::Debug for RealDeviceLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealDeviceLink")
            .field("device", &self.device)
            .field("write_characteristic", &self.write_characteristic)
            .field("notify_characteristic", &self.notify_characteristic)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DeviceLink for RealDeviceLink {
    fn device(&self) -> &FoundDevice {
        &self.device
    }

    #[instrument(skip(self, frame), level = "trace", fields(frame_len = frame.len()))]
    async fn write_command(&mut self, frame: &[u8]) -> Result<(), InteractionError> {
        self.peripheral
            .write(&self.write_characteristic, frame, WriteType::WithoutResponse)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), level = "trace")]
    async fn await_notification(
        &mut self,
        window: Duration,
    ) -> Result<Option<Vec<u8>>, InteractionError> {
        let deadline = tokio::time::Instant::now() + window;
        loop {
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            match tokio::time::timeout(deadline - now, self.notifications.next()).await {
                Ok(Some(notification)) => {
                    // Traffic on unrelated characteristics never counts as a
                    // reply.
                    if notification.uuid != self.notify_characteristic.uuid {
                        trace!(uuid = %notification.uuid, "ignoring notification from unexpected characteristic");
                        continue;
                    }
                    return Ok(Some(notification.value));
                }
                Ok(None) => return Err(InteractionError::NotificationStreamClosed),
                Err(_elapsed) => return Ok(None),
            }
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn close(self: Box<Self>) -> Result<(), InteractionError> {
        if let Err(error) = self.peripheral.unsubscribe(&self.notify_characteristic).await {
            debug!(?error, "failed to unsubscribe cleanly before disconnect");
        }
        if self.peripheral.is_connected().await? {
            self.peripheral.disconnect().await?;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct AdapterHandle {
    adapter: Adapter,
    name: String,
}

struct ConnectedPeripheral {
    peripheral: Peripheral,
    device: FoundDevice,
}

async fn disconnect_quietly(peripheral: &Peripheral) {
    if let Err(error) = peripheral.disconnect().await {
        debug!(?error, "failed to disconnect after endpoint validation error");
    }
}

fn resolve_characteristic(
    peripheral: &Peripheral,
    endpoint: EndpointId,
) -> Result<Characteristic, InteractionError> {
    let wanted = endpoint_metadata(endpoint).uuid();
    peripheral
        .characteristics()
        .into_iter()
        .find(|characteristic| characteristic.uuid.to_string().to_lowercase() == wanted)
        .ok_or(InteractionError::MissingEndpoint { endpoint })
}

fn is_wanted_device(candidate_address: &str, candidate_id: &str, wanted: &str) -> bool {
    candidate_address.eq_ignore_ascii_case(wanted) || candidate_id.eq_ignore_ascii_case(wanted)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("E7:6C:1D:02:0A:F0", "peripheral-7", "e7:6c:1d:02:0a:f0", true)]
    #[case("E7:6C:1D:02:0A:F0", "peripheral-7", "E7:6C:1D:02:0A:F0", true)]
    #[case("00:00:00:00:00:00", "6F9A83C1-6A2F-44A3", "6f9a83c1-6a2f-44a3", true)]
    #[case("E7:6C:1D:02:0A:F0", "peripheral-7", "AA:BB:CC:DD:EE:FF", false)]
    fn is_wanted_device_matches_address_or_backend_id_case_insensitively(
        #[case] candidate_address: &str,
        #[case] candidate_id: &str,
        #[case] wanted: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(
            expected,
            is_wanted_device(candidate_address, candidate_id, wanted)
        );
    }
}
