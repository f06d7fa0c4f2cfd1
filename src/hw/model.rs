use serde::Serialize;

/// A discovered BLE peripheral matching the configured kettle address.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct FoundDevice {
    address: String,
    local_name: Option<String>,
    rssi: Option<i16>,
}

impl FoundDevice {
    /// Creates a new discovered-device record.
    pub(crate) fn new(address: String, local_name: Option<String>, rssi: Option<i16>) -> Self {
        Self {
            address,
            local_name,
            rssi,
        }
    }

    /// Returns the link-layer address the device was matched on.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the advertised local name, if present.
    #[must_use]
    pub fn local_name(&self) -> Option<&str> {
        self.local_name.as_deref()
    }

    /// Returns the latest observed RSSI value, if present.
    #[must_use]
    pub fn rssi(&self) -> Option<i16> {
        self.rssi
    }

    /// Returns a one-line human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let name = self.local_name.as_deref().unwrap_or("<unnamed>");
        match self.rssi {
            Some(rssi) => format!("{name} ({address}, {rssi} dBm)", address = self.address),
            None => format!("{name} ({address})", address = self.address),
        }
    }
}
