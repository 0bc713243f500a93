//! Shared types for the network monitoring engine.

use thiserror::Error;

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Contract violations reported synchronously to the caller.
///
/// Expected absences (unreachable host, closed port, unresolved name) are
/// never errors; they surface as `Option`/`bool`/empty collections.
#[derive(Debug, Error)]
pub enum NetmonError {
    #[error("invalid host range: {start}-{end}")]
    InvalidRange { start: u8, end: u8 },
    #[error("invalid network prefix: {0}")]
    InvalidPrefix(String),
}

/// Reachability state of a monitored device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Unknown,
    Active,
    Inactive,
    Error,
}

impl DeviceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Unknown => "UNKNOWN",
            DeviceState::Active => "ACTIVE",
            DeviceState::Inactive => "INACTIVE",
            DeviceState::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered device. Identity is `id`; two devices with equal ids are the
/// same entity regardless of address.
#[derive(Debug, Clone)]
pub struct Device {
    pub id: String,
    pub address: String,
    pub state: DeviceState,
}

impl Device {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Device {
            id: id.into(),
            address: address.into(),
            state: DeviceState::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!version().is_empty());
    }

    #[test]
    fn new_device_starts_unknown() {
        let d = Device::new("gw", "192.168.1.1");
        assert_eq!(d.state, DeviceState::Unknown);
        assert_eq!(d.state.to_string(), "UNKNOWN");
    }
}
