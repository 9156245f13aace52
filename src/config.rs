use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Default UDP port for both discovery and command/ACK traffic
pub const DEFAULT_PORT: u16 = 8700;

/// Default time to wait for a command ACK
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(2000);

/// Default length of the discovery collection window
pub const DEFAULT_DISCOVERY_WINDOW: Duration = Duration::from_millis(2000);

/// Network settings shared by the transactor and discovery
///
/// Deserializes from JSON with millisecond durations:
///
/// ```
/// use studio_intercom::TransportConfig;
///
/// let config: TransportConfig =
///     serde_json::from_str(r#"{ "port": 9000, "ack_timeout_ms": 500 }"#).unwrap();
/// assert_eq!(config.port, 9000);
/// assert_eq!(config.ack_timeout.as_millis(), 500);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Destination port on the devices
    pub port: u16,

    /// How long a command waits for its reply
    #[serde(rename = "ack_timeout_ms", with = "millis")]
    pub ack_timeout: Duration,

    /// How long discovery collects replies
    #[serde(rename = "discovery_window_ms", with = "millis")]
    pub discovery_window: Duration,

    /// Where the discovery probe is sent
    pub broadcast_addr: IpAddr,

    /// Local address sockets bind to (port is always ephemeral)
    pub bind_addr: IpAddr,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            discovery_window: DEFAULT_DISCOVERY_WINDOW,
            broadcast_addr: IpAddr::V4(Ipv4Addr::BROADCAST),
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        }
    }
}

impl TransportConfig {
    /// Set the device port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the ACK timeout
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Set the discovery window
    pub fn with_discovery_window(mut self, window: Duration) -> Self {
        self.discovery_window = window;
        self
    }

    /// Set the discovery probe destination
    pub fn with_broadcast_addr(mut self, addr: IpAddr) -> Self {
        self.broadcast_addr = addr;
        self
    }

    /// Set the local bind address
    pub fn with_bind_addr(mut self, addr: IpAddr) -> Self {
        self.bind_addr = addr;
        self
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol() {
        let config = TransportConfig::default();
        assert_eq!(config.port, 8700);
        assert_eq!(config.ack_timeout, Duration::from_millis(2000));
        assert_eq!(config.broadcast_addr, IpAddr::V4(Ipv4Addr::BROADCAST));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: TransportConfig =
            serde_json::from_str(r#"{ "discovery_window_ms": 750 }"#).unwrap();
        assert_eq!(config.discovery_window, Duration::from_millis(750));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.ack_timeout, DEFAULT_ACK_TIMEOUT);
    }
}
