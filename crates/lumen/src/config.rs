//! Session configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading device credentials.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Device identity and credentials.
///
/// Supplied externally before the session starts; immutable for the
/// session's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    /// Cloud device identifier.
    #[serde(alias = "deviceID")]
    pub device_id: String,

    /// Device authentication token. Sent bearer-prefixed at registration.
    pub device_token: String,
}

impl DeviceConfig {
    /// Load credentials from a JSON file: `{"deviceId": …, "deviceToken": …}`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Connection address parts for the device channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub scheme: String,
    pub host: String,
    pub version: String,
    pub path: String,

    /// Ask the server to acknowledge every sent message. Only shapes the
    /// connection URL; acknowledgment replies are never awaited.
    pub ack: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            scheme: "wss".to_string(),
            host: "api.artik.cloud".to_string(),
            version: "v1.1".to_string(),
            path: "websocket".to_string(),
            ack: true,
        }
    }
}

impl ChannelConfig {
    /// Connection URL for the live channel endpoint.
    ///
    /// Deterministic, order-preserving concatenation of the address parts.
    pub fn endpoint_url(&self) -> String {
        format!(
            "{}://{}/{}/{}?ack={}",
            self.scheme, self.host, self.version, self.path, self.ack
        )
    }
}
