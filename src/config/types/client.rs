//! Client configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for `GatewayClient`, `LegClient` and the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Gateway base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Interval between keep-alive pings on a leg
    #[serde(default = "default_keepalive", with = "humantime_serde")]
    pub keepalive_interval: Duration,
    /// HTTP request timeout
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Give up connecting a leg after this long
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: default_base_url(),
            keepalive_interval: default_keepalive(),
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8787".to_string()
}

fn default_keepalive() -> Duration {
    Duration::from_secs(crate::gateway::protocol::KEEPALIVE_INTERVAL_SECS)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}
