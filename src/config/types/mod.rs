//! Configuration types module
//!
//! Gateway and session settings live here; storage and client settings have
//! their own files.

pub mod client;
pub mod storage;

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Agent session configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Durable store configuration
    #[serde(default)]
    pub storage: storage::StorageConfig,

    /// Client/CLI configuration
    #[serde(default)]
    pub client: client::ClientConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn from_env() -> crate::error::Result<Self> {
        crate::config::load_config()
    }
}

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind address
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Report the live agent count on `/status` instead of 0
    #[serde(default)]
    pub report_live_agent_count: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            port: default_port(),
            bind: default_bind(),
            report_live_agent_count: false,
        }
    }
}

fn default_port() -> u16 {
    8787
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

/// Agent session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Name given to agents created without one
    #[serde(default = "default_agent_name")]
    pub default_agent_name: String,
    /// Drop an agent with no open legs after this long without traffic (`null` disables)
    #[serde(default = "default_idle_eviction", with = "humantime_serde")]
    pub idle_eviction: Option<Duration>,
    /// Close a leg that sends nothing for this long (`null` disables)
    #[serde(default, with = "humantime_serde")]
    pub leg_idle_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            default_agent_name: default_agent_name(),
            idle_eviction: default_idle_eviction(),
            leg_idle_timeout: None,
        }
    }
}

fn default_agent_name() -> String {
    "anonymous".to_string()
}

fn default_idle_eviction() -> Option<Duration> {
    Some(Duration::from_secs(30 * 60))
}
