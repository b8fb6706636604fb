//! Observer server configuration.

use serde::{Deserialize, Serialize};

/// Observer server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserverConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum concurrent observer sockets.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Seconds to wait for the claim request after the socket opens.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Allowed CORS origins (empty = any origin).
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    8080
}

fn default_max_connections() -> usize {
    32
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            max_connections: default_max_connections(),
            request_timeout_secs: default_request_timeout_secs(),
            allowed_origins: Vec::new(),
        }
    }
}
