use crate::transport::TransportConfig;
use std::time::Duration;

pub const DEFAULT_RELAY_URL: &str = "ws://127.0.0.1:8080/ChatTexto/Server";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub relay_url: String,
    pub transport: TransportConfig,
    /// Upper bound for `leave()` when run from the process shutdown hook.
    pub shutdown_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_owned(),
            transport: TransportConfig::default(),
            shutdown_timeout: Duration::from_secs(3),
        }
    }
}

impl ClientConfig {
    pub fn with_relay_url(mut self, url: impl Into<String>) -> Self {
        self.relay_url = url.into();
        self
    }
}
