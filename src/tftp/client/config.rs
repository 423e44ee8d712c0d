use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 69;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_RETRIES: u8 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "humantime_serde")]
    pub timeout: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u8>,
}

impl ClientConfig {
    pub fn new(server: String, port: u16) -> Self {
        Self {
            server: Some(server),
            port: Some(port),
            timeout: Some(DEFAULT_TIMEOUT),
            retries: Some(DEFAULT_RETRIES),
        }
    }

    /// Applies command line values on top of the configuration file. A zero
    /// timeout keeps the default.
    pub fn merge_cli(
        mut self,
        cli_server: String,
        cli_port: Option<u16>,
        cli_timeout: Option<u64>,
        cli_retries: Option<u8>,
    ) -> Self {
        self.server = Some(cli_server);
        if cli_port.is_some() {
            self.port = cli_port;
        }
        if let Some(secs) = cli_timeout {
            self = self.with_timeout(Duration::from_secs(secs));
        }
        if cli_retries.is_some() {
            self.retries = cli_retries;
        }
        self
    }

    /// Read timeout per attempt. A zero timeout keeps the default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(if timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            timeout
        });
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.retries = Some(retries);
        self
    }
}
