use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default listen address.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:69";
/// Default payload file.
pub const DEFAULT_PAYLOAD: &str = "payload.svg";
/// Default number of transmissions of one block before giving up.
pub const DEFAULT_RETRIES: u8 = 10;
/// Default time to wait for the acknowledgment of one block.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(6);

/// TFTP server configuration as read from the `[serve]` table of the
/// configuration file. Every field is optional; unset fields fall back to
/// command line arguments and then to the built-in defaults.
///
/// # Example
///
/// ```rust
/// use payload_tftpd::tftp::server::Config;
/// use std::path::PathBuf;
///
/// let config = Config::with_defaults().merge_cli(
///     Some("127.0.0.1:6969".to_string()),
///     Some(PathBuf::from("boot.img")),
///     None,
///     None,
///     false,
/// );
/// assert_eq!(config.address.as_deref(), Some("127.0.0.1:6969"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Address to listen on (host:port)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// File served to every read request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<PathBuf>,
    /// Transmissions per block before the session is aborted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u8>,
    /// Time to wait for each acknowledgment
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "humantime_serde"
    )]
    pub timeout: Option<Duration>,
    /// Serve every transfer from the listening port (useful behind NAT)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single_port: Option<bool>,
}

impl Config {
    pub fn with_defaults() -> Self {
        Self {
            address: Some(DEFAULT_ADDRESS.to_string()),
            payload: Some(PathBuf::from(DEFAULT_PAYLOAD)),
            retries: Some(DEFAULT_RETRIES),
            timeout: Some(DEFAULT_TIMEOUT),
            single_port: Some(false),
        }
    }

    /// Overlays explicit command line values on top of this configuration.
    pub fn merge_cli(
        mut self,
        address: Option<String>,
        payload: Option<PathBuf>,
        retries: Option<u8>,
        timeout: Option<Duration>,
        single_port: bool,
    ) -> Self {
        if address.is_some() {
            self.address = address;
        }
        if payload.is_some() {
            self.payload = payload;
        }
        if retries.is_some() {
            self.retries = retries;
        }
        if timeout.is_some() {
            self.timeout = timeout;
        }
        if single_port {
            self.single_port = Some(true);
        }
        self
    }

    pub fn address(&self) -> &str {
        self.address.as_deref().unwrap_or(DEFAULT_ADDRESS)
    }

    pub fn payload_path(&self) -> PathBuf {
        self.payload
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PAYLOAD))
    }

    pub fn single_port(&self) -> bool {
        self.single_port.unwrap_or(false)
    }

    /// Builds the transfer settings for `payload` from this configuration.
    pub fn transfer(&self, payload: Arc<[u8]>) -> TransferConfig {
        let mut transfer = TransferConfig::new(payload);
        if let Some(retries) = self.retries {
            transfer = transfer.with_retries(retries);
        }
        if let Some(timeout) = self.timeout {
            transfer = transfer.with_timeout(timeout);
        }
        transfer
    }
}

/// Settings shared read-only by every transfer session.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub payload: Arc<[u8]>,
    pub retries: u8,
    pub timeout: Duration,
}

impl TransferConfig {
    pub fn new(payload: Arc<[u8]>) -> Self {
        Self {
            payload,
            retries: DEFAULT_RETRIES,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// A retry count of zero keeps the default.
    pub fn with_retries(mut self, retries: u8) -> Self {
        self.retries = if retries == 0 { DEFAULT_RETRIES } else { retries };
        self
    }

    /// A zero timeout keeps the default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = if timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            timeout
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_config_default() {
        let config = TransferConfig::new(Arc::from(&b"abc"[..]));

        assert_eq!(config.retries, 10);
        assert_eq!(config.timeout, Duration::from_secs(6));
        assert_eq!(&config.payload[..], b"abc");
    }

    #[test]
    fn test_zero_values_keep_defaults() {
        let config = TransferConfig::new(Arc::from(&b"abc"[..]))
            .with_retries(0)
            .with_timeout(Duration::ZERO);

        assert_eq!(config.retries, DEFAULT_RETRIES);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = Config {
            address: Some("0.0.0.0:69".to_string()),
            payload: Some(PathBuf::from("a.bin")),
            retries: Some(3),
            timeout: None,
            single_port: None,
        };

        let config = file.merge_cli(
            None,
            Some(PathBuf::from("b.bin")),
            None,
            Some(Duration::from_millis(500)),
            true,
        );

        assert_eq!(config.address(), "0.0.0.0:69");
        assert_eq!(config.payload_path(), PathBuf::from("b.bin"));
        assert!(config.single_port());

        let transfer = config.transfer(Arc::from(&b"x"[..]));
        assert_eq!(transfer.retries, 3);
        assert_eq!(transfer.timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_unset_fields_use_defaults() {
        let config = Config::default();

        assert_eq!(config.address(), DEFAULT_ADDRESS);
        assert_eq!(config.payload_path(), PathBuf::from(DEFAULT_PAYLOAD));
        assert!(!config.single_port());
    }

    #[test]
    fn test_toml_durations() {
        let config: Config = toml::from_str(
            r#"
            address = "127.0.0.1:6969"
            retries = 4
            timeout = "250ms"
            "#,
        )
        .unwrap();

        assert_eq!(config.retries, Some(4));
        assert_eq!(config.timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.payload, None);
    }
}
