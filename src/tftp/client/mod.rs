//! TFTP client implementation
//!
//! Downloads a file with a read request, the counterpart of the server.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use payload_tftpd::tftp::client::Client;
//! use payload_tftpd::tftp::client::config::ClientConfig;
//! use std::path::Path;
//!
//! let config = ClientConfig::new("192.168.1.100".to_string(), 69);
//! let client = Client::new(config).unwrap();
//! client.get("payload.svg", Path::new("local.svg")).unwrap();
//! ```
//!
//! # Command Line Usage
//!
//! ```bash
//! payload-tftpd fetch 192.168.1.100 payload.svg [local.svg]
//! ```

mod client_impl;
pub mod config;

use anyhow::Result;
use std::path::PathBuf;

pub use client_impl::Client;

/// Run the `fetch` command with CLI arguments and optional configuration
pub fn run_with_config(
    server: String,
    remote_file: String,
    local_file: Option<PathBuf>,
    port: Option<u16>,
    timeout: Option<u64>,
    retries: Option<u8>,
    config: Option<&config::ClientConfig>,
) -> Result<()> {
    let client_config = config.cloned().unwrap_or_default();
    let cfg = client_config.merge_cli(server, port, timeout, retries);

    let local_path = local_file.unwrap_or_else(|| PathBuf::from(&remote_file));

    log::info!(
        "Downloading {} from {}:{}",
        remote_file,
        cfg.server.as_deref().unwrap_or("unknown"),
        cfg.port.unwrap_or(69)
    );
    log::info!("Saving to: {}", local_path.display());

    let client = Client::new(cfg)?;
    client.get(&remote_file, &local_path)?;

    log::info!("Download completed successfully");
    Ok(())
}
