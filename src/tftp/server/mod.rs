//! TFTP server implementation
//!
//! This module provides the read-only TFTP server:
//! - `server_impl`: the listener, accepts read requests and starts transfers
//! - `session`: one stop-and-wait transfer of the payload to one client
//! - `config`: server configuration

pub mod config;
mod server_impl;
mod session;

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

// Public server types
pub use config::{Config, TransferConfig};
pub use server_impl::Server;
pub use session::{Session, SessionError, TransferSummary};

/// Run the TFTP server with CLI arguments and optional configuration
pub fn run_with_config(
    address: Option<String>,
    payload: Option<PathBuf>,
    retries: Option<u8>,
    timeout: Option<Duration>,
    single_port: bool,
    config: Option<Config>,
) -> Result<()> {
    let server_config = config.unwrap_or_default();
    let config = server_config.merge_cli(address, payload, retries, timeout, single_port);

    log::info!("Starting TFTP server on {}", config.address());
    log::info!("Payload: {}", config.payload_path().display());
    log::info!("Single port mode: {}", config.single_port());

    let mut server = Server::new(&config)?;

    log::info!("TFTP server listening, press Ctrl+C to stop");
    server.listen()
}
