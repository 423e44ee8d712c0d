//! TFTP (Trivial File Transfer Protocol) implementation
//!
//! A read-only subset of [RFC 1350](https://www.rfc-editor.org/rfc/rfc1350):
//! the server answers every read request with the same payload, sent in
//! 512-byte blocks with stop-and-wait retransmission. Write requests and
//! option negotiation are not supported.
//!
//! ## Module Structure
//!
//! ```text
//! tftp/
//! ├── core/           # Core protocol implementation
//! │   ├── packet      # Packet serialization/deserialization
//! │   ├── blocks      # Payload to DATA packet splitting
//! │   └── socket      # Socket abstraction layer
//! │
//! ├── server/         # TFTP server
//! │   ├── server      # Listener loop
//! │   ├── session     # Per-client transfer
//! │   └── config      # Server configuration
//! │
//! └── client/         # TFTP client (download only)
//! ```
//!
//! ## Usage Examples
//!
//! ### Start TFTP Server
//!
//! ```rust,no_run
//! use payload_tftpd::tftp::{server::Config, server::Server};
//! use std::path::PathBuf;
//!
//! let config = Config::with_defaults().merge_cli(
//!     Some("0.0.0.0:69".to_string()),
//!     Some(PathBuf::from("payload.svg")),
//!     None,
//!     None,
//!     false,
//! );
//!
//! let mut server = Server::new(&config).unwrap();
//! server.listen().unwrap();
//! ```

// Submodules
pub mod client;
pub mod core;
pub mod server;
