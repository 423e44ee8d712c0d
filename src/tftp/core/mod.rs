//! TFTP core protocol implementation
//!
//! This module contains the protocol building blocks shared by the server
//! and the client:
//! - `packet`: serialization and deserialization of RRQ, DATA, ACK and ERROR
//! - `blocks`: splitting a payload into numbered DATA packets
//! - `socket`: the per-peer channel abstraction

mod blocks;
mod packet;
mod socket;

pub use blocks::{Block, Blocks};
pub use packet::{BLOCK_SIZE, DATAGRAM_SIZE, ErrorCode, OCTET_MODE, Packet, PacketError};
pub use socket::{ServerSocket, Socket};
