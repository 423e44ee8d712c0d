use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::path::Path;
use std::time::Duration;

use super::config::{ClientConfig, DEFAULT_PORT, DEFAULT_RETRIES, DEFAULT_TIMEOUT};
use crate::tftp::core::{BLOCK_SIZE, DATAGRAM_SIZE, ErrorCode, OCTET_MODE, Packet};

/// TFTP client
///
/// Downloads files (RRQ) in octet mode.
pub struct Client {
    server_ip: IpAddr,
    server_port: u16,
    timeout: Duration,
    retries: u8,
}

impl Client {
    /// Create a new TFTP client
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        let server_str = config
            .server
            .ok_or_else(|| anyhow::anyhow!("Server address not specified"))?;
        let server_ip: IpAddr = server_str
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid server address '{}': {}", server_str, e))?;

        Ok(Self {
            server_ip,
            server_port: config.port.unwrap_or(DEFAULT_PORT),
            // A zero read timeout is rejected by the socket
            timeout: config
                .timeout
                .filter(|t| !t.is_zero())
                .unwrap_or(DEFAULT_TIMEOUT),
            retries: config.retries.unwrap_or(DEFAULT_RETRIES),
        })
    }

    /// Download a file from the server into `local_file`
    pub fn get(&self, remote_file: &str, local_file: &Path) -> anyhow::Result<()> {
        log::info!("Downloading {} to {}", remote_file, local_file.display());

        let data = self.get_bytes(remote_file)?;
        std::fs::write(local_file, &data)?;

        Ok(())
    }

    /// Download a file from the server into memory
    pub fn get_bytes(&self, remote_file: &str) -> anyhow::Result<Vec<u8>> {
        let local: SocketAddr = match self.server_ip {
            IpAddr::V4(_) => "0.0.0.0:0".parse()?,
            IpAddr::V6(_) => "[::]:0".parse()?,
        };
        let socket = UdpSocket::bind(local)?;
        socket.set_read_timeout(Some(self.timeout))?;
        socket.set_write_timeout(Some(self.timeout))?;

        let mut server_addr = SocketAddr::new(self.server_ip, self.server_port);
        let mut tid_set = false;

        // Send RRQ
        let rrq = Packet::Rrq {
            filename: remote_file.to_string(),
            mode: OCTET_MODE.to_string(),
        };
        let mut last_sent = rrq.serialize()?;
        socket.send_to(&last_sent, server_addr)?;

        let mut received = Vec::new();
        let mut block_num: u16 = 1;
        let mut retries = 0;

        loop {
            let mut buf = [0; DATAGRAM_SIZE + 1];
            match socket.recv_from(&mut buf) {
                Ok((amt, src)) => {
                    if !tid_set {
                        if src.ip() == self.server_ip {
                            server_addr = src;
                            tid_set = true;
                        } else {
                            continue;
                        }
                    } else if src != server_addr {
                        log::warn!("Ignoring packet from unknown transfer id {}", src);
                        let error =
                            Packet::error(ErrorCode::UnknownTransferId, "unknown transfer id");
                        socket.send_to(&error.serialize()?, src)?;
                        continue;
                    }

                    let packet = match Packet::deserialize(&buf[..amt]) {
                        Ok(packet) => packet,
                        Err(e) => {
                            log::warn!("Bad packet from {}: {}", src, e);
                            continue;
                        }
                    };

                    match packet {
                        Packet::Data { block_num: block, data } => {
                            if block == block_num {
                                received.extend_from_slice(&data);

                                // Send ACK
                                last_sent = Packet::Ack(block).serialize()?;
                                socket.send_to(&last_sent, server_addr)?;

                                block_num = block_num.wrapping_add(1);
                                retries = 0;

                                if data.len() < BLOCK_SIZE {
                                    break; // End of file
                                }
                            } else if block == block_num.wrapping_sub(1) {
                                // Our ACK was lost, the server resent the block
                                socket.send_to(&Packet::Ack(block).serialize()?, server_addr)?;
                            }
                        }
                        Packet::Error { code, msg } => {
                            return Err(anyhow::anyhow!("TFTP Error {}: {}", code, msg));
                        }
                        other => {
                            log::debug!("Ignoring unexpected packet {:?}", other);
                        }
                    }
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    if retries >= self.retries {
                        return Err(anyhow::anyhow!("Transfer timed out"));
                    }
                    retries += 1;
                    log::warn!("Timeout, retrying... ({}/{})", retries, self.retries);

                    // Resend last packet (RRQ or ACK)
                    socket.send_to(&last_sent, server_addr)?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        log::debug!("Transfer complete. Total bytes: {}", received.len());
        Ok(received)
    }
}
