use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use anyhow::Context;

use crate::tftp::core::{DATAGRAM_SIZE, Packet, ServerSocket, Socket};

use super::config::{Config, TransferConfig};
use super::session::Session;

/// A running transfer, tracked so that each client address has at most one.
struct ActiveSession {
    handle: JoinHandle<()>,
    /// Forwarding queue of the session's [`ServerSocket`] in single-port mode.
    inbox: Option<Sender<Vec<u8>>>,
}

/// TFTP server serving one payload to every read request.
///
/// # Example
///
/// ```rust,no_run
/// use payload_tftpd::tftp::server::{Config, Server};
///
/// let config = Config::with_defaults().merge_cli(
///     Some("0.0.0.0:69".to_string()),
///     Some("boot.img".into()),
///     None,
///     None,
///     false,
/// );
///
/// let mut server = Server::new(&config).unwrap();
/// server.listen().unwrap();
/// ```
pub struct Server {
    socket: UdpSocket,
    transfer: TransferConfig,
    single_port: bool,
    sessions: HashMap<SocketAddr, ActiveSession>,
}

impl Server {
    /// Reads the payload file and binds the listening socket.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let path = config.payload_path();
        let payload = std::fs::read(&path)
            .with_context(|| format!("Failed to read payload {}", path.display()))?;

        let socket = UdpSocket::bind(config.address())
            .with_context(|| format!("Failed to bind {}", config.address()))?;

        let server = Self::with_socket(socket, config.transfer(payload.into()))?;
        Ok(server.with_single_port(config.single_port()))
    }

    /// Wraps an already bound socket. Fails if there is nothing to serve.
    pub fn with_socket(socket: UdpSocket, transfer: TransferConfig) -> anyhow::Result<Self> {
        if transfer.payload.is_empty() {
            anyhow::bail!("payload is required");
        }

        Ok(Self {
            socket,
            transfer,
            single_port: false,
            sessions: HashMap::new(),
        })
    }

    /// Sets whether transfers share the listening port instead of using
    /// an ephemeral port each.
    pub fn with_single_port(mut self, single_port: bool) -> Self {
        self.single_port = single_port;
        self
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Serves read requests until the listening socket fails. That failure is
    /// the only error returned; malformed datagrams and failed transfers are
    /// logged and skipped.
    pub fn listen(&mut self) -> anyhow::Result<()> {
        log::info!(
            "Listening on {} ({} byte payload, {} retries, {:?} timeout)",
            self.local_addr()?,
            self.transfer.payload.len(),
            self.transfer.retries,
            self.transfer.timeout
        );

        let mut buf = [0; DATAGRAM_SIZE];
        loop {
            let (amt, addr) = self.socket.recv_from(&mut buf).map_err(|e| {
                log::error!("Receive failed on listening socket: {}", e);
                e
            })?;
            log::trace!("{} bytes from {}", amt, addr);

            self.sessions.retain(|_, s| !s.handle.is_finished());

            if self.forward(addr, &buf[..amt]) {
                continue;
            }

            match Packet::deserialize(&buf[..amt]) {
                Ok(Packet::Rrq { filename, mode }) => {
                    if self.sessions.contains_key(&addr) {
                        log::warn!("[{}] transfer already in progress, ignoring request", addr);
                        continue;
                    }
                    log::info!("[{}] requested file: {} ({})", addr, filename, mode);
                    if let Err(e) = self.spawn_session(addr) {
                        log::error!("[{}] failed to start transfer: {:#}", addr, e);
                    }
                }
                Ok(other) => {
                    log::debug!("[{}] ignoring unexpected packet {:?}", addr, other);
                }
                Err(e) => {
                    log::warn!("[{}] bad request: {}", addr, e);
                }
            }
        }
    }

    /// Hands a datagram to the running single-port session of `addr`.
    /// Returns `false` if no such session takes it.
    fn forward(&mut self, addr: SocketAddr, datagram: &[u8]) -> bool {
        let Some(inbox) = self.sessions.get(&addr).and_then(|s| s.inbox.as_ref()) else {
            return false;
        };

        if inbox.send(datagram.to_vec()).is_ok() {
            return true;
        }
        self.sessions.remove(&addr);
        false
    }

    fn spawn_session(&mut self, client: SocketAddr) -> anyhow::Result<()> {
        let transfer = self.transfer.clone();

        let (handle, inbox) = if self.single_port {
            let socket = ServerSocket::new(self.socket.try_clone()?, client, transfer.timeout);
            let inbox = socket.sender();
            (spawn_transfer(socket, transfer)?, Some(inbox))
        } else {
            let local = SocketAddr::new(self.socket.local_addr()?.ip(), 0);
            let socket = UdpSocket::bind(local)
                .with_context(|| format!("Failed to bind transfer socket on {}", local))?;
            socket.connect(client)?;
            log::debug!("[{}] transfer socket bound to {}", client, socket.local_addr()?);
            (spawn_transfer(socket, transfer)?, None)
        };

        self.sessions.insert(client, ActiveSession { handle, inbox });
        Ok(())
    }
}

fn spawn_transfer<S: Socket>(
    socket: S,
    transfer: TransferConfig,
) -> anyhow::Result<JoinHandle<()>> {
    let session = Session::new(socket, transfer)?;
    let client = session.client();

    let handle = thread::Builder::new()
        .name(format!("tftp-{}", client))
        .spawn(move || {
            if let Err(e) = session.run() {
                log::warn!("[{}] transfer aborted: {}", client, e);
            }
        })?;

    Ok(handle)
}
