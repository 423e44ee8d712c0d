use super::Packet;
use super::packet::DATAGRAM_SIZE;
use std::{
    io::{Error as IoError, ErrorKind},
    net::{SocketAddr, UdpSocket},
    sync::{
        Mutex,
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
    },
    time::Duration,
};

/// Socket `trait` is the point-to-point channel a transfer session talks
/// through. Every implementation is bound to exactly one remote peer.
///
/// Receive errors are reported through `anyhow` and keep their concrete type:
/// an [`std::io::Error`] of kind `WouldBlock`/`TimedOut` means the read
/// timeout expired, a [`super::PacketError`] means the datagram could not be
/// decoded.
pub trait Socket: Send + Sync + 'static {
    /// Sends a [`Packet`] to the socket's remote peer.
    fn send(&self, packet: &Packet) -> anyhow::Result<()>;
    /// Receives one [`Packet`] from the remote peer, waiting at most the
    /// configured read timeout.
    fn recv(&self) -> anyhow::Result<Packet>;
    /// Returns the remote [`SocketAddr`].
    fn remote_addr(&self) -> anyhow::Result<SocketAddr>;
    /// Sets the read timeout for the [`Socket`].
    fn set_read_timeout(&mut self, dur: Duration) -> anyhow::Result<()>;
}

/// A [`UdpSocket`] that has been `connect`ed to its peer; datagrams from any
/// other address are filtered out by the kernel.
impl Socket for UdpSocket {
    fn send(&self, packet: &Packet) -> anyhow::Result<()> {
        UdpSocket::send(self, &packet.serialize()?)?;

        Ok(())
    }

    fn recv(&self) -> anyhow::Result<Packet> {
        let mut buf = [0; DATAGRAM_SIZE + 1];
        let amt = UdpSocket::recv(self, &mut buf)?;
        let packet = Packet::deserialize(&buf[..amt])?;

        Ok(packet)
    }

    fn remote_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.peer_addr()?)
    }

    fn set_read_timeout(&mut self, dur: Duration) -> anyhow::Result<()> {
        UdpSocket::set_read_timeout(self, Some(dur))?;

        Ok(())
    }
}

/// ServerSocket `struct` is the per-client channel used in single-port mode.
/// Packets are sent from the shared listener socket, and the listener pushes
/// every datagram it receives from `remote` into this socket's queue.
///
/// # Example
///
/// ```rust
/// use std::net::{SocketAddr, UdpSocket};
/// use std::str::FromStr;
/// use payload_tftpd::tftp::core::{Socket, ServerSocket, Packet};
/// use std::time::Duration;
///
/// let socket = ServerSocket::new(
///     UdpSocket::bind("127.0.0.1:0").unwrap(),
///     SocketAddr::from_str("127.0.0.1:50000").unwrap(),
///     Duration::from_secs(3)
/// );
/// socket.send(&Packet::Ack(1)).unwrap();
/// ```
pub struct ServerSocket {
    socket: UdpSocket,
    remote: SocketAddr,
    sender: Sender<Vec<u8>>,
    receiver: Mutex<Receiver<Vec<u8>>>,
    timeout: Duration,
}

impl Socket for ServerSocket {
    fn send(&self, packet: &Packet) -> anyhow::Result<()> {
        self.socket.send_to(&packet.serialize()?, self.remote)?;

        Ok(())
    }

    fn recv(&self) -> anyhow::Result<Packet> {
        let receiver = self
            .receiver
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to lock receiver"))?;

        match receiver.recv_timeout(self.timeout) {
            Ok(datagram) => Ok(Packet::deserialize(&datagram)?),
            Err(RecvTimeoutError::Timeout) => Err(IoError::from(ErrorKind::TimedOut).into()),
            Err(RecvTimeoutError::Disconnected) => {
                Err(IoError::from(ErrorKind::NotConnected).into())
            }
        }
    }

    fn remote_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.remote)
    }

    fn set_read_timeout(&mut self, dur: Duration) -> anyhow::Result<()> {
        self.timeout = dur;

        Ok(())
    }
}

impl ServerSocket {
    /// Creates a new [`ServerSocket`] from a [`UdpSocket`] and a remote [`SocketAddr`].
    pub fn new(socket: UdpSocket, remote: SocketAddr, timeout: Duration) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            socket,
            remote,
            sender,
            receiver: Mutex::new(receiver),
            timeout,
        }
    }

    /// Returns a [`Sender`] the listener uses to forward raw datagrams from
    /// the remote peer.
    pub fn sender(&self) -> Sender<Vec<u8>> {
        self.sender.clone()
    }
}

impl<T: Socket + ?Sized> Socket for Box<T> {
    fn send(&self, packet: &Packet) -> anyhow::Result<()> {
        (**self).send(packet)
    }

    fn recv(&self) -> anyhow::Result<Packet> {
        (**self).recv()
    }

    fn remote_addr(&self) -> anyhow::Result<SocketAddr> {
        (**self).remote_addr()
    }

    fn set_read_timeout(&mut self, dur: Duration) -> anyhow::Result<()> {
        (**self).set_read_timeout(dur)
    }
}
