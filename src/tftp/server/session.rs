use std::io::{Error as IoError, ErrorKind};
use std::net::SocketAddr;

use thiserror::Error;

use crate::tftp::core::{Block, Blocks, ErrorCode, Packet, PacketError, Socket};

use super::config::TransferConfig;

/// Why a transfer session was aborted.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("client reported error {code}: {msg}")]
    Peer { code: ErrorCode, msg: String },
    #[error("exhausted retries on block {block}")]
    RetriesExhausted { block: u16 },
    #[error("transport failure: {0}")]
    Transport(anyhow::Error),
}

/// Statistics of a completed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSummary {
    pub blocks: u64,
    pub bytes: u64,
}

/// What one receive attempt produced.
enum Reply {
    Acked,
    Timeout,
    Noise,
    PeerError { code: ErrorCode, msg: String },
}

/// Stop-and-wait sender of the shared payload to one client.
///
/// Each block is transmitted at most `retries` times. After each
/// transmission the session waits one read timeout for the matching ACK;
/// anything else is noise and costs one attempt.
pub struct Session<S: Socket> {
    socket: S,
    client: SocketAddr,
    config: TransferConfig,
}

impl<S: Socket> Session<S> {
    pub fn new(mut socket: S, config: TransferConfig) -> anyhow::Result<Self> {
        socket.set_read_timeout(config.timeout)?;
        let client = socket.remote_addr()?;

        Ok(Self {
            socket,
            client,
            config,
        })
    }

    pub fn client(&self) -> SocketAddr {
        self.client
    }

    /// Runs the transfer to completion. The channel is closed when the
    /// session is dropped, whatever the outcome.
    pub fn run(self) -> Result<TransferSummary, SessionError> {
        let mut summary = TransferSummary {
            blocks: 0,
            bytes: 0,
        };

        let total = Blocks::count_for(self.config.payload.len());
        for block in Blocks::new(self.config.payload.clone()) {
            log::debug!(
                "[{}] sending block {}/{} ({} bytes)",
                self.client,
                summary.blocks + 1,
                total,
                block.data.len()
            );

            self.deliver(&block)?;

            summary.blocks += 1;
            summary.bytes += block.data.len() as u64;
        }

        log::info!(
            "[{}] sent {} blocks ({} bytes)",
            self.client,
            summary.blocks,
            summary.bytes
        );
        Ok(summary)
    }

    /// Transmits one block until it is acknowledged or the retry budget is spent.
    fn deliver(&self, block: &Block) -> Result<(), SessionError> {
        let block_num = block.num;
        let packet = block.to_packet();

        let mut attempts_remaining = self.config.retries;
        while attempts_remaining > 0 {
            attempts_remaining -= 1;

            self.socket.send(&packet).map_err(SessionError::Transport)?;

            match self.await_ack(block_num)? {
                Reply::Acked => return Ok(()),
                Reply::Timeout => {
                    log::debug!(
                        "[{}] timeout waiting for ACK {}, {} attempts left",
                        self.client,
                        block_num,
                        attempts_remaining
                    );
                }
                Reply::Noise => {
                    log::debug!(
                        "[{}] no progress on block {}, {} attempts left",
                        self.client,
                        block_num,
                        attempts_remaining
                    );
                }
                Reply::PeerError { code, msg } => {
                    return Err(SessionError::Peer { code, msg });
                }
            }
        }

        Err(SessionError::RetriesExhausted { block: block_num })
    }

    fn await_ack(&self, block_num: u16) -> Result<Reply, SessionError> {
        match self.socket.recv() {
            Ok(Packet::Ack(acked)) if acked == block_num => Ok(Reply::Acked),
            Ok(Packet::Ack(acked)) => {
                log::warn!(
                    "[{}] ACK {} does not match block {}",
                    self.client,
                    acked,
                    block_num
                );
                Ok(Reply::Noise)
            }
            Ok(Packet::Error { code, msg }) => Ok(Reply::PeerError { code, msg }),
            Ok(other) => {
                log::warn!("[{}] unexpected packet {:?}", self.client, other);
                Ok(Reply::Noise)
            }
            Err(e) if is_timeout(&e) => Ok(Reply::Timeout),
            Err(e) if e.downcast_ref::<PacketError>().is_some() => {
                log::warn!("[{}] bad packet: {}", self.client, e);
                Ok(Reply::Noise)
            }
            Err(e) => Err(SessionError::Transport(e)),
        }
    }
}

fn is_timeout(err: &anyhow::Error) -> bool {
    err.downcast_ref::<IoError>()
        .map(|e| matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::str::FromStr;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::tftp::core::BLOCK_SIZE;

    /// What the scripted peer does in response to one send.
    enum Step {
        Reply(Vec<u8>),
        Timeout,
        Fail,
    }

    /// In-memory channel: records every packet sent and answers each
    /// receive from a script. An exhausted script acknowledges whatever
    /// was sent last.
    #[derive(Clone)]
    struct ScriptedSocket {
        sent: Arc<Mutex<Vec<Packet>>>,
        script: Arc<Mutex<VecDeque<Step>>>,
        timeout: Arc<Mutex<Option<Duration>>>,
    }

    impl ScriptedSocket {
        fn new(script: Vec<Step>) -> Self {
            Self {
                sent: Arc::new(Mutex::new(Vec::new())),
                script: Arc::new(Mutex::new(script.into())),
                timeout: Arc::new(Mutex::new(None)),
            }
        }

        fn sent(&self) -> Vec<Packet> {
            self.sent.lock().unwrap().clone()
        }

        fn sent_blocks(&self) -> Vec<u16> {
            self.sent()
                .iter()
                .map(|p| match p {
                    Packet::Data { block_num, .. } => *block_num,
                    other => panic!("unexpected packet {:?}", other),
                })
                .collect()
        }
    }

    impl Socket for ScriptedSocket {
        fn send(&self, packet: &Packet) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(packet.clone());
            Ok(())
        }

        fn recv(&self) -> anyhow::Result<Packet> {
            let step = self.script.lock().unwrap().pop_front();
            match step {
                Some(Step::Reply(bytes)) => Ok(Packet::deserialize(&bytes)?),
                Some(Step::Timeout) => Err(IoError::from(ErrorKind::WouldBlock).into()),
                Some(Step::Fail) => Err(IoError::from(ErrorKind::ConnectionRefused).into()),
                None => match self.sent.lock().unwrap().last() {
                    Some(Packet::Data { block_num, .. }) => Ok(Packet::Ack(*block_num)),
                    _ => Err(IoError::from(ErrorKind::WouldBlock).into()),
                },
            }
        }

        fn remote_addr(&self) -> anyhow::Result<SocketAddr> {
            Ok(SocketAddr::from_str("127.0.0.1:50000").unwrap())
        }

        fn set_read_timeout(&mut self, dur: Duration) -> anyhow::Result<()> {
            *self.timeout.lock().unwrap() = Some(dur);
            Ok(())
        }
    }

    fn ack(block: u16) -> Step {
        Step::Reply(Packet::Ack(block).serialize().unwrap())
    }

    fn payload(len: usize) -> Arc<[u8]> {
        (0..len).map(|i| (i % 251) as u8).collect::<Vec<u8>>().into()
    }

    fn run(
        socket: &ScriptedSocket,
        len: usize,
        retries: u8,
    ) -> Result<TransferSummary, SessionError> {
        let config = TransferConfig::new(payload(len)).with_retries(retries);
        Session::new(socket.clone(), config).unwrap().run()
    }

    fn received_bytes(sent: &[Packet]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut expected = 1u16;
        for packet in sent {
            if let Packet::Data { block_num, data } = packet {
                if *block_num == expected {
                    out.extend_from_slice(data);
                    expected = expected.wrapping_add(1);
                }
            }
        }
        out
    }

    #[test]
    fn test_arms_read_timeout() {
        let socket = ScriptedSocket::new(vec![]);
        let config =
            TransferConfig::new(payload(10)).with_timeout(Duration::from_millis(1500));

        let session = Session::new(socket.clone(), config).unwrap();

        assert_eq!(
            *socket.timeout.lock().unwrap(),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(session.client(), SocketAddr::from_str("127.0.0.1:50000").unwrap());
    }

    #[test]
    fn test_zero_loss_sends_each_block_once() {
        let socket = ScriptedSocket::new(vec![]);

        let summary = run(&socket, 2000, 10).unwrap();

        assert_eq!(summary, TransferSummary { blocks: 4, bytes: 2000 });
        assert_eq!(socket.sent_blocks(), vec![1, 2, 3, 4]);
        assert!(socket.script.lock().unwrap().is_empty());
    }

    #[test]
    fn test_thousand_byte_payload() {
        let socket = ScriptedSocket::new(vec![]);

        run(&socket, 1000, 10).unwrap();

        let lengths: Vec<usize> = socket
            .sent()
            .iter()
            .map(|p| match p {
                Packet::Data { data, .. } => data.len(),
                other => panic!("unexpected packet {:?}", other),
            })
            .collect();
        assert_eq!(lengths, vec![512, 488]);
        assert_eq!(received_bytes(&socket.sent()), payload(1000).to_vec());
    }

    #[test]
    fn test_exact_multiple_sends_empty_final_block() {
        let socket = ScriptedSocket::new(vec![]);

        let summary = run(&socket, 2 * BLOCK_SIZE, 10).unwrap();

        assert_eq!(summary.blocks, 3);
        assert_eq!(
            socket.sent().last(),
            Some(&Packet::Data {
                block_num: 3,
                data: vec![]
            })
        );
    }

    #[test]
    fn test_lost_data_is_retransmitted() {
        // block 1 acked, block 2 lost once, then everything flows
        let socket = ScriptedSocket::new(vec![ack(1), Step::Timeout]);

        run(&socket, 1300, 10).unwrap();

        assert_eq!(socket.sent_blocks(), vec![1, 2, 2, 3]);
        assert_eq!(received_bytes(&socket.sent()), payload(1300).to_vec());
    }

    #[test]
    fn test_stale_ack_does_not_advance() {
        let socket = ScriptedSocket::new(vec![ack(1), ack(1), ack(7)]);

        let summary = run(&socket, 1300, 10).unwrap();

        assert_eq!(socket.sent_blocks(), vec![1, 2, 2, 2, 3]);
        assert_eq!(summary.blocks, 3);
    }

    #[test]
    fn test_malformed_reply_is_noise() {
        let socket = ScriptedSocket::new(vec![
            Step::Reply(vec![0, 4, 0]),
            Step::Reply(vec![9, 9, 9, 9]),
        ]);

        run(&socket, 100, 10).unwrap();

        assert_eq!(socket.sent_blocks(), vec![1, 1, 1]);
    }

    #[test]
    fn test_data_reply_is_noise() {
        let data = Packet::Data {
            block_num: 1,
            data: vec![1],
        };
        let socket = ScriptedSocket::new(vec![Step::Reply(data.serialize().unwrap())]);

        run(&socket, 100, 10).unwrap();

        assert_eq!(socket.sent_blocks(), vec![1, 1]);
    }

    #[test]
    fn test_retries_exhausted() {
        let socket = ScriptedSocket::new((0..3).map(|_| Step::Timeout).collect());

        let result = run(&socket, 100, 3);

        assert!(matches!(
            result,
            Err(SessionError::RetriesExhausted { block: 1 })
        ));
        assert_eq!(socket.sent_blocks(), vec![1, 1, 1]);
    }

    #[test]
    fn test_retry_budget_resets_per_block() {
        let socket = ScriptedSocket::new(vec![
            Step::Timeout,
            ack(1),
            Step::Timeout,
            ack(2),
            Step::Timeout,
        ]);

        let summary = run(&socket, 1300, 2).unwrap();

        assert_eq!(summary.blocks, 3);
        assert_eq!(socket.sent_blocks(), vec![1, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn test_noise_consumes_retries() {
        let socket = ScriptedSocket::new(vec![ack(5), ack(5)]);

        let result = run(&socket, 100, 2);

        assert!(matches!(
            result,
            Err(SessionError::RetriesExhausted { block: 1 })
        ));
    }

    #[test]
    fn test_peer_error_aborts_immediately() {
        let error = Packet::error(ErrorCode::DiskFull, "disk full");
        let socket = ScriptedSocket::new(vec![ack(1), Step::Reply(error.serialize().unwrap())]);

        let result = run(&socket, 5000, 10);

        match result {
            Err(SessionError::Peer { code, msg }) => {
                assert_eq!(code, ErrorCode::DiskFull);
                assert_eq!(msg, "disk full");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(socket.sent_blocks(), vec![1, 2]);
    }

    #[test]
    fn test_transport_failure_aborts() {
        let socket = ScriptedSocket::new(vec![Step::Fail]);

        let result = run(&socket, 100, 10);

        assert!(matches!(result, Err(SessionError::Transport(_))));
        assert_eq!(socket.sent_blocks(), vec![1]);
    }
}
