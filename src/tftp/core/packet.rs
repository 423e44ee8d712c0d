use std::fmt;

use thiserror::Error;

/// Maximum number of payload bytes carried by one DATA packet.
pub const BLOCK_SIZE: usize = 512;

/// Largest datagram the protocol produces: opcode, block number and one block.
pub const DATAGRAM_SIZE: usize = BLOCK_SIZE + 4;

/// The only transfer mode the server accepts.
pub const OCTET_MODE: &str = "octet";

const OP_RRQ: u16 = 1;
const OP_DATA: u16 = 3;
const OP_ACK: u16 = 4;
const OP_ERROR: u16 = 5;

/// Reasons a datagram cannot be decoded as a [`Packet`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("packet too short ({0} bytes)")]
    Truncated(usize),
    #[error("unsupported opcode {0}")]
    UnsupportedOpcode(u16),
    #[error("missing NUL terminator")]
    MissingTerminator,
    #[error("string field is not valid UTF-8")]
    InvalidString,
    #[error("empty filename")]
    EmptyFilename,
    #[error("unsupported transfer mode '{0}', only binary transfers supported")]
    UnsupportedMode(String),
    #[error("packet too large ({0} bytes)")]
    Oversized(usize),
}

/// RFC 1350 error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotDefined = 0,
    FileNotFound = 1,
    AccessViolation = 2,
    DiskFull = 3,
    IllegalOperation = 4,
    UnknownTransferId = 5,
    FileExists = 6,
    NoSuchUser = 7,
}

impl ErrorCode {
    /// Unknown codes are folded into [`ErrorCode::NotDefined`].
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => Self::FileNotFound,
            2 => Self::AccessViolation,
            3 => Self::DiskFull,
            4 => Self::IllegalOperation,
            5 => Self::UnknownTransferId,
            6 => Self::FileExists,
            7 => Self::NoSuchUser,
            _ => Self::NotDefined,
        }
    }

    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotDefined => "not defined",
            Self::FileNotFound => "file not found",
            Self::AccessViolation => "access violation",
            Self::DiskFull => "disk full",
            Self::IllegalOperation => "illegal operation",
            Self::UnknownTransferId => "unknown transfer id",
            Self::FileExists => "file already exists",
            Self::NoSuchUser => "no such user",
        };
        write!(f, "{} ({})", name, self.as_u16())
    }
}

/// A decoded TFTP packet. Write requests are not part of the protocol
/// subset spoken here and decode as [`PacketError::UnsupportedOpcode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Rrq { filename: String, mode: String },
    Data { block_num: u16, data: Vec<u8> },
    Ack(u16),
    Error { code: ErrorCode, msg: String },
}

impl Packet {
    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        let mut buf = Vec::with_capacity(DATAGRAM_SIZE);
        match self {
            Packet::Rrq { filename, mode } => {
                if filename.is_empty() {
                    return Err(PacketError::EmptyFilename);
                }
                buf.extend_from_slice(&OP_RRQ.to_be_bytes());
                push_str(&mut buf, filename)?;
                push_str(&mut buf, mode)?;
            }
            Packet::Data { block_num, data } => {
                if data.len() > BLOCK_SIZE {
                    return Err(PacketError::Oversized(data.len() + 4));
                }
                buf.extend_from_slice(&OP_DATA.to_be_bytes());
                buf.extend_from_slice(&block_num.to_be_bytes());
                buf.extend_from_slice(data);
            }
            Packet::Ack(block_num) => {
                buf.extend_from_slice(&OP_ACK.to_be_bytes());
                buf.extend_from_slice(&block_num.to_be_bytes());
            }
            Packet::Error { code, msg } => {
                buf.extend_from_slice(&OP_ERROR.to_be_bytes());
                buf.extend_from_slice(&code.as_u16().to_be_bytes());
                push_str(&mut buf, msg)?;
            }
        }
        Ok(buf)
    }

    pub fn deserialize(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < 4 {
            return Err(PacketError::Truncated(buf.len()));
        }
        if buf.len() > DATAGRAM_SIZE {
            return Err(PacketError::Oversized(buf.len()));
        }

        let opcode = u16::from_be_bytes([buf[0], buf[1]]);
        let body = &buf[2..];
        match opcode {
            OP_RRQ => {
                let (filename, rest) = take_str(body)?;
                let (mode, _) = take_str(rest)?;
                if filename.is_empty() {
                    return Err(PacketError::EmptyFilename);
                }
                if !mode.eq_ignore_ascii_case(OCTET_MODE) {
                    return Err(PacketError::UnsupportedMode(mode));
                }
                Ok(Packet::Rrq { filename, mode })
            }
            OP_DATA => Ok(Packet::Data {
                block_num: u16::from_be_bytes([body[0], body[1]]),
                data: body[2..].to_vec(),
            }),
            OP_ACK => {
                if buf.len() != 4 {
                    return Err(PacketError::Oversized(buf.len()));
                }
                Ok(Packet::Ack(u16::from_be_bytes([body[0], body[1]])))
            }
            OP_ERROR => {
                if buf.len() < 5 {
                    return Err(PacketError::Truncated(buf.len()));
                }
                let code = ErrorCode::from_u16(u16::from_be_bytes([body[0], body[1]]));
                let (msg, _) = take_str(&body[2..])?;
                Ok(Packet::Error { code, msg })
            }
            other => Err(PacketError::UnsupportedOpcode(other)),
        }
    }

    pub fn error(code: ErrorCode, msg: impl Into<String>) -> Self {
        Packet::Error {
            code,
            msg: msg.into(),
        }
    }
}

fn push_str(buf: &mut Vec<u8>, value: &str) -> Result<(), PacketError> {
    if value.as_bytes().contains(&0) {
        return Err(PacketError::InvalidString);
    }
    buf.extend_from_slice(value.as_bytes());
    buf.push(0);
    Ok(())
}

/// Splits off one NUL-terminated string, returning it with the remainder.
fn take_str(buf: &[u8]) -> Result<(String, &[u8]), PacketError> {
    let end = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or(PacketError::MissingTerminator)?;
    let value = std::str::from_utf8(&buf[..end]).map_err(|_| PacketError::InvalidString)?;
    Ok((value.to_string(), &buf[end + 1..]))
}
