//! Protocol error types and status codes.

use crate::message::OperationKind;
use crate::PacketType;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while framing, encoding or decoding SFTP packets.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unexpected end of packet: need {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("invalid packet length: {0}")]
    InvalidLength(u32),

    #[error("packet too large: {size} bytes (max {max})")]
    PacketTooLarge { size: u32, max: u32 },

    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,

    #[error("unknown packet type: {0}")]
    UnknownPacketType(u8),

    #[error("unexpected packet type: {0:?}")]
    UnexpectedPacket(PacketType),

    #[error("unknown extension: {0}")]
    UnknownExtension(String),

    #[error("unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u32),

    #[error("{operation} is not supported by protocol version {version}")]
    Unsupported {
        operation: OperationKind,
        version: u32,
    },

    #[error("invalid open mode: {0:?}")]
    InvalidOpenMode(String),
}

impl ProtocolError {
    /// Returns whether this error leaves the packet stream in an unknown
    /// state. Capability and argument errors are local to a single call.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ProtocolError::Unsupported { .. } | ProtocolError::InvalidOpenMode(_)
        )
    }
}

/// Status code carried by `SSH_FXP_STATUS` replies.
///
/// Codes outside the known table are kept verbatim so they can be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(u32);

impl StatusCode {
    pub const OK: Self = Self(0);
    pub const EOF: Self = Self(1);
    pub const NO_SUCH_FILE: Self = Self(2);
    pub const PERMISSION_DENIED: Self = Self(3);
    pub const FAILURE: Self = Self(4);
    pub const BAD_MESSAGE: Self = Self(5);
    pub const NO_CONNECTION: Self = Self(6);
    pub const CONNECTION_LOST: Self = Self(7);
    pub const OP_UNSUPPORTED: Self = Self(8);
    pub const INVALID_HANDLE: Self = Self(9);
    pub const NO_SUCH_PATH: Self = Self(10);
    pub const FILE_ALREADY_EXISTS: Self = Self(11);
    pub const WRITE_PROTECT: Self = Self(12);
    pub const NO_MEDIA: Self = Self(13);
    pub const NO_SPACE_ON_FILESYSTEM: Self = Self(14);
    pub const QUOTA_EXCEEDED: Self = Self(15);
    pub const UNKNOWN_PRINCIPAL: Self = Self(16);
    pub const LOCK_CONFLICT: Self = Self(17);
    pub const DIR_NOT_EMPTY: Self = Self(18);
    pub const NOT_A_DIRECTORY: Self = Self(19);
    pub const INVALID_FILENAME: Self = Self(20);
    pub const LINK_LOOP: Self = Self(21);

    pub const fn new(code: u32) -> Self {
        Self(code)
    }

    pub const fn code(&self) -> u32 {
        self.0
    }

    pub fn is_ok(&self) -> bool {
        *self == Self::OK
    }

    pub fn is_eof(&self) -> bool {
        *self == Self::EOF
    }

    /// Returns the lowercase name of the code, or `None` when the code is not
    /// one the protocol defines.
    pub fn name(&self) -> Option<&'static str> {
        let name = match self.0 {
            0 => "ok",
            1 => "eof",
            2 => "no such file",
            3 => "permission denied",
            4 => "failure",
            5 => "bad message",
            6 => "no connection",
            7 => "connection lost",
            8 => "op unsupported",
            9 => "invalid handle",
            10 => "no such path",
            11 => "file already exists",
            12 => "write protect",
            13 => "no media",
            14 => "no space on filesystem",
            15 => "quota exceeded",
            16 => "unknown principal",
            17 => "lock conflict",
            18 => "dir not empty",
            19 => "not a directory",
            20 => "invalid filename",
            21 => "link loop",
            _ => return None,
        };
        Some(name)
    }
}

impl From<u32> for StatusCode {
    fn from(code: u32) -> Self {
        Self(code)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "unknown status {}", self.0),
        }
    }
}
