//! Per-revision request encoding and reply decoding.
//!
//! Each revision module handles the operations it adds or reshapes and hands
//! everything else to the revision before it, down to [`v01`], which matches
//! every [`Operation`] and rejects the ones it does not know. Reply decoding
//! is layered the same way.

mod v01;
mod v02;
mod v03;
mod v04;
mod v05;
mod v06;

use crate::attributes::AttributeCodec;
use crate::buffer::Payload;
use crate::codec::Encoder;
use crate::constants::PacketType;
use crate::error::ProtocolError;
use crate::message::{Operation, OperationKind, ReplyData};
use bytes::BytesMut;

pub use v04::DEFAULT_STAT_FLAGS;
pub use v06::{check_file_digest_len, CHECK_FILE_ALGORITHMS, MIN_CHECK_FILE_BLOCK_SIZE};

/// Wire format of one negotiated protocol revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Driver {
    V1,
    V2,
    V3,
    V4,
    V5,
    /// Version 6 including the vendor extensions of the filexfer drafts.
    V6,
}

impl Driver {
    pub fn for_version(version: u32) -> Result<Self, ProtocolError> {
        match version {
            1 => Ok(Driver::V1),
            2 => Ok(Driver::V2),
            3 => Ok(Driver::V3),
            4 => Ok(Driver::V4),
            5 => Ok(Driver::V5),
            6 => Ok(Driver::V6),
            _ => Err(ProtocolError::UnsupportedVersion(version)),
        }
    }

    pub fn version(&self) -> u32 {
        match self {
            Driver::V1 => 1,
            Driver::V2 => 2,
            Driver::V3 => 3,
            Driver::V4 => 4,
            Driver::V5 => 5,
            Driver::V6 => 6,
        }
    }

    /// Attribute layout used by this revision.
    pub fn attributes(&self) -> &'static AttributeCodec {
        match self {
            Driver::V1 | Driver::V2 | Driver::V3 => &crate::attributes::V1,
            Driver::V4 => &crate::attributes::V4,
            Driver::V5 => &crate::attributes::V5,
            Driver::V6 => &crate::attributes::V6,
        }
    }

    /// Whether extension requests and replies are available.
    pub fn is_extended(&self) -> bool {
        matches!(self, Driver::V6)
    }

    /// Returns whether operations of `kind` can be sent at this revision.
    pub fn supports(&self, kind: OperationKind) -> bool {
        let version = self.version();
        match kind {
            OperationKind::Rename => version >= 2,
            OperationKind::Readlink | OperationKind::Symlink => version >= 3,
            OperationKind::Link | OperationKind::Block | OperationKind::Unblock => version >= 6,
            OperationKind::Extended => self.is_extended(),
            _ => true,
        }
    }

    /// Writes the arguments of `op` (everything after the request id) and
    /// returns the packet type to send them under.
    pub fn encode(&self, op: &Operation, buf: &mut BytesMut) -> Result<PacketType, ProtocolError> {
        match self {
            Driver::V1 => v01::encode(self, op, buf),
            Driver::V2 => v02::encode(self, op, buf),
            Driver::V3 => v03::encode(self, op, buf),
            Driver::V4 => v04::encode(self, op, buf),
            Driver::V5 => v05::encode(self, op, buf),
            Driver::V6 => v06::encode(self, op, buf),
        }
    }

    /// Encodes `op` as a complete, framed request packet.
    pub fn encode_request(&self, id: u32, op: &Operation) -> Result<BytesMut, ProtocolError> {
        let mut args = BytesMut::new();
        let packet_type = self.encode(op, &mut args)?;
        Ok(Encoder::encode_request(packet_type, id, &args))
    }

    /// Decodes a reply body (after the request id) according to its kind.
    pub fn decode(&self, kind: u8, payload: &mut Payload) -> Result<ReplyData, ProtocolError> {
        let packet_type = PacketType::try_from(kind)?;
        match self {
            Driver::V1 | Driver::V2 | Driver::V3 => v01::decode(self, packet_type, payload),
            Driver::V4 | Driver::V5 => v04::decode(self, packet_type, payload),
            Driver::V6 => v06::decode(self, packet_type, payload),
        }
    }

    pub(crate) fn unsupported(&self, op: &Operation) -> ProtocolError {
        ProtocolError::Unsupported {
            operation: op.kind(),
            version: self.version(),
        }
    }
}
