//! Packet layout for SFTP.
//!
//! Every packet on the channel is framed as:
//!
//! ```text
//! +-----------+--------+-------------------------------+
//! | length    | type   | payload                       |
//! | 4 bytes   | 1 byte | length - 1 bytes              |
//! +-----------+--------+-------------------------------+
//! ```
//!
//! For every type except INIT and VERSION the payload starts with a `u32`
//! request id.

use crate::buffer::Payload;
use crate::constants::PacketType;
use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the big-endian length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// One decoded packet: its kind tag and a cursor over the rest of the body.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Raw kind byte; see [`PacketType`].
    pub kind: u8,
    /// Everything after the kind byte.
    pub payload: Payload,
}

impl Packet {
    pub fn new(kind: u8, payload: impl Into<Payload>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// Splits a packet body (the bytes following the length prefix) into its
    /// kind byte and payload.
    pub fn from_body(mut body: Bytes) -> Result<Self, ProtocolError> {
        if body.is_empty() {
            return Err(ProtocolError::InvalidLength(0));
        }
        let kind = body.get_u8();
        Ok(Self::new(kind, body))
    }

    /// Returns the typed kind, failing on tags the protocol does not define.
    pub fn packet_type(&self) -> Result<PacketType, ProtocolError> {
        PacketType::try_from(self.kind)
    }

    /// Frames a packet body: length prefix, kind byte, then `body`.
    pub fn encode(packet_type: PacketType, body: &[u8]) -> BytesMut {
        let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + 1 + body.len());
        buf.put_u32(body.len() as u32 + 1);
        buf.put_u8(packet_type as u8);
        buf.put_slice(body);
        buf
    }

    /// Frames a request: length prefix, kind byte, request id, then `args`.
    pub fn encode_request(packet_type: PacketType, id: u32, args: &[u8]) -> BytesMut {
        let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + 5 + args.len());
        buf.put_u32(args.len() as u32 + 5);
        buf.put_u8(packet_type as u8);
        buf.put_u32(id);
        buf.put_slice(args);
        buf
    }
}
