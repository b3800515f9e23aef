//! Streaming packet decoder and request encoder.

use crate::constants::PacketType;
use crate::error::ProtocolError;
use crate::frame::{Packet, LENGTH_PREFIX_SIZE};
use crate::MAX_PACKET_SIZE;
use bytes::{Buf, Bytes, BytesMut};

/// Encodes outgoing packets.
pub struct Encoder;

impl Encoder {
    /// Encodes the INIT packet announcing the client's highest version.
    pub fn encode_init(version: u32) -> BytesMut {
        Packet::encode(PacketType::Init, &version.to_be_bytes())
    }

    /// Encodes a request packet from already-serialized arguments.
    pub fn encode_request(packet_type: PacketType, id: u32, args: &[u8]) -> BytesMut {
        Packet::encode_request(packet_type, id, args)
    }
}

/// Accumulates channel data and splits it into packets.
///
/// Input may arrive in chunks of any size. The length prefix is consumed as
/// soon as all four bytes are buffered and remembered until the body is
/// complete, so a packet split across many chunks is parsed only once.
pub struct Decoder {
    buffer: BytesMut,
    /// Declared length of the packet currently being received.
    packet_length: Option<usize>,
    max_packet_size: u32,
}

impl Decoder {
    pub fn new() -> Self {
        Self::with_max_packet_size(MAX_PACKET_SIZE)
    }

    pub fn with_max_packet_size(max_packet_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(32 * 1024),
            packet_length: None,
            max_packet_size,
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Appends bytes to the internal buffer.
    pub fn extend_bytes(&mut self, data: Bytes) {
        self.buffer.extend_from_slice(&data);
    }

    /// Attempts to extract the next complete packet.
    ///
    /// Returns `Ok(None)` when more input is needed. A zero or oversized
    /// declared length is an error; the stream cannot be resynchronized after
    /// one.
    pub fn decode_packet(&mut self) -> Result<Option<Packet>, ProtocolError> {
        let length = match self.packet_length {
            Some(length) => length,
            None => {
                if self.buffer.len() < LENGTH_PREFIX_SIZE {
                    return Ok(None);
                }
                let declared = self.buffer.get_u32();
                if declared == 0 {
                    return Err(ProtocolError::InvalidLength(declared));
                }
                if declared > self.max_packet_size {
                    return Err(ProtocolError::PacketTooLarge {
                        size: declared,
                        max: self.max_packet_size,
                    });
                }
                self.packet_length = Some(declared as usize);
                declared as usize
            }
        };

        if self.buffer.len() < length {
            return Ok(None);
        }

        let body = self.buffer.split_to(length).freeze();
        self.packet_length = None;
        Packet::from_body(body).map(Some)
    }

    /// Returns the declared length of a partially received packet, if any.
    pub fn pending_length(&self) -> Option<usize> {
        self.packet_length
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer and any partially framed packet.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.packet_length = None;
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
