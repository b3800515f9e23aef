//! Typed reads over a packet payload, and the matching writers.
//!
//! All integers are big-endian. Strings are a `u32` length followed by that
//! many bytes; the protocol does not promise they are UTF-8, so both a raw
//! and a checked accessor are provided.

use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes};

/// Read cursor over the payload of one packet.
///
/// Every read is bounds-checked against the packet: running past the end is
/// an [`ProtocolError::UnexpectedEof`], never a partial read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    data: Bytes,
}

impl Payload {
    pub fn new(data: Bytes) -> Self {
        Self { data }
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    /// Returns true once every byte has been consumed.
    pub fn is_eof(&self) -> bool {
        self.data.is_empty()
    }

    fn ensure(&self, needed: usize) -> Result<(), ProtocolError> {
        if self.data.len() < needed {
            return Err(ProtocolError::UnexpectedEof {
                needed,
                remaining: self.data.len(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        self.ensure(1)?;
        Ok(self.data.get_u8())
    }

    pub fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        self.ensure(4)?;
        Ok(self.data.get_u32())
    }

    pub fn read_u64(&mut self) -> Result<u64, ProtocolError> {
        self.ensure(8)?;
        Ok(self.data.get_u64())
    }

    /// Reads exactly `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes, ProtocolError> {
        self.ensure(len)?;
        Ok(self.data.split_to(len))
    }

    /// Reads a length-prefixed opaque string.
    pub fn read_string(&mut self) -> Result<Bytes, ProtocolError> {
        let len = self.read_u32()? as usize;
        self.read_bytes(len)
    }

    /// Reads a length-prefixed string that must be valid UTF-8.
    pub fn read_utf8(&mut self) -> Result<String, ProtocolError> {
        let raw = self.read_string()?;
        String::from_utf8(raw.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
    }

    /// Reads a length-prefixed string for display, replacing invalid UTF-8.
    pub fn read_utf8_lossy(&mut self) -> Result<String, ProtocolError> {
        let raw = self.read_string()?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    /// Reads a length-prefixed string and returns a cursor over its contents.
    pub fn read_nested(&mut self) -> Result<Payload, ProtocolError> {
        Ok(Payload::new(self.read_string()?))
    }

    /// Consumes and returns everything left in the payload.
    pub fn read_remaining(&mut self) -> Bytes {
        std::mem::take(&mut self.data)
    }
}

impl From<Bytes> for Payload {
    fn from(data: Bytes) -> Self {
        Self::new(data)
    }
}

impl From<&'static [u8]> for Payload {
    fn from(data: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(data))
    }
}

/// SFTP-specific writers on top of [`BufMut`].
pub trait PutExt: BufMut {
    /// Writes a length-prefixed string.
    fn put_string(&mut self, value: impl AsRef<[u8]>) {
        let value = value.as_ref();
        self.put_u32(value.len() as u32);
        self.put_slice(value);
    }

    fn put_bool(&mut self, value: bool) {
        self.put_u8(u8::from(value));
    }
}

impl<B: BufMut + ?Sized> PutExt for B {}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_typed_reads() {
        let mut buf = BytesMut::new();
        buf.put_u8(7);
        buf.put_u32(0xDEAD_BEEF);
        buf.put_u64(512_123);
        buf.put_string("hello");
        buf.put_bool(true);

        let mut payload = Payload::new(buf.freeze());
        assert_eq!(payload.read_u8().unwrap(), 7);
        assert_eq!(payload.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(payload.read_u64().unwrap(), 512_123);
        assert_eq!(payload.read_utf8().unwrap(), "hello");
        assert!(payload.read_bool().unwrap());
        assert!(payload.is_eof());
    }

    #[test]
    fn test_read_past_end_is_error() {
        let mut payload = Payload::from(&b"\x00\x00"[..]);
        let err = payload.read_u32().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::UnexpectedEof {
                needed: 4,
                remaining: 2
            }
        ));
        // nothing was consumed by the failed read
        assert_eq!(payload.remaining(), 2);
    }

    #[test]
    fn test_string_length_past_end_is_error() {
        let mut payload = Payload::from(&b"\x00\x00\x00\x10abc"[..]);
        assert!(matches!(
            payload.read_string(),
            Err(ProtocolError::UnexpectedEof { needed: 16, .. })
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut payload = Payload::from(&b"\x00\x00\x00\x02\xff\xfe"[..]);
        assert!(matches!(
            payload.read_utf8(),
            Err(ProtocolError::InvalidUtf8)
        ));
    }

    #[test]
    fn test_nested_and_remaining() {
        let mut buf = BytesMut::new();
        buf.put_string(b"\x00\x00\x00\x01");
        buf.put_slice(b"tail");

        let mut payload = Payload::new(buf.freeze());
        let mut nested = payload.read_nested().unwrap();
        assert_eq!(nested.read_u32().unwrap(), 1);
        assert!(nested.is_eof());
        assert_eq!(payload.read_remaining().as_ref(), b"tail");
        assert!(payload.is_eof());
    }
}
