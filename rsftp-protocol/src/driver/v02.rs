//! Version 2: adds rename.

use super::{v01, Driver};
use crate::buffer::PutExt;
use crate::constants::PacketType;
use crate::error::ProtocolError;
use crate::message::Operation;
use bytes::BytesMut;

pub(super) fn encode(
    driver: &Driver,
    op: &Operation,
    buf: &mut BytesMut,
) -> Result<PacketType, ProtocolError> {
    match op {
        // flags only exist from v4 on
        Operation::Rename { from, to, .. } => {
            buf.put_string(from);
            buf.put_string(to);
            Ok(PacketType::Rename)
        }
        _ => v01::encode(driver, op, buf),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rename_without_flags() {
        let op = Operation::Rename {
            from: "old".into(),
            to: "new".into(),
            flags: Some(1),
        };
        let mut buf = BytesMut::new();
        assert_eq!(Driver::V2.encode(&op, &mut buf).unwrap(), PacketType::Rename);
        assert_eq!(buf.as_ref(), b"\x00\x00\x00\x03old\x00\x00\x00\x03new");
    }

    #[test]
    fn test_readlink_still_unsupported() {
        let op = Operation::Readlink { path: "x".into() };
        assert!(matches!(
            Driver::V2.encode(&op, &mut BytesMut::new()),
            Err(ProtocolError::Unsupported { version: 2, .. })
        ));
    }
}
