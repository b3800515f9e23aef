//! Version 3: adds readlink and symlink.

use super::{v02, Driver};
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
        Operation::Readlink { path } => {
            buf.put_string(path);
            Ok(PacketType::Readlink)
        }
        Operation::Symlink { path, target } => {
            buf.put_string(path);
            buf.put_string(target);
            Ok(PacketType::Symlink)
        }
        _ => v02::encode(driver, op, buf),
    }
}
