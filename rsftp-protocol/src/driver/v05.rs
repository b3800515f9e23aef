//! Version 5: open takes a desired-access mask and a disposition.

use super::{v04, Driver};
use crate::buffer::PutExt;
use crate::constants::{ace, open_v5, posix, PacketType};
use crate::error::ProtocolError;
use crate::message::{OpenFlags, OpenMode, Operation};
use bytes::{BufMut, BytesMut};

const READ_ACCESS: u32 = ace::READ_DATA | ace::READ_ATTRIBUTES;
const WRITE_ACCESS: u32 = ace::WRITE_DATA | ace::WRITE_ATTRIBUTES;

pub(super) fn encode(
    driver: &Driver,
    op: &Operation,
    buf: &mut BytesMut,
) -> Result<PacketType, ProtocolError> {
    match op {
        Operation::Open { path, flags, attrs } => {
            let (disposition, access) = open_disposition(flags);
            buf.put_string(path);
            buf.put_u32(access);
            buf.put_u32(disposition);
            driver.attributes().encode(attrs, buf);
            Ok(PacketType::Open)
        }
        _ => v04::encode(driver, op, buf),
    }
}

/// Maps an open request to `(flags, desired_access)`.
fn open_disposition(flags: &OpenFlags) -> (u32, u32) {
    let bits = match flags {
        OpenFlags::Mode(OpenMode::Read) => return (open_v5::OPEN_EXISTING, READ_ACCESS),
        OpenFlags::Mode(OpenMode::Write) => return (open_v5::CREATE_TRUNCATE, WRITE_ACCESS),
        OpenFlags::Mode(OpenMode::ReadWrite) => {
            return (open_v5::OPEN_OR_CREATE, READ_ACCESS | WRITE_ACCESS)
        }
        OpenFlags::Mode(OpenMode::WriteRead) => {
            return (open_v5::CREATE_TRUNCATE, READ_ACCESS | WRITE_ACCESS)
        }
        OpenFlags::Mode(OpenMode::Append) => {
            return (
                open_v5::OPEN_OR_CREATE | open_v5::APPEND_DATA,
                WRITE_ACCESS | ace::APPEND_DATA,
            )
        }
        OpenFlags::Posix(bits) => *bits,
    };

    if bits & (posix::WRONLY | posix::RDWR) == 0 {
        return (open_v5::OPEN_EXISTING, READ_ACCESS);
    }

    let mut disposition = if bits & (posix::CREAT | posix::EXCL) == posix::CREAT | posix::EXCL {
        open_v5::CREATE_NEW
    } else if bits & (posix::CREAT | posix::TRUNC) == posix::CREAT | posix::TRUNC {
        open_v5::CREATE_TRUNCATE
    } else if bits & posix::CREAT != 0 {
        open_v5::OPEN_OR_CREATE
    } else if bits & posix::TRUNC != 0 {
        open_v5::TRUNCATE_EXISTING
    } else {
        open_v5::OPEN_EXISTING
    };

    let mut access = WRITE_ACCESS;
    if bits & posix::RDWR != 0 {
        access |= READ_ACCESS;
    }
    if bits & posix::APPEND != 0 {
        disposition |= open_v5::APPEND_DATA;
        access |= ace::APPEND_DATA;
    }
    (disposition, access)
}
