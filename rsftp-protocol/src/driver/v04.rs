//! Version 4: stat requests name the attributes they want, rename takes
//! flags, and name replies drop the longname.

use super::{v01, v03, Driver};
use crate::attributes::flags;
use crate::buffer::{Payload, PutExt};
use crate::constants::PacketType;
use crate::error::ProtocolError;
use crate::message::{Operation, ReplyData};
use crate::name::Name;
use crate::path::RemotePath;
use bytes::{BufMut, BytesMut};

/// Attributes requested by stat, lstat and fstat when the caller does not
/// choose.
pub const DEFAULT_STAT_FLAGS: u32 = flags::SIZE
    | flags::PERMISSIONS
    | flags::ACCESSTIME
    | flags::CREATETIME
    | flags::MODIFYTIME
    | flags::ACL
    | flags::OWNERGROUP
    | flags::SUBSECOND_TIMES
    | flags::EXTENDED;

pub(super) fn encode(
    driver: &Driver,
    op: &Operation,
    buf: &mut BytesMut,
) -> Result<PacketType, ProtocolError> {
    let packet_type = match op {
        Operation::Stat { path, flags } => {
            buf.put_string(path);
            buf.put_u32(flags.unwrap_or(DEFAULT_STAT_FLAGS));
            PacketType::Stat
        }
        Operation::Lstat { path, flags } => {
            buf.put_string(path);
            buf.put_u32(flags.unwrap_or(DEFAULT_STAT_FLAGS));
            PacketType::Lstat
        }
        Operation::Fstat { handle, flags } => {
            buf.put_string(handle);
            buf.put_u32(flags.unwrap_or(DEFAULT_STAT_FLAGS));
            PacketType::Fstat
        }
        Operation::Rename { from, to, flags } => {
            buf.put_string(from);
            buf.put_string(to);
            buf.put_u32(flags.unwrap_or(0));
            PacketType::Rename
        }
        _ => return v03::encode(driver, op, buf),
    };
    Ok(packet_type)
}

pub(super) fn decode(
    driver: &Driver,
    packet_type: PacketType,
    payload: &mut Payload,
) -> Result<ReplyData, ProtocolError> {
    match packet_type {
        PacketType::Name => {
            let count = payload.read_u32()?;
            let mut names = Vec::with_capacity(count.min(1024) as usize);
            for _ in 0..count {
                let filename = RemotePath::from(payload.read_string()?);
                let attributes = driver.attributes().decode(payload)?;
                names.push(Name::new(filename, None, attributes));
            }
            Ok(ReplyData::Names(names))
        }
        _ => v01::decode(driver, packet_type, payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::FileType;
    use crate::constants::rename_flags;
    use bytes::Bytes;

    #[test]
    fn test_stat_defaults_to_all_fields() {
        let op = Operation::Stat {
            path: "/x".into(),
            flags: None,
        };
        let mut buf = BytesMut::new();
        assert_eq!(Driver::V4.encode(&op, &mut buf).unwrap(), PacketType::Stat);

        let mut expected = BytesMut::new();
        expected.put_string("/x");
        expected.put_u32(0x8000_01fd);
        assert_eq!(buf, expected);
    }

    #[test]
    fn test_fstat_with_explicit_flags() {
        let op = Operation::Fstat {
            handle: Bytes::from_static(b"h"),
            flags: Some(flags::SIZE),
        };
        let mut buf = BytesMut::new();
        assert_eq!(Driver::V4.encode(&op, &mut buf).unwrap(), PacketType::Fstat);
        assert_eq!(buf.as_ref(), b"\x00\x00\x00\x01h\x00\x00\x00\x01");
    }

    #[test]
    fn test_rename_with_flags() {
        let op = Operation::Rename {
            from: "a".into(),
            to: "b".into(),
            flags: Some(rename_flags::OVERWRITE | rename_flags::ATOMIC),
        };
        let mut buf = BytesMut::new();
        assert_eq!(Driver::V5.encode(&op, &mut buf).unwrap(), PacketType::Rename);
        assert_eq!(
            buf.as_ref(),
            b"\x00\x00\x00\x01a\x00\x00\x00\x01b\x00\x00\x00\x03"
        );

        let op = Operation::Rename {
            from: "a".into(),
            to: "b".into(),
            flags: None,
        };
        let mut buf = BytesMut::new();
        Driver::V4.encode(&op, &mut buf).unwrap();
        assert!(buf.ends_with(&[0, 0, 0, 0]));
    }

    #[test]
    fn test_decode_names_without_longname() {
        let mut body = BytesMut::new();
        body.put_u32(2);
        body.put_string("docs");
        body.put_u32(flags::PERMISSIONS);
        body.put_u8(FileType::Directory as u8);
        body.put_u32(0o755);
        body.put_string("a.txt");
        body.put_u32(flags::SIZE);
        body.put_u8(FileType::Regular as u8);
        body.put_u64(12);

        let reply = Driver::V4
            .decode(PacketType::Name as u8, &mut Payload::new(body.freeze()))
            .unwrap();
        let ReplyData::Names(names) = reply else {
            panic!("expected a name reply");
        };
        assert_eq!(names.len(), 2);
        assert_eq!(names[0].filename, "docs");
        assert_eq!(names[0].longname, None);
        assert!(names[0].is_directory());
        assert_eq!(names[1].filename, "a.txt");
        assert_eq!(names[1].attributes.size, Some(12));
        assert!(names[1].is_file());
    }

    #[test]
    fn test_readlink_inherited() {
        let op = Operation::Readlink { path: "/l".into() };
        let mut buf = BytesMut::new();
        assert_eq!(
            Driver::V4.encode(&op, &mut buf).unwrap(),
            PacketType::Readlink
        );
    }
}
