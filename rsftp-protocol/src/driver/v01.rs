//! Version 1: the base operation set.

use super::Driver;
use crate::buffer::{Payload, PutExt};
use crate::constants::{open_flags, posix, PacketType};
use crate::error::ProtocolError;
use crate::message::{OpenFlags, OpenMode, Operation, ReplyData, Status};
use crate::name::Name;
use crate::path::RemotePath;
use bytes::{BufMut, BytesMut};

pub(super) fn encode(
    driver: &Driver,
    op: &Operation,
    buf: &mut BytesMut,
) -> Result<PacketType, ProtocolError> {
    let attributes = driver.attributes();
    let packet_type = match op {
        Operation::Open { path, flags, attrs } => {
            buf.put_string(path);
            buf.put_u32(translate_open_flags(flags));
            attributes.encode(attrs, buf);
            PacketType::Open
        }
        Operation::Close { handle } => {
            buf.put_string(handle);
            PacketType::Close
        }
        Operation::Read {
            handle,
            offset,
            length,
        } => {
            buf.put_string(handle);
            buf.put_u64(*offset);
            buf.put_u32(*length);
            PacketType::Read
        }
        Operation::Write {
            handle,
            offset,
            data,
        } => {
            buf.put_string(handle);
            buf.put_u64(*offset);
            buf.put_string(data);
            PacketType::Write
        }
        // before v4 there is no way to ask for a subset of attributes
        Operation::Lstat { path, .. } => {
            buf.put_string(path);
            PacketType::Lstat
        }
        Operation::Fstat { handle, .. } => {
            buf.put_string(handle);
            PacketType::Fstat
        }
        Operation::Stat { path, .. } => {
            buf.put_string(path);
            PacketType::Stat
        }
        Operation::Setstat { path, attrs } => {
            buf.put_string(path);
            attributes.encode(attrs, buf);
            PacketType::Setstat
        }
        Operation::Fsetstat { handle, attrs } => {
            buf.put_string(handle);
            attributes.encode(attrs, buf);
            PacketType::Fsetstat
        }
        Operation::Opendir { path } => {
            buf.put_string(path);
            PacketType::Opendir
        }
        Operation::Readdir { handle } => {
            buf.put_string(handle);
            PacketType::Readdir
        }
        Operation::Remove { path } => {
            buf.put_string(path);
            PacketType::Remove
        }
        Operation::Mkdir { path, attrs } => {
            buf.put_string(path);
            attributes.encode(attrs, buf);
            PacketType::Mkdir
        }
        Operation::Rmdir { path } => {
            buf.put_string(path);
            PacketType::Rmdir
        }
        Operation::Realpath { path } => {
            buf.put_string(path);
            PacketType::Realpath
        }
        Operation::Rename { .. }
        | Operation::Readlink { .. }
        | Operation::Symlink { .. }
        | Operation::Link { .. }
        | Operation::Block { .. }
        | Operation::Unblock { .. }
        | Operation::Extended(_) => return Err(driver.unsupported(op)),
    };
    Ok(packet_type)
}

/// Translates an open request into `SSH_FXF_*` bits.
///
/// Textual modes are first mapped to POSIX bits the way `fopen` would, then
/// the access mode picks READ, WRITE or APPEND and the creation bits carry
/// over.
fn translate_open_flags(flags: &OpenFlags) -> u32 {
    let bits = match flags {
        OpenFlags::Mode(OpenMode::Read) => posix::RDONLY,
        OpenFlags::Mode(OpenMode::ReadWrite) => posix::RDWR,
        OpenFlags::Mode(OpenMode::Write) => posix::WRONLY | posix::TRUNC | posix::CREAT,
        OpenFlags::Mode(OpenMode::WriteRead) => posix::RDWR | posix::TRUNC | posix::CREAT,
        OpenFlags::Mode(OpenMode::Append) => posix::APPEND | posix::CREAT,
        OpenFlags::Posix(bits) => *bits,
    };

    let mut sftp_flags = if bits & posix::WRONLY != 0 {
        open_flags::WRITE
    } else if bits & posix::RDWR != 0 {
        open_flags::READ | open_flags::WRITE
    } else if bits & posix::APPEND != 0 {
        open_flags::APPEND
    } else {
        open_flags::READ
    };

    if bits & posix::CREAT != 0 {
        sftp_flags |= open_flags::CREAT;
    }
    if bits & posix::TRUNC != 0 {
        sftp_flags |= open_flags::TRUNC;
    }
    if bits & posix::EXCL != 0 {
        sftp_flags |= open_flags::EXCL;
    }
    sftp_flags
}

pub(super) fn decode(
    driver: &Driver,
    packet_type: PacketType,
    payload: &mut Payload,
) -> Result<ReplyData, ProtocolError> {
    let reply = match packet_type {
        PacketType::Status => ReplyData::Status(Status::decode(payload)?),
        PacketType::Handle => ReplyData::Handle(payload.read_string()?),
        PacketType::Data => ReplyData::Data(payload.read_string()?),
        PacketType::Attrs => ReplyData::Attrs(driver.attributes().decode(payload)?),
        PacketType::Name => {
            let count = payload.read_u32()?;
            let mut names = Vec::with_capacity(count.min(1024) as usize);
            for _ in 0..count {
                let filename = RemotePath::from(payload.read_string()?);
                let longname = payload.read_utf8_lossy()?;
                let attributes = driver.attributes().decode(payload)?;
                names.push(Name::new(filename, Some(longname), attributes));
            }
            ReplyData::Names(names)
        }
        other => return Err(ProtocolError::UnexpectedPacket(other)),
    };
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{flags, Attributes};
    use crate::error::StatusCode;
    use bytes::Bytes;

    fn open(flags: OpenFlags, attrs: Attributes) -> BytesMut {
        let op = Operation::Open {
            path: "/path/to/file".into(),
            flags,
            attrs,
        };
        let mut buf = BytesMut::new();
        assert_eq!(Driver::V1.encode(&op, &mut buf).unwrap(), PacketType::Open);
        buf
    }

    fn expected_open(sftp_flags: u32, attrs: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_string("/path/to/file");
        buf.put_u32(sftp_flags);
        buf.put_slice(attrs);
        buf
    }

    #[test]
    fn test_open_read() {
        assert_eq!(
            open(OpenMode::Read.into(), Attributes::new()),
            expected_open(open_flags::READ, &[0, 0, 0, 0])
        );
    }

    #[test]
    fn test_open_write() {
        assert_eq!(
            open(OpenMode::Write.into(), Attributes::new()),
            expected_open(
                open_flags::WRITE | open_flags::TRUNC | open_flags::CREAT,
                &[0, 0, 0, 0]
            )
        );
    }

    #[test]
    fn test_open_read_write() {
        for mode in ["r+", "rw"] {
            assert_eq!(
                open(mode.parse().unwrap(), Attributes::new()),
                expected_open(open_flags::READ | open_flags::WRITE, &[0, 0, 0, 0])
            );
        }
    }

    #[test]
    fn test_open_append() {
        assert_eq!(
            open("a".parse().unwrap(), Attributes::new()),
            expected_open(open_flags::APPEND | open_flags::CREAT, &[0, 0, 0, 0])
        );
    }

    #[test]
    fn test_open_with_permissions() {
        let mut attrs = BytesMut::new();
        attrs.put_u32(flags::PERMISSIONS);
        attrs.put_u32(0o765);
        assert_eq!(
            open(OpenMode::Read.into(), Attributes::new().with_permissions(0o765)),
            expected_open(open_flags::READ, &attrs)
        );
    }

    #[test]
    fn test_open_posix_flags() {
        assert_eq!(
            open(
                OpenFlags::Posix(posix::WRONLY | posix::CREAT | posix::EXCL),
                Attributes::new()
            ),
            expected_open(
                open_flags::WRITE | open_flags::CREAT | open_flags::EXCL,
                &[0, 0, 0, 0]
            )
        );
    }

    #[test]
    fn test_read_and_write_layout() {
        let mut buf = BytesMut::new();
        let op = Operation::Read {
            handle: Bytes::from_static(b"handle"),
            offset: 512123,
            length: 1024,
        };
        assert_eq!(Driver::V1.encode(&op, &mut buf).unwrap(), PacketType::Read);
        let mut expected = BytesMut::new();
        expected.put_string("handle");
        expected.put_u64(512123);
        expected.put_u32(1024);
        assert_eq!(buf, expected);

        let mut buf = BytesMut::new();
        let op = Operation::Write {
            handle: Bytes::from_static(b"handle"),
            offset: 0,
            data: Bytes::from_static(b"hello"),
        };
        assert_eq!(Driver::V1.encode(&op, &mut buf).unwrap(), PacketType::Write);
        let mut expected = BytesMut::new();
        expected.put_string("handle");
        expected.put_u64(0);
        expected.put_string("hello");
        assert_eq!(buf, expected);
    }

    #[test]
    fn test_stat_ignores_flags() {
        let mut buf = BytesMut::new();
        let op = Operation::Stat {
            path: "/x".into(),
            flags: Some(flags::SIZE),
        };
        assert_eq!(Driver::V2.encode(&op, &mut buf).unwrap(), PacketType::Stat);
        assert_eq!(buf.as_ref(), b"\x00\x00\x00\x02/x");
    }

    #[test]
    fn test_mkdir_and_setstat_carry_attributes() {
        let attrs = Attributes::new().with_permissions(0o700);
        let mut buf = BytesMut::new();
        let op = Operation::Mkdir {
            path: "/d".into(),
            attrs: attrs.clone(),
        };
        assert_eq!(Driver::V1.encode(&op, &mut buf).unwrap(), PacketType::Mkdir);
        let mut expected = BytesMut::new();
        expected.put_string("/d");
        expected.put_u32(flags::PERMISSIONS);
        expected.put_u32(0o700);
        assert_eq!(buf, expected);

        let mut buf = BytesMut::new();
        let op = Operation::Fsetstat {
            handle: Bytes::from_static(b"h"),
            attrs,
        };
        assert_eq!(
            Driver::V1.encode(&op, &mut buf).unwrap(),
            PacketType::Fsetstat
        );
    }

    #[test]
    fn test_decode_names_with_longname() {
        let mut body = BytesMut::new();
        body.put_u32(2);
        body.put_string("name1");
        body.put_string("longname1");
        body.put_u32(flags::SIZE);
        body.put_u64(1);
        body.put_string("name2");
        body.put_string("longname2");
        body.put_u32(flags::PERMISSIONS);
        body.put_u32(0o755);

        let reply = Driver::V1
            .decode(PacketType::Name as u8, &mut Payload::new(body.freeze()))
            .unwrap();
        let ReplyData::Names(names) = reply else {
            panic!("expected a name reply");
        };
        assert_eq!(names.len(), 2);
        assert_eq!(names[0].filename, "name1");
        assert_eq!(names[0].longname.as_deref(), Some("longname1"));
        assert_eq!(names[0].attributes.size, Some(1));
        assert_eq!(names[1].filename, "name2");
        assert_eq!(names[1].longname.as_deref(), Some("longname2"));
        assert_eq!(names[1].attributes.permissions, Some(0o755));
    }

    #[test]
    fn test_decode_status_handle_data() {
        let reply = Driver::V1
            .decode(
                PacketType::Status as u8,
                &mut Payload::from(&b"\x00\x00\x00\x01"[..]),
            )
            .unwrap();
        assert!(matches!(reply, ReplyData::Status(ref s) if s.code == StatusCode::EOF));

        let reply = Driver::V1
            .decode(
                PacketType::Handle as u8,
                &mut Payload::from(&b"\x00\x00\x00\x03abc"[..]),
            )
            .unwrap();
        assert_eq!(reply, ReplyData::Handle(Bytes::from_static(b"abc")));

        let reply = Driver::V1
            .decode(
                PacketType::Data as u8,
                &mut Payload::from(&b"\x00\x00\x00\x02\xff\x00"[..]),
            )
            .unwrap();
        assert_eq!(reply, ReplyData::Data(Bytes::from_static(b"\xff\x00")));
    }

    #[test]
    fn test_decode_truncated_handle_is_error() {
        assert!(matches!(
            Driver::V1.decode(
                PacketType::Handle as u8,
                &mut Payload::from(&b"\x00\x00\x00\x09ab"[..])
            ),
            Err(ProtocolError::UnexpectedEof { .. })
        ));
    }
}
