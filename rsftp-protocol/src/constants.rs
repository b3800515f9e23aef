//! Packet types and flag values defined by the SFTP drafts.

use crate::error::ProtocolError;

/// Numeric packet kind, the first byte of every packet body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    Init = 1,
    Version = 2,
    Open = 3,
    Close = 4,
    Read = 5,
    Write = 6,
    Lstat = 7,
    Fstat = 8,
    Setstat = 9,
    Fsetstat = 10,
    Opendir = 11,
    Readdir = 12,
    Remove = 13,
    Mkdir = 14,
    Rmdir = 15,
    Realpath = 16,
    Stat = 17,
    Rename = 18,
    Readlink = 19,
    Symlink = 20,
    Link = 21,
    Block = 22,
    Unblock = 23,
    Status = 101,
    Handle = 102,
    Data = 103,
    Name = 104,
    Attrs = 105,
    Extended = 106,
    ExtendedReply = 107,
}

impl PacketType {
    /// Returns whether packets of this kind travel from server to client.
    pub fn is_reply(&self) -> bool {
        matches!(
            self,
            PacketType::Version
                | PacketType::Status
                | PacketType::Handle
                | PacketType::Data
                | PacketType::Name
                | PacketType::Attrs
                | PacketType::ExtendedReply
        )
    }
}

impl TryFrom<u8> for PacketType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let packet_type = match value {
            1 => PacketType::Init,
            2 => PacketType::Version,
            3 => PacketType::Open,
            4 => PacketType::Close,
            5 => PacketType::Read,
            6 => PacketType::Write,
            7 => PacketType::Lstat,
            8 => PacketType::Fstat,
            9 => PacketType::Setstat,
            10 => PacketType::Fsetstat,
            11 => PacketType::Opendir,
            12 => PacketType::Readdir,
            13 => PacketType::Remove,
            14 => PacketType::Mkdir,
            15 => PacketType::Rmdir,
            16 => PacketType::Realpath,
            17 => PacketType::Stat,
            18 => PacketType::Rename,
            19 => PacketType::Readlink,
            20 => PacketType::Symlink,
            21 => PacketType::Link,
            22 => PacketType::Block,
            23 => PacketType::Unblock,
            101 => PacketType::Status,
            102 => PacketType::Handle,
            103 => PacketType::Data,
            104 => PacketType::Name,
            105 => PacketType::Attrs,
            106 => PacketType::Extended,
            107 => PacketType::ExtendedReply,
            _ => return Err(ProtocolError::UnknownPacketType(value)),
        };
        Ok(packet_type)
    }
}

/// `SSH_FXF_*` open flags used by versions 1 through 4.
pub mod open_flags {
    pub const READ: u32 = 0x0000_0001;
    pub const WRITE: u32 = 0x0000_0002;
    pub const APPEND: u32 = 0x0000_0004;
    pub const CREAT: u32 = 0x0000_0008;
    pub const TRUNC: u32 = 0x0000_0010;
    pub const EXCL: u32 = 0x0000_0020;
}

/// Version 5+ open flags: a disposition in the low three bits, optionally
/// combined with behaviour flags.
pub mod open_v5 {
    pub const CREATE_NEW: u32 = 0x0000_0000;
    pub const CREATE_TRUNCATE: u32 = 0x0000_0001;
    pub const OPEN_EXISTING: u32 = 0x0000_0002;
    pub const OPEN_OR_CREATE: u32 = 0x0000_0003;
    pub const TRUNCATE_EXISTING: u32 = 0x0000_0004;
    pub const DISPOSITION_MASK: u32 = 0x0000_0007;

    pub const APPEND_DATA: u32 = 0x0000_0008;
    pub const APPEND_DATA_ATOMIC: u32 = 0x0000_0010;
    pub const TEXT_MODE: u32 = 0x0000_0020;
    pub const READ_LOCK: u32 = 0x0000_0040;
    pub const WRITE_LOCK: u32 = 0x0000_0080;
    pub const DELETE_LOCK: u32 = 0x0000_0100;
}

/// POSIX-style open flags accepted by [`crate::OpenFlags::Posix`].
///
/// Values follow Linux `fcntl.h` so a caller can pass `libc::O_*` directly.
pub mod posix {
    pub const RDONLY: u32 = 0o0;
    pub const WRONLY: u32 = 0o1;
    pub const RDWR: u32 = 0o2;
    pub const CREAT: u32 = 0o100;
    pub const EXCL: u32 = 0o200;
    pub const TRUNC: u32 = 0o1000;
    pub const APPEND: u32 = 0o2000;
}

/// `SSH_FXF_RENAME_*` flags (version 4+).
pub mod rename_flags {
    pub const OVERWRITE: u32 = 0x0000_0001;
    pub const ATOMIC: u32 = 0x0000_0002;
    pub const NATIVE: u32 = 0x0000_0004;
}

/// ACE type, flag and mask values used in ACLs, desired-access masks and
/// block (lock) masks.
pub mod ace {
    pub const ACCESS_ALLOWED_ACE_TYPE: u32 = 0x0000_0000;
    pub const ACCESS_DENIED_ACE_TYPE: u32 = 0x0000_0001;
    pub const SYSTEM_AUDIT_ACE_TYPE: u32 = 0x0000_0002;
    pub const SYSTEM_ALARM_ACE_TYPE: u32 = 0x0000_0003;

    pub const FILE_INHERIT_ACE: u32 = 0x0000_0001;
    pub const DIRECTORY_INHERIT_ACE: u32 = 0x0000_0002;
    pub const NO_PROPAGATE_INHERIT_ACE: u32 = 0x0000_0004;
    pub const INHERIT_ONLY_ACE: u32 = 0x0000_0008;
    pub const SUCCESSFUL_ACCESS_ACE_FLAG: u32 = 0x0000_0010;
    pub const FAILED_ACCESS_ACE_FLAG: u32 = 0x0000_0020;
    pub const IDENTIFIER_GROUP: u32 = 0x0000_0040;

    pub const READ_DATA: u32 = 0x0000_0001;
    pub const LIST_DIRECTORY: u32 = 0x0000_0001;
    pub const WRITE_DATA: u32 = 0x0000_0002;
    pub const ADD_FILE: u32 = 0x0000_0002;
    pub const APPEND_DATA: u32 = 0x0000_0004;
    pub const ADD_SUBDIRECTORY: u32 = 0x0000_0004;
    pub const READ_NAMED_ATTRS: u32 = 0x0000_0008;
    pub const WRITE_NAMED_ATTRS: u32 = 0x0000_0010;
    pub const EXECUTE: u32 = 0x0000_0020;
    pub const DELETE_CHILD: u32 = 0x0000_0040;
    pub const READ_ATTRIBUTES: u32 = 0x0000_0080;
    pub const WRITE_ATTRIBUTES: u32 = 0x0000_0100;
    pub const DELETE: u32 = 0x0001_0000;
    pub const READ_ACL: u32 = 0x0002_0000;
    pub const WRITE_ACL: u32 = 0x0004_0000;
    pub const WRITE_OWNER: u32 = 0x0008_0000;
    pub const SYNCHRONIZE: u32 = 0x0010_0000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_type_roundtrip() {
        for value in (1u8..=23).chain(101..=107) {
            let packet_type = PacketType::try_from(value).unwrap();
            assert_eq!(packet_type as u8, value);
        }
    }

    #[test]
    fn test_unknown_packet_type() {
        assert!(matches!(
            PacketType::try_from(0),
            Err(ProtocolError::UnknownPacketType(0))
        ));
        assert!(matches!(
            PacketType::try_from(24),
            Err(ProtocolError::UnknownPacketType(24))
        ));
        assert!(matches!(
            PacketType::try_from(108),
            Err(ProtocolError::UnknownPacketType(108))
        ));
    }

    #[test]
    fn test_reply_kinds() {
        assert!(PacketType::Status.is_reply());
        assert!(PacketType::ExtendedReply.is_reply());
        assert!(PacketType::Version.is_reply());
        assert!(!PacketType::Open.is_reply());
        assert!(!PacketType::Extended.is_reply());
    }
}
