//! Logical operations and decoded replies.
//!
//! An [`Operation`] is what a caller asks for, independent of how any one
//! protocol revision lays it out; the [`crate::Driver`] for the negotiated
//! revision turns it into bytes. Replies go the other way, into
//! [`ReplyData`].

use crate::attributes::Attributes;
use crate::buffer::Payload;
use crate::constants::PacketType;
use crate::error::{ProtocolError, StatusCode};
use crate::name::Name;
use crate::path::RemotePath;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operation tags, used for capability checks, errors and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Open,
    Close,
    Read,
    Write,
    Lstat,
    Fstat,
    Setstat,
    Fsetstat,
    Opendir,
    Readdir,
    Remove,
    Mkdir,
    Rmdir,
    Realpath,
    Stat,
    Rename,
    Readlink,
    Symlink,
    Link,
    Block,
    Unblock,
    Extended,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Open => "open",
            OperationKind::Close => "close",
            OperationKind::Read => "read",
            OperationKind::Write => "write",
            OperationKind::Lstat => "lstat",
            OperationKind::Fstat => "fstat",
            OperationKind::Setstat => "setstat",
            OperationKind::Fsetstat => "fsetstat",
            OperationKind::Opendir => "opendir",
            OperationKind::Readdir => "readdir",
            OperationKind::Remove => "remove",
            OperationKind::Mkdir => "mkdir",
            OperationKind::Rmdir => "rmdir",
            OperationKind::Realpath => "realpath",
            OperationKind::Stat => "stat",
            OperationKind::Rename => "rename",
            OperationKind::Readlink => "readlink",
            OperationKind::Symlink => "symlink",
            OperationKind::Link => "link",
            OperationKind::Block => "block",
            OperationKind::Unblock => "unblock",
            OperationKind::Extended => "extended",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `fopen`-style textual open mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    /// `r`
    Read,
    /// `r+` or `rw`
    ReadWrite,
    /// `w`: create or truncate
    Write,
    /// `w+`: create or truncate, also readable
    WriteRead,
    /// `a` or `a+`: create if missing, append
    Append,
}

impl FromStr for OpenMode {
    type Err = ProtocolError;

    /// Parses a mode string. A `b` anywhere in it is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mode: String = s.chars().filter(|c| *c != 'b').collect();
        match mode.as_str() {
            "r" => Ok(OpenMode::Read),
            "r+" | "rw" => Ok(OpenMode::ReadWrite),
            "w" => Ok(OpenMode::Write),
            "w+" => Ok(OpenMode::WriteRead),
            "a" | "a+" => Ok(OpenMode::Append),
            _ => Err(ProtocolError::InvalidOpenMode(s.to_string())),
        }
    }
}

/// How a file should be opened: a textual mode or POSIX `O_*` bits (see
/// [`crate::constants::posix`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenFlags {
    Mode(OpenMode),
    Posix(u32),
}

impl From<OpenMode> for OpenFlags {
    fn from(mode: OpenMode) -> Self {
        OpenFlags::Mode(mode)
    }
}

impl FromStr for OpenFlags {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(OpenFlags::Mode)
    }
}

/// Vendor extension requests understood by version 6 servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extension {
    /// `md5-hash-handle`: MD5 of a byte range, optionally short-circuited by
    /// `quick_hash` (the MD5 of the first 2048 bytes).
    Md5Hash {
        handle: Bytes,
        offset: u64,
        length: u64,
        quick_hash: Bytes,
    },
    /// `check-file-handle`: per-block hashes of a byte range.
    CheckFile {
        handle: Bytes,
        offset: u64,
        length: u64,
        block_size: u32,
    },
    /// `space-available`
    SpaceAvailable { path: RemotePath },
    /// `home-directory`
    HomeDirectory { username: String },
}

impl Extension {
    pub fn name(&self) -> &'static str {
        match self {
            Extension::Md5Hash { .. } => "md5-hash-handle",
            Extension::CheckFile { .. } => "check-file-handle",
            Extension::SpaceAvailable { .. } => "space-available",
            Extension::HomeDirectory { .. } => "home-directory",
        }
    }
}

/// A request with its typed arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Open {
        path: RemotePath,
        flags: OpenFlags,
        attrs: Attributes,
    },
    Close {
        handle: Bytes,
    },
    Read {
        handle: Bytes,
        offset: u64,
        length: u32,
    },
    Write {
        handle: Bytes,
        offset: u64,
        data: Bytes,
    },
    /// `flags` selects the attributes to return (v4+); `None` asks for all.
    Lstat {
        path: RemotePath,
        flags: Option<u32>,
    },
    Fstat {
        handle: Bytes,
        flags: Option<u32>,
    },
    Setstat {
        path: RemotePath,
        attrs: Attributes,
    },
    Fsetstat {
        handle: Bytes,
        attrs: Attributes,
    },
    Opendir {
        path: RemotePath,
    },
    Readdir {
        handle: Bytes,
    },
    Remove {
        path: RemotePath,
    },
    Mkdir {
        path: RemotePath,
        attrs: Attributes,
    },
    Rmdir {
        path: RemotePath,
    },
    Realpath {
        path: RemotePath,
    },
    Stat {
        path: RemotePath,
        flags: Option<u32>,
    },
    /// `flags` is only sent by v4+ (see [`crate::constants::rename_flags`]).
    Rename {
        from: RemotePath,
        to: RemotePath,
        flags: Option<u32>,
    },
    Readlink {
        path: RemotePath,
    },
    Symlink {
        path: RemotePath,
        target: RemotePath,
    },
    Link {
        new_link_path: RemotePath,
        existing_path: RemotePath,
        symlink: bool,
    },
    Block {
        handle: Bytes,
        offset: u64,
        length: u64,
        mask: u32,
    },
    Unblock {
        handle: Bytes,
        offset: u64,
        length: u64,
    },
    Extended(Extension),
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Open { .. } => OperationKind::Open,
            Operation::Close { .. } => OperationKind::Close,
            Operation::Read { .. } => OperationKind::Read,
            Operation::Write { .. } => OperationKind::Write,
            Operation::Lstat { .. } => OperationKind::Lstat,
            Operation::Fstat { .. } => OperationKind::Fstat,
            Operation::Setstat { .. } => OperationKind::Setstat,
            Operation::Fsetstat { .. } => OperationKind::Fsetstat,
            Operation::Opendir { .. } => OperationKind::Opendir,
            Operation::Readdir { .. } => OperationKind::Readdir,
            Operation::Remove { .. } => OperationKind::Remove,
            Operation::Mkdir { .. } => OperationKind::Mkdir,
            Operation::Rmdir { .. } => OperationKind::Rmdir,
            Operation::Realpath { .. } => OperationKind::Realpath,
            Operation::Stat { .. } => OperationKind::Stat,
            Operation::Rename { .. } => OperationKind::Rename,
            Operation::Readlink { .. } => OperationKind::Readlink,
            Operation::Symlink { .. } => OperationKind::Symlink,
            Operation::Link { .. } => OperationKind::Link,
            Operation::Block { .. } => OperationKind::Block,
            Operation::Unblock { .. } => OperationKind::Unblock,
            Operation::Extended(_) => OperationKind::Extended,
        }
    }
}

/// Body of an `SSH_FXP_STATUS` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub code: StatusCode,
    /// Absent when the server omitted it (v1 and v2 servers may).
    pub message: Option<String>,
    pub language: Option<String>,
}

impl Status {
    pub fn decode(payload: &mut Payload) -> Result<Self, ProtocolError> {
        let code = StatusCode::new(payload.read_u32()?);
        let message = if payload.is_eof() {
            None
        } else {
            Some(payload.read_utf8_lossy()?)
        };
        let language = if payload.is_eof() {
            None
        } else {
            Some(payload.read_utf8_lossy()?)
        };
        Ok(Self {
            code,
            message,
            language,
        })
    }
}

/// Counters of a `space-available` reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceAvailable {
    pub bytes_on_device: u64,
    pub unused_bytes_on_device: u64,
    pub bytes_available_to_user: u64,
    pub unused_bytes_available_to_user: u64,
    pub bytes_per_allocation_unit: u32,
}

/// Decoded body of an `SSH_FXP_EXTENDED_REPLY`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtendedReply {
    /// Empty when the quick-check hash did not match.
    Md5Hash { hash: Bytes },
    CheckFile { algorithm: String, hashes: Vec<Bytes> },
    SpaceAvailable(SpaceAvailable),
    HomeDirectory { home: RemotePath },
}

/// Payload of a reply, keyed by its packet kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyData {
    Status(Status),
    Handle(Bytes),
    Data(Bytes),
    Names(Vec<Name>),
    Attrs(Attributes),
    Extended(ExtendedReply),
}

impl ReplyData {
    /// The packet kind this payload arrived in.
    pub fn packet_type(&self) -> PacketType {
        match self {
            ReplyData::Status(_) => PacketType::Status,
            ReplyData::Handle(_) => PacketType::Handle,
            ReplyData::Data(_) => PacketType::Data,
            ReplyData::Names(_) => PacketType::Name,
            ReplyData::Attrs(_) => PacketType::Attrs,
            ReplyData::Extended(_) => PacketType::ExtendedReply,
        }
    }
}

/// Body of the server's `SSH_FXP_VERSION` packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub version: u32,
    /// Advertised `(name, data)` extension pairs, in the order sent.
    pub extensions: Vec<(String, Bytes)>,
}

impl VersionInfo {
    pub fn decode(payload: &mut Payload) -> Result<Self, ProtocolError> {
        let version = payload.read_u32()?;
        let mut extensions = Vec::new();
        while !payload.is_eof() {
            let name = payload.read_utf8_lossy()?;
            let data = payload.read_string()?;
            extensions.push((name, data));
        }
        Ok(Self {
            version,
            extensions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PutExt;
    use bytes::{BufMut, BytesMut};

    #[test]
    fn test_open_mode_parsing() {
        assert_eq!("r".parse::<OpenMode>().unwrap(), OpenMode::Read);
        assert_eq!("rb".parse::<OpenMode>().unwrap(), OpenMode::Read);
        assert_eq!("r+".parse::<OpenMode>().unwrap(), OpenMode::ReadWrite);
        assert_eq!("rw".parse::<OpenMode>().unwrap(), OpenMode::ReadWrite);
        assert_eq!("rb+".parse::<OpenMode>().unwrap(), OpenMode::ReadWrite);
        assert_eq!("w".parse::<OpenMode>().unwrap(), OpenMode::Write);
        assert_eq!("wb".parse::<OpenMode>().unwrap(), OpenMode::Write);
        assert_eq!("w+".parse::<OpenMode>().unwrap(), OpenMode::WriteRead);
        assert_eq!("a".parse::<OpenMode>().unwrap(), OpenMode::Append);
        assert_eq!("a+".parse::<OpenMode>().unwrap(), OpenMode::Append);
    }

    #[test]
    fn test_invalid_open_mode() {
        let err = "x".parse::<OpenMode>().unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidOpenMode(ref m) if m == "x"));
        assert!("".parse::<OpenMode>().is_err());
        assert!("rw+".parse::<OpenFlags>().is_err());
    }

    #[test]
    fn test_operation_kind_display() {
        let op = Operation::Rename {
            from: "a".into(),
            to: "b".into(),
            flags: None,
        };
        assert_eq!(op.kind(), OperationKind::Rename);
        assert_eq!(op.kind().to_string(), "rename");
        assert_eq!(
            Operation::Extended(Extension::HomeDirectory {
                username: "jamis".into()
            })
            .kind()
            .to_string(),
            "extended"
        );
    }

    #[test]
    fn test_extension_names() {
        let ext = Extension::CheckFile {
            handle: Bytes::from_static(b"h"),
            offset: 0,
            length: 0,
            block_size: 0,
        };
        assert_eq!(ext.name(), "check-file-handle");
        assert_eq!(
            Extension::SpaceAvailable { path: "/".into() }.name(),
            "space-available"
        );
    }

    #[test]
    fn test_status_with_and_without_message() {
        let mut payload = Payload::from(&b"\x00\x00\x00\x02"[..]);
        let status = Status::decode(&mut payload).unwrap();
        assert_eq!(status.code, StatusCode::NO_SUCH_FILE);
        assert_eq!(status.message, None);
        assert_eq!(status.language, None);

        let mut buf = BytesMut::new();
        buf.put_u32(4);
        buf.put_string("boom");
        buf.put_string("en");
        let status = Status::decode(&mut Payload::new(buf.freeze())).unwrap();
        assert_eq!(status.code, StatusCode::FAILURE);
        assert_eq!(status.message.as_deref(), Some("boom"));
        assert_eq!(status.language.as_deref(), Some("en"));
    }

    #[test]
    fn test_version_info() {
        let mut buf = BytesMut::new();
        buf.put_u32(3);
        buf.put_string("posix-rename@openssh.com");
        buf.put_string("1");
        buf.put_string("statvfs@openssh.com");
        buf.put_string("2");

        let info = VersionInfo::decode(&mut Payload::new(buf.freeze())).unwrap();
        assert_eq!(info.version, 3);
        assert_eq!(info.extensions.len(), 2);
        assert_eq!(info.extensions[0].0, "posix-rename@openssh.com");
        assert_eq!(info.extensions[1].1.as_ref(), b"2");
    }
}
