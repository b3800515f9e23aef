//! # rsftp-protocol
//!
//! Wire protocol implementation for SFTP, versions 1 through 6.
//!
//! This crate provides:
//! - Streaming packet framing with a length prefix
//! - The attribute layouts of every protocol revision
//! - [`RemotePath`], which keeps paths as the raw bytes the server uses
//! - Typed operations, and a [`Driver`] per revision that encodes them
//! - Reply decoding, including the version 6 vendor extensions
//!
//! It performs no I/O; see `rsftp-client` for the session engine.

pub mod attributes;
pub mod buffer;
pub mod codec;
pub mod constants;
pub mod driver;
pub mod error;
pub mod frame;
pub mod message;
pub mod name;
pub mod path;

pub use attributes::{AclEntry, AttributeCodec, Attributes, ExtendedMap, FileType};
pub use buffer::{Payload, PutExt};
pub use codec::{Decoder, Encoder};
pub use constants::PacketType;
pub use driver::Driver;
pub use error::{ProtocolError, StatusCode};
pub use frame::Packet;
pub use message::{
    ExtendedReply, Extension, OpenFlags, OpenMode, Operation, OperationKind, ReplyData,
    SpaceAvailable, Status, VersionInfo,
};
pub use name::Name;
pub use path::RemotePath;

/// Highest protocol version this implementation speaks.
pub const PROTOCOL_VERSION: u32 = 6;

/// Default cap on an incoming packet's declared length: a 256 KiB data
/// payload plus room for the header.
pub const MAX_PACKET_SIZE: u32 = 256 * 1024 + 1024;
