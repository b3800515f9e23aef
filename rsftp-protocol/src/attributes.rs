//! File attributes and their per-revision wire layouts.
//!
//! The attribute block is a `u32` presence mask followed by every present
//! field in a fixed, revision-specific order. A field is present on the wire
//! when *all* of its condition bits are set in the mask, so the nanosecond
//! companions of the v4+ timestamps need both the timestamp bit and
//! [`flags::SUBSECOND_TIMES`].

use crate::buffer::{Payload, PutExt};
use crate::error::ProtocolError;
use crate::path::RemotePath;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Presence bits of the attribute mask.
pub mod flags {
    pub const SIZE: u32 = 0x0000_0001;
    /// v1-v3 only.
    pub const UIDGID: u32 = 0x0000_0002;
    pub const PERMISSIONS: u32 = 0x0000_0004;
    /// v1-v3 name of the access/modify time bit.
    pub const ACMODTIME: u32 = 0x0000_0008;
    pub const ACCESSTIME: u32 = 0x0000_0008;
    pub const CREATETIME: u32 = 0x0000_0010;
    pub const MODIFYTIME: u32 = 0x0000_0020;
    pub const ACL: u32 = 0x0000_0040;
    pub const OWNERGROUP: u32 = 0x0000_0080;
    pub const SUBSECOND_TIMES: u32 = 0x0000_0100;
    pub const BITS: u32 = 0x0000_0200;
    pub const ALLOCATION_SIZE: u32 = 0x0000_0400;
    pub const TEXT_HINT: u32 = 0x0000_0800;
    pub const MIME_TYPE: u32 = 0x0000_1000;
    pub const LINK_COUNT: u32 = 0x0000_2000;
    pub const UNTRANSLATED_NAME: u32 = 0x0000_4000;
    pub const CTIME: u32 = 0x0000_8000;
    pub const EXTENDED: u32 = 0x8000_0000;
}

/// File type tag carried by v4+ attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum FileType {
    Regular = 1,
    Directory = 2,
    Symlink = 3,
    Special = 4,
    Unknown = 5,
    Socket = 6,
    CharDevice = 7,
    BlockDevice = 8,
    Fifo = 9,
}

impl FileType {
    /// Maps a wire byte to a type. Values the protocol does not define are
    /// reported as [`FileType::Unknown`].
    pub fn from_byte(value: u8) -> Self {
        match value {
            1 => FileType::Regular,
            2 => FileType::Directory,
            3 => FileType::Symlink,
            4 => FileType::Special,
            6 => FileType::Socket,
            7 => FileType::CharDevice,
            8 => FileType::BlockDevice,
            9 => FileType::Fifo,
            _ => FileType::Unknown,
        }
    }

    /// Character used in the first column of an `ls -l` listing.
    pub fn long_listing_char(&self) -> char {
        match self {
            FileType::Directory => 'd',
            FileType::Symlink => 'l',
            FileType::Socket => 's',
            FileType::CharDevice => 'c',
            FileType::BlockDevice => 'b',
            FileType::Fifo => 'p',
            _ => '-',
        }
    }
}

/// One access-control entry of a v4+ ACL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    pub ace_type: u32,
    pub flag: u32,
    pub mask: u32,
    pub who: String,
}

impl AclEntry {
    pub fn new(ace_type: u32, flag: u32, mask: u32, who: impl Into<String>) -> Self {
        Self {
            ace_type,
            flag,
            mask,
            who: who.into(),
        }
    }
}

/// Vendor-specific `(name, value)` pairs. Values are opaque bytes.
///
/// Keys are unique: inserting an existing key replaces its value in place,
/// so the order pairs were first seen is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedMap(Vec<(String, Bytes)>);

impl ExtendedMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Bytes>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Bytes> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bytes)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Bytes>> FromIterator<(K, V)> for ExtendedMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = ExtendedMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// File metadata, the superset of every revision's fields.
///
/// A field set to `None` is absent: it contributes nothing to the presence
/// mask and is not written. Fields that the negotiated revision does not
/// know are ignored by its codec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<FileType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocation_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atime: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atime_nseconds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub createtime: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub createtime_nseconds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtime: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtime_nseconds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctime: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctime_nseconds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acl: Option<Vec<AclEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attrib_bits: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attrib_bits_valid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_hint: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub untranslated_name: Option<RemotePath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended: Option<ExtendedMap>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file_type(mut self, file_type: FileType) -> Self {
        self.file_type = Some(file_type);
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_permissions(mut self, permissions: u32) -> Self {
        self.permissions = Some(permissions);
        self
    }

    pub fn with_uid_gid(mut self, uid: u32, gid: u32) -> Self {
        self.uid = Some(uid);
        self.gid = Some(gid);
        self
    }

    pub fn with_owner_group(mut self, owner: impl Into<String>, group: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self.group = Some(group.into());
        self
    }

    /// Sets access and modify times in whole seconds.
    pub fn with_times(mut self, atime: u64, mtime: u64) -> Self {
        self.atime = Some(atime);
        self.mtime = Some(mtime);
        self
    }

    pub fn with_extended(mut self, key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        self.extended
            .get_or_insert_with(ExtendedMap::new)
            .insert(key, value);
        self
    }

    pub fn is_directory(&self) -> bool {
        self.file_type == Some(FileType::Directory)
    }

    pub fn is_symlink(&self) -> bool {
        self.file_type == Some(FileType::Symlink)
    }

    pub fn is_file(&self) -> bool {
        self.file_type == Some(FileType::Regular)
    }

    /// Owner for display: the name when known, otherwise the numeric uid.
    pub fn owner_display(&self) -> Cow<'_, str> {
        match (&self.owner, self.uid) {
            (Some(owner), _) => Cow::Borrowed(owner.as_str()),
            (None, Some(uid)) => Cow::Owned(uid.to_string()),
            (None, None) => Cow::Borrowed(""),
        }
    }

    /// Group for display: the name when known, otherwise the numeric gid.
    pub fn group_display(&self) -> Cow<'_, str> {
        match (&self.group, self.gid) {
            (Some(group), _) => Cow::Borrowed(group.as_str()),
            (None, Some(gid)) => Cow::Owned(gid.to_string()),
            (None, None) => Cow::Borrowed(""),
        }
    }

    fn numeric(&self, field: Field) -> Option<u64> {
        match field {
            Field::FileType => Some(self.file_type.unwrap_or(FileType::Regular) as u64),
            Field::Size => self.size,
            Field::AllocationSize => self.allocation_size,
            Field::Uid => self.uid.map(u64::from),
            Field::Gid => self.gid.map(u64::from),
            Field::Permissions => self.permissions.map(u64::from),
            Field::Atime => self.atime,
            Field::AtimeNseconds => self.atime_nseconds.map(u64::from),
            Field::Createtime => self.createtime,
            Field::CreatetimeNseconds => self.createtime_nseconds.map(u64::from),
            Field::Mtime => self.mtime,
            Field::MtimeNseconds => self.mtime_nseconds.map(u64::from),
            Field::Ctime => self.ctime,
            Field::CtimeNseconds => self.ctime_nseconds.map(u64::from),
            Field::AttribBits => self.attrib_bits.map(u64::from),
            Field::AttribBitsValid => self.attrib_bits_valid.map(u64::from),
            Field::TextHint => self.text_hint.map(u64::from),
            Field::LinkCount => self.link_count.map(u64::from),
            _ => None,
        }
    }

    fn set_numeric(&mut self, field: Field, value: u64) {
        match field {
            Field::FileType => self.file_type = Some(FileType::from_byte(value as u8)),
            Field::Size => self.size = Some(value),
            Field::AllocationSize => self.allocation_size = Some(value),
            Field::Uid => self.uid = Some(value as u32),
            Field::Gid => self.gid = Some(value as u32),
            Field::Permissions => self.permissions = Some(value as u32),
            Field::Atime => self.atime = Some(value),
            Field::AtimeNseconds => self.atime_nseconds = Some(value as u32),
            Field::Createtime => self.createtime = Some(value),
            Field::CreatetimeNseconds => self.createtime_nseconds = Some(value as u32),
            Field::Mtime => self.mtime = Some(value),
            Field::MtimeNseconds => self.mtime_nseconds = Some(value as u32),
            Field::Ctime => self.ctime = Some(value),
            Field::CtimeNseconds => self.ctime_nseconds = Some(value as u32),
            Field::AttribBits => self.attrib_bits = Some(value as u32),
            Field::AttribBitsValid => self.attrib_bits_valid = Some(value as u32),
            Field::TextHint => self.text_hint = Some(value as u8),
            Field::LinkCount => self.link_count = Some(value as u32),
            _ => {}
        }
    }

    fn text(&self, field: Field) -> Option<&[u8]> {
        match field {
            Field::Owner => self.owner.as_deref().map(str::as_bytes),
            Field::Group => self.group.as_deref().map(str::as_bytes),
            Field::MimeType => self.mime_type.as_deref().map(str::as_bytes),
            Field::UntranslatedName => self.untranslated_name.as_ref().map(RemotePath::as_bytes),
            _ => None,
        }
    }

    /// Stores a string field. Names in a legacy encoding are kept readable
    /// rather than rejected; the untranslated name keeps its raw bytes.
    fn set_text(&mut self, field: Field, raw: Bytes) {
        match field {
            Field::Owner => self.owner = Some(lossy(&raw)),
            Field::Group => self.group = Some(lossy(&raw)),
            Field::MimeType => self.mime_type = Some(lossy(&raw)),
            Field::UntranslatedName => self.untranslated_name = Some(RemotePath::from(raw)),
            _ => {}
        }
    }

    fn is_present(&self, field: Field) -> bool {
        match field {
            Field::Acl => self.acl.is_some(),
            Field::Extended => self.extended.is_some(),
            Field::Owner | Field::Group | Field::MimeType | Field::UntranslatedName => {
                self.text(field).is_some()
            }
            // the type tag is unconditional and never sets a bit
            Field::FileType => false,
            _ => self.numeric(field).is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    FileType,
    Size,
    AllocationSize,
    Uid,
    Gid,
    Owner,
    Group,
    Permissions,
    Atime,
    AtimeNseconds,
    Createtime,
    CreatetimeNseconds,
    Mtime,
    MtimeNseconds,
    Ctime,
    CtimeNseconds,
    Acl,
    AttribBits,
    AttribBitsValid,
    TextHint,
    MimeType,
    LinkCount,
    UntranslatedName,
    Extended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wire {
    Byte,
    U32,
    U64,
    Str,
    Acl,
    Extended,
}

#[derive(Debug, Clone, Copy)]
struct Element {
    field: Field,
    wire: Wire,
    condition: u32,
}

const fn el(field: Field, wire: Wire, condition: u32) -> Element {
    Element {
        field,
        wire,
        condition,
    }
}

use flags::*;

const V1_ELEMENTS: &[Element] = &[
    el(Field::Size, Wire::U64, SIZE),
    el(Field::Uid, Wire::U32, UIDGID),
    el(Field::Gid, Wire::U32, UIDGID),
    el(Field::Permissions, Wire::U32, PERMISSIONS),
    el(Field::Atime, Wire::U32, ACMODTIME),
    el(Field::Mtime, Wire::U32, ACMODTIME),
    el(Field::Extended, Wire::Extended, EXTENDED),
];

const V4_ELEMENTS: &[Element] = &[
    el(Field::FileType, Wire::Byte, 0),
    el(Field::Size, Wire::U64, SIZE),
    el(Field::Owner, Wire::Str, OWNERGROUP),
    el(Field::Group, Wire::Str, OWNERGROUP),
    el(Field::Permissions, Wire::U32, PERMISSIONS),
    el(Field::Atime, Wire::U64, ACCESSTIME),
    el(Field::AtimeNseconds, Wire::U32, ACCESSTIME | SUBSECOND_TIMES),
    el(Field::Createtime, Wire::U64, CREATETIME),
    el(Field::CreatetimeNseconds, Wire::U32, CREATETIME | SUBSECOND_TIMES),
    el(Field::Mtime, Wire::U64, MODIFYTIME),
    el(Field::MtimeNseconds, Wire::U32, MODIFYTIME | SUBSECOND_TIMES),
    el(Field::Acl, Wire::Acl, ACL),
    el(Field::Extended, Wire::Extended, EXTENDED),
];

const V5_ELEMENTS: &[Element] = &[
    el(Field::FileType, Wire::Byte, 0),
    el(Field::Size, Wire::U64, SIZE),
    el(Field::Owner, Wire::Str, OWNERGROUP),
    el(Field::Group, Wire::Str, OWNERGROUP),
    el(Field::Permissions, Wire::U32, PERMISSIONS),
    el(Field::Atime, Wire::U64, ACCESSTIME),
    el(Field::AtimeNseconds, Wire::U32, ACCESSTIME | SUBSECOND_TIMES),
    el(Field::Createtime, Wire::U64, CREATETIME),
    el(Field::CreatetimeNseconds, Wire::U32, CREATETIME | SUBSECOND_TIMES),
    el(Field::Mtime, Wire::U64, MODIFYTIME),
    el(Field::MtimeNseconds, Wire::U32, MODIFYTIME | SUBSECOND_TIMES),
    el(Field::Acl, Wire::Acl, ACL),
    el(Field::AttribBits, Wire::U32, BITS),
    el(Field::Extended, Wire::Extended, EXTENDED),
];

const V6_ELEMENTS: &[Element] = &[
    el(Field::FileType, Wire::Byte, 0),
    el(Field::Size, Wire::U64, SIZE),
    el(Field::AllocationSize, Wire::U64, ALLOCATION_SIZE),
    el(Field::Owner, Wire::Str, OWNERGROUP),
    el(Field::Group, Wire::Str, OWNERGROUP),
    el(Field::Permissions, Wire::U32, PERMISSIONS),
    el(Field::Atime, Wire::U64, ACCESSTIME),
    el(Field::AtimeNseconds, Wire::U32, ACCESSTIME | SUBSECOND_TIMES),
    el(Field::Createtime, Wire::U64, CREATETIME),
    el(Field::CreatetimeNseconds, Wire::U32, CREATETIME | SUBSECOND_TIMES),
    el(Field::Mtime, Wire::U64, MODIFYTIME),
    el(Field::MtimeNseconds, Wire::U32, MODIFYTIME | SUBSECOND_TIMES),
    el(Field::Ctime, Wire::U64, CTIME),
    el(Field::CtimeNseconds, Wire::U32, CTIME | SUBSECOND_TIMES),
    el(Field::Acl, Wire::Acl, ACL),
    el(Field::AttribBits, Wire::U32, BITS),
    el(Field::AttribBitsValid, Wire::U32, BITS),
    el(Field::TextHint, Wire::Byte, TEXT_HINT),
    el(Field::MimeType, Wire::Str, MIME_TYPE),
    el(Field::LinkCount, Wire::U32, LINK_COUNT),
    el(Field::UntranslatedName, Wire::Str, UNTRANSLATED_NAME),
    el(Field::Extended, Wire::Extended, EXTENDED),
];

/// Attribute layout of one protocol revision.
///
/// Versions 1 to 3 share a layout; 4, 5 and 6 each have their own.
#[derive(Debug)]
pub struct AttributeCodec {
    version: u32,
    elements: &'static [Element],
}

pub static V1: AttributeCodec = AttributeCodec {
    version: 1,
    elements: V1_ELEMENTS,
};

pub static V4: AttributeCodec = AttributeCodec {
    version: 4,
    elements: V4_ELEMENTS,
};

pub static V5: AttributeCodec = AttributeCodec {
    version: 5,
    elements: V5_ELEMENTS,
};

pub static V6: AttributeCodec = AttributeCodec {
    version: 6,
    elements: V6_ELEMENTS,
};

impl AttributeCodec {
    /// Returns the layout used by protocol `version`.
    pub fn for_version(version: u32) -> Result<&'static AttributeCodec, ProtocolError> {
        match version {
            1..=3 => Ok(&V1),
            4 => Ok(&V4),
            5 => Ok(&V5),
            6 => Ok(&V6),
            _ => Err(ProtocolError::UnsupportedVersion(version)),
        }
    }

    /// First protocol version using this layout.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Whether this layout carries a type tag.
    pub fn has_file_type(&self) -> bool {
        self.version >= 4
    }

    /// Computes the presence mask for `attrs` under this layout.
    pub fn flags(&self, attrs: &Attributes) -> u32 {
        self.elements
            .iter()
            .filter(|element| attrs.is_present(element.field))
            .fold(0, |mask, element| mask | element.condition)
    }

    pub fn decode(&self, payload: &mut Payload) -> Result<Attributes, ProtocolError> {
        let mask = payload.read_u32()?;
        let mut attrs = Attributes::default();

        for element in self.elements {
            if mask & element.condition != element.condition {
                continue;
            }
            match element.wire {
                Wire::Byte => attrs.set_numeric(element.field, payload.read_u8()? as u64),
                Wire::U32 => attrs.set_numeric(element.field, payload.read_u32()? as u64),
                Wire::U64 => attrs.set_numeric(element.field, payload.read_u64()?),
                Wire::Str => attrs.set_text(element.field, payload.read_string()?),
                Wire::Acl => attrs.acl = Some(decode_acl(payload)?),
                Wire::Extended => attrs.extended = Some(decode_extended(payload)?),
            }
        }

        Ok(attrs)
    }

    /// Writes the mask and every present field.
    ///
    /// A field whose condition bits are all set by other fields is written
    /// even if it is itself absent, as zero or an empty string; the mask
    /// promises it. [`AttributeCodec::canonical`] describes exactly what a
    /// peer decodes.
    pub fn encode<B: BufMut>(&self, attrs: &Attributes, buf: &mut B) {
        let mask = self.flags(attrs);
        buf.put_u32(mask);

        for element in self.elements {
            if mask & element.condition != element.condition {
                continue;
            }
            match element.wire {
                Wire::Byte => buf.put_u8(attrs.numeric(element.field).unwrap_or(0) as u8),
                Wire::U32 => buf.put_u32(clamp_u32(attrs.numeric(element.field).unwrap_or(0))),
                Wire::U64 => buf.put_u64(attrs.numeric(element.field).unwrap_or(0)),
                Wire::Str => buf.put_string(attrs.text(element.field).unwrap_or(&[])),
                Wire::Acl => encode_acl(attrs.acl.as_deref().unwrap_or(&[]), buf),
                Wire::Extended => encode_extended(attrs.extended.as_ref(), buf),
            }
        }
    }

    pub fn encode_to_bytes(&self, attrs: &Attributes) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(attrs, &mut buf);
        buf.freeze()
    }

    /// The attributes a peer decodes after `attrs` is encoded with this
    /// layout.
    ///
    /// Fields the layout does not carry are dropped. Fields that share a
    /// presence bit with a present sibling appear with their wire default:
    /// a lone `mtime` next to a nanosecond-bearing `atime` gains
    /// `mtime_nseconds == Some(0)`, and a missing type tag becomes
    /// [`FileType::Regular`]. v1 times are clamped to `u32`.
    pub fn canonical(&self, attrs: &Attributes) -> Attributes {
        let mask = self.flags(attrs);
        let mut out = Attributes::default();

        for element in self.elements {
            if mask & element.condition != element.condition {
                continue;
            }
            let value = attrs.numeric(element.field).unwrap_or(0);
            match element.wire {
                Wire::Byte => out.set_numeric(element.field, u64::from(value as u8)),
                Wire::U32 => out.set_numeric(element.field, u64::from(clamp_u32(value))),
                Wire::U64 => out.set_numeric(element.field, value),
                Wire::Str => {
                    let raw = attrs.text(element.field).unwrap_or(&[]);
                    out.set_text(element.field, Bytes::copy_from_slice(raw));
                }
                Wire::Acl => out.acl = Some(attrs.acl.clone().unwrap_or_default()),
                Wire::Extended => out.extended = Some(attrs.extended.clone().unwrap_or_default()),
            }
        }

        out
    }
}

fn lossy(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn clamp_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

fn decode_acl(payload: &mut Payload) -> Result<Vec<AclEntry>, ProtocolError> {
    let mut nested = payload.read_nested()?;
    let count = nested.read_u32()?;
    let mut acl = Vec::with_capacity(count.min(64) as usize);
    for _ in 0..count {
        let ace_type = nested.read_u32()?;
        let flag = nested.read_u32()?;
        let mask = nested.read_u32()?;
        let who = nested.read_utf8_lossy()?;
        acl.push(AclEntry {
            ace_type,
            flag,
            mask,
            who,
        });
    }
    Ok(acl)
}

fn encode_acl<B: BufMut>(acl: &[AclEntry], buf: &mut B) {
    let mut nested = BytesMut::new();
    nested.put_u32(acl.len() as u32);
    for entry in acl {
        nested.put_u32(entry.ace_type);
        nested.put_u32(entry.flag);
        nested.put_u32(entry.mask);
        nested.put_string(&entry.who);
    }
    buf.put_string(&nested);
}

fn decode_extended(payload: &mut Payload) -> Result<ExtendedMap, ProtocolError> {
    let count = payload.read_u32()?;
    let mut map = ExtendedMap::new();
    for _ in 0..count {
        let key = payload.read_utf8_lossy()?;
        let value = payload.read_string()?;
        map.insert(key, value);
    }
    Ok(map)
}

fn encode_extended<B: BufMut>(map: Option<&ExtendedMap>, buf: &mut B) {
    let Some(map) = map else {
        buf.put_u32(0);
        return;
    };
    buf.put_u32(map.len() as u32);
    for (key, value) in map.iter() {
        buf.put_string(key);
        buf.put_string(value);
    }
}
