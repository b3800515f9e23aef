//! Version 6: link, byte-range locks and the vendor extensions.

use super::{v04, v05, Driver};
use crate::buffer::{Payload, PutExt};
use crate::constants::PacketType;
use crate::error::ProtocolError;
use crate::message::{Extension, ExtendedReply, Operation, ReplyData, SpaceAvailable};
use crate::path::RemotePath;
use bytes::{BufMut, BytesMut};

/// Algorithms offered in every `check-file-handle` request, in preference
/// order.
pub const CHECK_FILE_ALGORITHMS: &str = "md5,sha256,sha384,sha512";

/// Smallest non-zero block size a `check-file-handle` request may ask for.
pub const MIN_CHECK_FILE_BLOCK_SIZE: u32 = 256;

pub(super) fn encode(
    driver: &Driver,
    op: &Operation,
    buf: &mut BytesMut,
) -> Result<PacketType, ProtocolError> {
    let packet_type = match op {
        Operation::Link {
            new_link_path,
            existing_path,
            symlink,
        } => encode_link(new_link_path, existing_path, *symlink, buf),
        // Sent as link(target, path). Version 3 sends symlink(path, target),
        // and servers disagree on which argument order they expect.
        Operation::Symlink { path, target } => encode_link(target, path, true, buf),
        Operation::Block {
            handle,
            offset,
            length,
            mask,
        } => {
            buf.put_string(handle);
            buf.put_u64(*offset);
            buf.put_u64(*length);
            buf.put_u32(*mask);
            PacketType::Block
        }
        Operation::Unblock {
            handle,
            offset,
            length,
        } => {
            buf.put_string(handle);
            buf.put_u64(*offset);
            buf.put_u64(*length);
            PacketType::Unblock
        }
        Operation::Extended(extension) => {
            encode_extension(extension, buf);
            PacketType::Extended
        }
        _ => return v05::encode(driver, op, buf),
    };
    Ok(packet_type)
}

fn encode_link(
    new_link_path: &RemotePath,
    existing_path: &RemotePath,
    symlink: bool,
    buf: &mut BytesMut,
) -> PacketType {
    buf.put_string(new_link_path);
    buf.put_string(existing_path);
    buf.put_bool(symlink);
    PacketType::Link
}

fn encode_extension(extension: &Extension, buf: &mut BytesMut) {
    buf.put_string(extension.name());
    match extension {
        Extension::Md5Hash {
            handle,
            offset,
            length,
            quick_hash,
        } => {
            buf.put_string(handle);
            buf.put_u64(*offset);
            buf.put_u64(*length);
            buf.put_string(quick_hash);
        }
        Extension::CheckFile {
            handle,
            offset,
            length,
            block_size,
        } => {
            let block_size = if *block_size != 0 && *block_size < MIN_CHECK_FILE_BLOCK_SIZE {
                MIN_CHECK_FILE_BLOCK_SIZE
            } else {
                *block_size
            };
            buf.put_string(handle);
            buf.put_string(CHECK_FILE_ALGORITHMS);
            buf.put_u64(*offset);
            buf.put_u64(*length);
            buf.put_u32(block_size);
        }
        Extension::SpaceAvailable { path } => buf.put_string(path),
        Extension::HomeDirectory { username } => buf.put_string(username),
    }
}

/// Digest length in bytes for a `check-file` algorithm name.
pub fn check_file_digest_len(algorithm: &str) -> Result<usize, ProtocolError> {
    match algorithm {
        "md5" => Ok(16),
        "sha256" => Ok(32),
        "sha384" => Ok(48),
        "sha512" => Ok(64),
        _ => Err(ProtocolError::UnsupportedAlgorithm(algorithm.to_string())),
    }
}

pub(super) fn decode(
    driver: &Driver,
    packet_type: PacketType,
    payload: &mut Payload,
) -> Result<ReplyData, ProtocolError> {
    match packet_type {
        PacketType::ExtendedReply => decode_extended_reply(payload).map(ReplyData::Extended),
        _ => v04::decode(driver, packet_type, payload),
    }
}

/// Extended replies carry the extension name first; the rest is dispatched
/// on it.
fn decode_extended_reply(payload: &mut Payload) -> Result<ExtendedReply, ProtocolError> {
    let name = payload.read_utf8_lossy()?;
    let reply = match name.as_str() {
        "md5-hash" => {
            let hash = if payload.is_eof() {
                Default::default()
            } else {
                payload.read_string()?
            };
            ExtendedReply::Md5Hash { hash }
        }
        "check-file" => {
            let algorithm = payload.read_utf8_lossy()?;
            let digest_len = check_file_digest_len(&algorithm)?;
            let mut hashes = Vec::with_capacity(payload.remaining() / digest_len);
            while !payload.is_eof() {
                hashes.push(payload.read_bytes(digest_len)?);
            }
            ExtendedReply::CheckFile { algorithm, hashes }
        }
        "space-available" => ExtendedReply::SpaceAvailable(SpaceAvailable {
            bytes_on_device: payload.read_u64()?,
            unused_bytes_on_device: payload.read_u64()?,
            bytes_available_to_user: payload.read_u64()?,
            unused_bytes_available_to_user: payload.read_u64()?,
            bytes_per_allocation_unit: payload.read_u32()?,
        }),
        "home-directory" => ExtendedReply::HomeDirectory {
            home: RemotePath::from(payload.read_string()?),
        },
        _ => return Err(ProtocolError::UnknownExtension(name)),
    };
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ace;
    use bytes::Bytes;

    fn encode(op: &Operation) -> (PacketType, BytesMut) {
        let mut buf = BytesMut::new();
        let packet_type = Driver::V6.encode(op, &mut buf).unwrap();
        (packet_type, buf)
    }

    fn reply(body: BytesMut) -> Result<ExtendedReply, ProtocolError> {
        match Driver::V6.decode(PacketType::ExtendedReply as u8, &mut Payload::new(body.freeze()))? {
            ReplyData::Extended(reply) => Ok(reply),
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn test_link() {
        let (packet_type, buf) = encode(&Operation::Link {
            new_link_path: "new".into(),
            existing_path: "old".into(),
            symlink: false,
        });
        assert_eq!(packet_type, PacketType::Link);
        assert_eq!(buf.as_ref(), b"\x00\x00\x00\x03new\x00\x00\x00\x03old\x00");
    }

    #[test]
    fn test_symlink_is_sent_as_link_with_swapped_arguments() {
        let (packet_type, buf) = encode(&Operation::Symlink {
            path: "link".into(),
            target: "dest".into(),
        });
        assert_eq!(packet_type, PacketType::Link);
        assert_eq!(buf.as_ref(), b"\x00\x00\x00\x04dest\x00\x00\x00\x04link\x01");
    }

    #[test]
    fn test_block_and_unblock() {
        let (packet_type, buf) = encode(&Operation::Block {
            handle: Bytes::from_static(b"h"),
            offset: 1,
            length: 2,
            mask: ace::READ_DATA | ace::WRITE_DATA,
        });
        assert_eq!(packet_type, PacketType::Block);
        let mut expected = BytesMut::new();
        expected.put_string("h");
        expected.put_u64(1);
        expected.put_u64(2);
        expected.put_u32(3);
        assert_eq!(buf, expected);

        let (packet_type, buf) = encode(&Operation::Unblock {
            handle: Bytes::from_static(b"h"),
            offset: 1,
            length: 2,
        });
        assert_eq!(packet_type, PacketType::Unblock);
        assert_eq!(buf, expected[..expected.len() - 4]);
    }

    #[test]
    fn test_md5_hash_request_includes_handle() {
        let (packet_type, buf) = encode(&Operation::Extended(Extension::Md5Hash {
            handle: Bytes::from_static(b"h"),
            offset: 0,
            length: 100,
            quick_hash: Bytes::new(),
        }));
        assert_eq!(packet_type, PacketType::Extended);
        let mut expected = BytesMut::new();
        expected.put_string("md5-hash-handle");
        expected.put_string("h");
        expected.put_u64(0);
        expected.put_u64(100);
        expected.put_string("");
        assert_eq!(buf, expected);
    }

    #[test]
    fn test_check_file_raises_small_block_size() {
        for (requested, sent) in [(0u32, 0u32), (1, 256), (255, 256), (256, 256), (4096, 4096)] {
            let (_, buf) = encode(&Operation::Extended(Extension::CheckFile {
                handle: Bytes::from_static(b"h"),
                offset: 0,
                length: 0,
                block_size: requested,
            }));
            let mut expected = BytesMut::new();
            expected.put_string("check-file-handle");
            expected.put_string("h");
            expected.put_string(CHECK_FILE_ALGORITHMS);
            expected.put_u64(0);
            expected.put_u64(0);
            expected.put_u32(sent);
            assert_eq!(buf, expected, "block size {}", requested);
        }
    }

    #[test]
    fn test_space_available_and_home_requests() {
        let (_, buf) = encode(&Operation::Extended(Extension::SpaceAvailable {
            path: "/".into(),
        }));
        assert_eq!(buf.as_ref(), b"\x00\x00\x00\x0fspace-available\x00\x00\x00\x01/");

        let (_, buf) = encode(&Operation::Extended(Extension::HomeDirectory {
            username: "jamis".into(),
        }));
        assert_eq!(
            buf.as_ref(),
            b"\x00\x00\x00\x0ehome-directory\x00\x00\x00\x05jamis"
        );
    }

    #[test]
    fn test_md5_reply() {
        let mut body = BytesMut::new();
        body.put_string("md5-hash");
        body.put_string([7u8; 16]);
        assert_eq!(
            reply(body).unwrap(),
            ExtendedReply::Md5Hash {
                hash: Bytes::from_static(&[7u8; 16])
            }
        );

        let mut body = BytesMut::new();
        body.put_string("md5-hash");
        assert_eq!(
            reply(body).unwrap(),
            ExtendedReply::Md5Hash { hash: Bytes::new() }
        );
    }

    #[test]
    fn test_check_file_reply_splits_digests() {
        let mut body = BytesMut::new();
        body.put_string("check-file");
        body.put_string("sha256");
        body.put_slice(&[1u8; 32]);
        body.put_slice(&[2u8; 32]);

        let ExtendedReply::CheckFile { algorithm, hashes } = reply(body).unwrap() else {
            panic!("expected a check-file reply");
        };
        assert_eq!(algorithm, "sha256");
        assert_eq!(hashes.len(), 2);
        assert_eq!(hashes[1].as_ref(), &[2u8; 32]);
    }

    #[test]
    fn test_check_file_reply_unknown_algorithm() {
        let mut body = BytesMut::new();
        body.put_string("check-file");
        body.put_string("crc32");
        assert!(matches!(
            reply(body),
            Err(ProtocolError::UnsupportedAlgorithm(ref a)) if a == "crc32"
        ));
    }

    #[test]
    fn test_check_file_reply_partial_digest_is_error() {
        let mut body = BytesMut::new();
        body.put_string("check-file");
        body.put_string("md5");
        body.put_slice(&[0u8; 20]);
        assert!(matches!(reply(body), Err(ProtocolError::UnexpectedEof { .. })));
    }

    #[test]
    fn test_space_available_reply() {
        let mut body = BytesMut::new();
        body.put_string("space-available");
        body.put_u64(1000);
        body.put_u64(600);
        body.put_u64(500);
        body.put_u64(400);
        body.put_u32(4096);
        assert_eq!(
            reply(body).unwrap(),
            ExtendedReply::SpaceAvailable(SpaceAvailable {
                bytes_on_device: 1000,
                unused_bytes_on_device: 600,
                bytes_available_to_user: 500,
                unused_bytes_available_to_user: 400,
                bytes_per_allocation_unit: 4096,
            })
        );
    }

    #[test]
    fn test_home_directory_reply() {
        let mut body = BytesMut::new();
        body.put_string("home-directory");
        body.put_string("/home/jamis");
        assert_eq!(
            reply(body).unwrap(),
            ExtendedReply::HomeDirectory {
                home: "/home/jamis".into()
            }
        );
    }

    #[test]
    fn test_unknown_extension_reply() {
        let mut body = BytesMut::new();
        body.put_string("statvfs@openssh.com");
        assert!(matches!(
            reply(body),
            Err(ProtocolError::UnknownExtension(ref name)) if name == "statvfs@openssh.com"
        ));
    }

    #[test]
    fn test_digest_lengths() {
        assert_eq!(check_file_digest_len("md5").unwrap(), 16);
        assert_eq!(check_file_digest_len("sha384").unwrap(), 48);
        assert_eq!(check_file_digest_len("sha512").unwrap(), 64);
        assert!(check_file_digest_len("sha1").is_err());
    }
}
