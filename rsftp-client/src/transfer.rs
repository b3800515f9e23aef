//! Pipelined whole-file transfers.
//!
//! Both directions keep up to `max_in_flight` requests outstanding and
//! match replies to them by id. Replies are consumed in the order the
//! requests were issued; replies that arrive early are already routed to
//! their request when its turn comes.

use crate::client::{status_error, unexpected, Client};
use crate::error::ClientError;
use crate::request::Request;
use crate::transport::Transport;
use bytes::{Bytes, BytesMut};
use rsftp_protocol::{Attributes, OpenMode, RemotePath};
use std::collections::{BTreeMap, VecDeque};

impl<T: Transport> Client<T> {
    /// Reads the whole of `path` into memory.
    pub async fn download(&mut self, path: impl Into<RemotePath>) -> Result<Bytes, ClientError> {
        let path = path.into();
        let handle = self.open(&path, OpenMode::Read, Attributes::new()).await?;
        let downloaded = self.download_handle(&handle).await;
        let closed = self.close(handle).await;
        let data = downloaded?;
        closed?;
        tracing::debug!("download: {} bytes from {}", data.len(), path);
        Ok(data)
    }

    /// Writes `data` to `path`, creating or truncating it. Returns the number
    /// of bytes written.
    pub async fn upload(
        &mut self,
        path: impl Into<RemotePath>,
        data: Bytes,
    ) -> Result<u64, ClientError> {
        let path = path.into();
        let handle = self.open(&path, OpenMode::Write, Attributes::new()).await?;
        let uploaded = self.upload_handle(&handle, data).await;
        let closed = self.close(handle).await;
        let written = uploaded?;
        closed?;
        tracing::debug!("upload: {} bytes to {}", written, path);
        Ok(written)
    }

    async fn download_handle(&mut self, handle: &Bytes) -> Result<Bytes, ClientError> {
        let chunk_size = self.session().config().read_chunk_size as u32;
        let window = self.session().config().max_in_flight;
        let session = self.session_mut();

        // each read carries the (offset, length) it asked for
        let mut in_flight: VecDeque<Request<(u64, u32)>> = VecDeque::new();
        let mut chunks: BTreeMap<u64, Bytes> = BTreeMap::new();
        let mut next_offset = 0u64;
        let mut eof_at: Option<u64> = None;
        let mut failure: Option<ClientError> = None;

        loop {
            while failure.is_none() && eof_at.is_none() && in_flight.len() < window {
                let request = session
                    .read(handle.clone(), next_offset, chunk_size)?
                    .with_context((next_offset, chunk_size));
                next_offset += u64::from(chunk_size);
                in_flight.push_back(request);
            }

            let Some(mut request) = in_flight.pop_front() else {
                break;
            };
            let (offset, length) = *request.context();
            let response = session.wait(&mut request).await?;

            if response.eof() {
                eof_at = Some(eof_at.map_or(offset, |at| at.min(offset)));
                continue;
            }
            if !response.ok() {
                failure.get_or_insert_with(|| status_error(response));
                continue;
            }
            let data = match response.data() {
                Some(data) if !data.is_empty() => data.clone(),
                Some(_) => {
                    eof_at = Some(eof_at.map_or(offset, |at| at.min(offset)));
                    continue;
                }
                None => return Err(unexpected(response.reply())),
            };

            let received = data.len().min(length as usize) as u32;
            let rest = offset + u64::from(received);
            if received < length && eof_at.map_or(true, |at| rest < at) && failure.is_none() {
                tracing::trace!("download: short read at {}, asking for {}", offset, rest);
                let request = session
                    .read(handle.clone(), rest, length - received)?
                    .with_context((rest, length - received));
                in_flight.push_back(request);
            }
            chunks.insert(offset, data.slice(..received as usize));
        }

        if let Some(err) = failure {
            return Err(err);
        }

        let mut out = BytesMut::new();
        for (offset, data) in chunks {
            let end = out.len() as u64;
            if eof_at.is_some_and(|at| offset >= at) || offset > end {
                // a gap can only follow end of file
                break;
            }
            let skip = (end - offset) as usize;
            if skip < data.len() {
                out.extend_from_slice(&data[skip..]);
            }
        }
        Ok(out.freeze())
    }

    async fn upload_handle(&mut self, handle: &Bytes, data: Bytes) -> Result<u64, ClientError> {
        let chunk_size = self.session().config().read_chunk_size;
        let window = self.session().config().max_in_flight;
        let session = self.session_mut();

        let mut in_flight: VecDeque<Request> = VecDeque::new();
        let mut offset = 0usize;
        let mut failure: Option<ClientError> = None;

        loop {
            while failure.is_none() && offset < data.len() && in_flight.len() < window {
                let end = (offset + chunk_size).min(data.len());
                let request = session.write(handle.clone(), offset as u64, data.slice(offset..end))?;
                offset = end;
                in_flight.push_back(request);
            }

            let Some(mut request) = in_flight.pop_front() else {
                break;
            };
            let response = session.wait(&mut request).await?;
            if !response.ok() {
                failure.get_or_insert_with(|| status_error(response));
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(data.len() as u64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::session::tests::{data_reply, handle_reply, open_session, status, ScriptedTransport};
    use crate::transport::ChannelEvent;
    use rsftp_protocol::{PacketType, StatusCode};

    async fn client() -> Client<ScriptedTransport> {
        let config = SessionConfig::new()
            .with_read_chunk_size(512)
            .with_max_in_flight(2);
        Client::new(open_session(3, config).await)
    }

    fn push(client: &mut Client<ScriptedTransport>, event: ChannelEvent) {
        client.session_mut().transport_mut().push(event);
    }

    /// (kind, offset, length) of a sent read or write.
    fn sent_io(packet: &Bytes) -> (u8, u64, u32) {
        let handle_len =
            u32::from_be_bytes([packet[9], packet[10], packet[11], packet[12]]) as usize;
        let at = 13 + handle_len;
        let offset = u64::from_be_bytes(packet[at..at + 8].try_into().unwrap());
        let len = u32::from_be_bytes(packet[at + 8..at + 12].try_into().unwrap());
        (packet[4], offset, len)
    }

    #[tokio::test]
    async fn test_download_with_short_read() {
        let mut client = client().await;
        let content: Vec<u8> = (0..700u32).map(|i| (i % 251) as u8).collect();

        push(&mut client, handle_reply(0, b"fh"));
        push(&mut client, data_reply(1, &content[..512]));
        push(&mut client, data_reply(2, &content[512..]));
        push(&mut client, status(3, StatusCode::EOF, ""));
        push(&mut client, status(4, StatusCode::EOF, ""));
        push(&mut client, status(5, StatusCode::OK, ""));

        let data = client.download("/f").await.unwrap();
        assert_eq!(data.as_ref(), content.as_slice());

        let sent = &client.session().transport().sent;
        let read = PacketType::Read as u8;
        assert_eq!(sent_io(&sent[1]), (read, 0, 512));
        assert_eq!(sent_io(&sent[2]), (read, 512, 512));
        assert_eq!(sent_io(&sent[3]), (read, 1024, 512));
        // the short read is completed from where it stopped
        assert_eq!(sent_io(&sent[4]), (read, 700, 324));
        assert_eq!(sent[5][4], PacketType::Close as u8);
        assert!(!client.session().has_pending());
    }

    #[tokio::test]
    async fn test_download_empty_file() {
        let mut client = client().await;
        push(&mut client, handle_reply(0, b"fh"));
        push(&mut client, status(1, StatusCode::EOF, ""));
        push(&mut client, status(2, StatusCode::EOF, ""));
        push(&mut client, status(3, StatusCode::OK, ""));

        let data = client.download("/empty").await.unwrap();
        assert!(data.is_empty());
    }

    #[tokio::test]
    async fn test_download_failure_still_closes() {
        let mut client = client().await;
        push(&mut client, handle_reply(0, b"fh"));
        push(&mut client, status(1, StatusCode::FAILURE, "io error"));
        push(&mut client, status(2, StatusCode::EOF, ""));
        push(&mut client, status(3, StatusCode::OK, ""));

        let err = client.download("/f").await.unwrap_err();
        assert_eq!(err.status_code(), Some(StatusCode::FAILURE));
        let sent = &client.session().transport().sent;
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[3][4], PacketType::Close as u8);
    }

    #[tokio::test]
    async fn test_upload_pipelines_chunks() {
        let mut client = client().await;
        push(&mut client, handle_reply(0, b"fh"));
        for id in 1..=4 {
            push(&mut client, status(id, StatusCode::OK, ""));
        }

        let data = Bytes::from(vec![b'z'; 1200]);
        assert_eq!(client.upload("/out", data).await.unwrap(), 1200);

        let sent = &client.session().transport().sent;
        let write = PacketType::Write as u8;
        // the length field of a write is the data's string prefix
        assert_eq!(sent_io(&sent[1]), (write, 0, 512));
        assert_eq!(sent_io(&sent[2]), (write, 512, 512));
        assert_eq!(sent_io(&sent[3]), (write, 1024, 176));
        assert_eq!(sent[4][4], PacketType::Close as u8);
    }

    #[tokio::test]
    async fn test_upload_stops_after_failure() {
        let mut client = client().await;
        push(&mut client, handle_reply(0, b"fh"));
        push(&mut client, status(1, StatusCode::QUOTA_EXCEEDED, "quota"));
        push(&mut client, status(2, StatusCode::OK, ""));
        push(&mut client, status(3, StatusCode::OK, ""));

        let err = client
            .upload("/out", Bytes::from(vec![0u8; 4096]))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(StatusCode::QUOTA_EXCEEDED));

        // two writes in flight, none issued after the failure, then close
        let sent = &client.session().transport().sent;
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[3][4], PacketType::Close as u8);
    }
}
