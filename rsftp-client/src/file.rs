//! File-like access to an open remote handle.

use crate::client::Client;
use crate::error::ClientError;
use crate::transport::Transport;
use bytes::{Bytes, BytesMut};
use rsftp_protocol::{Attributes, OpenFlags, RemotePath};

/// An open remote file with a read-ahead buffer and a current position.
///
/// Reads are issued in blocks of the session's `read_chunk_size`. Writing
/// or seeking discards whatever was read ahead.
#[derive(Debug)]
pub struct RemoteFile<'a, T> {
    client: &'a mut Client<T>,
    handle: Bytes,
    position: u64,
    buffer: BytesMut,
    real_eof: bool,
    chunk_size: u32,
}

impl<T: Transport> Client<T> {
    /// Opens `path` and wraps the handle in a [`RemoteFile`].
    pub async fn open_file(
        &mut self,
        path: impl Into<RemotePath>,
        flags: impl Into<OpenFlags>,
    ) -> Result<RemoteFile<'_, T>, ClientError> {
        let handle = self.open(path, flags, Attributes::new()).await?;
        Ok(RemoteFile::new(self, handle))
    }
}

impl<'a, T: Transport> RemoteFile<'a, T> {
    pub fn new(client: &'a mut Client<T>, handle: Bytes) -> Self {
        let chunk_size = client.session().config().read_chunk_size as u32;
        Self {
            client,
            handle,
            position: 0,
            buffer: BytesMut::new(),
            real_eof: false,
            chunk_size,
        }
    }

    pub fn handle(&self) -> &Bytes {
        &self.handle
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Moves to `position`, dropping buffered data.
    pub fn seek(&mut self, position: u64) {
        self.position = position;
        self.buffer.clear();
        self.real_eof = false;
    }

    /// True once the server reported end of file and the buffer is drained.
    pub fn is_eof(&self) -> bool {
        self.real_eof && self.buffer.is_empty()
    }

    /// Reads the next block into the buffer. Returns false at end of file.
    async fn fill(&mut self) -> Result<bool, ClientError> {
        let offset = self.position + self.buffer.len() as u64;
        match self
            .client
            .read(self.handle.clone(), offset, self.chunk_size)
            .await?
        {
            Some(data) if !data.is_empty() => {
                self.buffer.extend_from_slice(&data);
                Ok(true)
            }
            _ => {
                self.real_eof = true;
                Ok(false)
            }
        }
    }

    fn take(&mut self, len: usize) -> Bytes {
        let data = self.buffer.split_to(len).freeze();
        self.position += data.len() as u64;
        data
    }

    /// Reads up to `len` bytes. Returns `None` at end of file.
    pub async fn read(&mut self, len: usize) -> Result<Option<Bytes>, ClientError> {
        while self.buffer.len() < len && !self.real_eof {
            self.fill().await?;
        }
        if self.buffer.is_empty() && len > 0 {
            return Ok(None);
        }
        let len = len.min(self.buffer.len());
        Ok(Some(self.take(len)))
    }

    /// Reads everything from the current position to end of file.
    pub async fn read_to_end(&mut self) -> Result<Bytes, ClientError> {
        while !self.real_eof && self.fill().await? {}
        let len = self.buffer.len();
        Ok(self.take(len))
    }

    /// Reads through the next `separator`, which is kept in the result. The
    /// last line may lack it. Returns `None` at end of file.
    pub async fn read_until(&mut self, separator: &[u8]) -> Result<Option<Bytes>, ClientError> {
        if separator.is_empty() {
            let rest = self.read_to_end().await?;
            return Ok((!rest.is_empty()).then_some(rest));
        }
        loop {
            if let Some(at) = find(&self.buffer, separator) {
                return Ok(Some(self.take(at + separator.len())));
            }
            if self.real_eof || !self.fill().await? {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                let len = self.buffer.len();
                return Ok(Some(self.take(len)));
            }
        }
    }

    /// Reads the next newline-terminated line.
    pub async fn read_line(&mut self) -> Result<Option<String>, ClientError> {
        Ok(self
            .read_until(b"\n")
            .await?
            .map(|line| String::from_utf8_lossy(&line).into_owned()))
    }

    /// Writes `data` at the current position.
    pub async fn write(&mut self, data: &[u8]) -> Result<(), ClientError> {
        self.buffer.clear();
        self.real_eof = false;
        for chunk in data.chunks(self.chunk_size as usize) {
            self.client
                .write(
                    self.handle.clone(),
                    self.position,
                    Bytes::copy_from_slice(chunk),
                )
                .await?;
            self.position += chunk.len() as u64;
        }
        Ok(())
    }

    pub async fn stat(&mut self) -> Result<Attributes, ClientError> {
        self.client.fstat(self.handle.clone()).await
    }

    pub async fn close(self) -> Result<(), ClientError> {
        self.client.close(self.handle).await
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::session::tests::{data_reply, handle_reply, open_session, status, ScriptedTransport};
    use crate::transport::ChannelEvent;
    use rsftp_protocol::{OpenMode, StatusCode};

    async fn client() -> Client<ScriptedTransport> {
        let config = SessionConfig::new().with_read_chunk_size(512);
        Client::new(open_session(3, config).await)
    }

    fn push(client: &mut Client<ScriptedTransport>, event: ChannelEvent) {
        client.session_mut().transport_mut().push(event);
    }

    fn read_offset(packet: &Bytes) -> (u64, u32) {
        // length, kind, id, string handle, offset, length
        let handle_len = u32::from_be_bytes([packet[9], packet[10], packet[11], packet[12]]) as usize;
        let at = 13 + handle_len;
        let offset = u64::from_be_bytes(packet[at..at + 8].try_into().unwrap());
        let len = u32::from_be_bytes(packet[at + 8..at + 12].try_into().unwrap());
        (offset, len)
    }

    #[tokio::test]
    async fn test_read_lines() {
        let mut client = client().await;
        push(&mut client, handle_reply(0, b"fh"));
        push(&mut client, data_reply(1, b"line one\nline two\nlast"));
        push(&mut client, status(2, StatusCode::EOF, ""));
        push(&mut client, status(3, StatusCode::OK, ""));

        let mut file = client.open_file("/f", OpenMode::Read).await.unwrap();
        assert_eq!(file.read_line().await.unwrap().unwrap(), "line one\n");
        assert_eq!(file.position(), 9);
        assert_eq!(file.read_line().await.unwrap().unwrap(), "line two\n");
        assert!(!file.is_eof());
        assert_eq!(file.read_line().await.unwrap().unwrap(), "last");
        assert!(file.is_eof());
        assert_eq!(file.read_line().await.unwrap(), None);
        assert_eq!(file.position(), 22);
        file.close().await.unwrap();

        let sent = &client.session().transport().sent;
        assert_eq!(read_offset(&sent[1]), (0, 512));
        assert_eq!(read_offset(&sent[2]), (22, 512));
    }

    #[tokio::test]
    async fn test_read_sizes_and_eof() {
        let mut client = client().await;
        push(&mut client, handle_reply(0, b"fh"));
        push(&mut client, data_reply(1, b"0123456789"));
        push(&mut client, status(2, StatusCode::EOF, ""));

        let mut file = client.open_file("/f", OpenMode::Read).await.unwrap();
        assert_eq!(file.read(4).await.unwrap().unwrap().as_ref(), b"0123");
        // short of the request: returns what remains before end of file
        assert_eq!(file.read(100).await.unwrap().unwrap().as_ref(), b"456789");
        assert_eq!(file.read(1).await.unwrap(), None);
        assert!(file.is_eof());
    }

    #[tokio::test]
    async fn test_read_to_end_spans_blocks() {
        let mut client = client().await;
        let block = vec![b'x'; 512];
        push(&mut client, handle_reply(0, b"fh"));
        push(&mut client, data_reply(1, &block));
        push(&mut client, data_reply(2, b"tail"));
        push(&mut client, status(3, StatusCode::EOF, ""));

        let mut file = client.open_file("/f", OpenMode::Read).await.unwrap();
        let data = file.read_to_end().await.unwrap();
        assert_eq!(data.len(), 516);
        assert!(data.ends_with(b"tail"));
        assert_eq!(file.position(), 516);
    }

    #[tokio::test]
    async fn test_read_to_end_after_eof_sends_nothing() {
        let mut client = client().await;
        push(&mut client, handle_reply(0, b"fh"));
        push(&mut client, data_reply(1, b"abc"));
        push(&mut client, status(2, StatusCode::EOF, ""));

        let mut file = client.open_file("/f", OpenMode::Read).await.unwrap();
        assert_eq!(file.read(10).await.unwrap().unwrap().as_ref(), b"abc");
        assert!(file.is_eof());
        assert!(file.read_to_end().await.unwrap().is_empty());
        assert!(file.read_to_end().await.unwrap().is_empty());
        drop(file);

        // open plus the two reads that found end of file
        assert_eq!(client.session().transport().sent.len(), 3);
    }

    #[tokio::test]
    async fn test_write_and_seek() {
        let mut client = client().await;
        push(&mut client, handle_reply(0, b"fh"));
        push(&mut client, status(1, StatusCode::OK, ""));
        push(&mut client, status(2, StatusCode::OK, ""));

        let mut file = client.open_file("/f", OpenMode::Write).await.unwrap();
        file.write(b"hello").await.unwrap();
        assert_eq!(file.position(), 5);
        file.seek(100);
        file.write(b"world").await.unwrap();
        assert_eq!(file.position(), 105);

        let sent = &client.session().transport().sent;
        // both writes carry their offsets
        assert_eq!(read_offset(&sent[1]).0, 0);
        assert_eq!(read_offset(&sent[2]).0, 100);
    }

    #[tokio::test]
    async fn test_write_failure_surfaces() {
        let mut client = client().await;
        push(&mut client, handle_reply(0, b"fh"));
        push(&mut client, status(1, StatusCode::NO_SPACE_ON_FILESYSTEM, "disk full"));

        let mut file = client.open_file("/f", OpenMode::Write).await.unwrap();
        let err = file.write(b"data").await.unwrap_err();
        assert_eq!(err.status_code(), Some(StatusCode::NO_SPACE_ON_FILESYSTEM));
        assert_eq!(file.position(), 0);
    }

    #[test]
    fn test_find() {
        assert_eq!(find(b"abc\r\ndef", b"\r\n"), Some(3));
        assert_eq!(find(b"abc", b"x"), None);
        assert_eq!(find(b"", b"x"), None);
    }
}
