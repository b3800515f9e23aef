//! High-level client API.

use crate::config::SessionConfig;
use crate::error::ClientError;
use crate::response::Response;
use crate::session::Session;
use crate::transport::Transport;
use bytes::Bytes;
use rsftp_protocol::{
    Attributes, ExtendedReply, Extension, Name, OpenFlags, Operation, PacketType, ProtocolError,
    RemotePath, ReplyData, SpaceAvailable,
};

/// Per-block hashes returned by `check-file-handle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChecksums {
    pub algorithm: String,
    pub hashes: Vec<Bytes>,
}

/// SFTP client.
///
/// Every method sends one request and waits for its reply. A reply with a
/// failure status becomes [`ClientError::Status`].
#[derive(Debug)]
pub struct Client<T> {
    session: Session<T>,
}

impl<T: Transport> Client<T> {
    /// Wraps a session that has completed its handshake.
    pub fn new(session: Session<T>) -> Self {
        Self { session }
    }

    /// Opens a session over `transport` and waits until it is ready.
    pub async fn connect(transport: T, config: SessionConfig) -> Result<Self, ClientError> {
        let session = Session::start(transport, config).await?;
        Ok(Self::new(session))
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<T> {
        &mut self.session
    }

    pub fn into_session(self) -> Session<T> {
        self.session
    }

    pub fn protocol_version(&self) -> Option<u32> {
        self.session.protocol_version()
    }

    /// Closes the channel.
    pub async fn disconnect(&mut self) -> Result<(), ClientError> {
        self.session.close_channel().await
    }

    /// Sends a request, converting failure statuses into errors.
    async fn request(&mut self, op: Operation) -> Result<Response, ClientError> {
        let response = self.session.call(op).await?;
        if !response.ok() {
            return Err(status_error(&response));
        }
        Ok(response)
    }

    /// Like `request`, but an EOF status yields `None`.
    async fn request_until_eof(&mut self, op: Operation) -> Result<Option<Response>, ClientError> {
        let response = self.session.call(op).await?;
        if response.eof() {
            return Ok(None);
        }
        if !response.ok() {
            return Err(status_error(&response));
        }
        Ok(Some(response))
    }

    async fn request_extended(
        &mut self,
        extension: Extension,
    ) -> Result<ExtendedReply, ClientError> {
        match self.request(Operation::Extended(extension)).await?.into_reply() {
            ReplyData::Extended(reply) => Ok(reply),
            other => Err(unexpected(&other)),
        }
    }

    // =========================================================================
    // Files
    // =========================================================================

    /// Opens a file, returning its handle.
    pub async fn open(
        &mut self,
        path: impl Into<RemotePath>,
        flags: impl Into<OpenFlags>,
        attrs: Attributes,
    ) -> Result<Bytes, ClientError> {
        let op = Operation::Open {
            path: path.into(),
            flags: flags.into(),
            attrs,
        };
        expect_handle(self.request(op).await?)
    }

    pub async fn close(&mut self, handle: Bytes) -> Result<(), ClientError> {
        self.request(Operation::Close { handle }).await?;
        Ok(())
    }

    /// Reads up to `length` bytes at `offset`. Returns `None` at end of file.
    pub async fn read(
        &mut self,
        handle: Bytes,
        offset: u64,
        length: u32,
    ) -> Result<Option<Bytes>, ClientError> {
        let op = Operation::Read {
            handle,
            offset,
            length,
        };
        match self.request_until_eof(op).await? {
            Some(response) => match response.into_reply() {
                ReplyData::Data(data) => Ok(Some(data)),
                other => Err(unexpected(&other)),
            },
            None => Ok(None),
        }
    }

    pub async fn write(&mut self, handle: Bytes, offset: u64, data: Bytes) -> Result<(), ClientError> {
        let op = Operation::Write {
            handle,
            offset,
            data,
        };
        self.request(op).await?;
        Ok(())
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    pub async fn stat(&mut self, path: impl Into<RemotePath>) -> Result<Attributes, ClientError> {
        let op = Operation::Stat {
            path: path.into(),
            flags: None,
        };
        expect_attrs(self.request(op).await?)
    }

    /// Like [`Client::stat`] but does not follow a final symbolic link.
    pub async fn lstat(&mut self, path: impl Into<RemotePath>) -> Result<Attributes, ClientError> {
        let op = Operation::Lstat {
            path: path.into(),
            flags: None,
        };
        expect_attrs(self.request(op).await?)
    }

    pub async fn fstat(&mut self, handle: Bytes) -> Result<Attributes, ClientError> {
        let op = Operation::Fstat {
            handle,
            flags: None,
        };
        expect_attrs(self.request(op).await?)
    }

    pub async fn setstat(
        &mut self,
        path: impl Into<RemotePath>,
        attrs: Attributes,
    ) -> Result<(), ClientError> {
        let op = Operation::Setstat {
            path: path.into(),
            attrs,
        };
        self.request(op).await?;
        Ok(())
    }

    pub async fn fsetstat(&mut self, handle: Bytes, attrs: Attributes) -> Result<(), ClientError> {
        self.request(Operation::Fsetstat { handle, attrs }).await?;
        Ok(())
    }

    // =========================================================================
    // Directories
    // =========================================================================

    pub async fn opendir(&mut self, path: impl Into<RemotePath>) -> Result<Bytes, ClientError> {
        let op = Operation::Opendir {
            path: path.into(),
        };
        expect_handle(self.request(op).await?)
    }

    /// Reads the next batch of entries. Returns `None` once the listing is
    /// exhausted.
    pub async fn readdir(&mut self, handle: Bytes) -> Result<Option<Vec<Name>>, ClientError> {
        match self.request_until_eof(Operation::Readdir { handle }).await? {
            Some(response) => match response.into_reply() {
                ReplyData::Names(names) => Ok(Some(names)),
                other => Err(unexpected(&other)),
            },
            None => Ok(None),
        }
    }

    /// Lists a whole directory.
    pub async fn read_dir(
        &mut self,
        path: impl Into<RemotePath>,
    ) -> Result<Vec<Name>, ClientError> {
        let handle = self.opendir(path).await?;
        let mut entries = Vec::new();
        let listed = loop {
            match self.readdir(handle.clone()).await {
                Ok(Some(names)) => entries.extend(names),
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        let closed = self.close(handle).await;
        listed?;
        closed?;
        Ok(entries)
    }

    pub async fn mkdir(
        &mut self,
        path: impl Into<RemotePath>,
        attrs: Attributes,
    ) -> Result<(), ClientError> {
        let op = Operation::Mkdir {
            path: path.into(),
            attrs,
        };
        self.request(op).await?;
        Ok(())
    }

    pub async fn rmdir(&mut self, path: impl Into<RemotePath>) -> Result<(), ClientError> {
        let op = Operation::Rmdir {
            path: path.into(),
        };
        self.request(op).await?;
        Ok(())
    }

    // =========================================================================
    // Paths
    // =========================================================================

    pub async fn remove(&mut self, path: impl Into<RemotePath>) -> Result<(), ClientError> {
        let op = Operation::Remove {
            path: path.into(),
        };
        self.request(op).await?;
        Ok(())
    }

    /// Canonicalizes `path` on the server.
    pub async fn realpath(
        &mut self,
        path: impl Into<RemotePath>,
    ) -> Result<RemotePath, ClientError> {
        let op = Operation::Realpath {
            path: path.into(),
        };
        expect_single_name(self.request(op).await?)
    }

    pub async fn rename(
        &mut self,
        from: impl Into<RemotePath>,
        to: impl Into<RemotePath>,
        flags: Option<u32>,
    ) -> Result<(), ClientError> {
        let op = Operation::Rename {
            from: from.into(),
            to: to.into(),
            flags,
        };
        self.request(op).await?;
        Ok(())
    }

    pub async fn readlink(
        &mut self,
        path: impl Into<RemotePath>,
    ) -> Result<RemotePath, ClientError> {
        let op = Operation::Readlink {
            path: path.into(),
        };
        expect_single_name(self.request(op).await?)
    }

    pub async fn symlink(
        &mut self,
        path: impl Into<RemotePath>,
        target: impl Into<RemotePath>,
    ) -> Result<(), ClientError> {
        let op = Operation::Symlink {
            path: path.into(),
            target: target.into(),
        };
        self.request(op).await?;
        Ok(())
    }

    pub async fn link(
        &mut self,
        new_link_path: impl Into<RemotePath>,
        existing_path: impl Into<RemotePath>,
        symlink: bool,
    ) -> Result<(), ClientError> {
        let op = Operation::Link {
            new_link_path: new_link_path.into(),
            existing_path: existing_path.into(),
            symlink,
        };
        self.request(op).await?;
        Ok(())
    }

    // =========================================================================
    // Locking
    // =========================================================================

    pub async fn block(
        &mut self,
        handle: Bytes,
        offset: u64,
        length: u64,
        mask: u32,
    ) -> Result<(), ClientError> {
        let op = Operation::Block {
            handle,
            offset,
            length,
            mask,
        };
        self.request(op).await?;
        Ok(())
    }

    pub async fn unblock(&mut self, handle: Bytes, offset: u64, length: u64) -> Result<(), ClientError> {
        let op = Operation::Unblock {
            handle,
            offset,
            length,
        };
        self.request(op).await?;
        Ok(())
    }

    // =========================================================================
    // Extensions
    // =========================================================================

    /// MD5 of a byte range. Empty when `quick_hash` did not match the first
    /// 2048 bytes of the range.
    pub async fn md5_hash(
        &mut self,
        handle: Bytes,
        offset: u64,
        length: u64,
        quick_hash: Bytes,
    ) -> Result<Bytes, ClientError> {
        let extension = Extension::Md5Hash {
            handle,
            offset,
            length,
            quick_hash,
        };
        match self.request_extended(extension).await? {
            ExtendedReply::Md5Hash { hash } => Ok(hash),
            other => Err(unexpected_extension(other)),
        }
    }

    /// Per-block hashes of a byte range; `block_size` 0 hashes the range as
    /// a single block.
    pub async fn check_file(
        &mut self,
        handle: Bytes,
        offset: u64,
        length: u64,
        block_size: u32,
    ) -> Result<FileChecksums, ClientError> {
        let extension = Extension::CheckFile {
            handle,
            offset,
            length,
            block_size,
        };
        match self.request_extended(extension).await? {
            ExtendedReply::CheckFile { algorithm, hashes } => Ok(FileChecksums { algorithm, hashes }),
            other => Err(unexpected_extension(other)),
        }
    }

    pub async fn space_available(
        &mut self,
        path: impl Into<RemotePath>,
    ) -> Result<SpaceAvailable, ClientError> {
        let extension = Extension::SpaceAvailable {
            path: path.into(),
        };
        match self.request_extended(extension).await? {
            ExtendedReply::SpaceAvailable(space) => Ok(space),
            other => Err(unexpected_extension(other)),
        }
    }

    pub async fn home_directory(&mut self, username: &str) -> Result<RemotePath, ClientError> {
        let extension = Extension::HomeDirectory {
            username: username.to_string(),
        };
        match self.request_extended(extension).await? {
            ExtendedReply::HomeDirectory { home } => Ok(home),
            other => Err(unexpected_extension(other)),
        }
    }
}

pub(crate) fn status_error(response: &Response) -> ClientError {
    let message = if response.message().is_empty() {
        response.code().to_string()
    } else {
        response.message().to_string()
    };
    ClientError::Status {
        code: response.code(),
        message,
    }
}

pub(crate) fn unexpected(reply: &ReplyData) -> ClientError {
    ProtocolError::UnexpectedPacket(reply.packet_type()).into()
}

fn unexpected_extension(reply: ExtendedReply) -> ClientError {
    unexpected(&ReplyData::Extended(reply))
}

fn expect_handle(response: Response) -> Result<Bytes, ClientError> {
    match response.into_reply() {
        ReplyData::Handle(handle) => Ok(handle),
        other => Err(unexpected(&other)),
    }
}

fn expect_attrs(response: Response) -> Result<Attributes, ClientError> {
    match response.into_reply() {
        ReplyData::Attrs(attrs) => Ok(attrs),
        other => Err(unexpected(&other)),
    }
}

fn expect_single_name(response: Response) -> Result<RemotePath, ClientError> {
    match response.into_reply() {
        ReplyData::Names(names) => names
            .into_iter()
            .next()
            .map(|name| name.filename)
            .ok_or_else(|| ProtocolError::UnexpectedPacket(PacketType::Name).into()),
        other => Err(unexpected(&other)),
    }
}
