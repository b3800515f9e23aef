//! Session state machine and request correlation.
//!
//! A [`Session`] owns one [`Transport`]. It walks the channel through
//! channel open, subsystem start and the INIT/VERSION handshake, then
//! assigns request ids, keeps the table of outstanding requests and routes
//! every reply to the request that carries its id.
//!
//! Nothing here blocks: operations return a [`Request`] at once. Replies are
//! only consumed while the caller drives the session with [`Session::wait`],
//! [`Session::loop_while`], [`Session::run`] or [`Session::process`].

use crate::config::SessionConfig;
use crate::error::ClientError;
use crate::request::Request;
use crate::response::Response;
use crate::transport::{ChannelEvent, Transport};
use bytes::Bytes;
use rsftp_protocol::{
    Attributes, Decoder, Driver, Encoder, Extension, OpenFlags, Operation, OperationKind, Packet,
    PacketType, ProtocolError, RemotePath, VersionInfo,
};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::oneshot;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    /// Channel requested, awaiting confirmation.
    Opening,
    /// Subsystem requested, awaiting the answer.
    Subsystem,
    /// INIT sent, awaiting VERSION.
    Init,
    Open,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Closed => "closed",
            SessionState::Opening => "opening",
            SessionState::Subsystem => "subsystem",
            SessionState::Init => "init",
            SessionState::Open => "open",
        };
        f.write_str(name)
    }
}

type Callback = Box<dyn FnOnce(&Response) + Send>;

/// An entry in the outstanding-request table.
struct PendingRequest {
    kind: OperationKind,
    callback: Option<Callback>,
    sender: oneshot::Sender<Response>,
}

/// An SFTP session over a transport.
pub struct Session<T> {
    transport: T,
    config: SessionConfig,
    state: SessionState,
    decoder: Decoder,
    driver: Option<Driver>,
    next_id: u32,
    pending: HashMap<u32, PendingRequest>,
    extensions: Vec<(String, Bytes)>,
}

impl<T: Transport> Session<T> {
    /// Creates a session; nothing is sent until [`Session::connect`].
    pub fn new(transport: T, config: SessionConfig) -> Self {
        let decoder = Decoder::with_max_packet_size(config.max_packet_size);
        Self {
            transport,
            config,
            state: SessionState::Closed,
            decoder,
            driver: None,
            next_id: 0,
            pending: HashMap::new(),
            extensions: Vec::new(),
        }
    }

    /// Creates a session and drives it until the handshake completes.
    pub async fn start(transport: T, config: SessionConfig) -> Result<Self, ClientError> {
        let mut session = Self::new(transport, config);
        session.connect()?;
        session.wait_ready().await?;
        Ok(session)
    }

    /// Starts the handshake by asking the transport for a channel.
    pub fn connect(&mut self) -> Result<(), ClientError> {
        if self.state != SessionState::Closed {
            tracing::debug!("connect: already {}", self.state);
            return Ok(());
        }
        tracing::debug!("connect: opening channel");
        self.decoder.clear();
        self.driver = None;
        self.extensions.clear();
        self.state = SessionState::Opening;
        self.transport.open_channel().map_err(|e| self.fail(e))
    }

    /// Drives the session until it is open, returning the negotiated
    /// version.
    pub async fn wait_ready(&mut self) -> Result<u32, ClientError> {
        loop {
            match (self.state, self.driver) {
                (SessionState::Open, Some(driver)) => return Ok(driver.version()),
                (SessionState::Closed, _) => return Err(ClientError::ConnectionClosed),
                _ => self.process().await?,
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Driver for the negotiated version.
    pub fn driver(&self) -> Option<Driver> {
        self.driver
    }

    /// Negotiated protocol version.
    pub fn protocol_version(&self) -> Option<u32> {
        self.driver.map(|driver| driver.version())
    }

    /// `(name, data)` pairs the server advertised in its VERSION packet.
    pub fn extensions(&self) -> &[(String, Bytes)] {
        &self.extensions
    }

    /// Data of an advertised extension.
    pub fn extension(&self, name: &str) -> Option<&Bytes> {
        self.extensions
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data)
    }

    /// Whether the reply to `id` is still outstanding.
    pub fn is_pending(&self, id: u32) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    // =========================================================================
    // Event loop
    // =========================================================================

    /// Polls the transport once and handles everything it reported.
    pub async fn process(&mut self) -> Result<(), ClientError> {
        let events = match self.transport.process().await {
            Ok(events) => events,
            Err(e) => return Err(self.fail(e)),
        };
        for event in events {
            if let Err(e) = self.handle_event(event) {
                return Err(self.fail(e));
            }
        }
        Ok(())
    }

    /// Processes events while `condition` holds.
    pub async fn loop_while<F>(&mut self, mut condition: F) -> Result<(), ClientError>
    where
        F: FnMut(&Self) -> bool,
    {
        while condition(self) {
            if self.state == SessionState::Closed {
                return Err(ClientError::ConnectionClosed);
            }
            self.process().await?;
        }
        Ok(())
    }

    /// Processes events until no request is outstanding.
    pub async fn run(&mut self) -> Result<(), ClientError> {
        self.loop_while(|session| session.has_pending()).await
    }

    /// Processes events until `request` has its reply.
    pub async fn wait<'r, C>(
        &mut self,
        request: &'r mut Request<C>,
    ) -> Result<&'r Response, ClientError> {
        while !request.collect()? {
            if self.state == SessionState::Closed {
                return Err(ClientError::ConnectionClosed);
            }
            self.process().await?;
        }
        request.response().ok_or(ClientError::ConnectionClosed)
    }

    /// Sends `op` and waits for its reply.
    pub async fn call(&mut self, op: Operation) -> Result<Response, ClientError> {
        let mut request = self.send(op)?;
        self.wait(&mut request).await?;
        request.take_response().ok_or(ClientError::ConnectionClosed)
    }

    /// Closes the channel. Outstanding requests are abandoned.
    pub async fn close_channel(&mut self) -> Result<(), ClientError> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        tracing::debug!(
            "close_channel: closing with {} request(s) outstanding",
            self.pending.len()
        );
        self.transport.close()?;
        while self.state != SessionState::Closed {
            match self.process().await {
                Ok(()) => {}
                Err(ClientError::ConnectionClosed) => break,
                Err(e) => return Err(e),
            }
        }
        self.reset();
        Ok(())
    }

    fn handle_event(&mut self, event: ChannelEvent) -> Result<(), ClientError> {
        match event {
            ChannelEvent::Confirmed => {
                if self.state != SessionState::Opening {
                    tracing::debug!("handle_event: ignoring confirmation while {}", self.state);
                    return Ok(());
                }
                tracing::debug!(
                    "handle_event: channel confirmed, requesting '{}' subsystem",
                    self.config.subsystem
                );
                self.state = SessionState::Subsystem;
                self.transport.request_subsystem(&self.config.subsystem)
            }
            ChannelEvent::SubsystemStarted { success } => {
                if self.state != SessionState::Subsystem {
                    tracing::debug!("handle_event: ignoring subsystem reply while {}", self.state);
                    return Ok(());
                }
                if !success {
                    return Err(ClientError::SubsystemRefused(self.config.subsystem.clone()));
                }
                tracing::debug!(
                    "handle_event: subsystem started, sending INIT version {}",
                    self.config.max_version
                );
                self.state = SessionState::Init;
                let init = Encoder::encode_init(self.config.max_version);
                self.transport.send_data(init.freeze())
            }
            ChannelEvent::Data(data) => {
                tracing::trace!("handle_event: {} bytes of data", data.len());
                self.decoder.extend_bytes(data);
                while let Some(packet) = self.decoder.decode_packet()? {
                    self.dispatch(packet)?;
                }
                Ok(())
            }
            ChannelEvent::ExtendedData { data_type, data } => {
                let text = String::from_utf8_lossy(&data);
                if data_type == 1 {
                    tracing::warn!("server stderr: {}", text.trim_end());
                } else {
                    tracing::debug!("extended data type {}: {}", data_type, text.trim_end());
                }
                Ok(())
            }
            ChannelEvent::Closed => {
                tracing::debug!(
                    "handle_event: channel closed ({} request(s) outstanding)",
                    self.pending.len()
                );
                self.reset();
                Ok(())
            }
        }
    }

    fn dispatch(&mut self, mut packet: Packet) -> Result<(), ClientError> {
        let packet_type = packet.packet_type()?;
        tracing::trace!(
            "dispatch: {:?} packet, {} bytes",
            packet_type,
            packet.payload.remaining()
        );

        if packet_type == PacketType::Version {
            return self.handle_version(packet);
        }

        let driver = match (self.state, self.driver) {
            (SessionState::Open, Some(driver)) => driver,
            _ => return Err(ProtocolError::UnexpectedPacket(packet_type).into()),
        };

        let id = packet.payload.read_u32()?;
        let pending = self
            .pending
            .remove(&id)
            .ok_or(ClientError::UnknownRequest(id))?;
        let data = driver.decode(packet.kind, &mut packet.payload)?;
        let response = Response::new(id, data);
        tracing::debug!(
            "dispatch: reply to {} id={} ({})",
            pending.kind,
            id,
            response.code()
        );

        if let Some(callback) = pending.callback {
            callback(&response);
        }
        // The caller may have dropped its Request.
        let _ = pending.sender.send(response);
        Ok(())
    }

    fn handle_version(&mut self, mut packet: Packet) -> Result<(), ClientError> {
        if self.state != SessionState::Init {
            return Err(ProtocolError::UnexpectedPacket(PacketType::Version).into());
        }

        let info = VersionInfo::decode(&mut packet.payload)?;
        let version = info.version.min(self.config.max_version);
        let driver = Driver::for_version(version)?;
        tracing::debug!(
            "handle_version: client={} server={} negotiated={}",
            self.config.max_version,
            info.version,
            version
        );
        for (name, data) in &info.extensions {
            tracing::debug!("handle_version: server extension {} ({} bytes)", name, data.len());
        }

        self.extensions = info.extensions;
        self.driver = Some(driver);
        self.state = SessionState::Open;
        tracing::info!("SFTP session open (protocol version {})", version);

        // first handshake only; a reconnect does not fire it again
        if let Some(on_ready) = self.config.on_ready.take() {
            on_ready(version);
        }
        Ok(())
    }

    /// Closes the session if `err` is fatal, then hands it back.
    fn fail(&mut self, err: ClientError) -> ClientError {
        if err.is_fatal() && self.state != SessionState::Closed {
            tracing::warn!("closing session after fatal error: {}", err);
            if let Err(e) = self.transport.close() {
                tracing::debug!("fail: transport close failed: {}", e);
            }
            self.reset();
        }
        err
    }

    /// Marks the session closed and abandons outstanding requests.
    fn reset(&mut self) {
        self.state = SessionState::Closed;
        self.pending.clear();
        self.decoder.clear();
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Encodes and sends `op`, returning without waiting for the reply.
    pub fn send(&mut self, op: Operation) -> Result<Request, ClientError> {
        self.enqueue(op, None)
    }

    /// Like [`Session::send`], invoking `callback` when the reply arrives.
    pub fn send_with_callback<F>(&mut self, op: Operation, callback: F) -> Result<Request, ClientError>
    where
        F: FnOnce(&Response) + Send + 'static,
    {
        self.enqueue(op, Some(Box::new(callback)))
    }

    fn enqueue(
        &mut self,
        op: Operation,
        callback: Option<Callback>,
    ) -> Result<Request, ClientError> {
        let driver = match (self.state, self.driver) {
            (SessionState::Open, Some(driver)) => driver,
            (state, _) => return Err(ClientError::NotOpen(state)),
        };

        let id = self.next_id;
        let kind = op.kind();
        let packet = driver.encode_request(id, &op)?;
        let len = packet.len();
        self.transport
            .send_data(packet.freeze())
            .map_err(|e| self.fail(e))?;
        self.next_id = id.wrapping_add(1);

        let (sender, receiver) = oneshot::channel();
        self.pending.insert(
            id,
            PendingRequest {
                kind,
                callback,
                sender,
            },
        );
        tracing::debug!("send: {} id={} ({} bytes)", kind, id, len);
        Ok(Request::new(id, kind, receiver))
    }

    pub fn open(
        &mut self,
        path: impl Into<RemotePath>,
        flags: impl Into<OpenFlags>,
        attrs: Attributes,
    ) -> Result<Request, ClientError> {
        self.send(Operation::Open {
            path: path.into(),
            flags: flags.into(),
            attrs,
        })
    }

    pub fn close(&mut self, handle: Bytes) -> Result<Request, ClientError> {
        self.send(Operation::Close { handle })
    }

    pub fn read(&mut self, handle: Bytes, offset: u64, length: u32) -> Result<Request, ClientError> {
        self.send(Operation::Read {
            handle,
            offset,
            length,
        })
    }

    pub fn write(&mut self, handle: Bytes, offset: u64, data: Bytes) -> Result<Request, ClientError> {
        self.send(Operation::Write {
            handle,
            offset,
            data,
        })
    }

    pub fn lstat(
        &mut self,
        path: impl Into<RemotePath>,
        flags: Option<u32>,
    ) -> Result<Request, ClientError> {
        self.send(Operation::Lstat {
            path: path.into(),
            flags,
        })
    }

    pub fn fstat(&mut self, handle: Bytes, flags: Option<u32>) -> Result<Request, ClientError> {
        self.send(Operation::Fstat { handle, flags })
    }

    pub fn stat(
        &mut self,
        path: impl Into<RemotePath>,
        flags: Option<u32>,
    ) -> Result<Request, ClientError> {
        self.send(Operation::Stat {
            path: path.into(),
            flags,
        })
    }

    pub fn setstat(
        &mut self,
        path: impl Into<RemotePath>,
        attrs: Attributes,
    ) -> Result<Request, ClientError> {
        self.send(Operation::Setstat {
            path: path.into(),
            attrs,
        })
    }

    pub fn fsetstat(&mut self, handle: Bytes, attrs: Attributes) -> Result<Request, ClientError> {
        self.send(Operation::Fsetstat { handle, attrs })
    }

    pub fn opendir(&mut self, path: impl Into<RemotePath>) -> Result<Request, ClientError> {
        self.send(Operation::Opendir { path: path.into() })
    }

    pub fn readdir(&mut self, handle: Bytes) -> Result<Request, ClientError> {
        self.send(Operation::Readdir { handle })
    }

    pub fn remove(&mut self, path: impl Into<RemotePath>) -> Result<Request, ClientError> {
        self.send(Operation::Remove { path: path.into() })
    }

    pub fn mkdir(
        &mut self,
        path: impl Into<RemotePath>,
        attrs: Attributes,
    ) -> Result<Request, ClientError> {
        self.send(Operation::Mkdir {
            path: path.into(),
            attrs,
        })
    }

    pub fn rmdir(&mut self, path: impl Into<RemotePath>) -> Result<Request, ClientError> {
        self.send(Operation::Rmdir { path: path.into() })
    }

    pub fn realpath(&mut self, path: impl Into<RemotePath>) -> Result<Request, ClientError> {
        self.send(Operation::Realpath { path: path.into() })
    }

    pub fn rename(
        &mut self,
        from: impl Into<RemotePath>,
        to: impl Into<RemotePath>,
        flags: Option<u32>,
    ) -> Result<Request, ClientError> {
        self.send(Operation::Rename {
            from: from.into(),
            to: to.into(),
            flags,
        })
    }

    pub fn readlink(&mut self, path: impl Into<RemotePath>) -> Result<Request, ClientError> {
        self.send(Operation::Readlink { path: path.into() })
    }

    pub fn symlink(
        &mut self,
        path: impl Into<RemotePath>,
        target: impl Into<RemotePath>,
    ) -> Result<Request, ClientError> {
        self.send(Operation::Symlink {
            path: path.into(),
            target: target.into(),
        })
    }

    pub fn link(
        &mut self,
        new_link_path: impl Into<RemotePath>,
        existing_path: impl Into<RemotePath>,
        symlink: bool,
    ) -> Result<Request, ClientError> {
        self.send(Operation::Link {
            new_link_path: new_link_path.into(),
            existing_path: existing_path.into(),
            symlink,
        })
    }

    pub fn block(
        &mut self,
        handle: Bytes,
        offset: u64,
        length: u64,
        mask: u32,
    ) -> Result<Request, ClientError> {
        self.send(Operation::Block {
            handle,
            offset,
            length,
            mask,
        })
    }

    pub fn unblock(&mut self, handle: Bytes, offset: u64, length: u64) -> Result<Request, ClientError> {
        self.send(Operation::Unblock {
            handle,
            offset,
            length,
        })
    }

    pub fn extended(&mut self, extension: Extension) -> Result<Request, ClientError> {
        self.send(Operation::Extended(extension))
    }
}

impl<T> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("driver", &self.driver)
            .field("next_id", &self.next_id)
            .field("pending", &self.pending.len())
            .finish()
    }
}
