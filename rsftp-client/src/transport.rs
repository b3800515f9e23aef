//! Secure-channel seam.
//!
//! The session never touches sockets or SSH itself. It drives a
//! [`Transport`]: ask for a channel, ask for a subsystem on it, queue bytes,
//! and poll for [`ChannelEvent`]s.

use crate::error::ClientError;
use bytes::{Bytes, BytesMut};
use std::collections::VecDeque;
use std::future::Future;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default read size for [`StreamTransport`] (32 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 32 * 1024;

/// Something the channel reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The channel opened.
    Confirmed,
    /// Answer to the subsystem request.
    SubsystemStarted { success: bool },
    /// Bytes on the channel's data stream.
    Data(Bytes),
    /// Bytes on a secondary stream (stderr is type 1).
    ExtendedData { data_type: u32, data: Bytes },
    /// The channel closed.
    Closed,
}

/// A secure channel capable of running a subsystem.
pub trait Transport: Send {
    /// Starts opening the channel; completion arrives as
    /// [`ChannelEvent::Confirmed`].
    fn open_channel(&mut self) -> Result<(), ClientError>;

    /// Asks for `name` on the open channel; the answer arrives as
    /// [`ChannelEvent::SubsystemStarted`].
    fn request_subsystem(&mut self, name: &str) -> Result<(), ClientError>;

    /// Queues bytes for the channel.
    fn send_data(&mut self, data: Bytes) -> Result<(), ClientError>;

    /// Closes the channel.
    fn close(&mut self) -> Result<(), ClientError>;

    /// Flushes queued bytes and waits for at least one event.
    fn process(&mut self) -> impl Future<Output = Result<Vec<ChannelEvent>, ClientError>> + Send;
}

/// A [`Transport`] over a byte stream whose peer already runs the subsystem,
/// such as the stdio of `ssh -s <host> sftp`.
///
/// Channel setup is local: opening and the subsystem request succeed
/// immediately.
#[derive(Debug)]
pub struct StreamTransport<S> {
    stream: S,
    outgoing: BytesMut,
    events: VecDeque<ChannelEvent>,
    read_buffer: Vec<u8>,
    closing: bool,
    closed: bool,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self::with_read_buffer_size(stream, DEFAULT_READ_BUFFER_SIZE)
    }

    pub fn with_read_buffer_size(stream: S, size: usize) -> Self {
        Self {
            stream,
            outgoing: BytesMut::new(),
            events: VecDeque::new(),
            read_buffer: vec![0u8; size.max(1)],
            closing: false,
            closed: false,
        }
    }

    /// Bytes queued but not yet written.
    pub fn pending_output(&self) -> usize {
        self.outgoing.len()
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn open_channel(&mut self) -> Result<(), ClientError> {
        if self.closed || self.closing {
            return Err(ClientError::ConnectionClosed);
        }
        self.events.push_back(ChannelEvent::Confirmed);
        Ok(())
    }

    fn request_subsystem(&mut self, name: &str) -> Result<(), ClientError> {
        tracing::debug!("subsystem '{}' is started by the stream's peer", name);
        self.events
            .push_back(ChannelEvent::SubsystemStarted { success: true });
        Ok(())
    }

    fn send_data(&mut self, data: Bytes) -> Result<(), ClientError> {
        if self.closed || self.closing {
            return Err(ClientError::ConnectionClosed);
        }
        self.outgoing.extend_from_slice(&data);
        Ok(())
    }

    fn close(&mut self) -> Result<(), ClientError> {
        self.closing = true;
        Ok(())
    }

    async fn process(&mut self) -> Result<Vec<ChannelEvent>, ClientError> {
        if !self.events.is_empty() {
            return Ok(self.events.drain(..).collect());
        }
        if self.closed {
            return Err(ClientError::ConnectionClosed);
        }

        if !self.outgoing.is_empty() {
            tracing::trace!("process: writing {} bytes", self.outgoing.len());
            self.stream.write_all(&self.outgoing).await?;
            self.stream.flush().await?;
            self.outgoing.clear();
        }

        if self.closing {
            if let Err(e) = self.stream.shutdown().await {
                tracing::debug!("process: shutdown failed: {}", e);
            }
            self.closed = true;
            return Ok(vec![ChannelEvent::Closed]);
        }

        let n = self.stream.read(&mut self.read_buffer).await?;
        if n == 0 {
            tracing::debug!("process: stream reached EOF");
            self.closed = true;
            return Ok(vec![ChannelEvent::Closed]);
        }
        tracing::trace!("process: read {} bytes", n);
        Ok(vec![ChannelEvent::Data(Bytes::copy_from_slice(
            &self.read_buffer[..n],
        ))])
    }
}
