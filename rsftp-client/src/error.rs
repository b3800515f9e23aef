//! Client error types.

use crate::session::SessionState;
use rsftp_protocol::{ProtocolError, StatusCode};
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("reply for unknown request id {0}")]
    UnknownRequest(u32),

    #[error("server refused the {0} subsystem")]
    SubsystemRefused(String),

    #[error("session is not open (state: {0})")]
    NotOpen(SessionState),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("{message} ({code}, {})", code.code())]
    Status { code: StatusCode, message: String },
}

impl ClientError {
    /// Returns whether this error ends the session.
    ///
    /// Capability and argument errors stay local to the call that raised
    /// them, as do failure statuses reported by the server.
    pub fn is_fatal(&self) -> bool {
        match self {
            ClientError::Protocol(e) => e.is_fatal(),
            ClientError::Io(_)
            | ClientError::Transport(_)
            | ClientError::UnknownRequest(_)
            | ClientError::SubsystemRefused(_)
            | ClientError::ConnectionClosed => true,
            ClientError::NotOpen(_) | ClientError::Status { .. } => false,
        }
    }

    /// The status code, when the server rejected the request.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}
