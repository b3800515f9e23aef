//! # rsftp-client
//!
//! Client engine for SFTP.
//!
//! This crate provides:
//! - A [`Session`] that performs the handshake over any [`Transport`] and
//!   correlates pipelined requests with their replies by id
//! - [`Request`] and [`Response`] values for non-blocking use
//! - A typed [`Client`] that turns failure statuses into errors
//! - [`RemoteFile`] for buffered, file-like access and pipelined
//!   whole-file download and upload
//! - [`StreamTransport`] for running over the stdio of an `ssh` subprocess

pub mod client;
pub mod config;
pub mod error;
pub mod file;
pub mod request;
pub mod response;
pub mod session;
pub mod stream;
mod transfer;
pub mod transport;

pub use client::{Client, FileChecksums};
pub use config::SessionConfig;
pub use error::ClientError;
pub use file::RemoteFile;
pub use request::Request;
pub use response::Response;
pub use session::{Session, SessionState};
pub use stream::{ChildStream, Duplex};
pub use transport::{ChannelEvent, StreamTransport, Transport};
