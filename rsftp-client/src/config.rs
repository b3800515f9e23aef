//! Session configuration.

use rsftp_protocol::{MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::fmt;
use std::sync::Arc;

/// Default subsystem requested on the channel.
pub const DEFAULT_SUBSYSTEM: &str = "sftp";

/// Lowest protocol version the client can speak.
pub const MIN_PROTOCOL_VERSION: u32 = 1;

/// Default block size for file reads (32 KiB).
pub const DEFAULT_READ_CHUNK_SIZE: usize = 32 * 1024;

/// Minimum read block size (512 bytes).
pub const MIN_READ_CHUNK_SIZE: usize = 512;

/// Maximum read block size (255 KiB), leaving room for the reply header
/// inside a server's 256 KiB packet limit.
pub const MAX_READ_CHUNK_SIZE: usize = 255 * 1024;

/// Default number of pipelined transfer requests.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 16;

/// Maximum number of pipelined transfer requests.
pub const MAX_IN_FLIGHT: usize = 64;

/// Invoked once with the negotiated version when the session opens.
pub type ReadyCallback = Arc<dyn Fn(u32) + Send + Sync>;

/// Session configuration.
#[derive(Clone)]
pub struct SessionConfig {
    /// Remote subsystem name.
    pub subsystem: String,
    /// Highest version announced in INIT.
    pub max_version: u32,
    /// Largest incoming packet accepted by the framer.
    pub max_packet_size: u32,
    /// Block size for file reads.
    pub read_chunk_size: usize,
    /// Pipelined requests kept outstanding by transfers.
    pub max_in_flight: usize,
    /// Called with the negotiated version when the first handshake
    /// completes. The session takes it, so it fires at most once.
    pub on_ready: Option<ReadyCallback>,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self {
            subsystem: DEFAULT_SUBSYSTEM.to_string(),
            max_version: PROTOCOL_VERSION,
            max_packet_size: MAX_PACKET_SIZE,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            on_ready: None,
        }
    }

    pub fn with_subsystem(mut self, name: impl Into<String>) -> Self {
        self.subsystem = name.into();
        self
    }

    pub fn with_max_version(mut self, version: u32) -> Self {
        self.max_version = version.clamp(MIN_PROTOCOL_VERSION, PROTOCOL_VERSION);
        self
    }

    pub fn with_max_packet_size(mut self, size: u32) -> Self {
        self.max_packet_size = size;
        self
    }

    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size.clamp(MIN_READ_CHUNK_SIZE, MAX_READ_CHUNK_SIZE);
        self
    }

    pub fn with_max_in_flight(mut self, count: usize) -> Self {
        self.max_in_flight = count.clamp(1, MAX_IN_FLIGHT);
        self
    }

    pub fn with_on_ready(mut self, callback: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.on_ready = Some(Arc::new(callback));
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("subsystem", &self.subsystem)
            .field("max_version", &self.max_version)
            .field("max_packet_size", &self.max_packet_size)
            .field("read_chunk_size", &self.read_chunk_size)
            .field("max_in_flight", &self.max_in_flight)
            .field("on_ready", &self.on_ready.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SessionConfig::new();
        assert_eq!(config.subsystem, "sftp");
        assert_eq!(config.max_version, 6);
        assert_eq!(config.max_packet_size, MAX_PACKET_SIZE);
        assert_eq!(config.read_chunk_size, DEFAULT_READ_CHUNK_SIZE);
        assert_eq!(config.max_in_flight, DEFAULT_MAX_IN_FLIGHT);
        assert!(config.on_ready.is_none());
    }

    #[test]
    fn test_config_clamping() {
        let config = SessionConfig::new()
            .with_max_version(9)
            .with_read_chunk_size(10)
            .with_max_in_flight(0);
        assert_eq!(config.max_version, PROTOCOL_VERSION);
        assert_eq!(config.read_chunk_size, MIN_READ_CHUNK_SIZE);
        assert_eq!(config.max_in_flight, 1);

        let config = SessionConfig::new()
            .with_max_version(0)
            .with_read_chunk_size(10 * 1024 * 1024)
            .with_max_in_flight(1000);
        assert_eq!(config.max_version, MIN_PROTOCOL_VERSION);
        assert_eq!(config.read_chunk_size, MAX_READ_CHUNK_SIZE);
        assert_eq!(config.max_in_flight, MAX_IN_FLIGHT);

        let config = SessionConfig::new().with_max_version(3);
        assert_eq!(config.max_version, 3);
    }

    #[test]
    fn test_config_debug_hides_callback() {
        let config = SessionConfig::new().with_on_ready(|_| {});
        let debug = format!("{:?}", config);
        assert!(debug.contains("on_ready: true"));
    }
}
