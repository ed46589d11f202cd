//! # Error Types
//!
//! Error handling for the world protocol core.
//!
//! Every failure here is local to the single inbound message being processed.
//! The dispatcher catches each error exactly once, logs it, and drops the
//! message; nothing in this enum is ever surfaced to the client.
//!
//! ## Error Categories
//! - **Decode Errors**: short payloads, malformed strings, bad frame headers
//! - **Session Errors**: the outbound channel of a session was closed
//! - **Collaborator Errors**: persistence, credential or transform failures
//! - **Configuration Errors**: invalid or unreadable configuration
//!
//! ## Example Usage
//! ```rust
//! use world_protocol::core::cursor::PacketReader;
//! use world_protocol::error::{ProtocolError, Result};
//!
//! fn read_key(payload: &[u8]) -> Result<i32> {
//!     let mut reader = PacketReader::new(payload);
//!     reader.read_i32()
//! }
//!
//! assert!(matches!(read_key(&[1, 2]), Err(ProtocolError::ShortPacket { .. })));
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Session errors
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed";
    pub const ERR_CONNECTION_TIMEOUT: &str = "Connection timed out (no activity)";

    /// Collaborator errors
    pub const ERR_CHARACTER_LOAD: &str = "Failed to load character";
    pub const ERR_CHARACTER_SAVE: &str = "Failed to save character";
    pub const ERR_ACCESS_KEY_ISSUE: &str = "Failed to issue access key";
}

/// ProtocolError is the primary error type for all world protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Short packet: needed {needed} bytes, {remaining} remaining")]
    ShortPacket { needed: usize, remaining: usize },

    #[error("Invalid string16 payload")]
    InvalidString,

    #[error("Invalid frame header")]
    InvalidHeader,

    #[error("Frame too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection timed out (no activity)")]
    ConnectionTimeout,

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Transform error: {0}")]
    Transform(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    /// True for failures caused by the bytes the client sent
    pub fn is_decode_failure(&self) -> bool {
        matches!(
            self,
            ProtocolError::ShortPacket { .. }
                | ProtocolError::InvalidString
                | ProtocolError::InvalidHeader
                | ProtocolError::OversizedPacket(_)
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
