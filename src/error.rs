//! # Error Types
//!
//! Error taxonomy for the proxy.
//!
//! Errors are scoped deliberately: a [`FramingError`] or transport failure kills
//! exactly one session, a bind failure kills the process, and decode failures
//! never leave the dump path (see [`crate::protocol::decoder::DecodeError`]).
//!
//! ## Error Categories
//! - **I/O errors**: transport reads/writes failed or the peer disconnected
//! - **Framing errors**: bytes on the wire violate BER/DER framing rules
//! - **Configuration errors**: invalid or unreadable startup configuration

use std::io;
use thiserror::Error;

/// A violation of the BER/DER framing rules observed on the wire.
///
/// Once framing is lost there is no way to resynchronize inside the byte
/// stream, so any of these is fatal to the session that observed it. The
/// process keeps running and keeps accepting new sessions.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingError {
    #[error("unexpected leading tag 0x{0:02x}, expected SEQUENCE (0x30)")]
    UnexpectedTag(u8),

    #[error("indefinite length found (not DER)")]
    IndefiniteLength,

    #[error("length too large")]
    LengthTooLarge,

    #[error("superfluous leading zeros in length")]
    NonMinimalLength,
}

/// The primary error type for proxy operations.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ProxyError {
    /// Whether this error means the peer is simply gone, as opposed to a
    /// protocol violation on an otherwise live connection.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, ProxyError::Io(_) | ProxyError::ConnectionClosed)
    }
}

/// Type alias for Results using ProxyError
pub type Result<T> = std::result::Result<T, ProxyError>;
