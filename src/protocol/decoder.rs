//! Decode boundary.
//!
//! The proxy treats message decoding as an opaque delegate behind
//! [`MessageDecoder`]. [`decode_guarded`] is the only way the dump path invokes
//! it: the call is wrapped in `catch_unwind`, so an abnormal termination inside
//! a decoder (malformed-but-framed content hitting a decoder bug, an assertion
//! failure) surfaces as an ordinary [`DecodeError`] instead of taking the
//! session down.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

/// Outcome of handing one frame to the message decoder.
pub type DecodeResult = std::result::Result<DecodedMessage, DecodeError>;

/// Structured summary of one decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    /// LDAP message ID from the envelope.
    pub message_id: i64,
    /// Operation name (e.g. "BindRequest").
    pub operation: String,
}

impl fmt::Display for DecodedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (msgid {})", self.operation, self.message_id)
    }
}

/// The decoder could not interpret an otherwise well-framed message, or failed
/// internally. Confined to the dump path; never affects forwarding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DecodeError {
    pub message: String,
}

impl DecodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Decodes one complete, validated frame into a structured message.
///
/// Implementations receive exactly the wire bytes of one frame, header
/// included, and never partial frames.
pub trait MessageDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> DecodeResult;
}

/// Invoke the decoder with panic isolation.
///
/// Any panic raised inside `decoder` is converted into a [`DecodeError`]
/// carrying the panic text; no unwind crosses this boundary.
pub fn decode_guarded(decoder: &dyn MessageDecoder, bytes: &[u8]) -> DecodeResult {
    match panic::catch_unwind(AssertUnwindSafe(|| decoder.decode(bytes))) {
        Ok(result) => result,
        Err(payload) => Err(DecodeError::new(format!(
            "decoder panicked: {}",
            panic_text(payload.as_ref())
        ))),
    }
}

fn panic_text(payload: &(dyn Any + Send)) -> &str {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text
    } else {
        "unknown panic"
    }
}
