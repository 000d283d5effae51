//! # Protocol Decoding Components
//!
//! The decode side of the tap: an isolation boundary around the message
//! decoder, and a built-in decoder that summarizes LDAP envelopes.
//!
//! Nothing in this module can affect forwarding; decode output exists only for
//! the dump log.
//!
//! ## Components
//! - **Decoder**: the `MessageDecoder` seam and the panic-isolating boundary
//! - **Ldap**: RFC 4511 envelope summary decoder, the default delegate

pub mod decoder;
pub mod ldap;
