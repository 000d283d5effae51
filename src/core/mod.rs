//! # Core Framing Components
//!
//! Low-level message framing over a live byte stream.
//!
//! This module determines message boundaries inside a boundary-less TCP stream
//! by parsing ASN.1 BER tag/length headers incrementally, then reading exactly
//! the declared payload.
//!
//! ## Components
//! - **Frame**: one complete wire message, tagged with direction and sequence
//! - **Framing**: the streaming tag/length parser with strict DER validation
//!
//! ## Wire Format
//! ```text
//! [Tag(1) = 0x30] [Length(1..4)] [Payload(N)]
//! ```
//!
//! ## Security
//! - Maximum declared length: 2^23 bytes, checked while parsing the header
//! - Indefinite and non-minimal length encodings rejected (DER)
//! - High-tag-number form unsupported; the top-level tag must be SEQUENCE

pub mod frame;
pub mod framing;
