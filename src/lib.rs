//! # ldap-tap
//!
//! Transparent intercepting proxy ("wire tap") for BER-framed LDAP traffic.
//!
//! The proxy sits between a client and a real server and forwards every byte
//! unmodified in both directions, while asynchronously decoding and logging
//! each discrete protocol message. Observation never alters, reorders, or
//! delays the traffic it taps.
//!
//! ## Components
//! - [`core::framing`]: streaming BER frame reader with strict DER validation
//! - [`protocol::decoder`]: panic-isolated boundary around the message decoder
//! - [`service::session`]: five-task per-connection pipeline with coordinated
//!   teardown
//! - [`service::acceptor`]: accept/dial loop, one session per client
//! - [`service::dumper`]: the decode-and-log path, behind an injectable sink
//!
//! ## Guarantees
//! - Frames are forwarded byte-identical and in read order per direction
//! - A framing violation or disconnect terminates its session, never the
//!   process
//! - Decode failures (including decoder panics) are confined to the dump log
//!
//! ## Example
//! ```no_run
//! use ldap_tap::config::ProxyConfig;
//! use ldap_tap::service::acceptor;
//!
//! #[tokio::main]
//! async fn main() -> ldap_tap::Result<()> {
//!     let mut config = ProxyConfig::default();
//!     config.listen_addr = "127.0.0.1:3389".to_string();
//!     config.upstream_addr = "ldap.example.com:389".to_string();
//!     acceptor::run(&config).await
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod utils;

pub use config::ProxyConfig;
pub use core::frame::{Direction, Frame};
pub use error::{FramingError, ProxyError, Result};
pub use protocol::decoder::{DecodeError, DecodedMessage, MessageDecoder};
pub use protocol::ldap::EnvelopeDecoder;
pub use service::acceptor::Acceptor;
pub use service::dumper::{DumpRecord, DumpSink, TracingSink};
pub use service::session::Session;
