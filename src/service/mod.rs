//! # Proxy Services
//!
//! The running pieces of the tap: the accept/dial loop, the per-connection
//! forwarding pipeline, and the dump path.
//!
//! ## Components
//! - **Acceptor**: listens locally, dials upstream, starts one session per
//!   accepted connection
//! - **Session**: five concurrent tasks forwarding bytes verbatim in both
//!   directions with coordinated teardown
//! - **Dumper**: drains the fanout channel, decodes, and emits log records

pub mod acceptor;
pub mod dumper;
pub mod session;
