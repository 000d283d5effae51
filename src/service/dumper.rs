//! Dump path: the decode-and-log consumer.
//!
//! Every forwarded frame is copied here. The sink is an injected dependency so
//! embedders and tests can capture records deterministically instead of
//! scraping ambient log output; [`TracingSink`] is the default.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::core::frame::{Direction, Frame};
use crate::protocol::decoder::{decode_guarded, DecodeResult, MessageDecoder};

/// One log record per forwarded message.
#[derive(Debug)]
pub struct DumpRecord {
    /// Identity of the session the frame belongs to.
    pub session: Arc<str>,
    pub direction: Direction,
    /// Per-direction sequence number, starting at 1.
    pub sequence: u64,
    /// Decoded message, or the diagnostic the decoder produced.
    pub outcome: DecodeResult,
}

/// Receives dump records from every session.
///
/// Implementations must tolerate concurrent calls from many sessions without
/// interleaving individual records.
pub trait DumpSink: Send + Sync {
    fn record(&self, record: &DumpRecord);
}

/// Default sink: one structured tracing event per record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DumpSink for TracingSink {
    fn record(&self, record: &DumpRecord) {
        match &record.outcome {
            Ok(message) => info!(
                session = %record.session,
                direction = %record.direction,
                sequence = record.sequence,
                message = %message,
                "message"
            ),
            Err(error) => warn!(
                session = %record.session,
                direction = %record.direction,
                sequence = record.sequence,
                error = %error,
                "message decode failed"
            ),
        }
    }
}

/// Drain the dump channel until every sender is gone.
///
/// Runs as the session's fifth task. Exits when the channel closes, after
/// draining whatever was still buffered, so records read before teardown are
/// not lost.
pub(crate) async fn run(
    session: Arc<str>,
    mut frames: mpsc::Receiver<Frame>,
    decoder: Arc<dyn MessageDecoder>,
    sink: Arc<dyn DumpSink>,
) {
    while let Some(frame) = frames.recv().await {
        let outcome = decode_guarded(decoder.as_ref(), &frame.bytes);
        sink.record(&DumpRecord {
            session: session.clone(),
            direction: frame.direction,
            sequence: frame.sequence,
            outcome,
        });
    }
}
