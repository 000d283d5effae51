//! Per-connection forwarding pipeline.
//!
//! A session owns one client connection and one server connection and runs
//! five tasks over three channels:
//!
//! ```text
//! client read half --read_loop--+--> to-server channel --> write_loop --> server write half
//!                               \--> dump channel ---\
//! server read half --read_loop--+--> to-client channel \--> dump task --> sink
//!                               \--> dump channel -----/
//! ```
//!
//! Forward channels have capacity 1: a reader hands each frame directly to its
//! writer and the socket provides the only buffering, so per-direction order is
//! exactly read order. The dump channel is bounded and fed with `try_send`; a
//! full queue drops the record rather than delaying forwarding.
//!
//! Teardown is coordinated through a [`CancellationToken`]: the first task to
//! observe a terminal condition (disconnect, framing violation, write failure)
//! cancels it, every blocking point races against `cancelled()`, and writers
//! drain what their reader already queued before shutting the write half down.
//! The session itself awaits all five tasks, so its resources are fully
//! released by the time it logs closure.

use std::sync::Arc;

use bytes::Bytes;
use futures::future::join_all;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::frame::{Direction, Frame};
use crate::core::framing;
use crate::error::ProxyError;
use crate::protocol::decoder::MessageDecoder;
use crate::service::dumper::{self, DumpSink};

pub struct Session {
    id: Arc<str>,
    decoder: Arc<dyn MessageDecoder>,
    sink: Arc<dyn DumpSink>,
    dump_queue_depth: usize,
}

impl Session {
    pub fn new(
        id: impl Into<Arc<str>>,
        decoder: Arc<dyn MessageDecoder>,
        sink: Arc<dyn DumpSink>,
        dump_queue_depth: usize,
    ) -> Self {
        Self {
            id: id.into(),
            decoder,
            sink,
            dump_queue_depth,
        }
    }

    /// Fire-and-forget: the session drives itself to closure and frees its
    /// resources without external polling.
    pub fn start(self, client: TcpStream, server: TcpStream) {
        tokio::spawn(self.run(client, server));
    }

    async fn run(self, client: TcpStream, server: TcpStream) {
        let (client_rd, client_wr) = client.into_split();
        let (server_rd, server_wr) = server.into_split();

        let (dump_tx, dump_rx) = mpsc::channel(self.dump_queue_depth);
        let (to_server_tx, to_server_rx) = mpsc::channel(1);
        let (to_client_tx, to_client_rx) = mpsc::channel(1);
        let shutdown = CancellationToken::new();

        let tasks = vec![
            tokio::spawn(read_loop(
                self.id.clone(),
                Direction::Client,
                client_rd,
                to_server_tx,
                dump_tx.clone(),
                shutdown.clone(),
            )),
            tokio::spawn(read_loop(
                self.id.clone(),
                Direction::Server,
                server_rd,
                to_client_tx,
                dump_tx,
                shutdown.clone(),
            )),
            tokio::spawn(write_loop(
                self.id.clone(),
                Direction::Client,
                server_wr,
                to_server_rx,
                shutdown.clone(),
            )),
            tokio::spawn(write_loop(
                self.id.clone(),
                Direction::Server,
                client_wr,
                to_client_rx,
                shutdown.clone(),
            )),
            tokio::spawn(dumper::run(
                self.id.clone(),
                dump_rx,
                self.decoder,
                self.sink,
            )),
        ];

        join_all(tasks).await;
        info!(session = %self.id, "session closed");
    }
}

/// Pull frames off one connection and publish each to the dump fanout and the
/// matching forward channel.
async fn read_loop(
    session: Arc<str>,
    direction: Direction,
    mut conn: OwnedReadHalf,
    forward: mpsc::Sender<Frame>,
    dump: mpsc::Sender<Frame>,
    shutdown: CancellationToken,
) {
    let mut sequence: u64 = 0;
    loop {
        let raw = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            read = framing::read_frame(&mut conn) => match read {
                Ok(raw) => raw,
                Err(ProxyError::Framing(violation)) => {
                    warn!(
                        session = %session,
                        direction = %direction,
                        error = %violation,
                        "framing violation, tearing session down"
                    );
                    break;
                }
                Err(error) => {
                    info!(
                        session = %session,
                        direction = %direction,
                        error = %error,
                        "peer disconnected"
                    );
                    break;
                }
            },
        };

        sequence += 1;
        let frame = Frame {
            direction,
            sequence,
            bytes: Bytes::from(raw),
        };

        // The dump path must never delay forwarding: a full queue loses the
        // record, not time.
        if let Err(mpsc::error::TrySendError::Full(_)) = dump.try_send(frame.clone()) {
            warn!(
                session = %session,
                direction = %direction,
                sequence,
                "dump queue full, record dropped"
            );
        }

        if forward.send(frame).await.is_err() {
            // Writer already gone; the session is tearing down.
            break;
        }
    }
    shutdown.cancel();
}

/// Drain one forward channel, writing each frame verbatim and completely to
/// the opposite connection.
async fn write_loop(
    session: Arc<str>,
    direction: Direction,
    mut conn: OwnedWriteHalf,
    mut frames: mpsc::Receiver<Frame>,
    shutdown: CancellationToken,
) {
    // recv() drains frames the reader queued before it stopped; the channel
    // closing is the normal exit. The token only guards against a write
    // stalled on an unresponsive peer.
    while let Some(frame) = frames.recv().await {
        let written = tokio::select! {
            biased;
            result = conn.write_all(&frame.bytes) => result,
            _ = shutdown.cancelled() => {
                debug!(session = %session, direction = %direction, "write abandoned at shutdown");
                break;
            }
        };
        if let Err(error) = written {
            warn!(
                session = %session,
                direction = %direction,
                error = %error,
                "forwarding write failed"
            );
            break;
        }
    }
    let _ = conn.shutdown().await;
    shutdown.cancel();
}
