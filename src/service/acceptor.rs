//! Accept loop: one per proxy instance.
//!
//! Binds the local listener (the only process-fatal failure), then accepts
//! forever. Each accepted client gets its own upstream connection and its own
//! [`Session`]; a failed upstream dial drops that client and the loop keeps
//! accepting. There is no admission limit: one session per accepted connection,
//! a known scalability boundary.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info};

use crate::config::ProxyConfig;
use crate::error::Result;
use crate::protocol::decoder::MessageDecoder;
use crate::protocol::ldap::EnvelopeDecoder;
use crate::service::dumper::{DumpSink, TracingSink};
use crate::service::session::Session;

pub struct Acceptor {
    listener: TcpListener,
    upstream_addr: String,
    dump_queue_depth: usize,
    decoder: Arc<dyn MessageDecoder>,
    sink: Arc<dyn DumpSink>,
    next_session: u64,
}

impl Acceptor {
    /// Bind the local listener. Nothing can run without it, so failure here is
    /// fatal to the proxy and propagates to the caller.
    pub async fn bind(
        config: &ProxyConfig,
        decoder: Arc<dyn MessageDecoder>,
        sink: Arc<dyn DumpSink>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr).await?;
        info!(
            listen = %config.listen_addr,
            upstream = %config.upstream_addr,
            "listening"
        );

        Ok(Self {
            listener,
            upstream_addr: config.upstream_addr.clone(),
            dump_queue_depth: config.dump_queue_depth,
            decoder,
            sink,
            next_session: 0,
        })
    }

    /// The address the listener actually bound, for callers that asked for an
    /// ephemeral port.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept clients until the process is terminated externally.
    pub async fn serve(mut self) -> Result<()> {
        loop {
            let (client, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(error) => {
                    error!(error = %error, "error accepting connection");
                    continue;
                }
            };

            // One failed downstream dial never takes the proxy down.
            let server = match TcpStream::connect(&self.upstream_addr).await {
                Ok(stream) => stream,
                Err(error) => {
                    error!(
                        peer = %peer,
                        upstream = %self.upstream_addr,
                        error = %error,
                        "upstream dial failed, dropping client"
                    );
                    continue;
                }
            };

            self.next_session += 1;
            let id: Arc<str> = format!("session-{}", self.next_session).into();
            info!(session = %id, peer = %peer, "connection accepted");

            Session::new(
                id,
                self.decoder.clone(),
                self.sink.clone(),
                self.dump_queue_depth,
            )
            .start(client, server);
        }
    }
}

/// Bind and serve with the default envelope decoder and tracing sink.
pub async fn run(config: &ProxyConfig) -> Result<()> {
    Acceptor::bind(config, Arc::new(EnvelopeDecoder), Arc::new(TracingSink))
        .await?
        .serve()
        .await
}
