//! The listener supervisor: binds the configured port, accepts
//! connections, and spawns one independent splice-then-relay task per
//! connection. It holds no per-connection state of its own.

use std::sync::Arc;
use std::time::Duration;

use rustls::ServerConfig;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::error::{SpliceError, StartupError};
use crate::handshake::{self, SplicedConnection};
use crate::relay;

/// Immutable, cheaply-cloneable configuration shared across every accepted
/// connection for the lifetime of the supervisor.
#[derive(Clone)]
pub struct ProxyOptions {
    pub listen_port: u16,
    pub backend_addr: String,
    pub tls_config: Arc<ServerConfig>,
    pub handshake_timeout: Duration,
}

impl ProxyOptions {
    pub fn new(
        listen_port: u16,
        backend_host: impl Into<String>,
        backend_port: u16,
        tls_config: Arc<ServerConfig>,
    ) -> Self {
        ProxyOptions {
            listen_port,
            backend_addr: format!("{}:{}", backend_host.into(), backend_port),
            tls_config,
            handshake_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }
}

/// Runs the accept loop until `shutdown` resolves. Already-accepted
/// connections are not interrupted; only new ones stop being accepted.
pub async fn serve(
    options: ProxyOptions,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<(), StartupError> {
    let listen_addr = format!("0.0.0.0:{}", options.listen_port);
    let listener = TcpListener::bind(&listen_addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: listen_addr.clone(),
            source,
        })?;
    info!(addr = %listen_addr, backend = %options.backend_addr, "listening for MySQL clients");

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown signal received, no longer accepting connections");
                return Ok(());
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((client, peer_addr)) => {
                        let options = options.clone();
                        tokio::spawn(async move {
                            handle_connection(client, peer_addr.to_string(), options).await;
                        });
                    }
                    Err(source) => {
                        warn!(%source, "accept failed");
                    }
                }
            }
        }
    }
}

async fn handle_connection(client: TcpStream, peer_addr: String, options: ProxyOptions) {
    let server = match TcpStream::connect(&options.backend_addr).await {
        Ok(stream) => stream,
        Err(source) => {
            let err = SpliceError::Dial {
                addr: options.backend_addr.clone(),
                source,
            };
            warn!(peer = %peer_addr, %err, "could not reach backend");
            return;
        }
    };

    let spliced = match handshake::splice(
        client,
        server,
        options.tls_config.clone(),
        options.handshake_timeout,
    )
    .await
    {
        Ok(spliced) => spliced,
        Err(SpliceError::Eof { .. }) => {
            // Normal for a health check or port probe: a peer that opens a
            // connection and disconnects without sending a handshake byte.
            debug!(peer = %peer_addr, "connection closed before handshake began");
            return;
        }
        Err(err) => {
            warn!(peer = %peer_addr, %err, "handshake splice failed");
            return;
        }
    };

    debug!(peer = %peer_addr, "handshake spliced, entering relay phase");
    let SplicedConnection { client, server } = spliced;
    relay::relay(client, server).await;
    debug!(peer = %peer_addr, "connection closed");
}
