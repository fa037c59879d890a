//! The post-handshake byte pipe. Once [`crate::handshake::splice`] hands
//! back two endpoints, neither side's bytes are inspected again: this is a
//! plain full-duplex copy, run as two independent directions joined at
//! the end.

use tokio::io::{split, AsyncWriteExt};

use crate::endpoint::Endpoint;
use crate::error::SpliceError;

/// Copies bytes in both directions between `client` and `server` until
/// both directions have reached EOF or hit an error. A direction that
/// finishes first eagerly half-closes its write side on the other
/// endpoint, so a peer blocked on a read unblocks promptly instead of
/// waiting for its own stream to also go idle.
pub async fn relay(client: Endpoint, server: Endpoint) {
    let (mut client_read, mut client_write) = split(client);
    let (mut server_read, mut server_write) = split(server);

    let client_to_server = async move {
        let result = tokio::io::copy(&mut client_read, &mut server_write).await;
        let _ = server_write.shutdown().await;
        log_outcome("client", "server", result);
    };

    let server_to_client = async move {
        let result = tokio::io::copy(&mut server_read, &mut client_write).await;
        let _ = client_write.shutdown().await;
        log_outcome("server", "client", result);
    };

    tokio::join!(client_to_server, server_to_client);
}

fn log_outcome(from: &'static str, to: &'static str, result: std::io::Result<u64>) {
    match result {
        Ok(bytes) => {
            tracing::debug!(from, to, bytes, "relay direction closed");
        }
        Err(source) => {
            let err = SpliceError::io("relay", source);
            tracing::warn!(from, to, %err, "relay direction failed");
        }
    }
}
