//! The connection-phase splicer: reads the server greeting and client
//! handshake, optionally upgrades the client side to TLS, rewrites the
//! sequence number and `CLIENT_SSL` capability bit the backend would
//! otherwise choke on, and forwards the server's auth response back.
//!
//! This is the only place in the proxy that looks inside a MySQL packet.
//! Everything before this module is a dumb byte counter; everything after
//! it (see [`crate::relay`]) is a dumb byte pipe.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use rustls::ServerConfig;
use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;

use crate::endpoint::{Endpoint, EndpointTag};
use crate::error::SpliceError;
use crate::packet::{clear_client_ssl_flag, read_packet, set_seq, write_packet};

/// Header-byte-0 of an `SSLRequest` packet: its payload is always exactly
/// 32 bytes (4-byte capabilities + 4-byte max packet size + 1-byte charset
/// + 23 bytes filler).
const SSL_REQUEST_LEN: u8 = 32;

/// Sequence numbers as seen by the backend, which never observes the
/// `SSLRequest` packet consumed on the client-TLS upgrade path.
const BACKEND_HANDSHAKE_SEQ: u8 = 1;
/// Sequence number the client expects on the auth response once its view
/// of the exchange includes the `SSLRequest` it sent.
const CLIENT_AUTH_RESPONSE_SEQ: u8 = 3;

pub struct SplicedConnection {
    pub client: Endpoint,
    pub server: Endpoint,
}

/// Drives the handshake state machine over `client` and `server`, returning
/// the two endpoints ready for [`crate::relay::relay`]. `tls_config` is
/// used only if the client requests TLS; `step_timeout` bounds every
/// blocking step individually.
pub async fn splice(
    client: TcpStream,
    server: TcpStream,
    tls_config: Arc<ServerConfig>,
    step_timeout: Duration,
) -> Result<SplicedConnection, SpliceError> {
    let mut server_ep = Endpoint::new(EndpointTag::Server, server);
    let mut client_ep = Endpoint::new(EndpointTag::Client, client);

    let greeting = step(
        step_timeout,
        "server greeting",
        read_packet(&mut server_ep, "server greeting"),
    )
    .await?;
    write_packet(&mut client_ep, &greeting, "server greeting").await?;

    let handshake = step(
        step_timeout,
        "client handshake",
        read_packet(&mut client_ep, "client handshake"),
    )
    .await?;

    let wants_tls = handshake[0] == SSL_REQUEST_LEN;

    if wants_tls {
        let acceptor = TlsAcceptor::from(tls_config);
        let tls_stream = step_tls_accept(step_timeout, async {
            acceptor
                .accept(client_ep)
                .await
                .map_err(|source| SpliceError::TlsAccept { source })
        })
        .await?;
        client_ep = Endpoint::new(EndpointTag::ClientTls, tls_stream);

        let mut upgraded = step(
            step_timeout,
            "client handshake (tls)",
            read_packet(&mut client_ep, "client handshake (tls)"),
        )
        .await?;
        set_seq(&mut upgraded, BACKEND_HANDSHAKE_SEQ);
        clear_client_ssl_flag(&mut upgraded);
        write_packet(&mut server_ep, &upgraded, "client handshake (tls)").await?;
    } else {
        write_packet(&mut server_ep, &handshake, "client handshake").await?;
    }

    let mut auth_response = step(
        step_timeout,
        "auth response",
        read_packet(&mut server_ep, "auth response"),
    )
    .await?;
    if wants_tls {
        set_seq(&mut auth_response, CLIENT_AUTH_RESPONSE_SEQ);
    }
    write_packet(&mut client_ep, &auth_response, "auth response").await?;

    Ok(SplicedConnection {
        client: client_ep,
        server: server_ep,
    })
}

/// Bounds a packet-read step. Expiry is a protocol-phase failure: the peer
/// never produced the expected packet in time.
async fn step<F, T>(duration: Duration, context: &'static str, fut: F) -> Result<T, SpliceError>
where
    F: Future<Output = Result<T, SpliceError>>,
{
    tokio::time::timeout(duration, fut)
        .await
        .unwrap_or(Err(SpliceError::Timeout { context }))
}

/// Bounds the TLS accept step specifically. Expiry is a TLS failure, not a
/// protocol one, so it surfaces through the same `TlsAccept` variant a
/// failed handshake would.
async fn step_tls_accept<F, T>(duration: Duration, fut: F) -> Result<T, SpliceError>
where
    F: Future<Output = Result<T, SpliceError>>,
{
    tokio::time::timeout(duration, fut).await.unwrap_or_else(|_| {
        Err(SpliceError::TlsAccept {
            source: io::Error::new(io::ErrorKind::TimedOut, "tls accept timed out"),
        })
    })
}
