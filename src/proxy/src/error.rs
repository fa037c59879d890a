use std::io;

use thiserror::Error;

/// Failures that can abort a single client connection during the handshake
/// splice. Every variant maps to one of the per-connection error kinds
/// described by the proxy's error handling design: the connection is
/// aborted and both sockets are closed, but the listener keeps running.
#[derive(Error, Debug)]
pub enum SpliceError {
    #[error("dialing backend {addr}: {source}")]
    Dial { addr: String, source: io::Error },

    #[error("malformed MySQL packet header {header:?}")]
    UnexpectedLength { header: [u8; 4] },

    #[error("connection closed before {context} completed")]
    Eof { context: &'static str },

    #[error("handshake step {context} timed out")]
    Timeout { context: &'static str },

    #[error("io error during {context}: {source}")]
    Io {
        context: &'static str,
        source: io::Error,
    },

    #[error("TLS accept on client connection failed: {source}")]
    TlsAccept { source: io::Error },
}

impl SpliceError {
    pub fn io(context: &'static str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::UnexpectedEof {
            SpliceError::Eof { context }
        } else {
            SpliceError::Io { context, source }
        }
    }
}

/// Failures that prevent the proxy from starting at all: bad listen
/// address, unreadable/invalid certificate material, or a bind failure.
/// These are fatal; the process exits with a nonzero status.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("reading certificate file {path}: {source}")]
    ReadCert { path: String, source: io::Error },

    #[error("reading private key file {path}: {source}")]
    ReadKey { path: String, source: io::Error },

    #[error("no certificates found in {path}")]
    EmptyCertChain { path: String },

    #[error("no private key found in {path}")]
    MissingKey { path: String },

    #[error("building TLS server configuration: {0}")]
    TlsConfig(#[from] rustls::Error),

    #[error("binding listener on {addr}: {source}")]
    Bind { addr: String, source: io::Error },
}
