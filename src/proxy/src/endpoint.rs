use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Diagnostic tag for an [`Endpoint`]. Carries no protocol meaning; it only
/// shows up in logs so a read or write failure can be attributed to the
/// right side of the splice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointTag {
    Client,
    ClientTls,
    Server,
}

impl EndpointTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointTag::Client => "client",
            EndpointTag::ClientTls => "client-tls",
            EndpointTag::Server => "server",
        }
    }
}

impl std::fmt::Display for EndpointTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A byte stream plus a human-readable tag. The stream is boxed so that the
/// client-facing endpoint can be swapped from a plain TCP stream to a
/// TLS-wrapped one in place, without the splicer's own code needing to be
/// generic over the stream type. Exactly one such swap ever happens per
/// connection (see [`Endpoint::upgrade_to_tls`]).
pub struct Endpoint {
    tag: EndpointTag,
    inner: Pin<Box<dyn AsyncStream>>,
}

/// Blanket requirement for anything an [`Endpoint`] can wrap.
pub trait AsyncStream: AsyncRead + AsyncWrite + Send {}
impl<T: AsyncRead + AsyncWrite + Send + ?Sized> AsyncStream for T {}

impl Endpoint {
    pub fn new(tag: EndpointTag, stream: impl AsyncStream + 'static) -> Self {
        Endpoint {
            tag,
            inner: Box::pin(stream),
        }
    }

    pub fn tag(&self) -> EndpointTag {
        self.tag
    }

    /// Replace the underlying stream, changing the tag from `client` to
    /// `client-tls`. After this call the original plain stream is gone;
    /// all subsequent reads and writes go through the replacement.
    pub fn replace(&mut self, tag: EndpointTag, stream: impl AsyncStream + 'static) {
        self.tag = tag;
        self.inner = Box::pin(stream);
    }

    pub fn into_inner(self) -> Pin<Box<dyn AsyncStream>> {
        self.inner
    }
}

impl AsyncRead for Endpoint {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        self.inner.as_mut().poll_read(cx, buf)
    }
}

impl AsyncWrite for Endpoint {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.inner.as_mut().poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        self.inner.as_mut().poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        self.inner.as_mut().poll_shutdown(cx)
    }
}
