//! The handshake-phase MySQL packet codec: a 4-byte header (3-byte
//! little-endian length, 1-byte sequence number) followed by a payload no
//! longer than 255 bytes. This is the degenerate case of MySQL's general
//! 24-bit length framing that the connection phase's small packets always
//! fall into; packets that don't fit are a protocol error for this proxy.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::error::SpliceError;
use crate::framed::read_n;

pub const HEADER_LEN: usize = 4;

/// Reads one packet (header + payload) from `reader`. The returned `Vec`
/// is the on-wire bytes: header followed by payload, ready to be mutated
/// in place by the handshake splicer and forwarded unchanged by
/// [`write_packet`].
pub async fn read_packet<R>(reader: &mut R, context: &'static str) -> Result<Vec<u8>, SpliceError>
where
    R: AsyncRead + Unpin,
{
    let mut packet = read_n(reader, HEADER_LEN, context).await?;
    let header: [u8; 4] = packet[..HEADER_LEN].try_into().expect("len checked above");
    if !(header[1] == 0 && header[2] == 0 && header[0] > 0) {
        return Err(SpliceError::UnexpectedLength { header });
    }
    let payload_len = header[0] as usize;
    let payload = read_n(reader, payload_len, context).await?;
    packet.extend_from_slice(&payload);
    Ok(packet)
}

/// Writes `packet`'s bytes unchanged to `writer`. The caller owns
/// correctness of the header/payload pairing; this performs no validation.
pub async fn write_packet<W>(
    writer: &mut W,
    packet: &[u8],
    context: &'static str,
) -> Result<(), SpliceError>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(packet)
        .await
        .map_err(|e| SpliceError::io(context, e))
}

/// Sequence number byte, offset 3 of the packet header.
pub fn seq(packet: &[u8]) -> u8 {
    packet[3]
}

pub fn set_seq(packet: &mut [u8], value: u8) {
    packet[3] = value;
}

/// Offset 5 of the packet is byte 1 of the little-endian `CLIENT_SSL`
/// capability field inside `HandshakeResponse`. Bit 3 of that byte is the
/// `CLIENT_SSL` flag itself.
const CLIENT_SSL_BIT: u8 = 1 << 3;

pub fn clear_client_ssl_flag(packet: &mut [u8]) {
    packet[5] &= !CLIENT_SSL_BIT;
}
