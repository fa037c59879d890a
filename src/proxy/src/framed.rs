use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::SpliceError;

/// Reads exactly `n` bytes from `reader`, coalescing short reads. Short
/// reads are normal (TCP and TLS both deliver them) and must not be
/// mistaken for failure; only a read that returns zero bytes before `n`
/// have been collected is treated as EOF.
///
/// Reads land directly into the destination buffer at the current offset,
/// so there is no scratch buffer to over-read into.
pub async fn read_n<R>(reader: &mut R, n: usize, context: &'static str) -> Result<Vec<u8>, SpliceError>
where
    R: AsyncRead + Unpin,
{
    let mut dest = vec![0u8; n];
    let mut collected = 0;
    while collected < n {
        let read = reader
            .read(&mut dest[collected..])
            .await
            .map_err(|e| SpliceError::io(context, e))?;
        if read == 0 {
            return Err(SpliceError::Eof { context });
        }
        collected += read;
    }
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncWriteExt};

    #[tokio::test]
    async fn reads_exact_count_from_single_write() {
        let (mut client, mut server) = duplex(64);
        client.write_all(b"hello world").await.unwrap();

        let got = read_n(&mut server, 5, "test").await.unwrap();
        assert_eq!(got, b"hello");
    }

    #[tokio::test]
    async fn coalesces_many_short_reads() {
        let (mut client, mut server) = duplex(1);
        let writer = tokio::spawn(async move {
            for b in b"sequence-number" {
                client.write_all(&[*b]).await.unwrap();
            }
        });

        let got = read_n(&mut server, "sequence-number".len(), "test")
            .await
            .unwrap();
        assert_eq!(got, b"sequence-number");
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn eof_before_n_bytes_is_an_error() {
        let (client, mut server) = duplex(64);
        drop(client);

        let err = read_n(&mut server, 4, "test").await.unwrap_err();
        assert!(matches!(err, SpliceError::Eof { .. }));
    }

    #[tokio::test]
    async fn zero_length_read_is_trivially_satisfied() {
        let (_client, mut server) = duplex(64);
        let got = read_n(&mut server, 0, "test").await.unwrap();
        assert!(got.is_empty());
    }
}
