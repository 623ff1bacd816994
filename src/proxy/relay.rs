use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

/// Copy bytes from `src` to `dst` until end-of-stream or an error, then shut
/// down `dst`'s write side so the peer observes the end. Reads go through a
/// bounded buffer and each chunk is written out fully before the next read,
/// so the copy can never run ahead of the slower side. Every read is guarded
/// by the idle timeout; a stalled peer cannot hold the session open forever.
///
/// Returns the number of bytes moved.
pub async fn copy_until_eof<R, W>(
    src: &mut R,
    dst: &mut W,
    buf_size: usize,
    idle: Duration,
) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let result = copy_loop(src, dst, buf_size, idle).await;
    let _ = dst.shutdown().await;
    result
}

async fn copy_loop<R, W>(
    src: &mut R,
    dst: &mut W,
    buf_size: usize,
    idle: Duration,
) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; buf_size];
    let mut copied = 0u64;
    loop {
        let n = timeout(idle, src.read(&mut buf))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "relay idle timeout"))??;
        if n == 0 {
            return Ok(copied);
        }
        dst.write_all(&buf[..n]).await?;
        copied += n as u64;
    }
}

/// Relay both directions of a tunnel concurrently and wait for both copies
/// to finish before returning, so the session's resources are released
/// deterministically. Per-direction byte order is preserved; there is no
/// ordering between the directions.
///
/// Returns the (client→server, server→client) results.
pub async fn tunnel<C, S>(
    client: C,
    server: S,
    buf_size: usize,
    idle: Duration,
) -> (io::Result<u64>, io::Result<u64>)
where
    C: AsyncRead + AsyncWrite + Unpin,
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut server_read, mut server_write) = tokio::io::split(server);

    tokio::join!(
        copy_until_eof(&mut client_read, &mut server_write, buf_size, idle),
        copy_until_eof(&mut server_read, &mut client_write, buf_size, idle),
    )
}
