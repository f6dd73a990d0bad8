//! Byte streams a session can run over.
//!
//! Any [`SessionStream`] works: TLS, Noise or QUIC streams set up by the
//! application are handed to [`crate::Session::new`] as they are.
//! [`IoStream`] covers the two built-in cases.

use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::net::{TcpListener, TcpStream};

/// Duplex byte stream owned by a session
pub trait SessionStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> SessionStream for T {}

/// Unified stream type: a TCP connection or an in-memory pipe
#[derive(Debug)]
pub enum IoStream {
    /// TCP connection established by the application
    Plain(TcpStream),
    /// In-memory stream, one end of [`memory_pair`]
    Memory(DuplexStream),
}

impl From<TcpStream> for IoStream {
    fn from(stream: TcpStream) -> Self {
        IoStream::Plain(stream)
    }
}

impl From<DuplexStream> for IoStream {
    fn from(stream: DuplexStream) -> Self {
        IoStream::Memory(stream)
    }
}

impl AsyncRead for IoStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            IoStream::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            IoStream::Memory(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for IoStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize, std::io::Error>> {
        match self.get_mut() {
            IoStream::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            IoStream::Memory(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), std::io::Error>> {
        match self.get_mut() {
            IoStream::Plain(stream) => Pin::new(stream).poll_flush(cx),
            IoStream::Memory(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<(), std::io::Error>> {
        match self.get_mut() {
            IoStream::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            IoStream::Memory(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Listen for TCP connections
pub async fn listen_tcp(addr: SocketAddr) -> tokio::io::Result<TcpListener> {
    TcpListener::bind(addr).await
}

/// Connect to a TCP address
pub async fn connect_tcp(addr: SocketAddr) -> tokio::io::Result<IoStream> {
    Ok(IoStream::Plain(TcpStream::connect(addr).await?))
}

/// Two connected in-memory streams, each buffering up to `max_buf_size`
/// bytes in flight
pub fn memory_pair(max_buf_size: usize) -> (IoStream, IoStream) {
    let (a, b) = tokio::io::duplex(max_buf_size);
    (IoStream::Memory(a), IoStream::Memory(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_memory_pair_carries_bytes_both_ways() {
        let (mut a, mut b) = memory_pair(1024);
        a.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        b.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        b.write_all(b"pong").await.unwrap();
        b.shutdown().await.unwrap();
        let mut rest = Vec::new();
        a.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"pong");
    }

    #[tokio::test]
    async fn test_tcp_listen_connect() {
        let listener = listen_tcp("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut stream = IoStream::from(stream);
            let mut buf = [0u8; 5];
            stream.read_exact(&mut buf).await.unwrap();
            stream.write_all(b"world").await.unwrap();
            buf
        });

        let mut client = connect_tcp(addr).await.unwrap();
        assert!(matches!(client, IoStream::Plain(_)));
        client.write_all(b"hello").await.unwrap();
        let mut reply = [0u8; 5];
        client.read_exact(&mut reply).await.unwrap();

        assert_eq!(&accept.await.unwrap(), b"hello");
        assert_eq!(&reply, b"world");
    }
}
