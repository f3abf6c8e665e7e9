//! Socket stream that is either plain TCP or upgraded to TLS.

use pin_project_lite::pin_project;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

pin_project! {
    /// A node connection after the optional StartTLS upgrade.
    #[project = RiakStreamProj]
    pub enum RiakStream {
        Plain { #[pin] stream: TcpStream },
        Tls { #[pin] stream: TlsStream<TcpStream> },
    }
}

impl RiakStream {
    pub fn plain(stream: TcpStream) -> Self {
        RiakStream::Plain { stream }
    }

    pub fn tls(stream: TlsStream<TcpStream>) -> Self {
        RiakStream::Tls { stream }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, RiakStream::Tls { .. })
    }
}

impl AsyncRead for RiakStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.project() {
            RiakStreamProj::Plain { stream } => stream.poll_read(cx, buf),
            RiakStreamProj::Tls { stream } => stream.poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for RiakStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.project() {
            RiakStreamProj::Plain { stream } => stream.poll_write(cx, buf),
            RiakStreamProj::Tls { stream } => stream.poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.project() {
            RiakStreamProj::Plain { stream } => stream.poll_flush(cx),
            RiakStreamProj::Tls { stream } => stream.poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.project() {
            RiakStreamProj::Plain { stream } => stream.poll_shutdown(cx),
            RiakStreamProj::Tls { stream } => stream.poll_shutdown(cx),
        }
    }
}
