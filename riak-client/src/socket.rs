//! Framed socket over one TCP connection to a node.
//!
//! The socket connects lazily: every read or write first makes sure a stream
//! exists, running the StartTLS and authentication handshake when security is
//! configured. A failed operation leaves the socket as it was; callers decide
//! whether to [`disconnect`](RiakSocket::disconnect).

use crate::config::{AuthConfig, NodeConfig};
use crate::error::ClientError;
use crate::stream::RiakStream;
use crate::tls;
use bytes::{Bytes, BytesMut};
use riak_protocol::pb::riak::{RpbAuthReq, RpbErrorResp};
use riak_protocol::timeseries;
use riak_protocol::{
    encode_code, encode_message, FrameHeader, MessageCode, ProtocolError, RiakMessage,
    StreamingResponse, FRAME_HEADER_SIZE,
};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// One connection's worth of framed I/O.
pub struct RiakSocket {
    config: Arc<NodeConfig>,
    auth: Option<Arc<AuthConfig>>,
    stream: Option<RiakStream>,
}

impl RiakSocket {
    pub fn new(config: Arc<NodeConfig>, auth: Option<Arc<AuthConfig>>) -> Self {
        Self {
            config,
            auth,
            stream: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn is_tls(&self) -> bool {
        self.stream.as_ref().is_some_and(RiakStream::is_tls)
    }

    async fn ensure_connected(&mut self) -> Result<&mut RiakStream, ClientError> {
        if self.stream.is_none() {
            let stream = self.connect().await?;
            self.stream = Some(stream);
        }
        self.stream.as_mut().ok_or(ClientError::ConnectionClosed)
    }

    async fn connect(&self) -> Result<RiakStream, ClientError> {
        let addr = self.config.address();
        tracing::debug!(node = %self.config.name, %addr, "connecting");

        let tcp = tokio::time::timeout(self.config.connect_timeout(), TcpStream::connect(&addr))
            .await
            .map_err(|_| ClientError::ConnectTimeout)??;
        tcp.set_nodelay(true)?;

        match &self.auth {
            Some(auth) => self.start_tls(tcp, auth).await,
            None => Ok(RiakStream::plain(tcp)),
        }
    }

    async fn start_tls(&self, mut tcp: TcpStream, auth: &AuthConfig) -> Result<RiakStream, ClientError> {
        let read_timeout = self.config.read_timeout();
        let write_timeout = self.config.write_timeout();

        write_frame(&mut tcp, &encode_code(MessageCode::StartTls), write_timeout).await?;
        let (code, _) = read_frame(&mut tcp, read_timeout).await?;
        expect_code(MessageCode::StartTls, code)?;

        let (connector, server_name) = tls::create_tls_connector(auth, &self.config.host)?;
        let tls_stream =
            tokio::time::timeout(self.config.connect_timeout(), connector.connect(server_name, tcp))
                .await
                .map_err(|_| ClientError::ConnectTimeout)?
                .map_err(|e| ClientError::TlsHandshake(e.to_string()))?;
        tracing::debug!(node = %self.config.name, "TLS established");

        let mut stream = RiakStream::tls(tls_stream);
        let request = RpbAuthReq {
            user: auth.username.as_bytes().to_vec(),
            password: auth.password.as_bytes().to_vec(),
        };
        write_frame(&mut stream, &encode_message(&request)?, write_timeout).await?;
        let (code, _) = read_frame(&mut stream, read_timeout).await?;
        expect_code(MessageCode::AuthResp, code)?;
        tracing::debug!(node = %self.config.name, user = %auth.username, "authenticated");

        Ok(stream)
    }

    /// Writes a message as one frame.
    pub async fn write<M: RiakMessage>(&mut self, message: &M) -> Result<(), ClientError> {
        let frame = encode_message(message)?;
        self.write_frame(&frame).await
    }

    /// Writes a header-only frame.
    pub async fn write_code(&mut self, code: MessageCode) -> Result<(), ClientError> {
        self.write_frame(&encode_code(code)).await
    }

    /// Writes an already-encoded frame.
    pub async fn write_frame(&mut self, frame: &[u8]) -> Result<(), ClientError> {
        let timeout = self.config.write_timeout();
        let stream = self.ensure_connected().await?;
        write_frame(stream, frame, timeout).await
    }

    /// Reads one frame and decodes it as `M`.
    ///
    /// Binary term responses are checked for an error term first.
    pub async fn read<M: RiakMessage>(&mut self) -> Result<M, ClientError> {
        let payload = self.read_payload(M::CODE).await?;
        if M::CODE == MessageCode::TsTtbMsg {
            if let Some(err) = timeseries::decode_error(&payload) {
                return Err(ClientError::ServerError {
                    code: err.code,
                    message: err.message,
                });
            }
        }
        Ok(M::decode_payload(payload)?)
    }

    /// Reads a frame that must carry `expected` and discards its payload.
    pub async fn read_code(&mut self, expected: MessageCode) -> Result<(), ClientError> {
        self.read_payload(expected).await.map(|_| ())
    }

    /// Reads frames until one reports done, handing each to `on_message`.
    pub async fn read_streaming<M, F>(&mut self, mut on_message: F) -> Result<(), ClientError>
    where
        M: StreamingResponse,
        F: FnMut(M) -> Result<(), ClientError>,
    {
        loop {
            let message = self.read::<M>().await?;
            let done = message.is_done();
            on_message(message)?;
            if done {
                return Ok(());
            }
        }
    }

    async fn read_payload(&mut self, expected: MessageCode) -> Result<Bytes, ClientError> {
        let timeout = self.config.read_timeout();
        let stream = self.ensure_connected().await?;
        let (code, payload) = read_frame(stream, timeout).await?;
        expect_code(expected, code)?;
        Ok(payload)
    }

    /// Shuts down and drops the stream. Idempotent.
    pub async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            tracing::debug!(node = %self.config.name, "disconnecting");
            let _ = stream.shutdown().await;
        }
    }

    /// Drops the stream without a graceful shutdown.
    pub fn close(&mut self) {
        self.stream = None;
    }
}

fn expect_code(expected: MessageCode, actual: MessageCode) -> Result<(), ClientError> {
    if expected != actual {
        return Err(ProtocolError::UnexpectedMessageCode { expected, actual }.into());
    }
    Ok(())
}

/// Fills `buf` from the stream. Stops early only when the peer closes.
async fn read_full<S>(stream: &mut S, buf: &mut [u8]) -> io::Result<usize>
where
    S: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = stream.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

async fn read_frame<S>(stream: &mut S, timeout: Duration) -> Result<(MessageCode, Bytes), ClientError>
where
    S: AsyncRead + Unpin,
{
    tokio::time::timeout(timeout, read_frame_inner(stream))
        .await
        .map_err(|_| ClientError::Timeout)?
}

async fn read_frame_inner<S>(stream: &mut S) -> Result<(MessageCode, Bytes), ClientError>
where
    S: AsyncRead + Unpin,
{
    let mut raw = [0u8; FRAME_HEADER_SIZE];
    if read_full(stream, &mut raw).await? < FRAME_HEADER_SIZE {
        return Err(ClientError::ConnectionClosed);
    }

    let header = FrameHeader::parse(&raw);
    let len = header.payload_len()?;
    let mut payload = BytesMut::zeroed(len);
    if read_full(stream, &mut payload).await? < len {
        return Err(ClientError::ConnectionClosed);
    }
    let payload = payload.freeze();

    if header.is_error() {
        let err = RpbErrorResp::decode_payload(payload)?;
        return Err(ClientError::ServerError {
            code: err.errcode,
            message: String::from_utf8_lossy(&err.errmsg).into_owned(),
        });
    }

    let code = header.message_code()?;
    tracing::trace!(%code, len, "frame received");
    Ok((code, payload))
}

async fn write_frame<S>(stream: &mut S, frame: &[u8], timeout: Duration) -> Result<(), ClientError>
where
    S: AsyncWrite + Unpin,
{
    tokio::time::timeout(timeout, async {
        stream.write_all(frame).await?;
        stream.flush().await
    })
    .await
    .map_err(|_| ClientError::Timeout)??;
    Ok(())
}
