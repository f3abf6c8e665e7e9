//! In-process fake node for tests.

use crate::config::NodeConfig;
use riak_protocol::pb::riak::RpbErrorResp;
use riak_protocol::{encode_code, encode_message, MessageCode, RiakMessage};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub struct MockServer {
    addr: SocketAddr,
    accepts: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl MockServer {
    /// Serves every accepted connection with `handler` on its own task.
    pub async fn start<F, Fut>(handler: F) -> Self
    where
        F: Fn(TcpStream) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepts = Arc::new(AtomicUsize::new(0));

        let counter = accepts.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(handler(stream));
            }
        });

        Self {
            addr,
            accepts,
            handle,
        }
    }

    pub fn node_config(&self) -> NodeConfig {
        NodeConfig::new("127.0.0.1", self.addr.port())
            .with_connect_timeout(Duration::from_secs(2))
            .with_read_timeout(Duration::from_secs(2))
            .with_write_timeout(Duration::from_secs(2))
    }

    /// Number of connections accepted so far.
    pub fn accepts(&self) -> usize {
        self.accepts.load(Ordering::SeqCst)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Reads one frame, returning `None` once the client hangs up.
pub async fn read_frame(stream: &mut TcpStream) -> Option<(u8, Vec<u8>)> {
    let mut header = [0u8; 5];
    stream.read_exact(&mut header).await.ok()?;
    let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let mut payload = vec![0u8; len.saturating_sub(1)];
    stream.read_exact(&mut payload).await.ok()?;
    Some((header[4], payload))
}

pub async fn write_raw(stream: &mut TcpStream, bytes: &[u8]) {
    let _ = stream.write_all(bytes).await;
}

pub async fn write_code(stream: &mut TcpStream, code: MessageCode) {
    write_raw(stream, &encode_code(code)).await;
}

pub async fn write_message<M: RiakMessage>(stream: &mut TcpStream, message: &M) {
    let frame = encode_message(message).unwrap();
    write_raw(stream, &frame).await;
}

pub async fn write_error(stream: &mut TcpStream, message: &str, code: u32) {
    let err = RpbErrorResp {
        errmsg: message.as_bytes().to_vec(),
        errcode: code,
    };
    write_message(stream, &err).await;
}

/// Keeps the connection open until the client closes it.
pub async fn hold_open(mut stream: TcpStream) {
    let mut buf = [0u8; 256];
    while let Ok(n) = stream.read(&mut buf).await {
        if n == 0 {
            break;
        }
    }
}

/// Answers every ping; any other request closes the connection.
pub async fn ping_handler(mut stream: TcpStream) {
    while let Some((code, _)) = read_frame(&mut stream).await {
        if code != MessageCode::PingReq.as_u8() {
            break;
        }
        write_code(&mut stream, MessageCode::PingResp).await;
    }
}

/// Accepts requests and never answers.
pub async fn silent_handler(stream: TcpStream) {
    hold_open(stream).await;
}

/// A port with nothing listening on it.
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}
