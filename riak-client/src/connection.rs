//! A single logical connection to one node.
//!
//! [`Connection`] wraps a [`RiakSocket`] and turns every transport failure
//! into a classified [`RiakError`]. Failures that leave the stream in an
//! unknown state tear it down; the next operation reconnects lazily. So does
//! an operation that was abandoned halfway, such as a dropped future or a
//! stream dropped before its last frame, since unread frames may still be
//! buffered on the stream.

use crate::command::Command;
use crate::config::{AuthConfig, NodeConfig};
use crate::error::{ClientError, ResultCode, RiakError, RiakResult};
use crate::socket::RiakSocket;
use bytes::BytesMut;
use futures::stream::{self, Stream};
use riak_protocol::{encode_message, RiakMessage, StreamingResponse};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

pub struct Connection {
    id: u64,
    node: String,
    socket: Mutex<RiakSocket>,
    disposed: AtomicBool,
    /// Set while an exchange is in flight and left set if it was abandoned.
    needs_reset: AtomicBool,
}

impl Connection {
    pub fn new(config: Arc<NodeConfig>, auth: Option<Arc<AuthConfig>>) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            node: config.name.clone(),
            socket: Mutex::new(RiakSocket::new(config, auth)),
            disposed: AtomicBool::new(false),
            needs_reset: AtomicBool::new(false),
        }
    }

    /// Process-unique identifier, used in logs.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub async fn is_connected(&self) -> bool {
        self.socket.lock().await.is_connected()
    }

    async fn lock(&self) -> RiakResult<MutexGuard<'_, RiakSocket>> {
        if self.is_disposed() {
            return Err(RiakError::new(
                ResultCode::CommunicationError,
                ClientError::Disposed.to_string(),
            ));
        }
        let mut socket = self.socket.lock().await;
        if self.needs_reset.swap(true, Ordering::SeqCst) && socket.is_connected() {
            tracing::debug!(
                connection = self.id,
                node = %self.node,
                "previous exchange abandoned, reconnecting"
            );
            socket.disconnect().await;
        }
        Ok(socket)
    }

    /// Converts a socket result, tearing the stream down when the failure
    /// calls for it.
    async fn settle<T>(&self, socket: &mut RiakSocket, result: Result<T, ClientError>) -> RiakResult<T> {
        self.needs_reset.store(false, Ordering::SeqCst);
        if self.is_disposed() {
            socket.close();
        }
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                let (riak_err, teardown) = classify(err);
                if teardown {
                    tracing::warn!(
                        connection = self.id,
                        node = %self.node,
                        error = %riak_err.message,
                        "connection failed, disconnecting"
                    );
                    socket.disconnect().await;
                } else {
                    tracing::debug!(connection = self.id, node = %self.node, error = %riak_err, "request failed");
                }
                Err(riak_err)
            }
        }
    }

    /// Reads one message of type `R`.
    pub async fn pb_read<R: RiakMessage>(&self) -> RiakResult<R> {
        let mut socket = self.lock().await?;
        let result = socket.read::<R>().await;
        self.settle(&mut socket, result).await
    }

    /// Writes one request.
    pub async fn pb_write<Q: RiakMessage>(&self, request: &Q) -> RiakResult<()> {
        let mut socket = self.lock().await?;
        let result = socket.write(request).await;
        self.settle(&mut socket, result).await
    }

    /// Writes a request and reads its single response.
    pub async fn pb_write_read<Q, R>(&self, request: &Q) -> RiakResult<R>
    where
        Q: RiakMessage,
        R: RiakMessage,
    {
        let mut socket = self.lock().await?;
        let result = async {
            socket.write(request).await?;
            socket.read::<R>().await
        }
        .await;
        self.settle(&mut socket, result).await
    }

    /// Reads messages while `repeat_while` holds for the last one read.
    ///
    /// The message that stops the loop is included in the result.
    pub async fn pb_repeat_read<R, P>(&self, repeat_while: P) -> RiakResult<Vec<R>>
    where
        R: RiakMessage,
        P: FnMut(&R) -> bool,
    {
        let mut socket = self.lock().await?;
        let result = repeat_read(&mut socket, repeat_while).await;
        self.settle(&mut socket, result).await
    }

    /// Writes a request, then reads as [`pb_repeat_read`](Self::pb_repeat_read).
    pub async fn pb_write_repeat_read<Q, R, P>(&self, request: &Q, repeat_while: P) -> RiakResult<Vec<R>>
    where
        Q: RiakMessage,
        R: RiakMessage,
        P: FnMut(&R) -> bool,
    {
        let mut socket = self.lock().await?;
        let result = async {
            socket.write(request).await?;
            repeat_read(&mut socket, repeat_while).await
        }
        .await;
        self.settle(&mut socket, result).await
    }

    /// Lazily reads messages as a stream.
    ///
    /// Nothing is read until the stream is polled. The stream ends after the
    /// first message for which `repeat_while` is false, or after the first
    /// error. `on_finish` runs exactly once: before the last item is yielded,
    /// or when the stream is dropped early.
    pub fn pb_stream_read<R, P, F>(
        self: Arc<Self>,
        repeat_while: P,
        on_finish: F,
    ) -> impl Stream<Item = RiakResult<R>> + Send + 'static
    where
        R: RiakMessage + Send + 'static,
        P: FnMut(&R) -> bool + Send + 'static,
        F: FnOnce() + Send + 'static,
    {
        self.streaming(None, repeat_while, on_finish)
    }

    /// Like [`pb_stream_read`](Self::pb_stream_read), but writes `request`
    /// on the first poll.
    pub fn pb_write_streaming_read<Q, R, P, F>(
        self: Arc<Self>,
        request: &Q,
        repeat_while: P,
        on_finish: F,
    ) -> impl Stream<Item = RiakResult<R>> + Send + 'static
    where
        Q: RiakMessage,
        R: RiakMessage + Send + 'static,
        P: FnMut(&R) -> bool + Send + 'static,
        F: FnOnce() + Send + 'static,
    {
        let frame = encode_message(request).map_err(ClientError::from);
        self.streaming(Some(frame), repeat_while, on_finish)
    }

    fn streaming<R, P, F>(
        self: Arc<Self>,
        pending: Option<Result<BytesMut, ClientError>>,
        repeat_while: P,
        on_finish: F,
    ) -> impl Stream<Item = RiakResult<R>> + Send + 'static
    where
        R: RiakMessage + Send + 'static,
        P: FnMut(&R) -> bool + Send + 'static,
        F: FnOnce() + Send + 'static,
    {
        let state: StreamState<R, P> = StreamState {
            connection: self,
            pending,
            repeat_while,
            on_finish: OnFinish(Some(Box::new(on_finish))),
            done: false,
            _response: PhantomData,
        };

        stream::unfold(state, |mut state| async move {
            if state.done {
                return None;
            }
            let result = state.connection.next_streamed::<R>(state.pending.take()).await;
            let last = match &result {
                Ok(message) => !(state.repeat_while)(message),
                Err(_) => true,
            };
            if last {
                state.done = true;
                state.on_finish.run();
            }
            Some((result, state))
        })
    }

    async fn next_streamed<R: RiakMessage>(&self, pending: Option<Result<BytesMut, ClientError>>) -> RiakResult<R> {
        let mut socket = self.lock().await?;
        let result = async {
            if let Some(frame) = pending {
                socket.write_frame(&frame?).await?;
            }
            socket.read::<R>().await
        }
        .await;
        self.settle(&mut socket, result).await
    }

    /// Runs a single request/response command.
    pub async fn execute<C: Command>(&self, command: &mut C) -> RiakResult<()> {
        let request = command.construct_request().map_err(request_error)?;
        let mut socket = self.lock().await?;
        command.reset();
        let result = async {
            socket.write(&request).await?;
            let response = socket.read::<C::Response>().await?;
            command.on_success(response)
        }
        .await;
        self.settle(&mut socket, result).await
    }

    /// Runs a streaming command, feeding every frame to the command until
    /// one reports done.
    pub async fn execute_streaming<C>(&self, command: &mut C) -> RiakResult<()>
    where
        C: Command,
        C::Response: StreamingResponse,
    {
        let request = command.construct_request().map_err(request_error)?;
        let mut socket = self.lock().await?;
        command.reset();
        let result = async {
            socket.write(&request).await?;
            socket
                .read_streaming(|response: C::Response| command.on_success(response))
                .await
        }
        .await;
        self.settle(&mut socket, result).await
    }

    /// Closes the stream gracefully. The connection stays usable.
    pub async fn disconnect(&self) {
        let mut socket = self.socket.lock().await;
        socket.disconnect().await;
        self.needs_reset.store(false, Ordering::SeqCst);
    }

    /// Marks the connection unusable and drops its stream. Idempotent.
    ///
    /// If an operation holds the socket, the stream is dropped when that
    /// operation finishes, or on the next call to `dispose`.
    pub fn dispose(&self) {
        let first = !self.disposed.swap(true, Ordering::SeqCst);
        if let Ok(mut socket) = self.socket.try_lock() {
            socket.close();
        }
        if first {
            tracing::debug!(connection = self.id, node = %self.node, "connection disposed");
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("node", &self.node)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

async fn repeat_read<R, P>(socket: &mut RiakSocket, mut repeat_while: P) -> Result<Vec<R>, ClientError>
where
    R: RiakMessage,
    P: FnMut(&R) -> bool,
{
    let mut messages = Vec::new();
    loop {
        let message = socket.read::<R>().await?;
        let more = repeat_while(&message);
        messages.push(message);
        if !more {
            return Ok(messages);
        }
    }
}

/// Maps a socket error to the caller-facing error, and whether the stream
/// must be torn down.
fn classify(err: ClientError) -> (RiakError, bool) {
    match err {
        ClientError::ServerError { code, message } => {
            let mut riak_err = RiakError::new(ResultCode::CommunicationError, message);
            riak_err.server_code = Some(code);
            (riak_err, false)
        }
        ClientError::InvalidRequest(message) => (RiakError::invalid_request(message), false),
        err if err.is_node_offline() => (
            RiakError::new(ResultCode::CommunicationError, err.to_string())
                .retryable()
                .node_offline(),
            true,
        ),
        err => (
            RiakError::new(ResultCode::CommunicationError, err.to_string()).retryable(),
            true,
        ),
    }
}

fn request_error(err: ClientError) -> RiakError {
    match err {
        ClientError::InvalidRequest(message) => RiakError::invalid_request(message),
        err => RiakError::invalid_request(err.to_string()),
    }
}

struct OnFinish(Option<Box<dyn FnOnce() + Send>>);

impl OnFinish {
    fn run(&mut self) {
        if let Some(finish) = self.0.take() {
            finish();
        }
    }
}

struct StreamState<R, P> {
    connection: Arc<Connection>,
    pending: Option<Result<BytesMut, ClientError>>,
    repeat_while: P,
    on_finish: OnFinish,
    done: bool,
    _response: PhantomData<fn() -> R>,
}

impl<R, P> Drop for StreamState<R, P> {
    fn drop(&mut self) {
        // Dropped before the terminal frame: the rest of the response is
        // still on the wire. A request that was never written leaves
        // nothing behind.
        if !self.done && self.pending.is_none() {
            self.connection.needs_reset.store(true, Ordering::SeqCst);
        }
        self.on_finish.run();
    }
}

/// Creates connections for one node.
#[derive(Debug, Clone)]
pub struct ConnectionFactory {
    config: Arc<NodeConfig>,
    auth: Option<Arc<AuthConfig>>,
}

impl ConnectionFactory {
    pub fn new(config: Arc<NodeConfig>, auth: Option<Arc<AuthConfig>>) -> Self {
        Self { config, auth }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn create(&self) -> Arc<Connection> {
        let connection = Connection::new(self.config.clone(), self.auth.clone());
        tracing::trace!(connection = connection.id(), node = %self.config.name, "connection created");
        Arc::new(connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{ListKeys, Ping};
    use crate::test_server::{self, MockServer};
    use futures::StreamExt;
    use riak_protocol::pb::kv::{RpbListKeysReq, RpbListKeysResp};
    use riak_protocol::pb::riak::{RpbPingReq, RpbPingResp};
    use riak_protocol::MessageCode;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::net::TcpStream;

    fn connection_for(server: &MockServer) -> Arc<Connection> {
        ConnectionFactory::new(Arc::new(server.node_config()), None).create()
    }

    fn keys_page(key: &[u8], done: bool) -> RpbListKeysResp {
        RpbListKeysResp {
            keys: if key.is_empty() { vec![] } else { vec![key.to_vec()] },
            done: if done { Some(true) } else { None },
        }
    }

    async fn three_pages_then_done(mut stream: TcpStream) {
        while let Some((code, _)) = test_server::read_frame(&mut stream).await {
            assert_eq!(code, MessageCode::ListKeysReq.as_u8());
            for key in [b"k1", b"k2", b"k3"] {
                test_server::write_message(&mut stream, &keys_page(key, false)).await;
            }
            test_server::write_message(&mut stream, &keys_page(b"", true)).await;
        }
    }

    fn list_keys_req() -> RpbListKeysReq {
        RpbListKeysReq {
            bucket: b"users".to_vec(),
            timeout: None,
            r#type: None,
        }
    }

    #[test]
    fn test_ids_are_unique() {
        let config = Arc::new(NodeConfig::new("127.0.0.1", 8087));
        let a = Connection::new(config.clone(), None);
        let b = Connection::new(config, None);
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_write_read() {
        let server = MockServer::start(test_server::ping_handler).await;
        let connection = connection_for(&server);
        let _: RpbPingResp = connection.pb_write_read(&RpbPingReq {}).await.unwrap();
        assert!(connection.is_connected().await);
    }

    #[tokio::test]
    async fn test_separate_write_and_read() {
        let server = MockServer::start(test_server::ping_handler).await;
        let connection = connection_for(&server);
        connection.pb_write(&RpbPingReq {}).await.unwrap();
        let _: RpbPingResp = connection.pb_read().await.unwrap();
    }

    #[tokio::test]
    async fn test_write_repeat_read() {
        let server = MockServer::start(three_pages_then_done).await;
        let connection = connection_for(&server);
        let pages: Vec<RpbListKeysResp> = connection
            .pb_write_repeat_read(&list_keys_req(), |r: &RpbListKeysResp| !r.is_done())
            .await
            .unwrap();
        assert_eq!(pages.len(), 4);
        assert!(pages[3].is_done());
    }

    #[tokio::test]
    async fn test_repeat_read_after_manual_write() {
        let server = MockServer::start(three_pages_then_done).await;
        let connection = connection_for(&server);
        connection.pb_write(&list_keys_req()).await.unwrap();
        let pages: Vec<RpbListKeysResp> = connection
            .pb_repeat_read(|r: &RpbListKeysResp| !r.is_done())
            .await
            .unwrap();
        assert_eq!(pages.len(), 4);
    }

    #[tokio::test]
    async fn test_streaming_read_is_lazy_and_finishes_once() {
        let server = MockServer::start(three_pages_then_done).await;
        let connection = connection_for(&server);
        let finished = Arc::new(AtomicUsize::new(0));

        let counter = finished.clone();
        let stream = connection.clone().pb_write_streaming_read(
            &list_keys_req(),
            |r: &RpbListKeysResp| !r.is_done(),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(server.accepts(), 0);

        let items: Vec<_> = stream.collect().await;
        assert_eq!(items.len(), 4);
        assert!(items.iter().all(Result::is_ok));
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_streaming_read_dropped_early_still_finishes() {
        let server = MockServer::start(three_pages_then_done).await;
        let connection = connection_for(&server);
        let finished = Arc::new(AtomicUsize::new(0));

        let counter = finished.clone();
        let mut stream = Box::pin(connection.clone().pb_write_streaming_read(
            &list_keys_req(),
            |r: &RpbListKeysResp| !r.is_done(),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        ));

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.keys, vec![b"k1".to_vec()]);
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        drop(stream);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abandoned_stream_forces_reconnect() {
        let server = MockServer::start(three_pages_then_done).await;
        let connection = connection_for(&server);

        let mut stream = Box::pin(connection.clone().pb_write_streaming_read(
            &list_keys_req(),
            |r: &RpbListKeysResp| !r.is_done(),
            || {},
        ));
        stream.next().await.unwrap().unwrap();
        drop(stream);

        let mut command = ListKeys::new("users");
        connection.execute_streaming(&mut command).await.unwrap();
        assert_eq!(
            command.keys(),
            &[b"k1".to_vec(), b"k2".to_vec(), b"k3".to_vec()]
        );
        assert_eq!(server.accepts(), 2);
    }

    #[tokio::test]
    async fn test_unpolled_stream_keeps_connection() {
        let server = MockServer::start(three_pages_then_done).await;
        let connection = connection_for(&server);
        connection.execute_streaming(&mut ListKeys::new("users")).await.unwrap();

        let stream = connection.clone().pb_write_streaming_read(
            &list_keys_req(),
            |r: &RpbListKeysResp| !r.is_done(),
            || {},
        );
        drop(stream);

        connection.execute_streaming(&mut ListKeys::new("users")).await.unwrap();
        assert_eq!(server.accepts(), 1);
    }

    #[tokio::test]
    async fn test_dropped_exchange_forces_reconnect() {
        let server = MockServer::start(|mut stream| async move {
            while test_server::read_frame(&mut stream).await.is_some() {
                tokio::time::sleep(Duration::from_millis(100)).await;
                test_server::write_code(&mut stream, MessageCode::PingResp).await;
            }
        })
        .await;
        let connection = connection_for(&server);

        let abandoned = connection.pb_write_read::<_, RpbPingResp>(&RpbPingReq {});
        assert!(tokio::time::timeout(Duration::from_millis(20), abandoned)
            .await
            .is_err());

        let _: RpbPingResp = connection.pb_write_read(&RpbPingReq {}).await.unwrap();
        assert_eq!(server.accepts(), 2);
    }

    #[tokio::test]
    async fn test_execute_streaming_starts_from_scratch() {
        let server = MockServer::start(three_pages_then_done).await;
        let connection = connection_for(&server);
        let mut command = ListKeys::new("users");
        connection.execute_streaming(&mut command).await.unwrap();
        connection.execute_streaming(&mut command).await.unwrap();
        assert_eq!(command.keys().len(), 3);
    }

    #[tokio::test]
    async fn test_stream_read_without_request() {
        let server = MockServer::start(three_pages_then_done).await;
        let connection = connection_for(&server);
        connection.pb_write(&list_keys_req()).await.unwrap();

        let finished = Arc::new(AtomicUsize::new(0));
        let counter = finished.clone();
        let items: Vec<RiakResult<RpbListKeysResp>> = connection
            .clone()
            .pb_stream_read(
                |r: &RpbListKeysResp| !r.is_done(),
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                },
            )
            .collect()
            .await;
        assert_eq!(items.len(), 4);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_streaming_error_ends_stream() {
        let server = MockServer::start(|mut stream| async move {
            test_server::read_frame(&mut stream).await;
            test_server::write_message(&mut stream, &keys_page(b"k1", false)).await;
        })
        .await;
        let connection = connection_for(&server);
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = finished.clone();

        let items: Vec<_> = connection
            .clone()
            .pb_write_streaming_read(
                &list_keys_req(),
                |r: &RpbListKeysResp| !r.is_done(),
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                },
            )
            .collect()
            .await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        let err = items[1].as_ref().unwrap_err();
        assert!(err.node_offline);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execute_command() {
        let server = MockServer::start(test_server::ping_handler).await;
        let connection = connection_for(&server);
        connection.execute(&mut Ping).await.unwrap();
    }

    #[tokio::test]
    async fn test_execute_streaming_command() {
        let server = MockServer::start(three_pages_then_done).await;
        let connection = connection_for(&server);
        let mut command = ListKeys::new("users");
        connection.execute_streaming(&mut command).await.unwrap();
        assert_eq!(
            command.keys(),
            &[b"k1".to_vec(), b"k2".to_vec(), b"k3".to_vec()]
        );
    }

    #[tokio::test]
    async fn test_invalid_request_never_touches_socket() {
        let server = MockServer::start(test_server::ping_handler).await;
        let connection = connection_for(&server);
        let err = connection
            .execute_streaming(&mut ListKeys::new("  "))
            .await
            .unwrap_err();
        assert_eq!(err.code, ResultCode::InvalidRequest);
        assert!(!err.retryable);
        assert_eq!(server.accepts(), 0);
    }

    #[tokio::test]
    async fn test_timeout_disconnects_and_reconnects() {
        let answered = Arc::new(AtomicUsize::new(0));
        let count = answered.clone();
        let server = MockServer::start(move |mut stream| {
            let count = count.clone();
            async move {
                // First connection never answers.
                if count.fetch_add(1, Ordering::SeqCst) == 0 {
                    test_server::hold_open(stream).await;
                    return;
                }
                while test_server::read_frame(&mut stream).await.is_some() {
                    test_server::write_code(&mut stream, MessageCode::PingResp).await;
                }
            }
        })
        .await;

        let config = server
            .node_config()
            .with_read_timeout(Duration::from_millis(50));
        let connection = ConnectionFactory::new(Arc::new(config), None).create();

        let err = connection
            .pb_write_read::<_, RpbPingResp>(&RpbPingReq {})
            .await
            .unwrap_err();
        assert!(err.retryable);
        assert!(err.node_offline);
        assert!(!connection.is_connected().await);

        let _: RpbPingResp = connection.pb_write_read(&RpbPingReq {}).await.unwrap();
        assert_eq!(server.accepts(), 2);
    }

    #[tokio::test]
    async fn test_server_error_keeps_connection() {
        let server = MockServer::start(|mut stream| async move {
            test_server::read_frame(&mut stream).await;
            test_server::write_error(&mut stream, "overload", 7).await;
            test_server::read_frame(&mut stream).await;
            test_server::write_code(&mut stream, MessageCode::PingResp).await;
        })
        .await;
        let connection = connection_for(&server);

        let err = connection
            .pb_write_read::<_, RpbPingResp>(&RpbPingReq {})
            .await
            .unwrap_err();
        assert_eq!(err.message, "overload");
        assert_eq!(err.server_code, Some(7));
        assert!(!err.retryable);
        assert!(!err.node_offline);
        assert!(connection.is_connected().await);

        let _: RpbPingResp = connection.pb_write_read(&RpbPingReq {}).await.unwrap();
        assert_eq!(server.accepts(), 1);
    }

    #[tokio::test]
    async fn test_unexpected_response_is_retryable_teardown() {
        let server = MockServer::start(|mut stream| async move {
            test_server::read_frame(&mut stream).await;
            test_server::write_code(&mut stream, MessageCode::GetServerInfoResp).await;
            test_server::hold_open(stream).await;
        })
        .await;
        let connection = connection_for(&server);
        let err = connection
            .pb_write_read::<_, RpbPingResp>(&RpbPingReq {})
            .await
            .unwrap_err();
        assert_eq!(err.code, ResultCode::CommunicationError);
        assert!(err.message.contains("unexpected"), "{}", err.message);
        assert!(err.retryable);
        assert!(!err.node_offline);
        assert!(!connection.is_connected().await);
    }

    #[tokio::test]
    async fn test_disposed_connection_rejects_work() {
        let server = MockServer::start(test_server::ping_handler).await;
        let connection = connection_for(&server);
        let _: RpbPingResp = connection.pb_write_read(&RpbPingReq {}).await.unwrap();

        connection.dispose();
        connection.dispose();
        assert!(connection.is_disposed());
        assert!(!connection.is_connected().await);
        assert!(connection.execute(&mut Ping).await.is_err());
    }

    #[tokio::test]
    async fn test_dispose_during_exchange_closes_afterwards() {
        let server = MockServer::start(|mut stream| async move {
            test_server::read_frame(&mut stream).await;
            tokio::time::sleep(Duration::from_millis(200)).await;
            test_server::write_code(&mut stream, MessageCode::PingResp).await;
            test_server::hold_open(stream).await;
        })
        .await;
        let connection = connection_for(&server);

        let in_flight = tokio::spawn({
            let connection = connection.clone();
            async move { connection.execute(&mut Ping).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        connection.dispose();

        tokio_test::assert_ok!(in_flight.await.unwrap());
        assert!(!connection.is_connected().await);
    }

    #[tokio::test]
    async fn test_disconnect_then_reuse() {
        let server = MockServer::start(test_server::ping_handler).await;
        let connection = connection_for(&server);
        connection.execute(&mut Ping).await.unwrap();
        connection.disconnect().await;
        assert!(!connection.is_connected().await);
        connection.execute(&mut Ping).await.unwrap();
        assert_eq!(server.accepts(), 2);
    }
}
