//! Connection managers.
//!
//! A node either keeps a fixed pool of connections or creates one per
//! operation. Both hand out connections through [`ConnectionManager::consume`],
//! which returns the connection when the caller's future completes, fails,
//! panics or is dropped. [`ConnectionManager::delayed_consume`] hands the
//! caller a [`Release`] guard instead, for results that outlive the call.

use crate::connection::{Connection, ConnectionFactory};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub enum ConnectionManager {
    Pool(ConnectionPool),
    OnTheFly(OnTheFlyManager),
}

impl ConnectionManager {
    /// Builds a pool of `pool_size` connections, or an on-the-fly manager
    /// when `pool_size` is zero.
    pub fn new(factory: ConnectionFactory, pool_size: usize) -> Self {
        if pool_size > 0 {
            ConnectionManager::Pool(ConnectionPool::new(&factory, pool_size))
        } else {
            ConnectionManager::OnTheFly(OnTheFlyManager::new(factory))
        }
    }

    /// Runs `f` with a connection and returns it afterwards.
    ///
    /// Returns `None` without calling `f` when no connection is available or
    /// the manager is disposed.
    pub async fn consume<F, Fut, T>(&self, f: F) -> Option<T>
    where
        F: FnOnce(Arc<Connection>) -> Fut,
        Fut: Future<Output = T>,
    {
        let (connection, release) = self.acquire()?;
        let output = f(connection).await;
        drop(release);
        Some(output)
    }

    /// Runs `f` with a connection whose return is left to the caller
    /// through the given [`Release`].
    pub async fn delayed_consume<F, Fut, T>(&self, f: F) -> Option<T>
    where
        F: FnOnce(Arc<Connection>, Release) -> Fut,
        Fut: Future<Output = T>,
    {
        let (connection, release) = self.acquire()?;
        Some(f(connection, release).await)
    }

    fn acquire(&self) -> Option<(Arc<Connection>, Release)> {
        match self {
            ConnectionManager::Pool(pool) => pool.acquire(),
            ConnectionManager::OnTheFly(manager) => manager.acquire(),
        }
    }

    /// Disposes every connection the manager owns. Idempotent.
    pub fn dispose(&self) {
        match self {
            ConnectionManager::Pool(pool) => pool.dispose(),
            ConnectionManager::OnTheFly(manager) => manager.dispose(),
        }
    }

    pub fn is_disposed(&self) -> bool {
        match self {
            ConnectionManager::Pool(pool) => pool.inner.disposed.load(Ordering::SeqCst),
            ConnectionManager::OnTheFly(manager) => manager.disposed.load(Ordering::SeqCst),
        }
    }
}

struct PoolInner {
    available: Mutex<Vec<Arc<Connection>>>,
    all: Vec<Arc<Connection>>,
    disposed: AtomicBool,
}

impl PoolInner {
    fn give_back(&self, connection: Arc<Connection>) {
        if self.disposed.load(Ordering::SeqCst) {
            connection.dispose();
            return;
        }
        self.available.lock().push(connection);
    }
}

/// A fixed set of connections created up front.
///
/// Connections are never replaced; one that failed reconnects on its next
/// use.
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    pub fn new(factory: &ConnectionFactory, size: usize) -> Self {
        let all: Vec<_> = (0..size).map(|_| factory.create()).collect();
        tracing::debug!(node = %factory.config().name, size, "connection pool created");
        Self {
            inner: Arc::new(PoolInner {
                available: Mutex::new(all.clone()),
                all,
                disposed: AtomicBool::new(false),
            }),
        }
    }

    pub fn size(&self) -> usize {
        self.inner.all.len()
    }

    /// Connections currently idle in the pool.
    pub fn available(&self) -> usize {
        self.inner.available.lock().len()
    }

    fn acquire(&self) -> Option<(Arc<Connection>, Release)> {
        if self.inner.disposed.load(Ordering::SeqCst) {
            return None;
        }
        let connection = self.inner.available.lock().pop()?;
        let release = Release {
            connection: Some(connection.clone()),
            target: ReleaseTarget::Pool(self.inner.clone()),
        };
        Some((connection, release))
    }

    fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.available.lock().clear();
        for connection in &self.inner.all {
            connection.dispose();
        }
        tracing::debug!(size = self.inner.all.len(), "connection pool disposed");
    }
}

/// Creates a fresh connection per operation and disposes it afterwards.
pub struct OnTheFlyManager {
    factory: ConnectionFactory,
    disposed: AtomicBool,
}

impl OnTheFlyManager {
    pub fn new(factory: ConnectionFactory) -> Self {
        Self {
            factory,
            disposed: AtomicBool::new(false),
        }
    }

    fn acquire(&self) -> Option<(Arc<Connection>, Release)> {
        if self.disposed.load(Ordering::SeqCst) {
            return None;
        }
        let connection = self.factory.create();
        let release = Release {
            connection: Some(connection.clone()),
            target: ReleaseTarget::Dispose,
        };
        Some((connection, release))
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }
}

enum ReleaseTarget {
    Pool(Arc<PoolInner>),
    Dispose,
}

/// Returns a borrowed connection to its manager exactly once, either on
/// [`release`](Release::release) or on drop.
pub struct Release {
    connection: Option<Arc<Connection>>,
    target: ReleaseTarget,
}

impl Release {
    pub fn release(mut self) {
        self.run();
    }

    fn run(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        match &self.target {
            ReleaseTarget::Pool(pool) => pool.give_back(connection),
            ReleaseTarget::Dispose => connection.dispose(),
        }
    }
}

impl Drop for Release {
    fn drop(&mut self) {
        self.run();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use crate::test_server::{self, MockServer};
    use crate::commands::{GetServerInfo, ListKeys, Ping};
    use bytes::Bytes;
    use futures::{FutureExt, StreamExt};
    use riak_protocol::pb::kv::{RpbListKeysReq, RpbListKeysResp};
    use riak_protocol::pb::riak::{RpbGetServerInfoResp, RpbPingReq, RpbPingResp};
    use riak_protocol::{RiakMessage, StreamingResponse};
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn factory_for(server: &MockServer) -> ConnectionFactory {
        ConnectionFactory::new(Arc::new(server.node_config()), None)
    }

    fn pool(size: usize) -> ConnectionManager {
        let factory = ConnectionFactory::new(Arc::new(NodeConfig::new("127.0.0.1", 8087)), None);
        ConnectionManager::new(factory, size)
    }

    fn available(manager: &ConnectionManager) -> usize {
        match manager {
            ConnectionManager::Pool(pool) => pool.available(),
            ConnectionManager::OnTheFly(_) => panic!("not a pool"),
        }
    }

    #[test]
    fn test_zero_size_is_on_the_fly() {
        assert!(matches!(pool(0), ConnectionManager::OnTheFly(_)));
        match pool(3) {
            ConnectionManager::Pool(p) => assert_eq!(p.size(), 3),
            ConnectionManager::OnTheFly(_) => panic!("expected pool"),
        }
    }

    #[test]
    fn test_on_the_fly_disposes_after_use() {
        let manager = pool(0);
        let connection = tokio_test::block_on(manager.consume(|c| async move { c })).unwrap();
        assert!(connection.is_disposed());

        let second = tokio_test::block_on(manager.consume(|c| async move { c.id() })).unwrap();
        assert_ne!(second, connection.id());
    }

    #[tokio::test]
    async fn test_pool_returns_connection() {
        let manager = pool(2);
        let id = manager.consume(|c| async move { c.id() }).await.unwrap();
        assert_eq!(available(&manager), 2);

        let ids: HashSet<u64> = match &manager {
            ConnectionManager::Pool(p) => p.inner.all.iter().map(|c| c.id()).collect(),
            ConnectionManager::OnTheFly(_) => unreachable!(),
        };
        assert!(ids.contains(&id));
    }

    #[tokio::test]
    async fn test_pool_exhaustion_yields_none() {
        let manager = pool(1);
        let inner = manager
            .consume(|_outer| async {
                assert_eq!(available(&manager), 0);
                manager.consume(|_| async { 1 }).await
            })
            .await;
        assert_eq!(inner, Some(None));
        assert_eq!(available(&manager), 1);
    }

    #[tokio::test]
    async fn test_concurrent_holders_get_distinct_connections() {
        let manager = pool(3);
        let mut held = Vec::new();
        for _ in 0..3 {
            held.push(manager.delayed_consume(|c, r| async move { (c, r) }).await.unwrap());
        }
        let ids: HashSet<u64> = held.iter().map(|(c, _)| c.id()).collect();
        assert_eq!(ids.len(), 3);

        let fourth = manager.consume(|_| async { 1 }).now_or_never();
        assert_eq!(fourth, Some(None));

        held.clear();
        assert_eq!(available(&manager), 3);
    }

    #[tokio::test]
    async fn test_pool_returns_connection_after_error() {
        let manager = pool(1);
        let result: Option<Result<(), &str>> = manager.consume(|_| async { Err("failed") }).await;
        assert_eq!(result, Some(Err("failed")));
        assert_eq!(available(&manager), 1);
    }

    #[tokio::test]
    async fn test_pool_returns_connection_after_panic() {
        let manager = Arc::new(pool(2));
        let task_manager = manager.clone();
        let handle = tokio::spawn(async move {
            task_manager
                .consume(|_| async {
                    panic!("operation panicked");
                })
                .await
        });
        assert!(handle.await.is_err());
        assert_eq!(available(&manager), 2);
    }

    #[tokio::test]
    async fn test_pool_returns_connection_on_cancel() {
        let manager = pool(1);
        let fut = manager.consume(|_| futures::future::pending::<()>());
        let timed_out = tokio::time::timeout(Duration::from_millis(10), fut).await;
        assert!(timed_out.is_err());
        assert_eq!(available(&manager), 1);
    }

    #[tokio::test]
    async fn test_pooled_connection_recovers_after_timeout() {
        let connections = Arc::new(AtomicUsize::new(0));
        let count = connections.clone();
        let server = MockServer::start(move |stream| {
            let first = count.fetch_add(1, Ordering::SeqCst) == 0;
            async move {
                if first {
                    test_server::hold_open(stream).await;
                } else {
                    test_server::ping_handler(stream).await;
                }
            }
        })
        .await;
        let config = server.node_config().with_read_timeout(Duration::from_millis(50));
        let manager = ConnectionManager::new(ConnectionFactory::new(Arc::new(config), None), 1);

        let (first_id, failed) = manager
            .consume(|c| async move { (c.id(), c.execute(&mut Ping).await) })
            .await
            .unwrap();
        assert!(failed.unwrap_err().node_offline);

        let (second_id, ok) = manager
            .consume(|c| async move { (c.id(), c.execute(&mut Ping).await) })
            .await
            .unwrap();
        tokio_test::assert_ok!(ok);
        assert_eq!(first_id, second_id);
        assert_eq!(server.accepts(), 2);
    }

    #[tokio::test]
    async fn test_pooled_connection_recovers_after_dropped_operation() {
        let connections = Arc::new(AtomicUsize::new(0));
        let count = connections.clone();
        let server = MockServer::start(move |mut stream| {
            let node = if count.fetch_add(1, Ordering::SeqCst) == 0 {
                "stale"
            } else {
                "fresh"
            };
            async move {
                while test_server::read_frame(&mut stream).await.is_some() {
                    if node == "stale" {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                    let info = RpbGetServerInfoResp {
                        node: Some(node.as_bytes().to_vec()),
                        server_version: None,
                    };
                    test_server::write_message(&mut stream, &info).await;
                }
            }
        })
        .await;
        let manager = ConnectionManager::new(factory_for(&server), 1);

        let abandoned = manager.consume(|c| async move {
            let mut command = GetServerInfo::new();
            c.execute(&mut command).await.map(|_| command)
        });
        assert!(tokio::time::timeout(Duration::from_millis(20), abandoned)
            .await
            .is_err());
        assert_eq!(available(&manager), 1);

        let info = manager
            .consume(|c| async move {
                let mut command = GetServerInfo::new();
                c.execute(&mut command).await.map(|_| command.into_info())
            })
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(info.node, "fresh");
        assert_eq!(server.accepts(), 2);
    }

    #[tokio::test]
    async fn test_pooled_connection_recovers_after_dropped_stream() {
        let server = MockServer::start(|mut stream| async move {
            while let Some((_, payload)) = test_server::read_frame(&mut stream).await {
                let request = RpbListKeysReq::decode_payload(Bytes::from(payload)).unwrap();
                let bucket = String::from_utf8(request.bucket).unwrap();
                for i in 0..3 {
                    let page = RpbListKeysResp {
                        keys: vec![format!("{}{}", bucket, i).into_bytes()],
                        done: None,
                    };
                    test_server::write_message(&mut stream, &page).await;
                }
                let done = RpbListKeysResp {
                    keys: vec![],
                    done: Some(true),
                };
                test_server::write_message(&mut stream, &done).await;
            }
        })
        .await;
        let manager = ConnectionManager::new(factory_for(&server), 1);

        let mut pages = manager
            .delayed_consume(|c, release| async move {
                let request = RpbListKeysReq {
                    bucket: b"a".to_vec(),
                    timeout: None,
                    r#type: None,
                };
                c.pb_write_streaming_read(
                    &request,
                    |r: &RpbListKeysResp| !r.is_done(),
                    move || release.release(),
                )
                .boxed()
            })
            .await
            .unwrap();
        let first = pages.next().await.unwrap().unwrap();
        assert_eq!(first.keys, vec![b"a0".to_vec()]);
        drop(pages);
        assert_eq!(available(&manager), 1);

        let keys = manager
            .consume(|c| async move {
                let mut command = ListKeys::new("b");
                c.execute_streaming(&mut command).await.map(|_| command.into_keys())
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(keys, vec![b"b0".to_vec(), b"b1".to_vec(), b"b2".to_vec()]);
        assert_eq!(server.accepts(), 2);
    }

    #[tokio::test]
    async fn test_delayed_release() {
        let manager = pool(1);
        let release = manager
            .delayed_consume(|_, release| async move { release })
            .await
            .unwrap();
        assert_eq!(available(&manager), 0);
        release.release();
        assert_eq!(available(&manager), 1);

        let release = manager.delayed_consume(|_, r| async move { r }).await.unwrap();
        drop(release);
        assert_eq!(available(&manager), 1);
    }

    #[tokio::test]
    async fn test_disposed_pool() {
        let manager = pool(2);
        let leaked = manager.delayed_consume(|c, r| async move { (c, r) }).await.unwrap();
        manager.dispose();
        manager.dispose();

        assert!(manager.is_disposed());
        assert!(manager.consume(|_| async {}).await.is_none());
        assert!(leaked.0.is_disposed());
        drop(leaked);
        assert_eq!(available(&manager), 0);
    }

    #[tokio::test]
    async fn test_on_the_fly_connections_are_distinct_and_disposed() {
        let server = MockServer::start(test_server::ping_handler).await;
        let manager = ConnectionManager::new(factory_for(&server), 0);

        let mut seen = Vec::new();
        for _ in 0..3 {
            let connection = manager
                .consume(|c| async move {
                    let _: RpbPingResp = c.pb_write_read(&RpbPingReq {}).await.unwrap();
                    c
                })
                .await
                .unwrap();
            assert!(connection.is_disposed());
            seen.push(connection.id());
        }
        seen.dedup();
        assert_eq!(seen.len(), 3);
        assert_eq!(server.accepts(), 3);

        manager.dispose();
        assert!(manager.consume(|_| async {}).await.is_none());
    }

    #[tokio::test]
    async fn test_delayed_stream_returns_on_completion() {
        let server = MockServer::start(|mut stream| async move {
            test_server::read_frame(&mut stream).await;
            for done in [None, Some(true)] {
                let page = RpbListKeysResp {
                    keys: vec![b"k".to_vec()],
                    done,
                };
                test_server::write_message(&mut stream, &page).await;
            }
            test_server::hold_open(stream).await;
        })
        .await;
        let manager = ConnectionManager::new(factory_for(&server), 1);

        let stream = manager
            .delayed_consume(|c, release| async move {
                let request = RpbListKeysReq {
                    bucket: b"b".to_vec(),
                    timeout: None,
                    r#type: None,
                };
                c.pb_write_streaming_read(
                    &request,
                    |r: &RpbListKeysResp| r.done != Some(true),
                    move || release.release(),
                )
            })
            .await
            .unwrap();
        assert_eq!(available(&manager), 0);

        let pages: Vec<_> = stream.collect().await;
        assert_eq!(pages.len(), 2);
        assert_eq!(available(&manager), 1);
    }
}
