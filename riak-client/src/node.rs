//! A single Riak node and the connections to it.

use crate::command::Command;
use crate::config::{AuthConfig, NodeConfig};
use crate::connection::{Connection, ConnectionFactory};
use crate::error::{RiakError, RiakResult};
use crate::manager::{ConnectionManager, Release};
use riak_protocol::StreamingResponse;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct Node {
    config: Arc<NodeConfig>,
    manager: ConnectionManager,
    disposing: AtomicBool,
}

impl Node {
    pub fn new(config: NodeConfig, auth: Option<AuthConfig>) -> Self {
        let config = Arc::new(config);
        let factory = ConnectionFactory::new(config.clone(), auth.map(Arc::new));
        let manager = ConnectionManager::new(factory, config.pool_size);
        tracing::debug!(
            node = %config.name,
            address = %config.address(),
            pool_size = config.pool_size,
            "node created"
        );
        Self {
            config,
            manager,
            disposing: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Nodes behind an external load balancer are never taken out of
    /// rotation.
    pub fn can_mark_offline(&self) -> bool {
        !self.config.external_load_balancer
    }

    pub fn is_disposing(&self) -> bool {
        self.disposing.load(Ordering::SeqCst)
    }

    fn unavailable(&self) -> RiakError {
        if self.is_disposing() || self.manager.is_disposed() {
            RiakError::shutting_down()
        } else {
            RiakError::no_connections()
        }
    }

    /// Runs `f` on a managed connection.
    pub async fn use_connection<F, Fut, T>(&self, f: F) -> RiakResult<T>
    where
        F: FnOnce(Arc<Connection>) -> Fut,
        Fut: Future<Output = RiakResult<T>>,
    {
        if self.is_disposing() {
            return Err(RiakError::shutting_down());
        }
        match self.manager.consume(f).await {
            Some(result) => result,
            None => Err(self.unavailable()),
        }
    }

    /// Runs `f` on a connection that is returned only when the given
    /// [`Release`] is released or dropped.
    pub async fn use_delayed_connection<F, Fut, T>(&self, f: F) -> RiakResult<T>
    where
        F: FnOnce(Arc<Connection>, Release) -> Fut,
        Fut: Future<Output = RiakResult<T>>,
    {
        if self.is_disposing() {
            return Err(RiakError::shutting_down());
        }
        match self.manager.delayed_consume(f).await {
            Some(result) => result,
            None => Err(self.unavailable()),
        }
    }

    pub async fn execute<C: Command>(&self, command: &mut C) -> RiakResult<()> {
        self.use_connection(|connection| async move { connection.execute(command).await })
            .await
    }

    pub async fn execute_streaming<C>(&self, command: &mut C) -> RiakResult<()>
    where
        C: Command,
        C::Response: StreamingResponse,
    {
        self.use_connection(|connection| async move { connection.execute_streaming(command).await })
            .await
    }

    /// Stops handing out connections and disposes the manager. Idempotent.
    pub fn dispose(&self) {
        if self.disposing.swap(true, Ordering::SeqCst) {
            return;
        }
        self.manager.dispose();
        tracing::debug!(node = %self.config.name, "node disposed");
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.config.name)
            .field("address", &self.config.address())
            .field("disposing", &self.is_disposing())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{ListKeys, Ping};
    use crate::error::ResultCode;
    use crate::test_server::{self, MockServer};
    use riak_protocol::pb::kv::RpbListKeysResp;

    #[tokio::test]
    async fn test_execute_ping() {
        let server = MockServer::start(test_server::ping_handler).await;
        let node = Node::new(server.node_config().with_pool_size(2), None);
        node.execute(&mut Ping).await.unwrap();
        node.execute(&mut Ping).await.unwrap();
        assert_eq!(server.accepts(), 1);
    }

    #[tokio::test]
    async fn test_execute_streaming() {
        let server = MockServer::start(|mut stream| async move {
            test_server::read_frame(&mut stream).await;
            let done = RpbListKeysResp {
                keys: vec![b"only".to_vec()],
                done: Some(true),
            };
            test_server::write_message(&mut stream, &done).await;
            test_server::hold_open(stream).await;
        })
        .await;
        let node = Node::new(server.node_config(), None);
        let mut command = ListKeys::new("b");
        node.execute_streaming(&mut command).await.unwrap();
        assert_eq!(command.keys(), &[b"only".to_vec()]);
    }

    #[tokio::test]
    async fn test_no_connections() {
        let node = Node::new(NodeConfig::new("127.0.0.1", 8087).with_pool_size(1), None);
        let err = node
            .use_connection(|_| async {
                node.use_connection(|_| async { Ok(()) }).await
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ResultCode::NoConnections);
        assert!(err.retryable);
    }

    #[tokio::test]
    async fn test_shutting_down() {
        let node = Node::new(NodeConfig::new("127.0.0.1", 8087), None);
        node.dispose();
        node.dispose();
        let err = node.execute(&mut Ping).await.unwrap_err();
        assert_eq!(err.code, ResultCode::ShuttingDown);
        assert!(!err.retryable);

        let err = node
            .use_delayed_connection(|_, _| async { Ok(()) })
            .await
            .unwrap_err();
        assert_eq!(err.code, ResultCode::ShuttingDown);
    }

    #[tokio::test]
    async fn test_on_the_fly_node() {
        let server = MockServer::start(test_server::ping_handler).await;
        let node = Node::new(server.node_config().with_pool_size(0), None);
        node.execute(&mut Ping).await.unwrap();
        node.execute(&mut Ping).await.unwrap();
        assert_eq!(server.accepts(), 2);
    }

    #[test]
    fn test_load_balancer_nodes_stay_online() {
        let node = Node::new(NodeConfig::new("lb", 8087).with_external_load_balancer(true), None);
        assert!(!node.can_mark_offline());
        let node = Node::new(NodeConfig::new("riak1", 8087), None);
        assert!(node.can_mark_offline());
    }
}
