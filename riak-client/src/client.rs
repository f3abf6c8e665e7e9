//! Cluster client.
//!
//! [`RiakClient`] spreads operations round-robin over the nodes that are
//! online, retries retryable failures on the next node, and takes nodes that
//! stop answering out of rotation until a health check finds them again.

use crate::command::Command;
use crate::commands::{
    GetServerInfo, ListBuckets, ListKeys, Ping, ServerInfo, TsDelete, TsGet, TsListKeys, TsPut,
    TsQuery,
};
use crate::config::{ClusterConfig, ConfigError};
use crate::connection::Connection;
use crate::error::{RiakError, RiakResult};
use crate::node::Node;
use futures::stream::{BoxStream, StreamExt};
use riak_protocol::pb::kv::{RpbListKeysReq, RpbListKeysResp};
use riak_protocol::{Cell, QueryResult, RiakMessage, Row, StreamingResponse};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

struct NodeState {
    node: Node,
    online: AtomicBool,
}

struct ClientInner {
    nodes: Vec<NodeState>,
    next: AtomicUsize,
    retries: u32,
    retry_wait: Duration,
    health_check_interval: Duration,
    shutdown: watch::Sender<bool>,
}

/// Client for a Riak cluster. Cheap to clone.
#[derive(Clone)]
pub struct RiakClient {
    inner: Arc<ClientInner>,
}

impl RiakClient {
    pub fn new(config: ClusterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let nodes = config
            .nodes
            .iter()
            .map(|node| NodeState {
                node: Node::new(node.clone(), config.auth.clone()),
                online: AtomicBool::new(true),
            })
            .collect();
        let (shutdown, _) = watch::channel(false);

        tracing::info!(nodes = config.nodes.len(), retries = config.retries, "riak client created");
        Ok(Self {
            inner: Arc::new(ClientInner {
                nodes,
                next: AtomicUsize::new(0),
                retries: config.retries,
                retry_wait: config.retry_wait(),
                health_check_interval: config.health_check_interval(),
                shutdown,
            }),
        })
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.inner.nodes.iter().map(|state| &state.node)
    }

    pub fn online_nodes(&self) -> usize {
        self.inner
            .nodes
            .iter()
            .filter(|state| state.online.load(Ordering::SeqCst))
            .count()
    }

    pub fn is_shutdown(&self) -> bool {
        *self.inner.shutdown.borrow()
    }

    fn select(&self) -> RiakResult<&NodeState> {
        if self.is_shutdown() {
            return Err(RiakError::shutting_down());
        }
        let nodes = &self.inner.nodes;
        let start = self.inner.next.fetch_add(1, Ordering::Relaxed);
        (0..nodes.len())
            .map(|offset| &nodes[(start + offset) % nodes.len()])
            .find(|state| state.online.load(Ordering::SeqCst))
            .ok_or_else(RiakError::cluster_offline)
    }

    /// Decides whether a failed attempt is retried. Returns the error to
    /// give up with, or `None` after waiting to retry.
    async fn retry_or_fail(
        &self,
        state: &NodeState,
        err: RiakError,
        attempt: &mut u32,
    ) -> Option<RiakError> {
        if err.node_offline
            && state.node.can_mark_offline()
            && state.online.swap(false, Ordering::SeqCst)
        {
            tracing::warn!(node = state.node.name(), error = %err, "node marked offline");
        }
        if !err.retryable || *attempt >= self.inner.retries {
            return Some(err);
        }
        *attempt += 1;
        tracing::debug!(node = state.node.name(), attempt = *attempt, error = %err, "retrying");
        tokio::time::sleep(self.inner.retry_wait).await;
        None
    }

    /// Runs a command, retrying on other nodes where possible.
    pub async fn execute<C: Command>(&self, command: &mut C) -> RiakResult<()> {
        let mut attempt = 0;
        loop {
            let state = self.select()?;
            match state.node.execute(command).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    if let Some(err) = self.retry_or_fail(state, err, &mut attempt).await {
                        return Err(err);
                    }
                }
            }
        }
    }

    /// Runs a streaming command, retrying on other nodes where possible.
    ///
    /// Each attempt resets the command, so frames from a failed attempt
    /// never reach the result.
    pub async fn execute_streaming<C>(&self, command: &mut C) -> RiakResult<()>
    where
        C: Command,
        C::Response: StreamingResponse,
    {
        let mut attempt = 0;
        loop {
            let state = self.select()?;
            match state.node.execute_streaming(command).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    if let Some(err) = self.retry_or_fail(state, err, &mut attempt).await {
                        return Err(err);
                    }
                }
            }
        }
    }

    /// Runs `f` on a connection, retrying on other nodes where possible.
    pub async fn use_connection<F, Fut, T>(&self, f: F) -> RiakResult<T>
    where
        F: Fn(Arc<Connection>) -> Fut,
        Fut: Future<Output = RiakResult<T>>,
    {
        let mut attempt = 0;
        loop {
            let state = self.select()?;
            match state.node.use_connection(&f).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if let Some(err) = self.retry_or_fail(state, err, &mut attempt).await {
                        return Err(err);
                    }
                }
            }
        }
    }

    /// Sends `request` and streams the responses lazily.
    ///
    /// The connection stays checked out until the stream ends or is
    /// dropped. Only acquiring a connection is retried; failures while
    /// streaming arrive as the stream's last item.
    pub async fn stream<Q, R>(&self, request: Q) -> RiakResult<BoxStream<'static, RiakResult<R>>>
    where
        Q: RiakMessage,
        R: StreamingResponse + Send + 'static,
    {
        let mut attempt = 0;
        loop {
            let state = self.select()?;
            let acquired = state
                .node
                .use_delayed_connection(|connection, release| async {
                    let stream = connection.pb_write_streaming_read(
                        &request,
                        |r: &R| !r.is_done(),
                        move || release.release(),
                    );
                    Ok(stream.boxed())
                })
                .await;
            match acquired {
                Ok(stream) => return Ok(stream),
                Err(err) => {
                    if let Some(err) = self.retry_or_fail(state, err, &mut attempt).await {
                        return Err(err);
                    }
                }
            }
        }
    }

    pub async fn ping(&self) -> RiakResult<()> {
        self.execute(&mut Ping).await
    }

    pub async fn server_info(&self) -> RiakResult<ServerInfo> {
        let mut command = GetServerInfo::new();
        self.execute(&mut command).await?;
        Ok(command.into_info().unwrap_or_default())
    }

    pub async fn list_buckets(&self, bucket_type: Option<&str>) -> RiakResult<Vec<String>> {
        let mut command = ListBuckets::new();
        if let Some(bucket_type) = bucket_type {
            command = command.with_bucket_type(bucket_type);
        }
        self.execute_streaming(&mut command).await?;
        Ok(command.into_buckets())
    }

    pub async fn list_keys(&self, bucket_type: Option<&str>, bucket: &str) -> RiakResult<Vec<Vec<u8>>> {
        let mut command = ListKeys::new(bucket);
        if let Some(bucket_type) = bucket_type {
            command = command.with_bucket_type(bucket_type);
        }
        self.execute_streaming(&mut command).await?;
        Ok(command.into_keys())
    }

    /// Streams the keys of a bucket page by page.
    pub async fn stream_keys(
        &self,
        bucket_type: Option<&str>,
        bucket: &str,
    ) -> RiakResult<BoxStream<'static, RiakResult<Vec<Vec<u8>>>>> {
        let request = ListKeys::new(bucket);
        let request = match bucket_type {
            Some(bucket_type) => request.with_bucket_type(bucket_type),
            None => request,
        };
        let request: RpbListKeysReq = request
            .construct_request()
            .map_err(|e| RiakError::invalid_request(e.to_string()))?;
        let pages = self.stream::<_, RpbListKeysResp>(request).await?;
        Ok(pages.map(|page| page.map(|p| p.keys)).boxed())
    }

    pub async fn ts_get(&self, table: &str, key: Vec<Cell>) -> RiakResult<QueryResult> {
        let mut command = TsGet::new(table, key);
        self.execute(&mut command).await?;
        Ok(command.into_result())
    }

    pub async fn ts_put(&self, table: &str, rows: Vec<Row>) -> RiakResult<()> {
        self.execute(&mut TsPut::new(table, rows)).await
    }

    pub async fn ts_delete(&self, table: &str, key: Vec<Cell>) -> RiakResult<()> {
        self.execute(&mut TsDelete::new(table, key)).await
    }

    pub async fn ts_query(&self, query: &str) -> RiakResult<QueryResult> {
        let mut command = TsQuery::new(query);
        self.execute(&mut command).await?;
        Ok(command.into_result())
    }

    pub async fn ts_list_keys(&self, table: &str) -> RiakResult<Vec<Row>> {
        let mut command = TsListKeys::new(table);
        self.execute_streaming(&mut command).await?;
        Ok(command.into_keys())
    }

    /// Pings every offline node and puts the ones that answer back into
    /// rotation. Returns how many came back.
    pub async fn check_offline_nodes(&self) -> usize {
        let mut recovered = 0;
        for state in &self.inner.nodes {
            if state.online.load(Ordering::SeqCst) {
                continue;
            }
            match state.node.execute(&mut Ping).await {
                Ok(()) => {
                    state.online.store(true, Ordering::SeqCst);
                    recovered += 1;
                    tracing::info!(node = state.node.name(), "node back online");
                }
                Err(err) => {
                    tracing::debug!(node = state.node.name(), error = %err, "node still offline");
                }
            }
        }
        recovered
    }

    /// Runs [`check_offline_nodes`](Self::check_offline_nodes) periodically
    /// until [`shutdown`](Self::shutdown).
    pub fn spawn_health_check(&self) -> JoinHandle<()> {
        let client = self.clone();
        let mut shutdown = self.inner.shutdown.subscribe();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(client.inner.health_check_interval);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        client.check_offline_nodes().await;
                    }
                    _ = shutdown.changed() => break,
                }
                if client.is_shutdown() {
                    break;
                }
            }
            tracing::debug!("health check stopped");
        })
    }

    /// Disposes every node. Later operations fail with `SHUTTING_DOWN`.
    pub fn shutdown(&self) {
        if self.inner.shutdown.send_replace(true) {
            return;
        }
        for state in &self.inner.nodes {
            state.node.dispose();
        }
        tracing::info!("riak client shut down");
    }
}

impl std::fmt::Debug for RiakClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiakClient")
            .field("nodes", &self.inner.nodes.len())
            .field("online", &self.online_nodes())
            .finish()
    }
}
