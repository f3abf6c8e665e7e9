//! Node and key/value commands.

use crate::command::{require_non_blank, Command};
use crate::error::ClientError;
use riak_protocol::pb::kv::{RpbListBucketsReq, RpbListBucketsResp, RpbListKeysReq, RpbListKeysResp};
use riak_protocol::pb::riak::{RpbGetServerInfoReq, RpbGetServerInfoResp, RpbPingReq, RpbPingResp};
use serde::Serialize;

/// Liveness check.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ping;

impl Command for Ping {
    type Request = RpbPingReq;
    type Response = RpbPingResp;

    fn construct_request(&self) -> Result<RpbPingReq, ClientError> {
        Ok(RpbPingReq {})
    }

    fn on_success(&mut self, _response: RpbPingResp) -> Result<(), ClientError> {
        Ok(())
    }
}

/// Node name and version reported by a server.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ServerInfo {
    pub node: String,
    pub server_version: String,
}

#[derive(Debug, Default)]
pub struct GetServerInfo {
    info: Option<ServerInfo>,
}

impl GetServerInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&self) -> Option<&ServerInfo> {
        self.info.as_ref()
    }

    pub fn into_info(self) -> Option<ServerInfo> {
        self.info
    }
}

impl Command for GetServerInfo {
    type Request = RpbGetServerInfoReq;
    type Response = RpbGetServerInfoResp;

    fn construct_request(&self) -> Result<RpbGetServerInfoReq, ClientError> {
        Ok(RpbGetServerInfoReq {})
    }

    fn on_success(&mut self, response: RpbGetServerInfoResp) -> Result<(), ClientError> {
        let text = |v: Option<Vec<u8>>| v.map(|b| String::from_utf8_lossy(&b).into_owned()).unwrap_or_default();
        self.info = Some(ServerInfo {
            node: text(response.node),
            server_version: text(response.server_version),
        });
        Ok(())
    }
}

/// Streams the bucket names of a bucket type.
#[derive(Debug, Default)]
pub struct ListBuckets {
    bucket_type: Option<String>,
    timeout: Option<u32>,
    buckets: Vec<String>,
}

impl ListBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bucket_type(mut self, bucket_type: impl Into<String>) -> Self {
        self.bucket_type = Some(bucket_type.into());
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u32) -> Self {
        self.timeout = Some(timeout_ms);
        self
    }

    pub fn buckets(&self) -> &[String] {
        &self.buckets
    }

    pub fn into_buckets(self) -> Vec<String> {
        self.buckets
    }
}

impl Command for ListBuckets {
    type Request = RpbListBucketsReq;
    type Response = RpbListBucketsResp;

    fn construct_request(&self) -> Result<RpbListBucketsReq, ClientError> {
        if let Some(bucket_type) = &self.bucket_type {
            require_non_blank("bucket type", bucket_type)?;
        }
        Ok(RpbListBucketsReq {
            timeout: self.timeout,
            stream: Some(true),
            r#type: self.bucket_type.as_ref().map(|t| t.as_bytes().to_vec()),
        })
    }

    fn on_success(&mut self, response: RpbListBucketsResp) -> Result<(), ClientError> {
        self.buckets.extend(
            response
                .buckets
                .into_iter()
                .map(|b| String::from_utf8_lossy(&b).into_owned()),
        );
        Ok(())
    }

    fn reset(&mut self) {
        self.buckets.clear();
    }
}

/// Streams the keys of a bucket.
#[derive(Debug)]
pub struct ListKeys {
    bucket_type: Option<String>,
    bucket: String,
    timeout: Option<u32>,
    keys: Vec<Vec<u8>>,
}

impl ListKeys {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket_type: None,
            bucket: bucket.into(),
            timeout: None,
            keys: Vec::new(),
        }
    }

    pub fn with_bucket_type(mut self, bucket_type: impl Into<String>) -> Self {
        self.bucket_type = Some(bucket_type.into());
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u32) -> Self {
        self.timeout = Some(timeout_ms);
        self
    }

    pub fn keys(&self) -> &[Vec<u8>] {
        &self.keys
    }

    pub fn into_keys(self) -> Vec<Vec<u8>> {
        self.keys
    }
}

impl Command for ListKeys {
    type Request = RpbListKeysReq;
    type Response = RpbListKeysResp;

    fn construct_request(&self) -> Result<RpbListKeysReq, ClientError> {
        require_non_blank("bucket", &self.bucket)?;
        if let Some(bucket_type) = &self.bucket_type {
            require_non_blank("bucket type", bucket_type)?;
        }
        Ok(RpbListKeysReq {
            bucket: self.bucket.as_bytes().to_vec(),
            timeout: self.timeout,
            r#type: self.bucket_type.as_ref().map(|t| t.as_bytes().to_vec()),
        })
    }

    fn on_success(&mut self, response: RpbListKeysResp) -> Result<(), ClientError> {
        self.keys.extend(response.keys);
        Ok(())
    }

    fn reset(&mut self) {
        self.keys.clear();
    }
}
