//! # riak-client
//!
//! Client library for Riak.
//!
//! This crate provides:
//! - Framed sockets with optional StartTLS and authentication
//! - Connections that classify every failure for retry decisions
//! - Fixed-size pools or per-operation connections per node
//! - A cluster client with round-robin, retries and node health checks

pub mod client;
pub mod command;
pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod manager;
pub mod node;
pub mod socket;
pub mod stream;
pub mod tls;

#[cfg(test)]
mod test_server;

pub use client::RiakClient;
pub use command::Command;
pub use config::{AuthConfig, ClusterConfig, ConfigError, NodeConfig};
pub use connection::{Connection, ConnectionFactory};
pub use error::{ClientError, ResultCode, RiakError, RiakResult};
pub use manager::{ConnectionManager, Release};
pub use node::Node;
