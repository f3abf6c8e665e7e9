//! Built-in commands.

mod kv;
mod ts;

pub use kv::{GetServerInfo, ListBuckets, ListKeys, Ping, ServerInfo};
pub use ts::{TsDelete, TsGet, TsListKeys, TsPut, TsQuery};
