//! Key/value messages: objects, listing, secondary indexes, counters,
//! coverage, map/reduce.

use super::riak::RpbPair;
use crate::message::{pb_messages, pb_streaming};

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbGetClientIdReq {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbGetClientIdResp {
    #[prost(bytes = "vec", required, tag = "1")]
    pub client_id: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbSetClientIdReq {
    #[prost(bytes = "vec", required, tag = "1")]
    pub client_id: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbSetClientIdResp {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbLink {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub bucket: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub key: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub tag: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbContent {
    #[prost(bytes = "vec", required, tag = "1")]
    pub value: Vec<u8>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub content_type: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub charset: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "4")]
    pub content_encoding: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "5")]
    pub vtag: Option<Vec<u8>>,
    #[prost(message, repeated, tag = "6")]
    pub links: Vec<RpbLink>,
    #[prost(uint32, optional, tag = "7")]
    pub last_mod: Option<u32>,
    #[prost(uint32, optional, tag = "8")]
    pub last_mod_usecs: Option<u32>,
    #[prost(message, repeated, tag = "9")]
    pub usermeta: Vec<RpbPair>,
    #[prost(message, repeated, tag = "10")]
    pub indexes: Vec<RpbPair>,
    #[prost(bool, optional, tag = "11")]
    pub deleted: Option<bool>,
    #[prost(uint32, optional, tag = "12")]
    pub ttl: Option<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbGetReq {
    #[prost(bytes = "vec", required, tag = "1")]
    pub bucket: Vec<u8>,
    #[prost(bytes = "vec", required, tag = "2")]
    pub key: Vec<u8>,
    #[prost(uint32, optional, tag = "3")]
    pub r: Option<u32>,
    #[prost(uint32, optional, tag = "4")]
    pub pr: Option<u32>,
    #[prost(bool, optional, tag = "5")]
    pub basic_quorum: Option<bool>,
    #[prost(bool, optional, tag = "6")]
    pub notfound_ok: Option<bool>,
    #[prost(bytes = "vec", optional, tag = "7")]
    pub if_modified: Option<Vec<u8>>,
    #[prost(bool, optional, tag = "8")]
    pub head: Option<bool>,
    #[prost(bool, optional, tag = "9")]
    pub deletedvclock: Option<bool>,
    #[prost(uint32, optional, tag = "10")]
    pub timeout: Option<u32>,
    #[prost(bool, optional, tag = "11")]
    pub sloppy_quorum: Option<bool>,
    #[prost(uint32, optional, tag = "12")]
    pub n_val: Option<u32>,
    #[prost(bytes = "vec", optional, tag = "13")]
    pub r#type: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbGetResp {
    #[prost(message, repeated, tag = "1")]
    pub content: Vec<RpbContent>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub vclock: Option<Vec<u8>>,
    #[prost(bool, optional, tag = "3")]
    pub unchanged: Option<bool>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbPutReq {
    #[prost(bytes = "vec", required, tag = "1")]
    pub bucket: Vec<u8>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub key: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub vclock: Option<Vec<u8>>,
    #[prost(message, required, tag = "4")]
    pub content: RpbContent,
    #[prost(uint32, optional, tag = "5")]
    pub w: Option<u32>,
    #[prost(uint32, optional, tag = "6")]
    pub dw: Option<u32>,
    #[prost(bool, optional, tag = "7")]
    pub return_body: Option<bool>,
    #[prost(uint32, optional, tag = "8")]
    pub pw: Option<u32>,
    #[prost(bool, optional, tag = "9")]
    pub if_not_modified: Option<bool>,
    #[prost(bool, optional, tag = "10")]
    pub if_none_match: Option<bool>,
    #[prost(bool, optional, tag = "11")]
    pub return_head: Option<bool>,
    #[prost(uint32, optional, tag = "12")]
    pub timeout: Option<u32>,
    #[prost(bool, optional, tag = "13")]
    pub asis: Option<bool>,
    #[prost(bool, optional, tag = "14")]
    pub sloppy_quorum: Option<bool>,
    #[prost(uint32, optional, tag = "15")]
    pub n_val: Option<u32>,
    #[prost(bytes = "vec", optional, tag = "16")]
    pub r#type: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbPutResp {
    #[prost(message, repeated, tag = "1")]
    pub content: Vec<RpbContent>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub vclock: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub key: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbDelReq {
    #[prost(bytes = "vec", required, tag = "1")]
    pub bucket: Vec<u8>,
    #[prost(bytes = "vec", required, tag = "2")]
    pub key: Vec<u8>,
    #[prost(uint32, optional, tag = "3")]
    pub rw: Option<u32>,
    #[prost(bytes = "vec", optional, tag = "4")]
    pub vclock: Option<Vec<u8>>,
    #[prost(uint32, optional, tag = "5")]
    pub r: Option<u32>,
    #[prost(uint32, optional, tag = "6")]
    pub w: Option<u32>,
    #[prost(uint32, optional, tag = "7")]
    pub pr: Option<u32>,
    #[prost(uint32, optional, tag = "8")]
    pub pw: Option<u32>,
    #[prost(uint32, optional, tag = "9")]
    pub dw: Option<u32>,
    #[prost(uint32, optional, tag = "10")]
    pub timeout: Option<u32>,
    #[prost(bool, optional, tag = "11")]
    pub sloppy_quorum: Option<bool>,
    #[prost(uint32, optional, tag = "12")]
    pub n_val: Option<u32>,
    #[prost(bytes = "vec", optional, tag = "13")]
    pub r#type: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbDelResp {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbListBucketsReq {
    #[prost(uint32, optional, tag = "1")]
    pub timeout: Option<u32>,
    #[prost(bool, optional, tag = "2")]
    pub stream: Option<bool>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub r#type: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbListBucketsResp {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub buckets: Vec<Vec<u8>>,
    #[prost(bool, optional, tag = "2")]
    pub done: Option<bool>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbListKeysReq {
    #[prost(bytes = "vec", required, tag = "1")]
    pub bucket: Vec<u8>,
    #[prost(uint32, optional, tag = "2")]
    pub timeout: Option<u32>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub r#type: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbListKeysResp {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub keys: Vec<Vec<u8>>,
    #[prost(bool, optional, tag = "2")]
    pub done: Option<bool>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbMapRedReq {
    #[prost(bytes = "vec", required, tag = "1")]
    pub request: Vec<u8>,
    #[prost(bytes = "vec", required, tag = "2")]
    pub content_type: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbMapRedResp {
    #[prost(uint32, optional, tag = "1")]
    pub phase: Option<u32>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub response: Option<Vec<u8>>,
    #[prost(bool, optional, tag = "3")]
    pub done: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum IndexQueryType {
    Eq = 0,
    Range = 1,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbIndexReq {
    #[prost(bytes = "vec", required, tag = "1")]
    pub bucket: Vec<u8>,
    #[prost(bytes = "vec", required, tag = "2")]
    pub index: Vec<u8>,
    #[prost(enumeration = "IndexQueryType", required, tag = "3")]
    pub qtype: i32,
    #[prost(bytes = "vec", optional, tag = "4")]
    pub key: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "5")]
    pub range_min: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "6")]
    pub range_max: Option<Vec<u8>>,
    #[prost(bool, optional, tag = "7")]
    pub return_terms: Option<bool>,
    #[prost(bool, optional, tag = "8")]
    pub stream: Option<bool>,
    #[prost(uint32, optional, tag = "9")]
    pub max_results: Option<u32>,
    #[prost(bytes = "vec", optional, tag = "10")]
    pub continuation: Option<Vec<u8>>,
    #[prost(uint32, optional, tag = "11")]
    pub timeout: Option<u32>,
    #[prost(bytes = "vec", optional, tag = "12")]
    pub r#type: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "13")]
    pub term_regex: Option<Vec<u8>>,
    #[prost(bool, optional, tag = "14")]
    pub pagination_sort: Option<bool>,
    #[prost(bytes = "vec", optional, tag = "15")]
    pub cover_context: Option<Vec<u8>>,
    #[prost(bool, optional, tag = "16")]
    pub return_body: Option<bool>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbIndexResp {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub keys: Vec<Vec<u8>>,
    #[prost(message, repeated, tag = "2")]
    pub results: Vec<RpbPair>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub continuation: Option<Vec<u8>>,
    #[prost(bool, optional, tag = "4")]
    pub done: Option<bool>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbIndexObject {
    #[prost(bytes = "vec", required, tag = "1")]
    pub key: Vec<u8>,
    #[prost(message, required, tag = "2")]
    pub object: RpbGetResp,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbIndexBodyResp {
    #[prost(message, repeated, tag = "1")]
    pub objects: Vec<RpbIndexObject>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub continuation: Option<Vec<u8>>,
    #[prost(bool, optional, tag = "3")]
    pub done: Option<bool>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbCsBucketReq {
    #[prost(bytes = "vec", required, tag = "1")]
    pub bucket: Vec<u8>,
    #[prost(bytes = "vec", required, tag = "2")]
    pub start_key: Vec<u8>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub end_key: Option<Vec<u8>>,
    #[prost(bool, optional, tag = "4")]
    pub start_incl: Option<bool>,
    #[prost(bool, optional, tag = "5")]
    pub end_incl: Option<bool>,
    #[prost(bytes = "vec", optional, tag = "6")]
    pub continuation: Option<Vec<u8>>,
    #[prost(uint32, optional, tag = "7")]
    pub max_results: Option<u32>,
    #[prost(uint32, optional, tag = "8")]
    pub timeout: Option<u32>,
    #[prost(bytes = "vec", optional, tag = "9")]
    pub r#type: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "10")]
    pub cover_context: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbCsBucketResp {
    #[prost(message, repeated, tag = "1")]
    pub objects: Vec<RpbIndexObject>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub continuation: Option<Vec<u8>>,
    #[prost(bool, optional, tag = "3")]
    pub done: Option<bool>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbCounterUpdateReq {
    #[prost(bytes = "vec", required, tag = "1")]
    pub bucket: Vec<u8>,
    #[prost(bytes = "vec", required, tag = "2")]
    pub key: Vec<u8>,
    #[prost(sint64, required, tag = "3")]
    pub amount: i64,
    #[prost(uint32, optional, tag = "4")]
    pub w: Option<u32>,
    #[prost(uint32, optional, tag = "5")]
    pub dw: Option<u32>,
    #[prost(uint32, optional, tag = "6")]
    pub pw: Option<u32>,
    #[prost(bool, optional, tag = "7")]
    pub returnvalue: Option<bool>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbCounterUpdateResp {
    #[prost(sint64, optional, tag = "1")]
    pub value: Option<i64>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbCounterGetReq {
    #[prost(bytes = "vec", required, tag = "1")]
    pub bucket: Vec<u8>,
    #[prost(bytes = "vec", required, tag = "2")]
    pub key: Vec<u8>,
    #[prost(uint32, optional, tag = "3")]
    pub r: Option<u32>,
    #[prost(uint32, optional, tag = "4")]
    pub pr: Option<u32>,
    #[prost(bool, optional, tag = "5")]
    pub basic_quorum: Option<bool>,
    #[prost(bool, optional, tag = "6")]
    pub notfound_ok: Option<bool>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbCounterGetResp {
    #[prost(sint64, optional, tag = "1")]
    pub value: Option<i64>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbGetBucketKeyPreflistReq {
    #[prost(bytes = "vec", required, tag = "1")]
    pub bucket: Vec<u8>,
    #[prost(bytes = "vec", required, tag = "2")]
    pub key: Vec<u8>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub r#type: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbBucketKeyPreflistItem {
    #[prost(int64, required, tag = "1")]
    pub partition: i64,
    #[prost(bytes = "vec", required, tag = "2")]
    pub node: Vec<u8>,
    #[prost(bool, required, tag = "3")]
    pub primary: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbGetBucketKeyPreflistResp {
    #[prost(message, repeated, tag = "1")]
    pub preflist: Vec<RpbBucketKeyPreflistItem>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbCoverageReq {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub r#type: Option<Vec<u8>>,
    #[prost(bytes = "vec", required, tag = "2")]
    pub bucket: Vec<u8>,
    #[prost(uint32, optional, tag = "3")]
    pub min_partitions: Option<u32>,
    #[prost(bytes = "vec", optional, tag = "4")]
    pub replace_cover: Option<Vec<u8>>,
    #[prost(bytes = "vec", repeated, tag = "5")]
    pub unavailable_cover: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbCoverageEntry {
    #[prost(bytes = "vec", required, tag = "1")]
    pub ip: Vec<u8>,
    #[prost(uint32, required, tag = "2")]
    pub port: u32,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub keyspace_desc: Option<Vec<u8>>,
    #[prost(bytes = "vec", required, tag = "4")]
    pub cover_context: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbCoverageResp {
    #[prost(message, repeated, tag = "1")]
    pub entries: Vec<RpbCoverageEntry>,
}

pb_messages! {
    RpbGetClientIdReq => GetClientIdReq,
    RpbGetClientIdResp => GetClientIdResp,
    RpbSetClientIdReq => SetClientIdReq,
    RpbSetClientIdResp => SetClientIdResp,
    RpbGetReq => GetReq,
    RpbGetResp => GetResp,
    RpbPutReq => PutReq,
    RpbPutResp => PutResp,
    RpbDelReq => DelReq,
    RpbDelResp => DelResp,
    RpbListBucketsReq => ListBucketsReq,
    RpbListBucketsResp => ListBucketsResp,
    RpbListKeysReq => ListKeysReq,
    RpbListKeysResp => ListKeysResp,
    RpbMapRedReq => MapRedReq,
    RpbMapRedResp => MapRedResp,
    RpbIndexReq => IndexReq,
    RpbIndexResp => IndexResp,
    RpbIndexBodyResp => IndexBodyResp,
    RpbCsBucketReq => CsBucketReq,
    RpbCsBucketResp => CsBucketResp,
    RpbCounterUpdateReq => CounterUpdateReq,
    RpbCounterUpdateResp => CounterUpdateResp,
    RpbCounterGetReq => CounterGetReq,
    RpbCounterGetResp => CounterGetResp,
    RpbGetBucketKeyPreflistReq => GetBucketKeyPreflistReq,
    RpbGetBucketKeyPreflistResp => GetBucketKeyPreflistResp,
    RpbCoverageReq => CoverageReq,
    RpbCoverageResp => CoverageResp,
}

pb_streaming! {
    RpbListBucketsResp,
    RpbListKeysResp,
    RpbMapRedResp,
    RpbIndexResp,
    RpbIndexBodyResp,
    RpbCsBucketResp,
}
