//! Time series messages.

use super::riak::RpbPair;
use crate::message::{pb_messages, pb_streaming, StreamingResponse};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum TsColumnType {
    Varchar = 0,
    Sint64 = 1,
    Double = 2,
    Timestamp = 3,
    Boolean = 4,
    Blob = 5,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TsColumnDescription {
    #[prost(bytes = "vec", required, tag = "1")]
    pub name: Vec<u8>,
    #[prost(enumeration = "TsColumnType", required, tag = "2")]
    pub r#type: i32,
}

/// One cell. At most one field is set; none set means null.
#[derive(Clone, PartialEq, prost::Message)]
pub struct TsCell {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub varchar_value: Option<Vec<u8>>,
    #[prost(sint64, optional, tag = "2")]
    pub sint64_value: Option<i64>,
    #[prost(sint64, optional, tag = "3")]
    pub timestamp_value: Option<i64>,
    #[prost(bool, optional, tag = "4")]
    pub boolean_value: Option<bool>,
    #[prost(double, optional, tag = "5")]
    pub double_value: Option<f64>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TsRow {
    #[prost(message, repeated, tag = "1")]
    pub cells: Vec<TsCell>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TsInterpolation {
    #[prost(bytes = "vec", required, tag = "1")]
    pub base: Vec<u8>,
    #[prost(message, repeated, tag = "2")]
    pub interpolations: Vec<RpbPair>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TsQueryReq {
    #[prost(message, optional, tag = "1")]
    pub query: Option<TsInterpolation>,
    #[prost(bool, optional, tag = "2", default = "false")]
    pub stream: Option<bool>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub cover_context: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TsQueryResp {
    #[prost(message, repeated, tag = "1")]
    pub columns: Vec<TsColumnDescription>,
    #[prost(message, repeated, tag = "2")]
    pub rows: Vec<TsRow>,
    #[prost(bool, optional, tag = "3", default = "true")]
    pub done: Option<bool>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TsGetReq {
    #[prost(bytes = "vec", required, tag = "1")]
    pub table: Vec<u8>,
    #[prost(message, repeated, tag = "2")]
    pub key: Vec<TsCell>,
    #[prost(uint32, optional, tag = "3")]
    pub timeout: Option<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TsGetResp {
    #[prost(message, repeated, tag = "1")]
    pub columns: Vec<TsColumnDescription>,
    #[prost(message, repeated, tag = "2")]
    pub rows: Vec<TsRow>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TsPutReq {
    #[prost(bytes = "vec", required, tag = "1")]
    pub table: Vec<u8>,
    #[prost(message, repeated, tag = "2")]
    pub columns: Vec<TsColumnDescription>,
    #[prost(message, repeated, tag = "3")]
    pub rows: Vec<TsRow>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TsPutResp {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TsDelReq {
    #[prost(bytes = "vec", required, tag = "1")]
    pub table: Vec<u8>,
    #[prost(message, repeated, tag = "2")]
    pub key: Vec<TsCell>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub vclock: Option<Vec<u8>>,
    #[prost(uint32, optional, tag = "4")]
    pub timeout: Option<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TsDelResp {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TsListKeysReq {
    #[prost(bytes = "vec", required, tag = "1")]
    pub table: Vec<u8>,
    #[prost(uint32, optional, tag = "2")]
    pub timeout: Option<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TsListKeysResp {
    #[prost(message, repeated, tag = "1")]
    pub keys: Vec<TsRow>,
    #[prost(bool, optional, tag = "2")]
    pub done: Option<bool>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TsRange {
    #[prost(bytes = "vec", required, tag = "1")]
    pub field_name: Vec<u8>,
    #[prost(sint64, required, tag = "2")]
    pub lower_bound: i64,
    #[prost(bool, required, tag = "3")]
    pub lower_bound_inclusive: bool,
    #[prost(sint64, required, tag = "4")]
    pub upper_bound: i64,
    #[prost(bool, required, tag = "5")]
    pub upper_bound_inclusive: bool,
    #[prost(bytes = "vec", required, tag = "6")]
    pub desc: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TsCoverageEntry {
    #[prost(bytes = "vec", required, tag = "1")]
    pub ip: Vec<u8>,
    #[prost(uint32, required, tag = "2")]
    pub port: u32,
    #[prost(bytes = "vec", required, tag = "3")]
    pub cover_context: Vec<u8>,
    #[prost(message, optional, tag = "4")]
    pub range: Option<TsRange>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TsCoverageReq {
    #[prost(message, optional, tag = "1")]
    pub query: Option<TsInterpolation>,
    #[prost(bytes = "vec", required, tag = "2")]
    pub table: Vec<u8>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub replace_cover: Option<Vec<u8>>,
    #[prost(bytes = "vec", repeated, tag = "4")]
    pub unavailable_cover: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TsCoverageResp {
    #[prost(message, repeated, tag = "1")]
    pub entries: Vec<TsCoverageEntry>,
}

pb_messages! {
    TsQueryReq => TsQueryReq,
    TsQueryResp => TsQueryResp,
    TsPutReq => TsPutReq,
    TsPutResp => TsPutResp,
    TsDelReq => TsDelReq,
    TsDelResp => TsDelResp,
    TsGetReq => TsGetReq,
    TsGetResp => TsGetResp,
    TsListKeysReq => TsListKeysReq,
    TsListKeysResp => TsListKeysResp,
    TsCoverageReq => TsCoverageReq,
    TsCoverageResp => TsCoverageResp,
    TsCoverageEntry => TsCoverageEntry,
    TsRange => TsRange,
}

pb_streaming! {
    TsListKeysResp,
}

// A query response without the flag is a complete, single-frame result.
impl StreamingResponse for TsQueryResp {
    fn is_done(&self) -> bool {
        self.done.unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RiakMessage;
    use bytes::Bytes;

    #[test]
    fn test_query_resp_done_defaults_true() {
        let resp = TsQueryResp::decode_payload(Bytes::new()).unwrap();
        assert!(resp.is_done());

        let partial = TsQueryResp {
            done: Some(false),
            ..Default::default()
        };
        assert!(!partial.is_done());
    }

    #[test]
    fn test_list_keys_done_defaults_false() {
        let resp = TsListKeysResp::decode_payload(Bytes::new()).unwrap();
        assert!(!resp.is_done());
    }
}
