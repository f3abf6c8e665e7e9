//! Search queries and Yokozuna index/schema administration.

use super::riak::RpbPair;
use crate::message::pb_messages;

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbSearchDoc {
    #[prost(message, repeated, tag = "1")]
    pub fields: Vec<RpbPair>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbSearchQueryReq {
    #[prost(bytes = "vec", required, tag = "1")]
    pub q: Vec<u8>,
    #[prost(bytes = "vec", required, tag = "2")]
    pub index: Vec<u8>,
    #[prost(uint32, optional, tag = "3")]
    pub rows: Option<u32>,
    #[prost(uint32, optional, tag = "4")]
    pub start: Option<u32>,
    #[prost(bytes = "vec", optional, tag = "5")]
    pub sort: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "6")]
    pub filter: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "7")]
    pub df: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "8")]
    pub op: Option<Vec<u8>>,
    #[prost(bytes = "vec", repeated, tag = "9")]
    pub fl: Vec<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "10")]
    pub presort: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbSearchQueryResp {
    #[prost(message, repeated, tag = "1")]
    pub docs: Vec<RpbSearchDoc>,
    #[prost(float, optional, tag = "2")]
    pub max_score: Option<f32>,
    #[prost(uint32, optional, tag = "3")]
    pub num_found: Option<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbYokozunaIndex {
    #[prost(bytes = "vec", required, tag = "1")]
    pub name: Vec<u8>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub schema: Option<Vec<u8>>,
    #[prost(uint32, optional, tag = "3")]
    pub n_val: Option<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbYokozunaIndexGetReq {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub name: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbYokozunaIndexGetResp {
    #[prost(message, repeated, tag = "1")]
    pub index: Vec<RpbYokozunaIndex>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbYokozunaIndexPutReq {
    #[prost(message, required, tag = "1")]
    pub index: RpbYokozunaIndex,
    #[prost(uint32, optional, tag = "2")]
    pub timeout: Option<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbYokozunaIndexDeleteReq {
    #[prost(bytes = "vec", required, tag = "1")]
    pub name: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbYokozunaSchema {
    #[prost(bytes = "vec", required, tag = "1")]
    pub name: Vec<u8>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub content: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbYokozunaSchemaPutReq {
    #[prost(message, required, tag = "1")]
    pub schema: RpbYokozunaSchema,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbYokozunaSchemaGetReq {
    #[prost(bytes = "vec", required, tag = "1")]
    pub name: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbYokozunaSchemaGetResp {
    #[prost(message, required, tag = "1")]
    pub schema: RpbYokozunaSchema,
}

pb_messages! {
    RpbSearchQueryReq => SearchQueryReq,
    RpbSearchQueryResp => SearchQueryResp,
    RpbYokozunaIndexGetReq => YokozunaIndexGetReq,
    RpbYokozunaIndexGetResp => YokozunaIndexGetResp,
    RpbYokozunaIndexPutReq => YokozunaIndexPutReq,
    RpbYokozunaIndexDeleteReq => YokozunaIndexDeleteReq,
    RpbYokozunaSchemaGetReq => YokozunaSchemaGetReq,
    RpbYokozunaSchemaGetResp => YokozunaSchemaGetResp,
    RpbYokozunaSchemaPutReq => YokozunaSchemaPutReq,
}
