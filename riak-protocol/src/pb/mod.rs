//! Protocol buffer payloads.
//!
//! Hand-written prost definitions mirroring the Riak `.proto` files. Every
//! request and response type is bound to exactly one [`MessageCode`].
//!
//! [`MessageCode`]: crate::code::MessageCode

pub mod dt;
pub mod kv;
pub mod riak;
pub mod search;
pub mod ts;
