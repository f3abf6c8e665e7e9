//! # riak-protocol
//!
//! Wire protocol implementation for the Riak protocol buffers interface.
//!
//! This crate provides:
//! - Length-prefixed framing with a one-byte message code
//! - The message code table and the typed payloads bound to each code
//! - A binary term encoder/decoder for the time series fast path
//! - Time series values and their term layout

pub mod code;
pub mod error;
pub mod frame;
pub mod message;
pub mod pb;
pub mod timeseries;
pub mod ttb;

pub use code::MessageCode;
pub use error::{ProtocolError, TermError};
pub use frame::{encode_code, encode_message, Frame, FrameHeader, FRAME_HEADER_SIZE};
pub use message::{RiakMessage, StreamingResponse, TtbMessage};
pub use timeseries::{Cell, Column, ColumnType, QueryResult, Row};

/// Default port for the Riak protocol buffers listener.
pub const DEFAULT_PORT: u16 = 8087;

/// Maximum frame payload size (256 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 256 * 1024 * 1024;
