//! Typed message payloads.
//!
//! Each payload type names its own [`MessageCode`], so the mapping between
//! codes and types is fixed at compile time. Protocol buffer messages get
//! their implementation from a macro; the binary term pseudo-message is
//! [`TtbMessage`].

use crate::code::MessageCode;
use crate::error::ProtocolError;
use bytes::{BufMut, Bytes, BytesMut};

/// A payload that can travel inside a frame.
pub trait RiakMessage: Sized {
    /// The frame code this payload is sent and received under.
    const CODE: MessageCode;

    /// Payload size in bytes, used to size the frame buffer.
    fn encoded_len(&self) -> usize;

    /// Appends the payload to `buf`.
    fn encode_payload(&self, buf: &mut BytesMut) -> Result<(), ProtocolError>;

    fn decode_payload(payload: Bytes) -> Result<Self, ProtocolError>;
}

/// A response delivered as a sequence of frames.
pub trait StreamingResponse: RiakMessage {
    /// True on the last frame of the stream.
    fn is_done(&self) -> bool;
}

/// A pre-encoded binary term, written to the wire verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TtbMessage {
    pub payload: Bytes,
}

impl TtbMessage {
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }
}

impl RiakMessage for TtbMessage {
    const CODE: MessageCode = MessageCode::TsTtbMsg;

    fn encoded_len(&self) -> usize {
        self.payload.len()
    }

    fn encode_payload(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_slice(&self.payload);
        Ok(())
    }

    fn decode_payload(payload: Bytes) -> Result<Self, ProtocolError> {
        Ok(Self { payload })
    }
}

/// Implements [`RiakMessage`] for prost message types.
macro_rules! pb_messages {
    ($($ty:ty => $code:ident),* $(,)?) => {
        $(
            impl $crate::message::RiakMessage for $ty {
                const CODE: $crate::code::MessageCode = $crate::code::MessageCode::$code;

                fn encoded_len(&self) -> usize {
                    ::prost::Message::encoded_len(self)
                }

                fn encode_payload(
                    &self,
                    buf: &mut ::bytes::BytesMut,
                ) -> ::std::result::Result<(), $crate::error::ProtocolError> {
                    ::prost::Message::encode(self, buf)?;
                    Ok(())
                }

                fn decode_payload(
                    payload: ::bytes::Bytes,
                ) -> ::std::result::Result<Self, $crate::error::ProtocolError> {
                    Ok(<$ty as ::prost::Message>::decode(payload)?)
                }
            }
        )*
    };
}

/// Implements [`StreamingResponse`] for prost types with an optional `done`
/// field.
macro_rules! pb_streaming {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::message::StreamingResponse for $ty {
                fn is_done(&self) -> bool {
                    self.done.unwrap_or(false)
                }
            }
        )*
    };
}

pub(crate) use pb_messages;
pub(crate) use pb_streaming;
