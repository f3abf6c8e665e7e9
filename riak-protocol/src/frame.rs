//! Binary frame format.
//!
//! Frame layout (5 bytes header + payload):
//!
//! ```text
//! +-----------------+--------+---------------------+
//! | length (BE u32) |  code  | payload             |
//! |     4 bytes     | 1 byte | length - 1 bytes    |
//! +-----------------+--------+---------------------+
//! ```
//!
//! The length counts the code byte, so an empty payload has length 1.

use crate::code::MessageCode;
use crate::error::ProtocolError;
use crate::message::RiakMessage;
use crate::MAX_PAYLOAD_SIZE;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the fixed frame header in bytes (4 + 1 = 5).
pub const FRAME_HEADER_SIZE: usize = 5;

/// The fixed header at the start of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Declared length, including the code byte.
    pub length: u32,
    /// Raw code byte. Not validated until [`FrameHeader::message_code`].
    pub code: u8,
}

impl FrameHeader {
    pub fn parse(raw: &[u8; FRAME_HEADER_SIZE]) -> Self {
        Self {
            length: u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]),
            code: raw[4],
        }
    }

    /// Number of payload bytes that follow the header.
    pub fn payload_len(&self) -> Result<usize, ProtocolError> {
        if self.length == 0 {
            return Err(ProtocolError::InvalidFrameLength(self.length));
        }
        let len = (self.length - 1) as usize;
        if len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: len,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(len)
    }

    pub fn is_error(&self) -> bool {
        self.code == MessageCode::ErrorResp.as_u8()
    }

    pub fn message_code(&self) -> Result<MessageCode, ProtocolError> {
        MessageCode::try_from(self.code)
    }
}

/// Encodes a header-only frame for a message with no payload.
pub fn encode_code(code: MessageCode) -> [u8; FRAME_HEADER_SIZE] {
    let mut out = [0u8; FRAME_HEADER_SIZE];
    out[..4].copy_from_slice(&1u32.to_be_bytes());
    out[4] = code.as_u8();
    out
}

/// Encodes a message into a complete frame.
///
/// The header is reserved up front, the payload serialized after it, and
/// the length and code filled in once the payload size is known.
pub fn encode_message<M: RiakMessage>(message: &M) -> Result<BytesMut, ProtocolError> {
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + message.encoded_len());
    buf.put_bytes(0, FRAME_HEADER_SIZE);
    message.encode_payload(&mut buf)?;

    let payload_len = buf.len() - FRAME_HEADER_SIZE;
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: payload_len,
            max: MAX_PAYLOAD_SIZE,
        });
    }

    buf[..4].copy_from_slice(&((payload_len + 1) as u32).to_be_bytes());
    buf[4] = M::CODE.as_u8();
    Ok(buf)
}

/// A parsed frame with a known message code.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub code: MessageCode,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(code: MessageCode, payload: Bytes) -> Self {
        Self { code, payload }
    }

    /// Encodes the frame into bytes.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        if self.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: self.payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + self.payload.len());
        buf.put_u32(self.payload.len() as u32 + 1);
        buf.put_u8(self.code.as_u8());
        buf.put_slice(&self.payload);
        Ok(buf)
    }

    /// Decodes a frame from bytes.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or `Err` on protocol errors.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let mut raw = [0u8; FRAME_HEADER_SIZE];
        raw.copy_from_slice(&buf[..FRAME_HEADER_SIZE]);
        let header = FrameHeader::parse(&raw);
        let payload_len = header.payload_len()?;

        if buf.len() < FRAME_HEADER_SIZE + payload_len {
            return Ok(None);
        }

        let code = header.message_code()?;
        buf.advance(FRAME_HEADER_SIZE);
        let payload = buf.split_to(payload_len).freeze();

        Ok(Some(Self { code, payload }))
    }
}
