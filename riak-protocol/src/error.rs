//! Protocol error types.

use crate::code::MessageCode;
use crate::ttb::tag;
use thiserror::Error;

/// Errors raised while reading or writing binary terms.
#[derive(Debug, Error, PartialEq)]
pub enum TermError {
    #[error(
        "wrong tag encountered: expected one of [{}], got {}",
        tag::describe_all(.expected),
        tag::describe(*.actual)
    )]
    WrongTag {
        expected: &'static [u8],
        actual: u8,
    },

    #[error("unexpected end of term: need {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("atom contains a character outside Latin-1: {0:?}")]
    AtomNotLatin1(String),

    #[error("atom too long: {0} bytes (max 65535)")]
    AtomTooLong(usize),

    #[error("integer too large: {0} magnitude bytes (max 8)")]
    BignumTooLarge(usize),

    #[error("integer does not fit in a signed 64-bit value")]
    IntegerOverflow,

    #[error("invalid float: {0:?}")]
    InvalidFloat(String),

    #[error("invalid UTF-8 in binary")]
    InvalidUtf8,

    #[error("unexpected atom: expected {expected}, got {actual}")]
    UnexpectedAtom {
        expected: &'static str,
        actual: String,
    },

    #[error("unexpected arity: expected {expected}, got {actual}")]
    UnexpectedArity { expected: u32, actual: u32 },
}

/// Protocol-level errors that can occur during framing or message handling.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("invalid frame length: {0}")]
    InvalidFrameLength(u32),

    #[error("unknown message code: {0}")]
    UnknownMessageCode(u8),

    #[error("unexpected message code: expected {expected}, got {actual}")]
    UnexpectedMessageCode {
        expected: MessageCode,
        actual: MessageCode,
    },

    #[error("protobuf encode error: {0}")]
    Encode(#[from] prost::EncodeError),

    #[error("protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("term error: {0}")]
    Term(#[from] TermError),
}
