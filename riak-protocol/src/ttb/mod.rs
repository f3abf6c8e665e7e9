//! Binary term encoding.
//!
//! A subset of the Erlang external term format used by the time series fast
//! path. [`TermWriter`] builds a term into a growable buffer and
//! [`TermReader`] walks one back out, validating every tag it consumes.

mod reader;
pub mod tag;
mod writer;

pub use reader::TermReader;
pub use writer::TermWriter;

/// Atom `undefined`.
pub const UNDEFINED: &str = "undefined";
