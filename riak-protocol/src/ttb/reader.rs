use super::tag;
use crate::error::TermError;
use bytes::{Buf, Bytes};

/// Atoms longer than this are cut short when read.
const MAX_ATOM_LENGTH: usize = 255;

/// Reads a binary term from a byte buffer.
///
/// Every read that consumes a tag skips a leading version byte, so callers
/// never have to special-case the start of a term.
#[derive(Debug, Clone)]
pub struct TermReader {
    buf: Bytes,
}

impl TermReader {
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<(), TermError> {
        if self.buf.remaining() < needed {
            return Err(TermError::UnexpectedEof {
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    pub fn read1(&mut self) -> Result<u8, TermError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read2_be(&mut self) -> Result<u16, TermError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16())
    }

    pub fn read4_be(&mut self) -> Result<u32, TermError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    /// Reads an `n`-byte big-endian unsigned value, `n <= 8`.
    pub fn read_be(&mut self, n: usize) -> Result<u64, TermError> {
        if n > 8 {
            return Err(TermError::BignumTooLarge(n));
        }
        self.ensure(n)?;
        Ok(self.buf.get_uint(n))
    }

    fn read_bytes(&mut self, n: usize) -> Result<Bytes, TermError> {
        self.ensure(n)?;
        Ok(self.buf.split_to(n))
    }

    /// Returns the next tag without consuming it. A version byte is skipped.
    pub fn peek_tag(&mut self) -> Result<u8, TermError> {
        self.skip_version();
        self.ensure(1)?;
        Ok(self.buf[0])
    }

    fn skip_version(&mut self) {
        if self.buf.first() == Some(&tag::VERSION) {
            self.buf.advance(1);
        }
    }

    fn read_tag(&mut self, expected: &'static [u8]) -> Result<u8, TermError> {
        self.skip_version();
        let actual = self.read1()?;
        if !expected.contains(&actual) {
            return Err(TermError::WrongTag { expected, actual });
        }
        Ok(actual)
    }

    /// Reads an atom. Names longer than 255 bytes are truncated.
    pub fn read_atom(&mut self) -> Result<String, TermError> {
        let t = self.read_tag(tag::ATOMS)?;
        let len = match t {
            tag::SMALL_ATOM | tag::SMALL_ATOM_UTF8 => self.read1()? as usize,
            _ => self.read2_be()? as usize,
        };
        let raw = self.read_bytes(len)?;
        let raw = &raw[..len.min(MAX_ATOM_LENGTH)];

        match t {
            tag::ATOM_UTF8 | tag::SMALL_ATOM_UTF8 => {
                Ok(String::from_utf8_lossy(raw).into_owned())
            }
            _ => Ok(raw.iter().map(|b| *b as char).collect()),
        }
    }

    pub fn read_binary(&mut self) -> Result<Bytes, TermError> {
        self.read_tag(&[tag::BINARY])?;
        let len = self.read4_be()? as usize;
        self.read_bytes(len)
    }

    pub fn read_binary_as_string(&mut self) -> Result<String, TermError> {
        let raw = self.read_binary()?;
        String::from_utf8(raw.to_vec()).map_err(|_| TermError::InvalidUtf8)
    }

    pub fn read_boolean(&mut self) -> Result<bool, TermError> {
        match self.read_atom()?.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(TermError::UnexpectedAtom {
                expected: "true or false",
                actual: other.to_string(),
            }),
        }
    }

    pub fn read_double(&mut self) -> Result<f64, TermError> {
        match self.read_tag(tag::FLOATS)? {
            tag::NEW_FLOAT => {
                self.ensure(8)?;
                Ok(f64::from_bits(self.buf.get_u64()))
            }
            _ => {
                let raw = self.read_bytes(tag::FLOAT_LENGTH)?;
                let text = String::from_utf8_lossy(&raw);
                let text = text.trim_end_matches('\0').trim();
                text.parse::<f64>()
                    .map_err(|_| TermError::InvalidFloat(text.to_string()))
            }
        }
    }

    /// Reads any integer representation into an `i64`.
    pub fn read_long(&mut self) -> Result<i64, TermError> {
        let t = self.read_tag(tag::INTEGERS)?;
        match t {
            tag::SMALL_INTEGER => Ok(self.read1()? as i64),
            tag::INTEGER => Ok(self.read4_be()? as i32 as i64),
            _ => {
                let arity = if t == tag::SMALL_BIG {
                    self.read1()? as usize
                } else {
                    self.read4_be()? as usize
                };
                if arity > 8 {
                    return Err(TermError::BignumTooLarge(arity));
                }
                let negative = self.read1()? != 0;
                let raw = self.read_bytes(arity)?;
                let magnitude = raw
                    .iter()
                    .rev()
                    .fold(0u64, |acc, b| (acc << 8) | *b as u64);

                if negative {
                    if magnitude > i64::MIN.unsigned_abs() {
                        return Err(TermError::IntegerOverflow);
                    }
                    Ok((magnitude as i64).wrapping_neg())
                } else {
                    i64::try_from(magnitude).map_err(|_| TermError::IntegerOverflow)
                }
            }
        }
    }

    /// Reads a list head and returns its arity. Nil reads as zero.
    pub fn read_list_head(&mut self) -> Result<u32, TermError> {
        match self.read_tag(tag::LISTS)? {
            tag::NIL => Ok(0),
            _ => self.read4_be(),
        }
    }

    pub fn read_tuple_head(&mut self) -> Result<u32, TermError> {
        match self.read_tag(tag::TUPLES)? {
            tag::SMALL_TUPLE => Ok(self.read1()? as u32),
            _ => self.read4_be(),
        }
    }

    pub fn read_nil(&mut self) -> Result<(), TermError> {
        self.read_tag(&[tag::NIL])?;
        Ok(())
    }

    /// Reads a tuple head that must have exactly `arity` elements.
    pub fn expect_tuple(&mut self, arity: u32) -> Result<(), TermError> {
        let actual = self.read_tuple_head()?;
        if actual != arity {
            return Err(TermError::UnexpectedArity {
                expected: arity,
                actual,
            });
        }
        Ok(())
    }

    /// Reads an atom that must equal `name`.
    pub fn expect_atom(&mut self, name: &'static str) -> Result<(), TermError> {
        let actual = self.read_atom()?;
        if actual != name {
            return Err(TermError::UnexpectedAtom {
                expected: name,
                actual,
            });
        }
        Ok(())
    }
}
