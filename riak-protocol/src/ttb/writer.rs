use super::tag;
use crate::error::TermError;
use bytes::{BufMut, Bytes, BytesMut};

/// Builds a binary term into a growable buffer.
///
/// Compound terms are written head first: call [`write_tuple_head`] or
/// [`write_list_head`] with the arity, then write that many elements. A
/// non-empty list must be closed with [`write_nil`].
///
/// [`write_tuple_head`]: TermWriter::write_tuple_head
/// [`write_list_head`]: TermWriter::write_list_head
/// [`write_nil`]: TermWriter::write_nil
#[derive(Debug, Default)]
pub struct TermWriter {
    buf: BytesMut,
}

impl TermWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a writer that has already emitted the version byte.
    pub fn with_version() -> Self {
        let mut writer = Self::new();
        writer.write_version();
        writer
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }

    pub fn write_version(&mut self) {
        self.buf.put_u8(tag::VERSION);
    }

    /// Writes an atom as Latin-1 with a 2-byte length.
    pub fn write_atom(&mut self, name: &str) -> Result<(), TermError> {
        let mut latin1 = Vec::with_capacity(name.len());
        for ch in name.chars() {
            let code = ch as u32;
            if code > 0xFF {
                return Err(TermError::AtomNotLatin1(name.to_string()));
            }
            latin1.push(code as u8);
        }
        if latin1.len() > u16::MAX as usize {
            return Err(TermError::AtomTooLong(latin1.len()));
        }

        self.buf.put_u8(tag::ATOM);
        self.buf.put_u16(latin1.len() as u16);
        self.buf.put_slice(&latin1);
        Ok(())
    }

    pub fn write_binary(&mut self, data: &[u8]) {
        self.buf.put_u8(tag::BINARY);
        self.buf.put_u32(data.len() as u32);
        self.buf.put_slice(data);
    }

    /// Writes the UTF-8 encoding of `value` as a binary.
    pub fn write_string_as_binary(&mut self, value: &str) {
        self.write_binary(value.as_bytes());
    }

    /// Writes `true` or `false` right after the atom tag with no length
    /// prefix. The server expects exactly these bytes.
    pub fn write_boolean(&mut self, value: bool) {
        self.buf.put_u8(tag::ATOM);
        if value {
            self.buf.put_slice(b"true");
        } else {
            self.buf.put_slice(b"false");
        }
    }

    /// Writes an integer in its smallest representation.
    pub fn write_long(&mut self, value: i64) {
        if (0..=255).contains(&value) {
            self.buf.put_u8(tag::SMALL_INTEGER);
            self.buf.put_u8(value as u8);
        } else if (i32::MIN as i64..=i32::MAX as i64).contains(&value) {
            self.buf.put_u8(tag::INTEGER);
            self.buf.put_i32(value as i32);
        } else {
            let magnitude = value.unsigned_abs().to_le_bytes();
            let used = 8 - magnitude.iter().rev().take_while(|b| **b == 0).count();
            self.buf.put_u8(tag::SMALL_BIG);
            self.buf.put_u8(used as u8);
            self.buf.put_u8(u8::from(value < 0));
            self.buf.put_slice(&magnitude[..used]);
        }
    }

    pub fn write_int(&mut self, value: i32) {
        self.write_long(value as i64);
    }

    pub fn write_short(&mut self, value: i16) {
        self.write_long(value as i64);
    }

    pub fn write_double(&mut self, value: f64) {
        self.buf.put_u8(tag::NEW_FLOAT);
        self.buf.put_u64(value.to_bits());
    }

    pub fn write_tuple_head(&mut self, arity: u32) {
        if arity < 256 {
            self.buf.put_u8(tag::SMALL_TUPLE);
            self.buf.put_u8(arity as u8);
        } else {
            self.buf.put_u8(tag::LARGE_TUPLE);
            self.buf.put_u32(arity);
        }
    }

    /// Writes a list head. An empty list is written as nil alone.
    pub fn write_list_head(&mut self, arity: u32) {
        if arity == 0 {
            self.write_nil();
        } else {
            self.buf.put_u8(tag::LIST);
            self.buf.put_u32(arity);
        }
    }

    pub fn write_nil(&mut self) {
        self.buf.put_u8(tag::NIL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn written(f: impl FnOnce(&mut TermWriter)) -> Vec<u8> {
        let mut w = TermWriter::new();
        f(&mut w);
        w.as_bytes().to_vec()
    }

    #[test]
    fn test_boolean_has_no_length_prefix() {
        assert_eq!(written(|w| w.write_boolean(true)), b"\x64true".to_vec());
        assert_eq!(written(|w| w.write_boolean(false)), b"\x64false".to_vec());
    }

    #[test]
    fn test_atom_is_length_prefixed_latin1() {
        let bytes = written(|w| w.write_atom("tsgetreq").unwrap());
        assert_eq!(bytes[0], tag::ATOM);
        assert_eq!(&bytes[1..3], &[0, 8]);
        assert_eq!(&bytes[3..], b"tsgetreq");

        let bytes = written(|w| w.write_atom("caf\u{e9}").unwrap());
        assert_eq!(&bytes[1..], &[0, 4, b'c', b'a', b'f', 0xE9]);
    }

    #[test]
    fn test_atom_outside_latin1_fails() {
        let mut w = TermWriter::new();
        let err = w.write_atom("snow\u{2603}").unwrap_err();
        assert!(matches!(err, TermError::AtomNotLatin1(_)));
        assert!(w.is_empty());
    }

    #[test]
    fn test_atom_too_long_fails() {
        let mut w = TermWriter::new();
        let name = "a".repeat(70_000);
        assert_eq!(w.write_atom(&name), Err(TermError::AtomTooLong(70_000)));
    }

    #[test]
    fn test_string_as_binary_is_utf8() {
        let bytes = written(|w| w.write_string_as_binary("\u{2603}"));
        assert_eq!(bytes[0], tag::BINARY);
        assert_eq!(&bytes[1..5], &[0, 0, 0, 3]);
        assert_eq!(&bytes[5..], "\u{2603}".as_bytes());
    }

    #[test]
    fn test_integer_representations() {
        assert_eq!(written(|w| w.write_long(0)), vec![tag::SMALL_INTEGER, 0]);
        assert_eq!(written(|w| w.write_long(255)), vec![tag::SMALL_INTEGER, 255]);
        assert_eq!(
            written(|w| w.write_long(256)),
            vec![tag::INTEGER, 0, 0, 1, 0]
        );
        assert_eq!(
            written(|w| w.write_int(-1)),
            vec![tag::INTEGER, 0xFF, 0xFF, 0xFF, 0xFF]
        );
        assert_eq!(
            written(|w| w.write_short(-300)),
            vec![tag::INTEGER, 0xFF, 0xFF, 0xFE, 0xD4]
        );
        // 2^32: five magnitude bytes, positive sign.
        assert_eq!(
            written(|w| w.write_long(1 << 32)),
            vec![tag::SMALL_BIG, 5, 0, 0, 0, 0, 0, 1]
        );
        assert_eq!(
            written(|w| w.write_long(i64::MIN)),
            vec![tag::SMALL_BIG, 8, 1, 0, 0, 0, 0, 0, 0, 0, 0x80]
        );
    }

    #[test]
    fn test_double_is_big_endian_bits() {
        let bytes = written(|w| w.write_double(1.5));
        assert_eq!(bytes[0], tag::NEW_FLOAT);
        assert_eq!(&bytes[1..], &1.5f64.to_bits().to_be_bytes());
    }

    #[test]
    fn test_empty_list_is_nil() {
        assert_eq!(written(|w| w.write_list_head(0)), vec![tag::NIL]);
        assert_eq!(
            written(|w| w.write_list_head(2)),
            vec![tag::LIST, 0, 0, 0, 2]
        );
    }

    #[test]
    fn test_tuple_heads() {
        assert_eq!(written(|w| w.write_tuple_head(3)), vec![tag::SMALL_TUPLE, 3]);
        assert_eq!(
            written(|w| w.write_tuple_head(300)),
            vec![tag::LARGE_TUPLE, 0, 0, 1, 44]
        );
    }

    #[test]
    fn test_with_version() {
        let w = TermWriter::with_version();
        assert_eq!(w.as_bytes(), &[tag::VERSION]);
    }
}
