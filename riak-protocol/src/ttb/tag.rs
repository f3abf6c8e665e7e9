//! Term tags.

/// Leading byte of a top-level term.
pub const VERSION: u8 = 131;
pub const NEW_FLOAT: u8 = 70;
pub const SMALL_INTEGER: u8 = 97;
pub const INTEGER: u8 = 98;
/// Legacy float: 31 bytes of NUL-padded ASCII.
pub const FLOAT: u8 = 99;
pub const ATOM: u8 = 100;
pub const SMALL_TUPLE: u8 = 104;
pub const LARGE_TUPLE: u8 = 105;
pub const NIL: u8 = 106;
pub const STRING: u8 = 107;
pub const LIST: u8 = 108;
pub const BINARY: u8 = 109;
pub const SMALL_BIG: u8 = 110;
pub const LARGE_BIG: u8 = 111;
pub const SMALL_ATOM: u8 = 115;
pub const ATOM_UTF8: u8 = 118;
pub const SMALL_ATOM_UTF8: u8 = 119;

/// Width of the legacy float payload.
pub const FLOAT_LENGTH: usize = 31;

pub(crate) const ATOMS: &[u8] = &[ATOM, SMALL_ATOM, ATOM_UTF8, SMALL_ATOM_UTF8];
pub(crate) const INTEGERS: &[u8] = &[SMALL_INTEGER, INTEGER, SMALL_BIG, LARGE_BIG];
pub(crate) const FLOATS: &[u8] = &[NEW_FLOAT, FLOAT];
pub(crate) const TUPLES: &[u8] = &[SMALL_TUPLE, LARGE_TUPLE];
pub(crate) const LISTS: &[u8] = &[NIL, LIST];

/// Human-readable name of a tag.
pub fn name(tag: u8) -> &'static str {
    match tag {
        VERSION => "version",
        NEW_FLOAT => "new_float",
        SMALL_INTEGER => "small_integer",
        INTEGER => "integer",
        FLOAT => "float",
        ATOM => "atom",
        SMALL_TUPLE => "small_tuple",
        LARGE_TUPLE => "large_tuple",
        NIL => "nil",
        STRING => "string",
        LIST => "list",
        BINARY => "binary",
        SMALL_BIG => "small_big",
        LARGE_BIG => "large_big",
        SMALL_ATOM => "small_atom",
        ATOM_UTF8 => "atom_utf8",
        SMALL_ATOM_UTF8 => "small_atom_utf8",
        _ => "unknown",
    }
}

pub fn describe(tag: u8) -> String {
    format!("{}({})", name(tag), tag)
}

pub fn describe_all(tags: &[u8]) -> String {
    tags.iter()
        .map(|t| describe(*t))
        .collect::<Vec<_>>()
        .join(", ")
}
