//! Time series values and their binary term encoding.
//!
//! Request terms:
//!
//! ```text
//! {tsgetreq,   Table, [KeyCell...], Timeout | undefined}
//! {tsputreq,   Table, [], [{Cell...}...]}
//! {tsdelreq,   Table, [KeyCell...], undefined, Timeout | undefined}
//! {tsqueryreq, {tsinterpolation, Query, []}, false, undefined}
//! ```
//!
//! Get and query responses are `{Atom, {ColumnNames, ColumnTypes, Rows}}`;
//! put and delete answer with a bare atom. A null cell travels as `[]`.

use crate::error::TermError;
use crate::message::TtbMessage;
use crate::pb::ts::{TsCell, TsColumnDescription, TsColumnType, TsRow};
use crate::ttb::{tag, TermReader, TermWriter, UNDEFINED};
use bytes::Bytes;
use serde::Serialize;
use std::fmt;

const TS_GET_REQ: &str = "tsgetreq";
const TS_GET_RESP: &str = "tsgetresp";
const TS_PUT_REQ: &str = "tsputreq";
const TS_PUT_RESP: &str = "tsputresp";
const TS_DEL_REQ: &str = "tsdelreq";
const TS_DEL_RESP: &str = "tsdelresp";
const TS_QUERY_REQ: &str = "tsqueryreq";
const TS_QUERY_RESP: &str = "tsqueryresp";
const TS_INTERPOLATION: &str = "tsinterpolation";
const RPB_ERROR_RESP: &str = "rpberrorresp";

const CELL_TAGS: &[u8] = &[
    tag::NIL,
    tag::BINARY,
    tag::SMALL_INTEGER,
    tag::INTEGER,
    tag::SMALL_BIG,
    tag::LARGE_BIG,
    tag::NEW_FLOAT,
    tag::FLOAT,
    tag::ATOM,
    tag::SMALL_ATOM,
    tag::ATOM_UTF8,
    tag::SMALL_ATOM_UTF8,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Varchar,
    Sint64,
    Double,
    Timestamp,
    Boolean,
    Blob,
}

impl ColumnType {
    pub fn atom(self) -> &'static str {
        match self {
            ColumnType::Varchar => "varchar",
            ColumnType::Sint64 => "sint64",
            ColumnType::Double => "double",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Boolean => "boolean",
            ColumnType::Blob => "blob",
        }
    }

    pub fn from_atom(atom: &str) -> Result<Self, TermError> {
        match atom {
            "varchar" => Ok(ColumnType::Varchar),
            "sint64" => Ok(ColumnType::Sint64),
            "double" => Ok(ColumnType::Double),
            "timestamp" => Ok(ColumnType::Timestamp),
            "boolean" => Ok(ColumnType::Boolean),
            "blob" => Ok(ColumnType::Blob),
            other => Err(TermError::UnexpectedAtom {
                expected: "a column type",
                actual: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.atom())
    }
}

impl From<TsColumnType> for ColumnType {
    fn from(value: TsColumnType) -> Self {
        match value {
            TsColumnType::Varchar => ColumnType::Varchar,
            TsColumnType::Sint64 => ColumnType::Sint64,
            TsColumnType::Double => ColumnType::Double,
            TsColumnType::Timestamp => ColumnType::Timestamp,
            TsColumnType::Boolean => ColumnType::Boolean,
            TsColumnType::Blob => ColumnType::Blob,
        }
    }
}

/// A single time series value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Varchar(String),
    Sint64(i64),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
    Double(f64),
    Boolean(bool),
    Blob(Vec<u8>),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    fn write(&self, w: &mut TermWriter) {
        match self {
            Cell::Null => w.write_nil(),
            Cell::Varchar(s) => w.write_string_as_binary(s),
            Cell::Blob(b) => w.write_binary(b),
            Cell::Sint64(v) | Cell::Timestamp(v) => w.write_long(*v),
            Cell::Double(v) => w.write_double(*v),
            Cell::Boolean(b) => w.write_boolean(*b),
        }
    }

    fn read(r: &mut TermReader, column_type: Option<ColumnType>) -> Result<Self, TermError> {
        match r.peek_tag()? {
            tag::NIL => {
                r.read_nil()?;
                Ok(Cell::Null)
            }
            tag::BINARY => {
                if column_type == Some(ColumnType::Blob) {
                    Ok(Cell::Blob(r.read_binary()?.to_vec()))
                } else {
                    Ok(Cell::Varchar(r.read_binary_as_string()?))
                }
            }
            tag::NEW_FLOAT | tag::FLOAT => Ok(Cell::Double(r.read_double()?)),
            t if tag::INTEGERS.contains(&t) => {
                let value = r.read_long()?;
                if column_type == Some(ColumnType::Timestamp) {
                    Ok(Cell::Timestamp(value))
                } else {
                    Ok(Cell::Sint64(value))
                }
            }
            t if tag::ATOMS.contains(&t) => Ok(Cell::Boolean(r.read_boolean()?)),
            actual => Err(TermError::WrongTag {
                expected: CELL_TAGS,
                actual,
            }),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str("null"),
            Cell::Varchar(s) => f.write_str(s),
            Cell::Sint64(v) | Cell::Timestamp(v) => write!(f, "{}", v),
            Cell::Double(v) => write!(f, "{}", v),
            Cell::Boolean(b) => write!(f, "{}", b),
            Cell::Blob(b) => {
                for byte in b {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

impl From<&Cell> for TsCell {
    fn from(cell: &Cell) -> Self {
        let mut out = TsCell::default();
        match cell {
            Cell::Null => {}
            Cell::Varchar(s) => out.varchar_value = Some(s.as_bytes().to_vec()),
            Cell::Blob(b) => out.varchar_value = Some(b.clone()),
            Cell::Sint64(v) => out.sint64_value = Some(*v),
            Cell::Timestamp(v) => out.timestamp_value = Some(*v),
            Cell::Double(v) => out.double_value = Some(*v),
            Cell::Boolean(b) => out.boolean_value = Some(*b),
        }
        out
    }
}

impl From<TsCell> for Cell {
    fn from(cell: TsCell) -> Self {
        if let Some(raw) = cell.varchar_value {
            match String::from_utf8(raw) {
                Ok(s) => Cell::Varchar(s),
                Err(e) => Cell::Blob(e.into_bytes()),
            }
        } else if let Some(v) = cell.sint64_value {
            Cell::Sint64(v)
        } else if let Some(v) = cell.timestamp_value {
            Cell::Timestamp(v)
        } else if let Some(v) = cell.double_value {
            Cell::Double(v)
        } else if let Some(b) = cell.boolean_value {
            Cell::Boolean(b)
        } else {
            Cell::Null
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

impl From<TsColumnDescription> for Column {
    fn from(desc: TsColumnDescription) -> Self {
        let column_type = TsColumnType::try_from(desc.r#type)
            .map(ColumnType::from)
            .unwrap_or(ColumnType::Varchar);
        Column {
            name: String::from_utf8_lossy(&desc.name).into_owned(),
            column_type,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row {
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }
}

impl From<TsRow> for Row {
    fn from(row: TsRow) -> Self {
        Row::new(row.cells.into_iter().map(Cell::from).collect())
    }
}

/// Columns and rows returned by a get or a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// An error term returned in place of a regular response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorTerm {
    pub message: String,
    pub code: u32,
}

fn write_timeout(w: &mut TermWriter, timeout: Option<u32>) -> Result<(), TermError> {
    match timeout {
        Some(ms) => {
            w.write_long(ms as i64);
            Ok(())
        }
        None => w.write_atom(UNDEFINED),
    }
}

fn write_cells_list(w: &mut TermWriter, cells: &[Cell]) {
    w.write_list_head(cells.len() as u32);
    for cell in cells {
        cell.write(w);
    }
    if !cells.is_empty() {
        w.write_nil();
    }
}

pub fn encode_get_request(
    table: &str,
    key: &[Cell],
    timeout: Option<u32>,
) -> Result<TtbMessage, TermError> {
    let mut w = TermWriter::with_version();
    w.write_tuple_head(4);
    w.write_atom(TS_GET_REQ)?;
    w.write_string_as_binary(table);
    write_cells_list(&mut w, key);
    write_timeout(&mut w, timeout)?;
    Ok(TtbMessage::new(w.freeze()))
}

pub fn encode_put_request(table: &str, rows: &[Row]) -> Result<TtbMessage, TermError> {
    let mut w = TermWriter::with_version();
    w.write_tuple_head(4);
    w.write_atom(TS_PUT_REQ)?;
    w.write_string_as_binary(table);
    w.write_list_head(0);
    w.write_list_head(rows.len() as u32);
    for row in rows {
        w.write_tuple_head(row.cells.len() as u32);
        for cell in &row.cells {
            cell.write(&mut w);
        }
    }
    if !rows.is_empty() {
        w.write_nil();
    }
    Ok(TtbMessage::new(w.freeze()))
}

pub fn encode_delete_request(
    table: &str,
    key: &[Cell],
    timeout: Option<u32>,
) -> Result<TtbMessage, TermError> {
    let mut w = TermWriter::with_version();
    w.write_tuple_head(5);
    w.write_atom(TS_DEL_REQ)?;
    w.write_string_as_binary(table);
    write_cells_list(&mut w, key);
    w.write_atom(UNDEFINED)?;
    write_timeout(&mut w, timeout)?;
    Ok(TtbMessage::new(w.freeze()))
}

pub fn encode_query_request(query: &str) -> Result<TtbMessage, TermError> {
    let mut w = TermWriter::with_version();
    w.write_tuple_head(4);
    w.write_atom(TS_QUERY_REQ)?;
    w.write_tuple_head(3);
    w.write_atom(TS_INTERPOLATION)?;
    w.write_string_as_binary(query);
    w.write_list_head(0);
    w.write_boolean(false);
    w.write_atom(UNDEFINED)?;
    Ok(TtbMessage::new(w.freeze()))
}

fn read_list<T>(
    r: &mut TermReader,
    mut read_item: impl FnMut(&mut TermReader) -> Result<T, TermError>,
) -> Result<Vec<T>, TermError> {
    let arity = r.read_list_head()?;
    let mut items = Vec::with_capacity(arity as usize);
    for _ in 0..arity {
        items.push(read_item(r)?);
    }
    if arity > 0 {
        r.read_nil()?;
    }
    Ok(items)
}

fn decode_result(payload: Bytes, atom: &'static str) -> Result<QueryResult, TermError> {
    let mut r = TermReader::new(payload);
    if tag::ATOMS.contains(&r.peek_tag()?) {
        r.expect_atom(atom)?;
        return Ok(QueryResult::default());
    }

    r.expect_tuple(2)?;
    r.expect_atom(atom)?;
    r.expect_tuple(3)?;

    let names = read_list(&mut r, |r| r.read_binary_as_string())?;
    let types = read_list(&mut r, |r| ColumnType::from_atom(&r.read_atom()?))?;
    if names.len() != types.len() {
        return Err(TermError::UnexpectedArity {
            expected: names.len() as u32,
            actual: types.len() as u32,
        });
    }

    let rows = read_list(&mut r, |r| {
        let arity = r.read_tuple_head()?;
        let mut cells = Vec::with_capacity(arity as usize);
        for i in 0..arity as usize {
            cells.push(Cell::read(r, types.get(i).copied())?);
        }
        Ok(Row::new(cells))
    })?;

    let columns = names
        .into_iter()
        .zip(types)
        .map(|(name, column_type)| Column::new(name, column_type))
        .collect();

    Ok(QueryResult { columns, rows })
}

pub fn decode_get_response(payload: Bytes) -> Result<QueryResult, TermError> {
    decode_result(payload, TS_GET_RESP)
}

pub fn decode_query_response(payload: Bytes) -> Result<QueryResult, TermError> {
    decode_result(payload, TS_QUERY_RESP)
}

pub fn decode_put_response(payload: Bytes) -> Result<(), TermError> {
    TermReader::new(payload).expect_atom(TS_PUT_RESP)
}

pub fn decode_delete_response(payload: Bytes) -> Result<(), TermError> {
    TermReader::new(payload).expect_atom(TS_DEL_RESP)
}

/// Checks whether a response term is `{rpberrorresp, Message, Code}`.
///
/// Any payload of another shape yields `None` and is left to the typed
/// decoder.
pub fn decode_error(payload: &Bytes) -> Option<ErrorTerm> {
    let mut r = TermReader::new(payload.clone());
    let first = r.peek_tag().ok()?;

    if tag::ATOMS.contains(&first) {
        return (r.read_atom().ok()? == RPB_ERROR_RESP).then(|| ErrorTerm {
            message: "unknown error".to_string(),
            code: 0,
        });
    }

    if r.read_tuple_head().ok()? != 3 || r.read_atom().ok()? != RPB_ERROR_RESP {
        return None;
    }
    let message = r.read_binary().ok()?;
    let code = r.read_long().ok()?;
    Some(ErrorTerm {
        message: String::from_utf8_lossy(&message).into_owned(),
        code: u32::try_from(code).unwrap_or(0),
    })
}
