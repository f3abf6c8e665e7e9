//! Time series commands.
//!
//! Get, put, delete and query travel as binary terms; key listing uses the
//! protocol buffer stream.

use crate::command::{require_non_blank, Command};
use crate::error::ClientError;
use riak_protocol::pb::ts::{TsListKeysReq, TsListKeysResp};
use riak_protocol::timeseries::{self, QueryResult, Row};
use riak_protocol::{Cell, TtbMessage};

fn encoded(result: Result<TtbMessage, riak_protocol::TermError>) -> Result<TtbMessage, ClientError> {
    result.map_err(|e| ClientError::InvalidRequest(e.to_string()))
}

fn require_key(key: &[Cell]) -> Result<(), ClientError> {
    if key.is_empty() {
        return Err(ClientError::InvalidRequest("key must not be empty".to_string()));
    }
    Ok(())
}

/// Fetches one row by key.
#[derive(Debug)]
pub struct TsGet {
    table: String,
    key: Vec<Cell>,
    timeout: Option<u32>,
    result: QueryResult,
}

impl TsGet {
    pub fn new(table: impl Into<String>, key: Vec<Cell>) -> Self {
        Self {
            table: table.into(),
            key,
            timeout: None,
            result: QueryResult::default(),
        }
    }

    pub fn with_timeout(mut self, timeout_ms: u32) -> Self {
        self.timeout = Some(timeout_ms);
        self
    }

    pub fn result(&self) -> &QueryResult {
        &self.result
    }

    pub fn into_result(self) -> QueryResult {
        self.result
    }
}

impl Command for TsGet {
    type Request = TtbMessage;
    type Response = TtbMessage;

    fn construct_request(&self) -> Result<TtbMessage, ClientError> {
        require_non_blank("table", &self.table)?;
        require_key(&self.key)?;
        encoded(timeseries::encode_get_request(&self.table, &self.key, self.timeout))
    }

    fn on_success(&mut self, response: TtbMessage) -> Result<(), ClientError> {
        self.result = timeseries::decode_get_response(response.payload)?;
        Ok(())
    }
}

/// Writes rows to a table.
#[derive(Debug)]
pub struct TsPut {
    table: String,
    rows: Vec<Row>,
}

impl TsPut {
    pub fn new(table: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            table: table.into(),
            rows,
        }
    }
}

impl Command for TsPut {
    type Request = TtbMessage;
    type Response = TtbMessage;

    fn construct_request(&self) -> Result<TtbMessage, ClientError> {
        require_non_blank("table", &self.table)?;
        if self.rows.is_empty() {
            return Err(ClientError::InvalidRequest("no rows to write".to_string()));
        }
        encoded(timeseries::encode_put_request(&self.table, &self.rows))
    }

    fn on_success(&mut self, response: TtbMessage) -> Result<(), ClientError> {
        timeseries::decode_put_response(response.payload)?;
        Ok(())
    }
}

/// Deletes one row by key.
#[derive(Debug)]
pub struct TsDelete {
    table: String,
    key: Vec<Cell>,
    timeout: Option<u32>,
}

impl TsDelete {
    pub fn new(table: impl Into<String>, key: Vec<Cell>) -> Self {
        Self {
            table: table.into(),
            key,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout_ms: u32) -> Self {
        self.timeout = Some(timeout_ms);
        self
    }
}

impl Command for TsDelete {
    type Request = TtbMessage;
    type Response = TtbMessage;

    fn construct_request(&self) -> Result<TtbMessage, ClientError> {
        require_non_blank("table", &self.table)?;
        require_key(&self.key)?;
        encoded(timeseries::encode_delete_request(&self.table, &self.key, self.timeout))
    }

    fn on_success(&mut self, response: TtbMessage) -> Result<(), ClientError> {
        timeseries::decode_delete_response(response.payload)?;
        Ok(())
    }
}

/// Runs a SQL-like query.
#[derive(Debug)]
pub struct TsQuery {
    query: String,
    result: QueryResult,
}

impl TsQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            result: QueryResult::default(),
        }
    }

    pub fn result(&self) -> &QueryResult {
        &self.result
    }

    pub fn into_result(self) -> QueryResult {
        self.result
    }
}

impl Command for TsQuery {
    type Request = TtbMessage;
    type Response = TtbMessage;

    fn construct_request(&self) -> Result<TtbMessage, ClientError> {
        require_non_blank("query", &self.query)?;
        encoded(timeseries::encode_query_request(&self.query))
    }

    fn on_success(&mut self, response: TtbMessage) -> Result<(), ClientError> {
        self.result = timeseries::decode_query_response(response.payload)?;
        Ok(())
    }
}

/// Streams every key of a table.
#[derive(Debug)]
pub struct TsListKeys {
    table: String,
    timeout: Option<u32>,
    keys: Vec<Row>,
}

impl TsListKeys {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            timeout: None,
            keys: Vec::new(),
        }
    }

    pub fn with_timeout(mut self, timeout_ms: u32) -> Self {
        self.timeout = Some(timeout_ms);
        self
    }

    pub fn keys(&self) -> &[Row] {
        &self.keys
    }

    pub fn into_keys(self) -> Vec<Row> {
        self.keys
    }
}

impl Command for TsListKeys {
    type Request = TsListKeysReq;
    type Response = TsListKeysResp;

    fn construct_request(&self) -> Result<TsListKeysReq, ClientError> {
        require_non_blank("table", &self.table)?;
        Ok(TsListKeysReq {
            table: self.table.as_bytes().to_vec(),
            timeout: self.timeout,
        })
    }

    fn on_success(&mut self, response: TsListKeysResp) -> Result<(), ClientError> {
        self.keys.extend(response.keys.into_iter().map(Row::from));
        Ok(())
    }

    fn reset(&mut self) {
        self.keys.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use riak_protocol::pb::ts::{TsCell, TsRow};
    use riak_protocol::ttb::TermWriter;

    fn key() -> Vec<Cell> {
        vec![
            Cell::Varchar("family1".into()),
            Cell::Varchar("series1".into()),
            Cell::Timestamp(1_443_806_900_000),
        ]
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            TsGet::new("", key()).construct_request(),
            Err(ClientError::InvalidRequest(_))
        ));
        assert!(matches!(
            TsGet::new("GeoCheckin", vec![]).construct_request(),
            Err(ClientError::InvalidRequest(_))
        ));
        assert!(matches!(
            TsDelete::new("GeoCheckin", vec![]).construct_request(),
            Err(ClientError::InvalidRequest(_))
        ));
        assert!(matches!(
            TsPut::new("GeoCheckin", vec![]).construct_request(),
            Err(ClientError::InvalidRequest(_))
        ));
        assert!(matches!(
            TsQuery::new("   ").construct_request(),
            Err(ClientError::InvalidRequest(_))
        ));
        assert!(matches!(
            TsListKeys::new("").construct_request(),
            Err(ClientError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_get_request_is_term() {
        let req = TsGet::new("GeoCheckin", key())
            .with_timeout(1000)
            .construct_request()
            .unwrap();
        assert_eq!(req.payload[0], 131);
    }

    #[test]
    fn test_put_decodes_bare_atom_response() {
        let mut w = TermWriter::with_version();
        w.write_atom("tsputresp").unwrap();
        let mut cmd = TsPut::new("GeoCheckin", vec![Row::new(key())]);
        cmd.on_success(TtbMessage::new(w.freeze())).unwrap();
    }

    #[test]
    fn test_garbage_response_is_protocol_error() {
        let mut cmd = TsQuery::new("select * from GeoCheckin");
        let err = cmd
            .on_success(TtbMessage::new(Bytes::from_static(&[131, 97, 1])))
            .unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
    }

    #[test]
    fn test_list_keys_accumulates_rows() {
        let mut cmd = TsListKeys::new("GeoCheckin");
        let row = TsRow {
            cells: vec![TsCell {
                sint64_value: Some(5),
                ..Default::default()
            }],
        };
        cmd.on_success(TsListKeysResp {
            keys: vec![row.clone()],
            done: None,
        })
        .unwrap();
        cmd.on_success(TsListKeysResp {
            keys: vec![row],
            done: Some(true),
        })
        .unwrap();
        assert_eq!(cmd.keys().len(), 2);
        assert_eq!(cmd.keys()[0].cells, vec![Cell::Sint64(5)]);

        cmd.reset();
        assert!(cmd.keys().is_empty());
    }
}
