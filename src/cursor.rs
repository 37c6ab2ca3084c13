//! Streaming cursor over a `RowBinaryWithNamesAndTypes` response body.
//!
//! The body layout is: LEB128 column count, the column names, the column
//! type strings, then rows of per-column values with no terminator - the
//! stream ends cleanly on a row boundary.
//!
//! Decoding is retry-based: the cursor attempts to decode the next row from
//! its buffer, and when the codec runs out of bytes it awaits another chunk
//! and retries the row from its start.
//!
//! The mid-stream exception sentinel is detected at row boundaries: before
//! each row decode the cursor checks whether the buffer starts with the
//! `__exception__<TOKEN>` opening marker, so sentinel bytes are never fed
//! to the value codecs (fixed-width columns would happily decode them as
//! rows). The check only runs between rows - a marker inside a
//! length-prefixed string value is plain data. A premature end of stream
//! additionally consults the body tail for the sentinel before giving up.
//!
//! A cursor is single-consumer by construction: every advancing operation
//! takes `&mut self`, so concurrent reads are rejected at compile time.

use crate::codec::{
    read_value,
    ReadOptions,
};
use crate::io::chunked::{
    find_stream_exception,
    ChunkedBody,
    EXCEPTION_MARKER,
};
use crate::io::ByteReader;
use crate::response::{
    QueryStats,
    ResponseHead,
};
use crate::types::{
    Type,
    TypeRef,
};
use crate::value::Value;
use crate::{
    Error,
    Result,
};
use bytes::{
    Buf,
    BytesMut,
};
use std::sync::Arc;
use tracing::debug;

/// One column of the response schema.
#[derive(Debug, Clone)]
pub struct ColumnMeta {
    /// Column name.
    pub name: String,
    /// Parsed column type.
    pub column_type: TypeRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    BetweenRows,
    RowReady,
    End,
    Failed,
}

/// Outcome of the sentinel check at a row boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    /// The buffer does not start with the opening marker; decode the row.
    NoMatch,
    /// The buffer is a proper prefix of the marker; refill before deciding,
    /// so a chunk split cannot leak marker bytes into the row decoder.
    NeedMore,
    /// The buffer starts with the opening marker: the rows have ended.
    Sentinel,
}

/// A forward-only tabular cursor over a streaming query response.
pub struct RowCursor {
    head: ResponseHead,
    body: ChunkedBody,
    buffer: BytesMut,
    columns: Arc<Vec<ColumnMeta>>,
    row: Vec<Value>,
    state: CursorState,
    read_options: ReadOptions,
    /// The opening marker looked for at row boundaries: `__exception__`
    /// plus the response's tag when one was echoed.
    sentinel_needle: Vec<u8>,
}

impl RowCursor {
    /// Parses the schema header and returns a cursor positioned before the
    /// first row. Unknown column types are rejected.
    pub(crate) async fn open(
        head: ResponseHead,
        body: ChunkedBody,
        read_options: ReadOptions,
    ) -> Result<RowCursor> {
        let mut sentinel_needle = EXCEPTION_MARKER.to_vec();
        if let Some(tag) = &head.exception_tag {
            sentinel_needle.extend_from_slice(tag.as_bytes());
        }
        let mut cursor = RowCursor {
            head,
            body,
            buffer: BytesMut::new(),
            columns: Arc::new(Vec::new()),
            row: Vec::new(),
            state: CursorState::BetweenRows,
            read_options,
            sentinel_needle,
        };

        loop {
            match try_decode_header(&cursor.buffer) {
                Ok((columns, consumed)) => {
                    cursor.buffer.advance(consumed);
                    debug!(columns = columns.len(), "response header read");
                    cursor.columns = Arc::new(columns);
                    return Ok(cursor);
                }
                Err(Error::NotEnoughData) => {
                    if !cursor.fill().await? {
                        return Err(cursor.premature_end());
                    }
                }
                Err(e) => {
                    cursor.state = CursorState::Failed;
                    return Err(e);
                }
            }
        }
    }

    /// The response schema.
    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    /// Shared handle to the response schema.
    pub fn columns_ref(&self) -> Arc<Vec<ColumnMeta>> {
        Arc::clone(&self.columns)
    }

    /// The query id the server reported.
    pub fn query_id(&self) -> &str {
        &self.head.query_id
    }

    /// The server timezone, when the server reported one.
    pub fn server_timezone(&self) -> Option<&str> {
        self.head.server_timezone.as_deref()
    }

    /// Statistics from the response summary header.
    pub fn stats(&self) -> &QueryStats {
        &self.head.stats
    }

    /// Advances to the next row. Returns `false` on clean end of stream.
    ///
    /// A sentinel marker at the row boundary fails with
    /// [`Error::ServerStream`] when the response carried an exception tag,
    /// and [`Error::UnexpectedEndOfStream`] otherwise; a stream cut off a
    /// row boundary gets the same treatment after a scan of the body tail.
    pub async fn read_row(&mut self) -> Result<bool> {
        match self.state {
            CursorState::BetweenRows | CursorState::RowReady => {}
            CursorState::End => return Ok(false),
            CursorState::Failed => {
                return Err(Error::InvalidState(
                    "cursor already failed".to_string(),
                ))
            }
        }

        loop {
            // The buffer start is a row boundary here, both on the first
            // pass and on every refill retry, so the sentinel check never
            // fires on marker bytes inside a value.
            match self.check_boundary() {
                Boundary::Sentinel => return Err(self.sentinel_error().await),
                Boundary::NeedMore => {
                    if !self.fill().await? {
                        if self.buffer.is_empty() {
                            self.state = CursorState::End;
                            return Ok(false);
                        }
                        return Err(self.premature_end());
                    }
                    continue;
                }
                Boundary::NoMatch => {}
            }

            match try_decode_row(
                &self.buffer,
                &self.columns,
                &self.read_options,
            ) {
                Ok((row, consumed)) => {
                    self.buffer.advance(consumed);
                    self.row = row;
                    self.state = CursorState::RowReady;
                    return Ok(true);
                }
                Err(Error::NotEnoughData) => {
                    if !self.fill().await? {
                        // A clean end lands exactly on a row boundary; any
                        // buffered remainder means the stream was cut.
                        if self.buffer.is_empty() {
                            self.state = CursorState::End;
                            return Ok(false);
                        }
                        return Err(self.premature_end());
                    }
                }
                Err(e) => {
                    self.state = CursorState::Failed;
                    return Err(e);
                }
            }
        }
    }

    /// Compares the buffer start against the sentinel opening marker.
    ///
    /// An empty or shorter buffer that matches a prefix of the marker is
    /// inconclusive: the caller must refill and check again before handing
    /// bytes to the row decoder.
    fn check_boundary(&self) -> Boundary {
        let needle = &self.sentinel_needle;
        if self.buffer.len() >= needle.len() {
            if self.buffer[..needle.len()] == needle[..] {
                Boundary::Sentinel
            } else {
                Boundary::NoMatch
            }
        } else if needle[..self.buffer.len()] == self.buffer[..] {
            Boundary::NeedMore
        } else {
            Boundary::NoMatch
        }
    }

    /// Raises the error for a sentinel found at a row boundary.
    ///
    /// With an echoed exception tag, the rest of the body is drained so the
    /// tail holds the complete sentinel, which is then parsed into a
    /// server-stream error. Without a tag the marker is just where the
    /// usable stream ends.
    async fn sentinel_error(&mut self) -> Error {
        self.state = CursorState::Failed;
        let Some(tag) = self.head.exception_tag.clone() else {
            return Error::UnexpectedEndOfStream;
        };
        loop {
            match self.body.next_chunk().await {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(e) => return e,
            }
        }
        debug!("mid-stream exception sentinel found at row boundary");
        match find_stream_exception(self.body.tail(), &tag) {
            Some((code, message)) => Error::ServerStream { code, message },
            None => Error::UnexpectedEndOfStream,
        }
    }

    /// Returns a column of the current row.
    pub fn get(&self, index: usize) -> Result<&Value> {
        if self.state != CursorState::RowReady {
            return Err(Error::InvalidState(
                "no current row; call read_row first".to_string(),
            ));
        }
        self.row.get(index).ok_or_else(|| {
            Error::InvalidState(format!(
                "column index {} out of range ({} columns)",
                index,
                self.row.len()
            ))
        })
    }

    /// Returns a column of the current row by name.
    pub fn get_by_name(&self, name: &str) -> Result<&Value> {
        let index = self
            .columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| {
                Error::InvalidState(format!("no column named '{}'", name))
            })?;
        self.get(index)
    }

    /// The values of the current row.
    pub fn row(&self) -> Result<&[Value]> {
        if self.state != CursorState::RowReady {
            return Err(Error::InvalidState(
                "no current row; call read_row first".to_string(),
            ));
        }
        Ok(&self.row)
    }

    /// Takes ownership of the current row's values.
    pub fn take_row(&mut self) -> Result<Vec<Value>> {
        if self.state != CursorState::RowReady {
            return Err(Error::InvalidState(
                "no current row; call read_row first".to_string(),
            ));
        }
        self.state = CursorState::BetweenRows;
        Ok(std::mem::take(&mut self.row))
    }

    /// Releases the cursor, aborting the remaining body stream.
    ///
    /// Dropping the cursor has the same effect; this method just makes the
    /// release explicit at call sites.
    pub fn close(self) {
        drop(self);
    }

    async fn fill(&mut self) -> Result<bool> {
        match self.body.next_chunk().await {
            Ok(Some(chunk)) => {
                self.buffer.extend_from_slice(&chunk);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => {
                self.state = CursorState::Failed;
                Err(e)
            }
        }
    }

    fn premature_end(&mut self) -> Error {
        self.state = CursorState::Failed;
        if let Some(tag) = &self.head.exception_tag {
            if let Some((code, message)) =
                find_stream_exception(self.body.tail(), tag)
            {
                debug!(code, "mid-stream exception sentinel found");
                return Error::ServerStream { code, message };
            }
        }
        Error::UnexpectedEndOfStream
    }
}

impl std::fmt::Debug for RowCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowCursor")
            .field("query_id", &self.head.query_id)
            .field("columns", &self.columns.len())
            .field("state", &self.state)
            .finish()
    }
}

fn try_decode_header(buf: &[u8]) -> Result<(Vec<ColumnMeta>, usize)> {
    let mut r = ByteReader::new(buf);
    let count = r.read_length()?;

    let mut names = Vec::with_capacity(count);
    for _ in 0..count {
        names.push(r.read_string()?);
    }

    let mut columns = Vec::with_capacity(count);
    for name in names {
        let type_str = r.read_string()?;
        let column_type = Type::parse(&type_str)?;
        columns.push(ColumnMeta { name, column_type });
    }

    Ok((columns, r.position()))
}

fn try_decode_row(
    buf: &[u8],
    columns: &[ColumnMeta],
    opts: &ReadOptions,
) -> Result<(Vec<Value>, usize)> {
    let mut r = ByteReader::new(buf);
    let mut row = Vec::with_capacity(columns.len());
    for column in columns {
        row.push(read_value(&mut r, &column.column_type, opts)?);
    }
    Ok((row, r.position()))
}

/// A fully-materialised query result.
#[derive(Debug)]
pub struct Rows {
    /// The response schema.
    pub columns: Arc<Vec<ColumnMeta>>,
    /// All rows in server order.
    pub rows: Vec<Vec<Value>>,
    /// The query id the server reported.
    pub query_id: String,
    /// The server timezone, when reported.
    pub server_timezone: Option<String>,
    /// Statistics from the response summary header.
    pub stats: QueryStats,
}

impl Rows {
    /// Collects every remaining row of a cursor.
    pub(crate) async fn collect(mut cursor: RowCursor) -> Result<Rows> {
        let mut rows = Vec::new();
        while cursor.read_row().await? {
            rows.push(cursor.take_row()?);
        }
        Ok(Rows {
            columns: cursor.columns_ref(),
            query_id: cursor.query_id().to_string(),
            server_timezone: cursor
                .server_timezone()
                .map(str::to_string),
            stats: cursor.stats().clone(),
            rows,
        })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the result has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The index of a named column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}
