//! The asynchronous ClickHouse client.
//!
//! A [`Client`] is long-lived and cheap to clone; it owns the HTTP
//! transport handle, the immutable [`Settings`] and the JSON schema
//! registry, and holds no per-call mutable state, so it is safe to share
//! across tasks.

use crate::codec::ReadOptions;
use crate::cursor::{
    RowCursor,
    Rows,
};
use crate::http::{
    HttpTransport,
    ReqwestTransport,
};
use crate::insert::{
    run_insert,
    InsertPlan,
};
use crate::io::chunked::BoxByteStream;
use crate::json_registry::JsonRegistry;
use crate::options::Settings;
use crate::request::{
    build_ping_request,
    build_query_request,
    QueryBody,
    QueryRequest,
};
use crate::response::{
    dispatch,
    QueryStats,
};
use crate::value::Value;
use crate::Result;
use bytes::{
    Bytes,
    BytesMut,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Shared immutable state behind a [`Client`].
pub(crate) struct ClientCore {
    pub(crate) transport: Arc<dyn HttpTransport>,
    pub(crate) settings: Settings,
    pub(crate) json_registry: JsonRegistry,
}

/// A raw query result: the response body in a caller-chosen format.
#[derive(Debug)]
pub struct RawResult {
    /// The query id the server reported.
    pub query_id: String,
    /// The server timezone, when reported.
    pub server_timezone: Option<String>,
    /// Statistics from the response summary header.
    pub stats: QueryStats,
    /// The complete response body.
    pub data: Bytes,
}

/// Asynchronous ClickHouse client over HTTP.
#[derive(Clone)]
pub struct Client {
    core: Arc<ClientCore>,
}

impl Client {
    /// Creates a client with the production `reqwest` transport.
    pub fn new(settings: Settings) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(&settings)?);
        Self::with_transport(settings, transport)
    }

    /// Creates a client from a semicolon-delimited connection string.
    pub fn from_connection_string(connection_string: &str) -> Result<Self> {
        Self::new(connection_string.parse()?)
    }

    /// Creates a client over a caller-supplied transport. Used by tests to
    /// substitute an in-memory mock.
    pub fn with_transport(
        mut settings: Settings,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        if settings.use_session && settings.session_id.is_none() {
            settings.session_id = Some(Uuid::new_v4().to_string());
        }
        Ok(Self {
            core: Arc::new(ClientCore {
                transport,
                settings,
                json_registry: JsonRegistry::new(),
            }),
        })
    }

    /// The client settings.
    pub fn settings(&self) -> &Settings {
        &self.core.settings
    }

    /// The client-owned JSON schema registry.
    pub fn json_registry(&self) -> &JsonRegistry {
        &self.core.json_registry
    }

    /// `GET /ping`. True iff the server answered 2xx; transport failures
    /// and other statuses return false rather than erroring.
    pub async fn ping(&self) -> bool {
        let request = match build_ping_request(&self.core.settings) {
            Ok(request) => request,
            Err(_) => return false,
        };
        match self.core.transport.send(request).await {
            Ok(response) => (200..300).contains(&response.status),
            Err(e) => {
                debug!(error = %e, "ping failed");
                false
            }
        }
    }

    /// Executes a statement that produces no result set (DDL, `INSERT ...
    /// SELECT`, mutations) and returns the server statistics.
    pub async fn execute(
        &self,
        query: impl Into<QueryRequest>,
    ) -> Result<QueryStats> {
        let mut query = query.into();
        // Buffering server-side turns late failures into plain non-2xx
        // responses, which is the right shape for a no-result statement.
        query
            .options
            .custom_settings
            .push(("wait_end_of_query".to_string(), "1".to_string()));

        let cancel = query.options.cancellation.clone();
        let prepared = build_query_request(
            &self.core.settings,
            &query,
            QueryBody::Sql,
        )?;
        let (head, mut body) =
            dispatch(self.core.transport.as_ref(), prepared, cancel).await?;
        while body.next_chunk().await?.is_some() {}
        Ok(head.stats)
    }

    /// Executes a query and returns a streaming [`RowCursor`] over its
    /// `RowBinaryWithNamesAndTypes` response.
    pub async fn query_reader(
        &self,
        query: impl Into<QueryRequest>,
    ) -> Result<RowCursor> {
        let mut query = query.into();
        query.options.custom_settings.push((
            "default_format".to_string(),
            "RowBinaryWithNamesAndTypes".to_string(),
        ));

        let cancel = query.options.cancellation.clone();
        let prepared = build_query_request(
            &self.core.settings,
            &query,
            QueryBody::Sql,
        )?;
        let (head, body) =
            dispatch(self.core.transport.as_ref(), prepared, cancel).await?;
        RowCursor::open(head, body, self.read_options()).await
    }

    /// Executes a query and materialises every row.
    pub async fn query_rows(
        &self,
        query: impl Into<QueryRequest>,
    ) -> Result<Rows> {
        let cursor = self.query_reader(query).await?;
        Rows::collect(cursor).await
    }

    /// Executes a query and returns the first column of the first row, or
    /// `None` for an empty result set. The remainder of the stream is
    /// released without being read.
    pub async fn query_scalar(
        &self,
        query: impl Into<QueryRequest>,
    ) -> Result<Option<Value>> {
        let mut cursor = self.query_reader(query).await?;
        if !cursor.read_row().await? {
            return Ok(None);
        }
        let mut row = cursor.take_row()?;
        cursor.close();
        if row.is_empty() {
            return Ok(None);
        }
        Ok(Some(row.swap_remove(0)))
    }

    /// Executes a query and returns the raw response body in the given
    /// ClickHouse format (e.g. `JSONEachRow`, `CSV`).
    pub async fn query_raw(
        &self,
        query: impl Into<QueryRequest>,
        format: &str,
    ) -> Result<RawResult> {
        let mut query = query.into();
        query
            .options
            .custom_settings
            .push(("default_format".to_string(), format.to_string()));

        let cancel = query.options.cancellation.clone();
        let prepared = build_query_request(
            &self.core.settings,
            &query,
            QueryBody::Sql,
        )?;
        let (head, mut body) =
            dispatch(self.core.transport.as_ref(), prepared, cancel).await?;
        let mut data = BytesMut::new();
        while let Some(chunk) = body.next_chunk().await? {
            data.extend_from_slice(&chunk);
        }
        Ok(RawResult {
            query_id: head.query_id,
            server_timezone: head.server_timezone,
            stats: head.stats,
            data: data.freeze(),
        })
    }

    /// Bulk-inserts rows per the plan; see [`InsertPlan`]. Returns the
    /// number of rows written.
    pub async fn insert<I>(&self, plan: &InsertPlan, rows: I) -> Result<u64>
    where
        I: IntoIterator<Item = Vec<Value>>,
    {
        run_insert(Arc::clone(&self.core), plan, rows, None).await
    }

    /// Bulk insert with a cancellation signal: in-flight batches are
    /// aborted and no new batches are accepted once the token fires.
    pub async fn insert_with_cancellation<I>(
        &self,
        plan: &InsertPlan,
        rows: I,
        cancel: tokio_util::sync::CancellationToken,
    ) -> Result<u64>
    where
        I: IntoIterator<Item = Vec<Value>>,
    {
        run_insert(Arc::clone(&self.core), plan, rows, Some(cancel)).await
    }

    /// Streams a caller-prepared body as the data of the given `INSERT ...
    /// FORMAT ...` statement, passing the bytes through untouched.
    pub async fn insert_raw_stream(
        &self,
        query: impl Into<QueryRequest>,
        body: BoxByteStream,
    ) -> Result<QueryStats> {
        let query = query.into();
        let cancel = query.options.cancellation.clone();
        let prepared = build_query_request(
            &self.core.settings,
            &query,
            QueryBody::Stream(body),
        )?;
        let (head, mut response_body) =
            dispatch(self.core.transport.as_ref(), prepared, cancel).await?;
        while response_body.next_chunk().await?.is_some() {}
        Ok(head.stats)
    }

    fn read_options(&self) -> ReadOptions {
        ReadOptions {
            strings_as_bytes: self.core.settings.read_strings_as_byte_arrays,
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.core.settings.host)
            .field("port", &self.core.settings.port)
            .finish()
    }
}
