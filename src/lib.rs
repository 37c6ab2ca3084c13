//! # ClickHouse HTTP Client
//!
//! An async Rust client for ClickHouse speaking the HTTP interface, with
//! streaming `RowBinary` / `RowBinaryWithNamesAndTypes` payloads, the full
//! parametric type system, mid-stream server-exception detection, and a
//! batched parallel insert engine.
//!
//! # Quick Start
//!
//! ```no_run
//! use clickhouse_http_client::{Client, InsertPlan, QueryRequest, Settings, Value};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::from_connection_string(
//!     "Host=localhost;Port=8123;Username=default;Database=default",
//! )?;
//!
//! // DDL
//! client
//!     .execute("CREATE TABLE IF NOT EXISTS demo (id UInt64, name String) ENGINE = Memory")
//!     .await?;
//!
//! // Bulk insert
//! let plan = InsertPlan::new(
//!     "demo",
//!     vec!["id".to_string(), "name".to_string()],
//! )
//! .batch_size(10_000);
//! let rows = (0..100u64)
//!     .map(|i| vec![Value::from(i), Value::from(format!("row {i}"))]);
//! let written = client.insert(&plan, rows).await?;
//! assert_eq!(written, 100);
//!
//! // Streaming read with a bound parameter
//! let query = QueryRequest::new("SELECT id, name FROM demo WHERE id < {limit:UInt64}")
//!     .param("limit", 10u64);
//! let mut cursor = client.query_reader(query).await?;
//! while cursor.read_row().await? {
//!     let id = cursor.get(0)?;
//!     let name = cursor.get_by_name("name")?;
//!     println!("{id:?} {name:?}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`client`] - the async [`Client`] and its operations
//! - [`options`] - [`Settings`], connection strings and [`QueryOptions`]
//! - [`types`] - the ClickHouse type system and type-string parser
//! - [`value`] - host value representation
//! - [`codec`] - `RowBinary` value codecs
//! - [`cursor`] - streaming row cursor with mid-stream exception detection
//! - [`insert`] - batched parallel insert engine
//! - [`sql`] - `{name:Type}` parameter scanner
//! - [`format`] - parameter literal formatter
//! - [`http`] - the HTTP transport boundary
//! - [`json_registry`] - record schemas for `JSON` columns
//! - [`error`] - error taxonomy and `Result` alias

#![warn(missing_docs)]

/// The async client API.
pub mod client;
/// `RowBinary` value codecs.
pub mod codec;
/// Streaming row cursor over query responses.
pub mod cursor;
/// Error types and `Result` alias.
pub mod error;
/// Textual parameter formatting.
pub mod format;
/// The HTTP transport boundary and the production `reqwest` transport.
pub mod http;
/// Batched parallel insert engine.
pub mod insert;
/// Byte-level readers, writers and chunked body plumbing.
pub mod io;
/// Registry of record schemas for `JSON` columns.
pub mod json_registry;
/// Client settings and per-query options.
pub mod options;
/// Query model and HTTP request assembly.
pub mod request;
/// Response dispatch and header harvesting.
pub mod response;
/// `{name:Type}` parameter pre-scanner.
pub mod sql;
/// The ClickHouse type system and type-string parser.
pub mod types;
/// Host value representation.
pub mod value;

pub use client::{
    Client,
    RawResult,
};
pub use cursor::{
    ColumnMeta,
    RowCursor,
    Rows,
};
pub use error::{
    Error,
    Result,
};
pub use insert::{
    InsertFormat,
    InsertPlan,
};
pub use json_registry::{
    JsonMode,
    JsonRegistry,
    JsonSchemaBuilder,
};
pub use options::{
    Protocol,
    QueryOptions,
    Settings,
};
pub use request::{
    Parameter,
    QueryRequest,
};
pub use response::QueryStats;
pub use types::{
    Type,
    TypeRef,
};
pub use value::{
    DateTime64Value,
    DateTimeValue,
    Decimal,
    Int256,
    JsonNode,
    JsonTypedValue,
    UInt256,
    Value,
};
