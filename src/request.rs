//! Query model and HTTP request assembly.
//!
//! [`QueryRequest`] is what callers hand to the client: SQL, bound
//! parameters and per-query options. [`build_query_request`] turns it into
//! a transport-ready [`HttpRequest`]: the URL query string carries the
//! database, session, query id, `param_<name>` literals, roles and server
//! settings; headers carry auth, compression and the per-request exception
//! tag.

use crate::format::format_parameter;
use crate::http::{
    HttpBody,
    HttpMethod,
    HttpRequest,
};
use crate::io::chunked::BoxByteStream;
use crate::json_registry::JsonMode;
use crate::options::{
    QueryOptions,
    Settings,
};
use crate::sql::extract_param_hints;
use crate::types::Type;
use crate::value::Value;
use crate::{
    Error,
    Result,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use uuid::Uuid;

/// Header names callers may not override.
const HEADER_DENYLIST: [&str; 3] =
    ["connection", "authorization", "user-agent"];

/// One bound parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    /// Placeholder name, without braces.
    pub name: String,
    /// The bound value.
    pub value: Value,
    /// Explicit type string; wins over the SQL hint and host inference.
    pub type_hint: Option<String>,
}

/// A query to execute: SQL, bound parameters and per-query options.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    /// The SQL text, possibly containing `{name:Type}` placeholders.
    pub sql: String,
    /// Bound parameters.
    pub parameters: Vec<Parameter>,
    /// Per-query overrides.
    pub options: QueryOptions,
}

impl QueryRequest {
    /// Creates a request for the given SQL.
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into(), ..Default::default() }
    }

    /// Binds a parameter, inferring its type from the SQL hint or the host
    /// value.
    pub fn param(
        mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.parameters.push(Parameter {
            name: name.into(),
            value: value.into(),
            type_hint: None,
        });
        self
    }

    /// Binds a parameter with an explicit type string.
    pub fn param_typed(
        mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
        type_str: impl Into<String>,
    ) -> Self {
        self.parameters.push(Parameter {
            name: name.into(),
            value: value.into(),
            type_hint: Some(type_str.into()),
        });
        self
    }

    /// Replaces the per-query options.
    pub fn options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }
}

impl From<&str> for QueryRequest {
    fn from(sql: &str) -> Self {
        QueryRequest::new(sql)
    }
}

impl From<String> for QueryRequest {
    fn from(sql: String) -> Self {
        QueryRequest::new(sql)
    }
}

/// What goes in the POST body.
pub(crate) enum QueryBody {
    /// The SQL text itself (SELECT / DDL flows).
    Sql,
    /// Binary data; the SQL moves to the `query=` URL entry (insert flows).
    Data(Bytes),
    /// A caller-supplied stream; the SQL moves to the URL, and the body is
    /// passed through without re-compression.
    Stream(BoxByteStream),
}

/// A transport-ready request plus the identifiers harvested back later.
pub(crate) struct PreparedRequest {
    pub request: HttpRequest,
    pub query_id: String,
    pub exception_tag: String,
}

/// Generates the opaque per-request exception tag.
pub(crate) fn generate_exception_tag() -> String {
    Uuid::new_v4().simple().to_string()[..10].to_uppercase()
}

/// Builds the library `User-Agent`, sanitized to printable ASCII.
pub(crate) fn user_agent() -> String {
    let raw = format!(
        "clickhouse-http-client/{} (platform:{}; os:{}; runtime:rust; arch:{})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::FAMILY,
        std::env::consts::OS,
        std::env::consts::ARCH,
    );
    raw.chars().filter(|c| (' '..='~').contains(c)).collect()
}

/// Assembles the complete HTTP request for a query.
pub(crate) fn build_query_request(
    settings: &Settings,
    query: &QueryRequest,
    body: QueryBody,
) -> Result<PreparedRequest> {
    let options = &query.options;
    let mut url = settings.base_url()?;
    let query_id = options
        .query_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let exception_tag = generate_exception_tag();

    let hints = extract_param_hints(&query.sql)?;

    {
        let mut pairs = url.query_pairs_mut();

        if let Some(database) =
            options.database.as_ref().or(settings.database.as_ref())
        {
            pairs.append_pair("database", database);
        }

        let use_session =
            options.use_session.unwrap_or(settings.use_session);
        if use_session {
            let session_id = options
                .session_id
                .as_ref()
                .or(settings.session_id.as_ref())
                .ok_or_else(|| {
                    Error::Config(
                        "UseSession is set but no session id is available"
                            .to_string(),
                    )
                })?;
            pairs.append_pair("session_id", session_id);
        }

        pairs.append_pair("query_id", &query_id);

        for parameter in &query.parameters {
            let ty = resolve_parameter_type(parameter, &hints)?;
            let literal =
                format_parameter(&parameter.value, ty.as_deref())?;
            pairs.append_pair(
                &format!("param_{}", parameter.name),
                &literal,
            );
        }

        let roles = if options.roles.is_empty() {
            &settings.roles
        } else {
            &options.roles
        };
        for role in roles {
            pairs.append_pair("role", role);
        }

        if settings.compression {
            pairs.append_pair("enable_http_compression", "1");
        }

        if settings.json_read_mode == JsonMode::String {
            pairs.append_pair("output_format_binary_write_json_as_string", "1");
        }
        if settings.json_write_mode == JsonMode::String {
            pairs.append_pair("input_format_binary_read_json_as_string", "1");
        }

        for (name, value) in settings
            .custom_settings
            .iter()
            .chain(options.custom_settings.iter())
        {
            pairs.append_pair(name, value);
        }

        if let Some(limit) = options.max_execution_time {
            pairs.append_pair(
                "max_execution_time",
                &limit.as_secs().max(1).to_string(),
            );
        }

        if !matches!(&body, &QueryBody::Sql) {
            pairs.append_pair("query", &query.sql);
        }
    }

    let mut headers = Vec::new();
    headers.push(("User-Agent".to_string(), user_agent()));
    headers.push((
        "Authorization".to_string(),
        authorization_header(settings, options),
    ));
    headers.push((
        "X-ClickHouse-Exception-Tag".to_string(),
        exception_tag.clone(),
    ));
    if settings.compression {
        headers.push((
            "Accept-Encoding".to_string(),
            "gzip, deflate".to_string(),
        ));
    }
    for (name, value) in &options.custom_headers {
        if HEADER_DENYLIST
            .iter()
            .any(|denied| name.eq_ignore_ascii_case(denied))
        {
            continue;
        }
        headers.push((name.clone(), value.clone()));
    }

    let body = match body {
        QueryBody::Sql => {
            compressible_body(settings, Bytes::from(query.sql.clone()), &mut headers)?
        }
        QueryBody::Data(bytes) => {
            compressible_body(settings, bytes, &mut headers)?
        }
        QueryBody::Stream(stream) => HttpBody::Stream(stream),
    };

    Ok(PreparedRequest {
        request: HttpRequest {
            method: HttpMethod::Post,
            url,
            headers,
            body,
            timeout: settings.timeout,
        },
        query_id,
        exception_tag,
    })
}

/// Builds the `GET /ping` request.
pub(crate) fn build_ping_request(settings: &Settings) -> Result<HttpRequest> {
    let base = settings.base_url()?;
    let url = base.join("ping").map_err(|e| {
        Error::Config(format!("invalid ping URL: {}", e))
    })?;
    Ok(HttpRequest {
        method: HttpMethod::Get,
        url,
        headers: vec![("User-Agent".to_string(), user_agent())],
        body: HttpBody::Empty,
        timeout: settings.timeout,
    })
}

/// Type resolution priority: explicit parameter type, then SQL hint, then
/// host inference (handled downstream by passing `None`).
fn resolve_parameter_type(
    parameter: &Parameter,
    hints: &std::collections::HashMap<String, String>,
) -> Result<Option<crate::types::TypeRef>> {
    if let Some(explicit) = &parameter.type_hint {
        return Ok(Some(Type::parse(explicit)?));
    }
    if let Some(hint) = hints.get(&parameter.name) {
        return Ok(Some(Type::parse(hint)?));
    }
    Ok(None)
}

fn authorization_header(
    settings: &Settings,
    options: &QueryOptions,
) -> String {
    if let Some(token) =
        options.bearer_token.as_ref().or(settings.bearer_token.as_ref())
    {
        return format!("Bearer {}", token);
    }
    let credentials =
        format!("{}:{}", settings.username, settings.password);
    format!("Basic {}", BASE64.encode(credentials))
}

fn compressible_body(
    settings: &Settings,
    bytes: Bytes,
    headers: &mut Vec<(String, String)>,
) -> Result<HttpBody> {
    if !settings.compression {
        return Ok(HttpBody::Bytes(bytes));
    }
    let mut encoder =
        GzEncoder::new(Vec::with_capacity(bytes.len() / 2), Compression::default());
    encoder
        .write_all(&bytes)
        .and_then(|_| encoder.finish())
        .map(|compressed| {
            headers.push((
                "Content-Encoding".to_string(),
                "gzip".to_string(),
            ));
            HttpBody::Bytes(Bytes::from(compressed))
        })
        .map_err(Error::Io)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings::new("localhost", 8123).database("testdb")
    }

    fn url_of(prepared: &PreparedRequest) -> String {
        prepared.request.url.to_string()
    }

    #[test]
    fn test_query_string_contents() {
        let query = QueryRequest::new("SELECT {id:UInt64}")
            .param("id", 42u64)
            .options(QueryOptions::new().query_id("qid-1"));
        let prepared =
            build_query_request(&settings(), &query, QueryBody::Sql)
                .unwrap();
        let url = url_of(&prepared);
        assert!(url.contains("database=testdb"));
        assert!(url.contains("query_id=qid-1"));
        assert!(url.contains("param_id=42"));
        assert_eq!(prepared.query_id, "qid-1");
        // SQL flows in the body, not the URL.
        assert!(!url.contains("query=SELECT"));
        match &prepared.request.body {
            HttpBody::Bytes(b) => {
                assert_eq!(&b[..], b"SELECT {id:UInt64}")
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_sql_hint_drives_formatting() {
        let query = QueryRequest::new("SELECT {when:DateTime64(3)}")
            .param(
                "when",
                Value::DateTime64(crate::value::DateTime64Value {
                    ticks: 1_500,
                    precision: 3,
                    timezone: None,
                }),
            );
        let prepared =
            build_query_request(&settings(), &query, QueryBody::Sql)
                .unwrap();
        // The DateTime64 hint selects the 7-fraction-digit rendering.
        assert!(url_of(&prepared)
            .contains("param_when=1970-01-01+00%3A00%3A01.5000000"));
    }

    #[test]
    fn test_data_body_moves_sql_to_url() {
        let query = QueryRequest::new("INSERT INTO t (a) FORMAT RowBinary");
        let prepared = build_query_request(
            &settings(),
            &query,
            QueryBody::Data(Bytes::from_static(b"\x01")),
        )
        .unwrap();
        assert!(url_of(&prepared).contains("query=INSERT"));
    }

    #[test]
    fn test_auth_selection() {
        let query = QueryRequest::new("SELECT 1");
        let mut s = settings();
        s.username = "alice".to_string();
        s.password = "secret".to_string();
        let prepared =
            build_query_request(&s, &query, QueryBody::Sql).unwrap();
        let auth = prepared
            .request
            .headers
            .iter()
            .find(|(k, _)| k == "Authorization")
            .unwrap();
        assert_eq!(auth.1, format!("Basic {}", BASE64.encode("alice:secret")));

        // Bearer wins.
        s.bearer_token = Some("tok".to_string());
        let prepared =
            build_query_request(&s, &query, QueryBody::Sql).unwrap();
        let auth = prepared
            .request
            .headers
            .iter()
            .find(|(k, _)| k == "Authorization")
            .unwrap();
        assert_eq!(auth.1, "Bearer tok");
    }

    #[test]
    fn test_custom_header_denylist() {
        let query = QueryRequest::new("SELECT 1").options(
            QueryOptions::new()
                .header("X-Custom", "yes")
                .header("Authorization", "Bearer forged")
                .header("connection", "close")
                .header("User-Agent", "evil"),
        );
        let prepared =
            build_query_request(&settings(), &query, QueryBody::Sql)
                .unwrap();
        let names: Vec<&str> = prepared
            .request
            .headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert!(names.contains(&"X-Custom"));
        assert_eq!(
            names.iter().filter(|n| **n == "Authorization").count(),
            1
        );
        let auth = prepared
            .request
            .headers
            .iter()
            .find(|(k, _)| k == "Authorization")
            .unwrap();
        assert_ne!(auth.1, "Bearer forged");
    }

    #[test]
    fn test_compression_gzips_body() {
        let mut s = settings();
        s.compression = true;
        let query = QueryRequest::new("SELECT 1");
        let prepared =
            build_query_request(&s, &query, QueryBody::Sql).unwrap();
        assert!(url_of(&prepared).contains("enable_http_compression=1"));
        assert!(prepared
            .request
            .headers
            .iter()
            .any(|(k, v)| k == "Content-Encoding" && v == "gzip"));
        match &prepared.request.body {
            HttpBody::Bytes(b) => {
                // Gzip magic.
                assert_eq!(&b[..2], &[0x1F, 0x8B]);
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_roles_and_settings() {
        let mut s = settings();
        s.roles = vec!["r1".to_string(), "r2".to_string()];
        s.custom_settings =
            vec![("max_threads".to_string(), "2".to_string())];
        let query = QueryRequest::new("SELECT 1").options(
            QueryOptions::new()
                .setting("send_logs_level", "trace")
                .max_execution_time(std::time::Duration::from_secs(30)),
        );
        let prepared =
            build_query_request(&s, &query, QueryBody::Sql).unwrap();
        let url = url_of(&prepared);
        assert!(url.contains("role=r1"));
        assert!(url.contains("role=r2"));
        assert!(url.contains("max_threads=2"));
        assert!(url.contains("send_logs_level=trace"));
        assert!(url.contains("max_execution_time=30"));
    }

    #[test]
    fn test_parameter_conflict_surfaces() {
        let query = QueryRequest::new("SELECT {v:Int32}, {v:String}");
        assert!(matches!(
            build_query_request(&settings(), &query, QueryBody::Sql),
            Err(Error::ParameterConflict { .. })
        ));
    }

    #[test]
    fn test_exception_tag_shape() {
        let tag = generate_exception_tag();
        assert_eq!(tag.len(), 10);
        assert!(tag.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_exception_tag_header_matches_prepared() {
        let query = QueryRequest::new("SELECT 1");
        let prepared =
            build_query_request(&settings(), &query, QueryBody::Sql)
                .unwrap();
        let sent = prepared
            .request
            .headers
            .iter()
            .find(|(k, _)| k == "X-ClickHouse-Exception-Tag")
            .unwrap();
        assert_eq!(sent.1, prepared.exception_tag);
    }

    #[test]
    fn test_user_agent_printable() {
        let ua = user_agent();
        assert!(ua.starts_with("clickhouse-http-client/"));
        assert!(ua.chars().all(|c| (' '..='~').contains(&c)));
    }
}
