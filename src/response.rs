//! Response dispatch: header harvesting and server-error mapping.
//!
//! Before the body is handed to a reader, the dispatcher pulls the
//! ClickHouse headers off the response: query id, server timezone, the
//! `X-ClickHouse-Summary` statistics JSON and the echoed exception tag.
//! Non-2xx responses are consumed fully and parsed into a server error.

use crate::http::{
    HttpResponse,
    HttpTransport,
};
use crate::io::chunked::{
    parse_error_code,
    ChunkedBody,
};
use crate::request::PreparedRequest;
use crate::{
    Error,
    Result,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Query statistics from the `X-ClickHouse-Summary` response header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryStats {
    /// Rows read server-side.
    pub read_rows: u64,
    /// Bytes read server-side.
    pub read_bytes: u64,
    /// Rows written server-side.
    pub written_rows: u64,
    /// Bytes written server-side.
    pub written_bytes: u64,
    /// Estimated total rows to read.
    pub total_rows_to_read: u64,
    /// Rows in the result set.
    pub result_rows: u64,
    /// Bytes in the result set.
    pub result_bytes: u64,
    /// Server-side elapsed time in nanoseconds.
    pub elapsed_ns: u64,
}

impl QueryStats {
    /// Parses the summary header. ClickHouse sends a JSON object whose
    /// integer fields are quoted strings; bare numbers are tolerated too.
    /// Unknown fields are ignored, missing fields stay zero.
    pub(crate) fn from_summary(summary: &str) -> QueryStats {
        let mut stats = QueryStats::default();
        let parsed: serde_json::Value = match serde_json::from_str(summary) {
            Ok(v) => v,
            Err(_) => return stats,
        };
        let Some(object) = parsed.as_object() else {
            return stats;
        };
        for (key, value) in object {
            let number = value
                .as_u64()
                .or_else(|| value.as_str().and_then(|s| s.parse().ok()));
            let Some(number) = number else { continue };
            match key.as_str() {
                "read_rows" => stats.read_rows = number,
                "read_bytes" => stats.read_bytes = number,
                "written_rows" => stats.written_rows = number,
                "written_bytes" => stats.written_bytes = number,
                "total_rows_to_read" => stats.total_rows_to_read = number,
                "result_rows" => stats.result_rows = number,
                "result_bytes" => stats.result_bytes = number,
                "elapsed_ns" => stats.elapsed_ns = number,
                _ => {}
            }
        }
        stats
    }
}

/// The harvested head of a successful query response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    /// Query id echoed by the server (falls back to the one we sent).
    pub query_id: String,
    /// Server timezone from `X-ClickHouse-Timezone`.
    pub server_timezone: Option<String>,
    /// Parsed summary statistics.
    pub stats: QueryStats,
    /// The echoed exception tag, present when the server has mid-stream
    /// error reporting enabled.
    pub exception_tag: Option<String>,
}

/// Sends a prepared request and splits the response into head and body.
///
/// Non-2xx responses are drained and turned into [`Error::Server`].
pub(crate) async fn dispatch(
    transport: &dyn HttpTransport,
    prepared: PreparedRequest,
    cancel: Option<CancellationToken>,
) -> Result<(ResponseHead, ChunkedBody)> {
    let PreparedRequest { request, query_id, exception_tag: _ } = prepared;
    debug!(url = %request.url, "dispatching request");

    let response = match &cancel {
        Some(token) => {
            tokio::select! {
                _ = token.cancelled() => return Err(Error::Cancelled),
                response = transport.send(request) => response?,
            }
        }
        None => transport.send(request).await?,
    };

    if !(200..300).contains(&response.status) {
        return Err(server_error_from_response(response, cancel).await);
    }

    let query_id = response
        .header("x-clickhouse-query-id")
        .map(str::to_string)
        .unwrap_or(query_id);
    let server_timezone =
        response.header("x-clickhouse-timezone").map(str::to_string);
    let stats = response
        .header("x-clickhouse-summary")
        .map(QueryStats::from_summary)
        .unwrap_or_default();
    // The reader only scans for the sentinel when the response carried a
    // tag; the header value is the token that frames the sentinel.
    let exception_tag = response
        .header("x-clickhouse-exception-tag")
        .map(str::to_string);

    debug!(%query_id, ?stats, "response headers harvested");
    let head =
        ResponseHead { query_id, server_timezone, stats, exception_tag };
    Ok((head, ChunkedBody::new(response.body, cancel)))
}

/// Reads the error body of a non-2xx response and maps it to
/// [`Error::Server`] via the `Code: <digits>. ` prefix.
async fn server_error_from_response(
    response: HttpResponse,
    cancel: Option<CancellationToken>,
) -> Error {
    const MAX_ERROR_BODY: usize = 1 << 20;

    let status = response.status;
    let mut body = ChunkedBody::new(response.body, cancel);
    let mut message = Vec::new();
    loop {
        match body.next_chunk().await {
            Ok(Some(chunk)) => {
                if message.len() < MAX_ERROR_BODY {
                    message.extend_from_slice(&chunk);
                }
            }
            Ok(None) => break,
            Err(e) => return e,
        }
    }
    let message = String::from_utf8_lossy(&message).trim().to_string();
    if message.is_empty() {
        return Error::Server {
            code: 0,
            message: format!("HTTP status {}", status),
        };
    }
    Error::Server { code: parse_error_code(&message), message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_with_quoted_integers() {
        let stats = QueryStats::from_summary(
            r#"{"read_rows":"3","read_bytes":"24","written_rows":"0",
                "written_bytes":"0","total_rows_to_read":"3",
                "result_rows":"3","result_bytes":"72","elapsed_ns":"463"}"#,
        );
        assert_eq!(stats.read_rows, 3);
        assert_eq!(stats.read_bytes, 24);
        assert_eq!(stats.total_rows_to_read, 3);
        assert_eq!(stats.result_bytes, 72);
        assert_eq!(stats.elapsed_ns, 463);
    }

    #[test]
    fn test_summary_tolerates_garbage() {
        assert_eq!(
            QueryStats::from_summary("not json"),
            QueryStats::default()
        );
        assert_eq!(QueryStats::from_summary("[]"), QueryStats::default());
        let stats =
            QueryStats::from_summary(r#"{"read_rows":7,"unknown":"x"}"#);
        assert_eq!(stats.read_rows, 7);
    }
}
