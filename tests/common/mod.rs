//! Shared test helpers: an in-memory mock transport and response builders.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use clickhouse_http_client::codec::write_value;
use clickhouse_http_client::http::{
    HttpBody,
    HttpRequest,
    HttpResponse,
    HttpTransport,
};
use clickhouse_http_client::io::ByteWriter;
use clickhouse_http_client::{
    Client,
    Error,
    Result,
    Settings,
    Type,
    Value,
};
use futures_util::stream;
use futures_util::StreamExt;
use std::collections::VecDeque;
use std::sync::{
    Arc,
    Mutex,
};

/// One scripted response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub chunks: Vec<Bytes>,
}

impl MockResponse {
    pub fn ok() -> Self {
        Self { status: 200, headers: Vec::new(), chunks: Vec::new() }
    }

    pub fn status(status: u16) -> Self {
        Self { status, headers: Vec::new(), chunks: Vec::new() }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_lowercase(), value.to_string()));
        self
    }

    pub fn chunk(mut self, bytes: impl Into<Bytes>) -> Self {
        self.chunks.push(bytes.into());
        self
    }

    /// Splits the accumulated body into single-byte chunks, the worst case
    /// for the cursor's refill loop.
    pub fn shattered(mut self) -> Self {
        let whole: Vec<u8> =
            self.chunks.iter().flat_map(|c| c.to_vec()).collect();
        self.chunks = whole
            .into_iter()
            .map(|b| Bytes::copy_from_slice(&[b]))
            .collect();
        self
    }
}

/// A request as the transport saw it, with the body collected.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// In-memory [`HttpTransport`]: pops scripted responses in order and records
/// every request it sees.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<MockResponse>>,
    default_response: Mutex<Option<MockResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, response: MockResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Response returned when the scripted queue is empty.
    pub fn with_default(&self, response: MockResponse) {
        *self.default_response.lock().unwrap() = Some(response);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let body = match request.body {
            HttpBody::Empty => Vec::new(),
            HttpBody::Bytes(bytes) => bytes.to_vec(),
            HttpBody::Stream(mut stream) => {
                let mut collected = Vec::new();
                while let Some(chunk) = stream.next().await {
                    collected.extend_from_slice(&chunk.map_err(Error::Io)?);
                }
                collected
            }
        };
        self.requests.lock().unwrap().push(RecordedRequest {
            url: request.url.to_string(),
            headers: request.headers,
            body,
        });

        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.default_response.lock().unwrap().clone())
            .ok_or_else(|| {
                Error::Transport("no scripted response".to_string())
            })?;

        Ok(HttpResponse {
            status: response.status,
            headers: response.headers,
            body: Box::pin(stream::iter(
                response.chunks.into_iter().map(Ok),
            )),
        })
    }
}

/// Builds a client over the mock transport.
pub fn mock_client(transport: &Arc<MockTransport>) -> Client {
    let transport: Arc<dyn HttpTransport> = transport.clone();
    Client::with_transport(Settings::new("mock", 8123), transport).unwrap()
}

/// Serializes a `RowBinaryWithNamesAndTypes` body: schema header plus rows.
pub fn rbwnat_body(columns: &[(&str, &str)], rows: &[Vec<Value>]) -> Bytes {
    let mut w = ByteWriter::new();
    w.write_varint(columns.len() as u64);
    for (name, _) in columns {
        w.write_string(name);
    }
    for (_, type_str) in columns {
        w.write_string(type_str);
    }
    for row in rows {
        assert_eq!(row.len(), columns.len(), "row width mismatch");
        for ((_, type_str), value) in columns.iter().zip(row) {
            let ty = Type::parse(type_str).unwrap();
            write_value(&mut w, &ty, value).unwrap();
        }
    }
    w.into_bytes()
}

/// The mid-stream exception sentinel as ClickHouse emits it.
pub fn exception_sentinel(tag: &str, message: &str) -> Bytes {
    Bytes::from(format!(
        "__exception__{tag}\n{message}\n{} {tag}__exception__",
        message.len()
    ))
}
