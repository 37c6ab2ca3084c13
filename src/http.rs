//! The HTTP collaborator boundary.
//!
//! The client core never talks to a socket itself: it hands a fully-formed
//! [`HttpRequest`] to an [`HttpTransport`] and gets back a status, headers
//! and a chunked body stream. The production transport is backed by
//! `reqwest`; tests substitute an in-memory mock.

use crate::io::chunked::BoxByteStream;
use crate::options::Settings;
use crate::{
    Error,
    Result,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use std::time::Duration;
use url::Url;

/// Request method; the client only ever needs these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET, used for `/ping`.
    Get,
    /// POST, used for everything else.
    Post,
}

/// A request body.
pub enum HttpBody {
    /// No body.
    Empty,
    /// A fully-buffered body.
    Bytes(Bytes),
    /// A caller-supplied streaming body.
    Stream(BoxByteStream),
}

impl std::fmt::Debug for HttpBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpBody::Empty => f.write_str("Empty"),
            HttpBody::Bytes(b) => write!(f, "Bytes({})", b.len()),
            HttpBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// A fully-formed request for the transport.
#[derive(Debug)]
pub struct HttpRequest {
    /// Request method.
    pub method: HttpMethod,
    /// Complete URL including the query string.
    pub url: Url,
    /// Request headers.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: HttpBody,
    /// Per-request deadline.
    pub timeout: Option<Duration>,
}

/// A response as the core consumes it: harvested head plus a body stream.
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers with lower-cased names.
    pub headers: Vec<(String, String)>,
    /// The chunked body.
    pub body: BoxByteStream,
}

impl HttpResponse {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish()
    }
}

/// The external HTTP collaborator.
///
/// Implementations own connection pooling, TLS and content encoding. The
/// core guarantees that every returned body is either fully read or dropped
/// (which aborts the underlying stream), so implementations can reclaim
/// connections.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends the request and resolves once response headers have arrived.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Production transport backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a transport from the client settings: deadline, gzip response
    /// decompression and certificate validation are configured here.
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(settings.compression)
            .danger_accept_invalid_certs(
                settings.skip_server_certificate_validation,
            );
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            Error::Config(format!("failed to build HTTP client: {}", e))
        })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };
        let mut builder = self.client.request(method, request.url);
        for (name, value) in &request.headers {
            // Content negotiation belongs to this transport; reqwest skips
            // auto-decompression when the header is set by hand.
            if name.eq_ignore_ascii_case("accept-encoding") {
                continue;
            }
            builder = builder.header(name, value);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        builder = match request.body {
            HttpBody::Empty => builder,
            HttpBody::Bytes(bytes) => builder.body(bytes),
            HttpBody::Stream(stream) => {
                builder.body(reqwest::Body::wrap_stream(stream))
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| {
                    (name.as_str().to_ascii_lowercase(), v.to_string())
                })
            })
            .collect();
        let body: BoxByteStream = Box::pin(response.bytes_stream().map(
            |chunk| {
                chunk.map_err(|e| std::io::Error::other(e.to_string()))
            },
        ));

        Ok(HttpResponse { status, headers, body })
    }
}
