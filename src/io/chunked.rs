//! Chunked response-body plumbing.
//!
//! [`ChunkedBody`] pulls [`Bytes`] chunks from the HTTP collaborator's body
//! stream, honors cancellation, and records a rolling tail of the raw bytes.
//! When a codec read hits a premature end of stream, the row cursor scans
//! that tail for the mid-stream exception sentinel
//! `__exception__<TOKEN>\n<message>\n<size> <TOKEN>__exception__`.

use crate::{
    Error,
    Result,
};
use bytes::Bytes;
use futures_util::StreamExt;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// A boxed stream of body chunks, the shape both the reqwest transport and
/// test mocks produce.
pub type BoxByteStream =
    Pin<Box<dyn futures_util::Stream<Item = std::io::Result<Bytes>> + Send>>;

/// The opening/closing marker of the mid-stream exception sentinel.
pub(crate) const EXCEPTION_MARKER: &[u8] = b"__exception__";

/// How many trailing body bytes are kept for sentinel detection.
pub(crate) const TAIL_CAPACITY: usize = 4096;

/// An async chunk source with cancellation and a sentinel tail.
pub struct ChunkedBody {
    stream: BoxByteStream,
    cancel: Option<CancellationToken>,
    tail: Vec<u8>,
    finished: bool,
}

impl ChunkedBody {
    /// Wraps a body stream. When `cancel` is set, every chunk await races
    /// the token.
    pub fn new(stream: BoxByteStream, cancel: Option<CancellationToken>) -> Self {
        Self { stream, cancel, tail: Vec::new(), finished: false }
    }

    /// Returns the next chunk, `None` at end of stream.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.finished {
            return Ok(None);
        }
        if let Some(token) = &self.cancel {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }
        }

        let next = match &self.cancel {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => return Err(Error::Cancelled),
                    next = self.stream.next() => next,
                }
            }
            None => self.stream.next().await,
        };

        match next {
            Some(Ok(chunk)) => {
                self.record_tail(&chunk);
                Ok(Some(chunk))
            }
            Some(Err(e)) => {
                self.finished = true;
                Err(Error::Io(e))
            }
            None => {
                self.finished = true;
                Ok(None)
            }
        }
    }

    /// The rolling tail of raw body bytes, at most [`TAIL_CAPACITY`] long.
    pub fn tail(&self) -> &[u8] {
        &self.tail
    }

    fn record_tail(&mut self, chunk: &[u8]) {
        if chunk.len() >= TAIL_CAPACITY {
            self.tail.clear();
            self.tail.extend_from_slice(&chunk[chunk.len() - TAIL_CAPACITY..]);
            return;
        }
        let overflow = (self.tail.len() + chunk.len())
            .saturating_sub(TAIL_CAPACITY);
        if overflow > 0 {
            self.tail.drain(..overflow);
        }
        self.tail.extend_from_slice(chunk);
    }
}

impl std::fmt::Debug for ChunkedBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedBody")
            .field("tail_len", &self.tail.len())
            .field("finished", &self.finished)
            .finish()
    }
}

/// Scans a body tail for the exception sentinel of the given tag and parses
/// `(code, message)` out of it.
///
/// The closing `<size> <TOKEN>__exception__` marker may be missing when the
/// server died mid-write; in that case everything after the opening marker
/// up to the last newline is the message.
pub(crate) fn find_stream_exception(
    tail: &[u8],
    tag: &str,
) -> Option<(i32, String)> {
    let mut needle = EXCEPTION_MARKER.to_vec();
    needle.extend_from_slice(tag.as_bytes());
    let start = find_last(tail, &needle)?;

    let mut rest = &tail[start + needle.len()..];
    if rest.first() == Some(&b'\n') {
        rest = &rest[1..];
    }
    let text = String::from_utf8_lossy(rest);

    let closing = format!("{}__exception__", tag);
    let message = match text.find(&closing) {
        Some(pos) => {
            let before = &text[..pos];
            match before.rfind('\n') {
                Some(nl) => before[..nl].to_string(),
                None => before.trim_end().to_string(),
            }
        }
        None => match text.rfind('\n') {
            Some(nl) => text[..nl].to_string(),
            None => text.into_owned(),
        },
    };

    let code = parse_error_code(&message);
    Some((code, message))
}

/// Extracts the leading `Code: <digits>. ` error code, 0 when absent.
pub(crate) fn parse_error_code(message: &str) -> i32 {
    fn leading_code(message: &str) -> Option<i32> {
        let rest = message.strip_prefix("Code: ")?;
        let digits: String =
            rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() || !rest[digits.len()..].starts_with('.') {
            return None;
        }
        digits.parse().ok()
    }
    leading_code(message).unwrap_or(0)
}

fn find_last(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len())
        .rev()
        .find(|&i| &haystack[i..i + needle.len()] == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn body(chunks: Vec<&'static [u8]>) -> ChunkedBody {
        let stream = stream::iter(
            chunks.into_iter().map(|c| Ok(Bytes::from_static(c))),
        );
        ChunkedBody::new(Box::pin(stream), None)
    }

    #[tokio::test]
    async fn test_chunks_and_tail() {
        let mut body = body(vec![b"hello ", b"world"]);
        assert_eq!(
            body.next_chunk().await.unwrap(),
            Some(Bytes::from_static(b"hello "))
        );
        assert_eq!(
            body.next_chunk().await.unwrap(),
            Some(Bytes::from_static(b"world"))
        );
        assert_eq!(body.next_chunk().await.unwrap(), None);
        assert_eq!(body.tail(), b"hello world");
    }

    #[tokio::test]
    async fn test_tail_is_bounded() {
        let chunk: Vec<u8> = (0..TAIL_CAPACITY + 100)
            .map(|i| (i % 251) as u8)
            .collect();
        let chunk = Bytes::from(chunk);
        let stream = stream::iter(vec![Ok(chunk.clone())]);
        let mut body = ChunkedBody::new(Box::pin(stream), None);
        body.next_chunk().await.unwrap();
        assert_eq!(body.tail().len(), TAIL_CAPACITY);
        assert_eq!(body.tail(), &chunk[100..]);
    }

    #[tokio::test]
    async fn test_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let stream = stream::iter(vec![Ok(Bytes::from_static(b"x"))]);
        let mut body = ChunkedBody::new(Box::pin(stream), Some(token));
        assert!(matches!(
            body.next_chunk().await,
            Err(Error::Cancelled)
        ));
    }

    #[test]
    fn test_sentinel_with_closing_marker() {
        let tail =
            b"rowdata__exception__PU1FNUFH98\nCode: 395. boom\n14 PU1FNUFH98__exception__";
        let (code, message) =
            find_stream_exception(tail, "PU1FNUFH98").unwrap();
        assert_eq!(code, 395);
        assert_eq!(message, "Code: 395. boom");
    }

    #[test]
    fn test_sentinel_without_closing_marker() {
        let tail = b"rowdata__exception__ABCDEFGHIJ\nCode: 241. oom\n";
        let (code, message) =
            find_stream_exception(tail, "ABCDEFGHIJ").unwrap();
        assert_eq!(code, 241);
        assert_eq!(message, "Code: 241. oom");
    }

    #[test]
    fn test_sentinel_absent_or_wrong_tag() {
        assert!(find_stream_exception(b"plain row data", "TAG").is_none());
        let tail = b"__exception__OTHERTAG00\nCode: 1. x\n";
        assert!(find_stream_exception(tail, "ABCDEFGHIJ").is_none());
    }

    #[test]
    fn test_error_code_parse() {
        assert_eq!(parse_error_code("Code: 395. boom"), 395);
        assert_eq!(parse_error_code("no code here"), 0);
        assert_eq!(parse_error_code("Code: x. nope"), 0);
    }
}
