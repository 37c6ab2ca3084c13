//! Error types for the ClickHouse client.
//!
//! All fallible operations in this crate return [`Result<T>`], which is an
//! alias for `std::result::Result<T, Error>`.

use thiserror::Error;

/// Errors that can occur when using the ClickHouse client.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed connection string or invalid client/plan configuration.
    /// Raised synchronously, before any I/O.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A type string or parameter SQL could not be parsed.
    #[error("Parse error at position {position}: {message}")]
    Parse {
        /// Description of what failed to parse.
        message: String,
        /// Byte offset in the input where parsing failed.
        position: usize,
    },

    /// Two `{name:Type}` placeholders for the same name disagree on type.
    #[error("Conflicting types for parameter '{name}': '{first}' vs '{second}'")]
    ParameterConflict {
        /// The parameter name.
        name: String,
        /// The type declared by the first occurrence.
        first: String,
        /// The type declared by the conflicting occurrence.
        second: String,
    },

    /// A host value cannot be represented in the target ClickHouse type
    /// without loss.
    #[error("Value out of range: {0}")]
    ValueOutOfRange(String),

    /// Failure from the HTTP collaborator before response headers arrived.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status.
    #[error("Server error {code}: {message}")]
    Server {
        /// ClickHouse error code, 0 when the body carried no `Code:` prefix.
        code: i32,
        /// Error message from the server.
        message: String,
    },

    /// A mid-stream error detected via the exception-tag sentinel inside a
    /// streaming 200 response.
    #[error("Server stream error {code}: {message}")]
    ServerStream {
        /// ClickHouse error code, 0 when the sentinel carried no `Code:` prefix.
        code: i32,
        /// Error message extracted from the sentinel.
        message: String,
    },

    /// The body ended before a value boundary and no exception sentinel was
    /// found.
    #[error("Unexpected end of stream")]
    UnexpectedEndOfStream,

    /// Cancellation was signalled while the operation was in flight.
    #[error("Operation cancelled")]
    Cancelled,

    /// An operation was invoked in a state that does not permit it, such as
    /// reading a column before the first row.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A wire-level violation: malformed varint, undeclared enum tag, bad
    /// variant discriminator, or similar structurally invalid data.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// An I/O error surfaced by the body stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid UTF-8 was encountered when reading a string.
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Internal sentinel: a decode step ran out of buffered bytes and the
    /// caller should refill and retry. Never surfaced to library users; a
    /// refill that cannot make progress becomes [`Error::UnexpectedEndOfStream`].
    #[error("not enough data buffered")]
    NotEnoughData,
}

impl Error {
    /// Shorthand for a [`Error::Parse`] with a position.
    pub(crate) fn parse(message: impl Into<String>, position: usize) -> Self {
        Error::Parse { message: message.into(), position }
    }
}

/// A type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Server { code: 395, message: "boom".to_string() };
        assert_eq!(err.to_string(), "Server error 395: boom");

        let err = Error::parse("unexpected token", 7);
        assert_eq!(
            err.to_string(),
            "Parse error at position 7: unexpected token"
        );
    }

    #[test]
    fn test_parameter_conflict_display() {
        let err = Error::ParameterConflict {
            name: "val".to_string(),
            first: "Int32".to_string(),
            second: "String".to_string(),
        };
        assert!(err.to_string().contains("val"));
        assert!(err.to_string().contains("Int32"));
    }
}
