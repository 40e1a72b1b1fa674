//! Error types for SMTP operations.

use std::io;
use std::time::Duration;

use crate::types::ReplyCode;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
///
/// Configuration and message errors are rejected up front and leave an
/// established session untouched; protocol and transport errors during a
/// session close the connection, so the next operation must reconnect.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Client-side configuration problem, detected before any I/O.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// A wait on the transport exceeded its deadline.
    #[error("timed out after {0:?} while {1}")]
    Timeout(Duration, &'static str),

    /// The terminal reply line carried an unexpected code.
    #[error("invalid response, expected {expected}, received: {line}")]
    UnexpectedReply {
        /// Code the conversation state called for.
        expected: ReplyCode,
        /// The offending reply line, verbatim.
        line: String,
    },

    /// A reply line did not have the `DDD<sep><text>` shape.
    #[error("malformed reply line: {0}")]
    MalformedReply(String),

    /// Server data was already buffered when a send was attempted.
    #[error("unsolicited server data pending before send")]
    Crosstalk,

    /// The server does not offer a required capability.
    #[error("server does not support {0}")]
    NotSupported(String),

    /// The message failed its validity check.
    #[error("message is not valid")]
    InvalidMessage,

    /// The message could not be serialised.
    #[error("message serialisation failed: {0}")]
    Message(#[from] mailcourier_mime::Error),
}
