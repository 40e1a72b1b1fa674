//! Error types for message composition.

/// Result type alias for composition operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while validating or serialising a message.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Address does not match the accepted email syntax.
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    /// An address list that must not be empty was empty.
    #[error("empty address list")]
    EmptyAddressList,

    /// A field required for serialisation was empty.
    #[error("empty {0} during serialisation")]
    MissingField(&'static str),

    /// A multipart container with no parts cannot be serialised.
    #[error("multipart container has no parts")]
    EmptyMultipart,

    /// The message failed its validity check.
    #[error("message is not valid: {0}")]
    InvalidMessage(&'static str),
}
