//! Error types for the PLY codec.

use thiserror::Error;

/// Main error type for PLY operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Unrecognized `format` encoding or version token
    #[error("Unsupported PLY format: {0}")]
    UnsupportedFormat(String),

    /// Header grammar violation
    #[error("Malformed PLY header: {0}")]
    MalformedHeader(String),

    /// Type token not present in the type registry
    #[error("Unknown property type: {0}")]
    UnknownType(String),

    /// Request references an element that is not in the schema
    #[error("Element not found: {0}")]
    UnknownElement(String),

    /// Request references a property that is not declared on the element
    #[error("Property '{property}' not found on element '{element}'")]
    UnknownProperty { element: String, property: String },

    /// Structurally invalid request or add-properties call
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Typed access to a buffer with the wrong scalar type
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Body content does not decode per the declared schema
    #[error("Malformed PLY body: {0}")]
    MalformedBody(String),

    /// Post-read invariant violated (engine bug)
    #[error("Internal inconsistency: {0}")]
    InternalInconsistency(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a malformed header error.
    pub fn header(msg: impl Into<String>) -> Self {
        Self::MalformedHeader(msg.into())
    }

    /// Create a malformed body error.
    pub fn body(msg: impl Into<String>) -> Self {
        Self::MalformedBody(msg.into())
    }

    /// Create an invalid request error.
    pub fn request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Map a stream error raised while decoding the body.
    ///
    /// Running out of bytes mid-element is a content problem, not a transport one.
    pub(crate) fn from_body_io(err: std::io::Error, context: impl FnOnce() -> String) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::MalformedBody(format!("unexpected end of stream in {}", context()))
        } else {
            Self::Io(err)
        }
    }
}

/// Result type alias for PLY operations.
pub type Result<T> = std::result::Result<T, Error>;
