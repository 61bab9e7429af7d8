//! Error types for the FinTS client library.

use std::fmt;
use thiserror::Error;

use crate::dialog::DialogState;

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Codec direction a segment kind may or may not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encode,
    Decode,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Encode => f.write_str("encoding"),
            Direction::Decode => f.write_str("decoding"),
        }
    }
}

/// Error types that can occur while talking to a bank.
#[derive(Debug, Error)]
pub enum Error {
    /// Escaping or framing violation in wire text.
    #[error("Malformed wire data at byte {position}: {reason}")]
    MalformedWire { position: usize, reason: String },

    /// The segment kind has no codec for the requested direction.
    #[error("Segment {kind} does not support {direction}")]
    UnsupportedDirection { kind: String, direction: Direction },

    /// The segment kind cannot be encoded in the requested version.
    #[error("Segment {kind} does not support version {version}")]
    UnsupportedVersion { kind: String, version: u32 },

    /// Well-framed segment whose fields do not match the kind's layout.
    #[error("Unparseable {kind} segment: {reason}")]
    Unparseable { kind: String, reason: String },

    /// A field required for encoding is empty.
    #[error("Missing required field {field} in {kind} segment")]
    MissingField { kind: String, field: String },

    /// Lookup miss in a response.
    #[error("Segment {0} not found in response")]
    SegmentNotFound(String),

    /// The bank answered with an error return value.
    #[error("Bank error {code}: {message}")]
    Protocol { code: String, message: String },

    /// Dialog operation attempted outside its valid state.
    #[error("Cannot {operation} a dialog in state {state}")]
    InvalidDialogState {
        operation: &'static str,
        state: DialogState,
    },

    /// Failure reported by the transport collaborator.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid client configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Error parsing MT940 format.
    #[error("MT940 parsing error at line {line}: {message}")]
    Mt940ParseError { line: usize, message: String },

    /// Invalid date format.
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    /// Invalid amount format.
    #[error("Invalid amount format: {0}")]
    InvalidAmount(String),

    /// General statement parsing error.
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl Error {
    pub(crate) fn malformed(position: usize, reason: impl Into<String>) -> Self {
        Error::MalformedWire {
            position,
            reason: reason.into(),
        }
    }

    pub(crate) fn unparseable(kind: &str, reason: impl Into<String>) -> Self {
        Error::Unparseable {
            kind: kind.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing_field(kind: &str, field: &str) -> Self {
        Error::MissingField {
            kind: kind.to_string(),
            field: field.to_string(),
        }
    }

    pub(crate) fn unsupported(kind: &str, direction: Direction) -> Self {
        Error::UnsupportedDirection {
            kind: kind.to_string(),
            direction,
        }
    }
}
