//! OBD-II Error Types

use thiserror::Error;

/// Errors that can occur while talking to the adapter
#[derive(Debug, Error)]
pub enum ObdError {
    /// Serial port connection error
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// Timeout waiting for response
    #[error("Timeout waiting for OBD response after {0}ms")]
    Timeout(u64),

    /// Queue entry could not be parsed into a command
    #[error("Invalid command: {0:?}")]
    InvalidCommand(String),

    /// Transport is not connected (needs an external reconnect)
    #[error("OBD adapter not connected")]
    NotConnected,

    /// Adapter closed the link
    #[error("OBD adapter disconnected")]
    Disconnected,
}

impl From<std::io::Error> for ObdError {
    fn from(err: std::io::Error) -> Self {
        ObdError::SerialError(err.to_string())
    }
}

/// Errors raised when reading a field out of a response payload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    /// Requested nibble range does not fit inside the payload
    #[error("Nibbles {start}..{end} out of range for payload of {len} nibbles")]
    OutOfRange { start: usize, end: usize, len: usize },

    /// Payload contains a non-hex digit inside the requested range
    #[error("Invalid hex digits {0:?}")]
    InvalidHex(String),

    /// Field is wider than the extraction engine supports
    #[error("Field of {0} bytes is too wide")]
    TooWide(usize),
}
