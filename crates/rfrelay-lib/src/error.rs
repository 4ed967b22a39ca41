//! Unified error type for the rfrelay-lib crate.
//!
//! [`RelayError`] covers the protocol taxonomy (not found, message too long,
//! timeout, malformed reply, unknown model, device closed) plus the transport,
//! argument and configuration failures around it. Transport timeouts are
//! lifted into [`RelayError::Timeout`] so callers can tell them apart from
//! every other transport failure.

use std::fmt;

use crate::transport::TransportError;

/// Unified error type for rfrelay-lib operations.
#[derive(Debug)]
pub enum RelayError {
    /// No device matched the requested serial/model pattern.
    NotFound,
    /// Payload does not fit in one frame (length given).
    MessageTooLong(usize),
    /// A USB write or read exceeded its timeout.
    Timeout(String),
    /// A string reply had no NUL terminator.
    MalformedReply(String),
    /// No switch strategy exists for this model string.
    UnknownModel(String),
    /// Operation attempted after `close()`.
    DeviceClosed,
    /// Any other transport failure (open, claim, transfer).
    Transport(TransportError),
    /// Reply decoded but its content could not be interpreted.
    UnexpectedReply(String),
    /// Caller supplied a value the protocol cannot express.
    InvalidArgument(String),
    /// Configuration validation error.
    Config(String),
    /// Standard I/O error (config persistence).
    Io(std::io::Error),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::NotFound => write!(f, "Relay device not found"),
            RelayError::MessageTooLong(len) => {
                write!(f, "Message is too long: {len} bytes (max 63)")
            }
            RelayError::Timeout(e) => write!(f, "Timed out: {e}"),
            RelayError::MalformedReply(what) => {
                write!(f, "Malformed reply: no terminator in {what}")
            }
            RelayError::UnknownModel(model) => write!(f, "Unknown model type {model}"),
            RelayError::DeviceClosed => write!(f, "Device is closed"),
            RelayError::Transport(e) => write!(f, "{e}"),
            RelayError::UnexpectedReply(e) => write!(f, "Unexpected reply: {e}"),
            RelayError::InvalidArgument(e) => write!(f, "Invalid argument: {e}"),
            RelayError::Config(e) => write!(f, "Config error: {e}"),
            RelayError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelayError::Transport(e) => Some(e),
            RelayError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for RelayError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Timeout(ctx) => RelayError::Timeout(ctx),
            other => RelayError::Transport(other),
        }
    }
}

impl From<std::io::Error> for RelayError {
    fn from(e: std::io::Error) -> Self {
        RelayError::Io(e)
    }
}

/// Crate-level Result alias using [`RelayError`].
pub type Result<T> = std::result::Result<T, RelayError>;
