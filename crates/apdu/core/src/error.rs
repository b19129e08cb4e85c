//! Core error type for APDU operations
//!
//! Errors raised while building, parsing or exchanging APDUs. Protocol layers
//! built on top of this crate wrap this type in their own error enums.

use crate::response::status::StatusWord;
use crate::transport::TransportError;

/// Result type for APDU operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type that encompasses all possible errors in the crate
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error raised by the underlying transport
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Response shorter than a status word
    #[error("Incomplete response: {0} bytes")]
    IncompleteResponse(usize),

    /// Parse error when processing a command or response
    #[error("Parse error: {0}")]
    Parse(&'static str),

    /// Status word returned by the card indicates failure
    #[error("Status error {status}: {}", .status.description())]
    Status {
        /// Status word that caused the error
        status: StatusWord,
    },

    /// Invalid command length
    #[error("Invalid command length: {0}")]
    InvalidCommandLength(usize),

    /// Command payload does not fit the selected encoding
    #[error("Command data too long: {0} bytes")]
    DataTooLong(usize),

    /// Card kept answering 61xx past the GET RESPONSE limit
    #[error("Response chain limit exceeded")]
    ChainLimitExceeded,

    /// Error raised by a secure channel decorating a transport
    #[error("Secure channel error: {0}")]
    SecureChannel(String),

    /// Context error with message and source error
    #[error("{context}: {source}")]
    Context {
        /// Contextual message
        context: String,
        /// Source error
        source: Box<Self>,
    },
}

impl Error {
    /// Create a new error with context information
    pub fn with_context<S: Into<String>>(self, context: S) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a new status error
    pub const fn status(sw1: u8, sw2: u8) -> Self {
        Self::Status {
            status: StatusWord::new(sw1, sw2),
        }
    }

    /// Create a new parse error
    pub const fn parse(message: &'static str) -> Self {
        Self::Parse(message)
    }

    /// Check whether this error originated in the transport
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Context { source, .. } => source.is_transport(),
            _ => false,
        }
    }
}

/// Extension trait for Result with APDU Errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context<S: Into<String>>(self, context: S) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context<S: Into<String>>(self, context: S) -> Self {
        self.map_err(|e| e.with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_keeps_transport_origin() {
        let err: Result<()> = Err(TransportError::Timeout.into());
        let err = err.context("INITIALIZE UPDATE").unwrap_err();

        assert!(err.is_transport());
        assert_eq!(err.to_string(), "INITIALIZE UPDATE: Operation timed out");
    }

    #[test]
    fn test_status_error_display() {
        let err = Error::status(0x69, 0x82);
        assert_eq!(
            err.to_string(),
            "Status error 69 82: Security status not satisfied"
        );
        assert!(!err.is_transport());
    }
}
