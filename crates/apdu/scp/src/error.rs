//! Error types for secure channel operations

use scpkit_apdu_core::StatusWord;
use thiserror::Error;

/// Result type for secure channel operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad failure categories
///
/// Callers react differently to each: bad keys or certificates call for
/// different credentials, transport failures for a reconnect, malformed data
/// for an abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// TLV or APDU structurally invalid
    MalformedData,
    /// Cryptogram, receipt or certificate verification failed
    AuthenticationFailed,
    /// Response MAC or chaining state failure after the handshake
    ChannelIntegrityFailure,
    /// Key parameter invariant violated
    InvalidParameters,
    /// Failure propagated from the underlying transport
    TransportFailure,
}

/// Error type for secure channel operations
#[derive(Debug, Error)]
pub enum Error {
    /// Errors from the APDU layer (transport, encoding)
    #[error(transparent)]
    Apdu(#[from] scpkit_apdu_core::Error),

    /// Malformed TLV, APDU or handshake payload
    #[error("Malformed data: {0}")]
    MalformedData(&'static str),

    /// Wrong data length
    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Key parameter invariant violated
    #[error("Invalid parameters: {0}")]
    InvalidParameters(&'static str),

    /// Invalid key reference identifier
    #[error("Invalid key identifier: {0:#04x}")]
    InvalidKeyId(u8),

    /// The card reported a protocol we do not speak
    #[error("Unsupported SCP version: {0:#04x}")]
    UnsupportedScpVersion(u8),

    /// Authentication of the card (or by the card) failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(&'static str),

    /// A handshake command was rejected by the card
    #[error("{command} rejected by card: {status} ({})", .status.description())]
    Rejected {
        /// Name of the rejected command
        command: &'static str,
        /// Status word returned by the card
        status: StatusWord,
    },

    /// Response MAC verification failed
    #[error("Response MAC verification failed")]
    ResponseMacMismatch,

    /// The encryption counter cannot be advanced any further
    #[error("Encryption counter exhausted")]
    CounterExhausted,

    /// The channel was closed, either explicitly or after a fatal failure
    #[error("Secure channel closed")]
    ChannelClosed,

    /// Handshake method called in the wrong state
    #[error("Invalid handshake state: {0}")]
    InvalidState(&'static str),

    /// Cryptographic primitive failure
    #[error("Cryptographic error: {0}")]
    Crypto(&'static str),
}

impl Error {
    /// Categorise this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Apdu(e) if e.is_transport() => ErrorKind::TransportFailure,
            Self::Apdu(_)
            | Self::MalformedData(_)
            | Self::InvalidLength { .. }
            | Self::UnsupportedScpVersion(_)
            | Self::Crypto(_) => ErrorKind::MalformedData,
            Self::InvalidParameters(_) | Self::InvalidKeyId(_) | Self::InvalidState(_) => {
                ErrorKind::InvalidParameters
            }
            Self::AuthenticationFailed(_) | Self::Rejected { .. } => {
                ErrorKind::AuthenticationFailed
            }
            Self::ResponseMacMismatch | Self::CounterExhausted | Self::ChannelClosed => {
                ErrorKind::ChannelIntegrityFailure
            }
        }
    }

    /// Create an invalid length error
    pub const fn invalid_length(expected: usize, actual: usize) -> Self {
        Self::InvalidLength { expected, actual }
    }
}

impl From<scpkit_apdu_core::TransportError> for Error {
    fn from(error: scpkit_apdu_core::TransportError) -> Self {
        Self::Apdu(error.into())
    }
}

impl From<Error> for scpkit_apdu_core::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::Apdu(e) => e,
            other => Self::SecureChannel(other.to_string()),
        }
    }
}
