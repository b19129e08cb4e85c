//! Core traits and types for APDU (Application Protocol Data Unit) operations
//!
//! This crate provides the building blocks shared by every layer that talks to a
//! smart-card-class secure element:
//!
//! - [`Command`] and [`Response`] according to ISO/IEC 7816-4, including extended
//!   length encoding for secure-messaging payloads
//! - [`StatusWord`] interpretation
//! - The [`CardTransport`] trait, the boundary to the physical transport (CCID,
//!   HID or NFC) which only knows how to exchange raw bytes
//!
//! Secure channel protocols are layered on top of this crate by decorating a
//! [`CardTransport`] with another implementation of the same trait.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod command;
pub mod response;
pub mod transport;

mod error;
pub use error::{Error, Result, ResultExt};

pub use command::{Command, ExpectedLength};
pub use response::Response;
pub use response::status::StatusWord;
pub use transport::{CardTransport, TransportError};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        Bytes, BytesMut, CardTransport, Command, Error, Response, Result, StatusWord,
        TransportError,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports() {
        let cmd = Command::new(0x00, 0xA4, 0x04, 0x00);
        assert_eq!(cmd.cla, 0x00);
        assert_eq!(cmd.ins, 0xA4);

        let resp = Response::success(Some(Bytes::from_static(&[0x01, 0x02, 0x03])));
        assert!(resp.is_success());
        assert_eq!(resp.payload().as_deref(), Some(&[0x01, 0x02, 0x03][..]));
        assert_eq!(resp.status(), StatusWord::new(0x90, 0x00));
    }
}
