//! GlobalPlatform secure channel engine
//!
//! This crate authenticates a host to a secure element and protects the APDU
//! traffic that follows, using the two GlobalPlatform families:
//!
//! - SCP03: mutual authentication with pre-shared AES keys
//! - SCP11a/b/c: ECDH key agreement over P-256 with optional OCE certificates
//!
//! Both handshakes produce an [`ScpState`], which [`ScpChannel`] uses to wrap
//! every command (encryption, C-MAC) and unwrap every response (R-MAC,
//! decryption). [`ScpChannel`] implements [`CardTransport`], so application
//! layers run over a secured transport exactly as over a plain one.
//!
//! # Examples
//!
//! ```no_run
//! # fn run<T: scpkit_apdu_core::CardTransport>(transport: T) -> scpkit_scp::Result<()> {
//! use scpkit_apdu_core::Command;
//! use scpkit_scp::{Scp03KeyParameters, ScpChannel};
//!
//! let params = Scp03KeyParameters::default_keys();
//! let mut channel = ScpChannel::open_scp03(transport, &params)?;
//!
//! let response = channel.transmit(&Command::new(0x80, 0xCA, 0x00, 0x66).with_le(0))?;
//! println!("{:?}", response.status());
//! # Ok(())
//! # }
//! ```
//!
//! [`CardTransport`]: scpkit_apdu_core::CardTransport
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod channel;
pub mod commands;
pub mod constants;
pub mod crypto;
pub mod handshake;
pub mod kdf;
pub mod keys;
pub mod scp03;
pub mod scp11;
pub mod state;
pub mod tlv;

mod error;
#[cfg(test)]
mod mock;

pub use channel::ScpChannel;
pub use error::{Error, ErrorKind, Result};
pub use handshake::{HandshakeState, SecureChannelHandshake};
pub use keys::{
    KeyMaterial, KeyReference, OceKeyReference, Scp03KeyParameters, Scp11KeyParameters,
    ScpKind, StaticKeys,
};
pub use scp03::Scp03Handshake;
pub use scp11::Scp11Handshake;
pub use state::{ChainingState, ScpState, SecurityLevel, SessionKeys};
pub use tlv::{Tlv, TlvMap};

// Key types of the public API
pub use p256::{PublicKey, SecretKey};
