//! Handshake abstraction shared by SCP03 and SCP11
//!
//! Each protocol family drives its own exchange with the card and hands the
//! resulting [`ScpState`] to the secure channel, which does not care which
//! handshake produced it.

use std::fmt;

use bytes::BytesMut;
use scpkit_apdu_core::{CardTransport, Command, Response};
use tracing::trace;

use crate::{
    Error, Result,
    constants::{cla, ins},
    state::ScpState,
};

/// Progress of a handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeState {
    /// Nothing sent yet
    Unauthenticated,
    /// SCP03: INITIALIZE UPDATE answered and the card cryptogram verified
    ChallengeExchanged,
    /// SCP11a/c: the OCE certificate chain was accepted by the card
    CertificateVerified,
    /// SCP11: shared secret established and the receipt verified
    KeyAgreed,
    /// Handshake completed, session state handed over
    Authenticated,
    /// Handshake failed; start over with a fresh instance
    Error,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unauthenticated => "unauthenticated",
            Self::ChallengeExchanged => "challenge exchanged",
            Self::CertificateVerified => "certificate verified",
            Self::KeyAgreed => "key agreed",
            Self::Authenticated => "authenticated",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// A secure channel handshake
///
/// A handshake runs once. Any failure moves it to [`HandshakeState::Error`]
/// for good, since challenges and chaining state cannot be reused.
pub trait SecureChannelHandshake {
    /// Run the handshake over `transport`
    fn perform<T: CardTransport>(&mut self, transport: &mut T) -> Result<ScpState>;

    /// Current state
    fn state(&self) -> HandshakeState;
}

/// GET RESPONSE rounds accepted for a single command
const MAX_GET_RESPONSE: usize = 10;

fn send<T: CardTransport>(transport: &mut T, command: &Command) -> Result<Response> {
    let raw = command.to_bytes()?;
    let response = transport
        .transmit_raw(&raw)
        .map_err(|e| Error::Apdu(e.into()))?;
    Ok(Response::from_bytes(&response)?)
}

/// Send one command and parse the response
///
/// A 61xx answer is followed up with GET RESPONSE until the card returns a
/// final status; the parts are joined before anything verifies them.
pub(crate) fn transmit<T: CardTransport>(transport: &mut T, command: &Command) -> Result<Response> {
    let mut response = send(transport, command)?;
    if !response.status().is_more_data_available() {
        return Ok(response);
    }

    let mut data = BytesMut::new();
    let mut rounds = 0;
    while response.status().is_more_data_available() {
        if rounds == MAX_GET_RESPONSE {
            return Err(scpkit_apdu_core::Error::ChainLimitExceeded.into());
        }
        data.extend_from_slice(response.data());

        let available = response.status().sw2;
        trace!(available, "Fetching remaining response data");
        let get_response =
            Command::new(cla::ISO, ins::GET_RESPONSE, 0x00, 0x00).with_le(available.into());
        response = send(transport, &get_response)?;
        rounds += 1;
    }
    data.extend_from_slice(response.data());

    Ok(Response::new(Some(data.freeze()), response.status()))
}

/// Run `step`, moving `state` to [`HandshakeState::Error`] when it fails
pub(crate) fn guarded<R>(
    state: &mut HandshakeState,
    step: impl FnOnce(&mut HandshakeState) -> Result<R>,
) -> Result<R> {
    let result = step(state);
    if result.is_err() {
        *state = HandshakeState::Error;
    }
    result
}
