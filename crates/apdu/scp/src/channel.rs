//! Secure channel transport
//!
//! [`ScpChannel`] decorates a raw [`CardTransport`] once a handshake has
//! succeeded: every command is wrapped before it is sent and every response is
//! verified and decrypted before it is returned. The channel implements
//! [`CardTransport`] itself, so application layers run over it unchanged.
//! Responses the card splits with `61xx` are fetched with GET RESPONSE and
//! joined before the R-MAC is checked.
//!
//! The channel takes `&mut self` for every exchange, which serializes commands.
//! A failed exchange leaves the chaining state indeterminate relative to the
//! card, so on any error the channel drops its session state and every later
//! call fails with [`Error::ChannelClosed`].

use std::fmt;

use bytes::Bytes;
use scpkit_apdu_core::{CardTransport, Command, Response};
use tracing::{debug, trace, warn};

use crate::{
    Error, Result,
    handshake::{SecureChannelHandshake, transmit},
    keys::{Scp03KeyParameters, Scp11KeyParameters},
    scp03::Scp03Handshake,
    scp11::Scp11Handshake,
    state::ScpState,
};

/// Transport protected by an SCP03 or SCP11 session
pub struct ScpChannel<T: CardTransport> {
    transport: T,
    state: Option<ScpState>,
}

impl<T: CardTransport> fmt::Debug for ScpChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScpChannel")
            .field("transport", &self.transport)
            .field("established", &self.is_established())
            .finish()
    }
}

impl<T: CardTransport> ScpChannel<T> {
    /// Run `handshake` over `transport` and wrap the transport in the
    /// resulting session
    ///
    /// Pass `&mut transport` to keep ownership of the transport when the
    /// handshake fails.
    pub fn open<H: SecureChannelHandshake>(mut transport: T, handshake: &mut H) -> Result<Self> {
        let state = handshake.perform(&mut transport)?;
        Ok(Self::from_state(transport, state))
    }

    /// Open an SCP03 channel with full security level and a random host challenge
    pub fn open_scp03(transport: T, params: &Scp03KeyParameters) -> Result<Self> {
        Self::open(transport, &mut Scp03Handshake::new(params))
    }

    /// Open an SCP11 channel with a fresh ephemeral key
    pub fn open_scp11(transport: T, params: &Scp11KeyParameters) -> Result<Self> {
        Self::open(transport, &mut Scp11Handshake::new(params))
    }

    /// Wrap a transport in an already established session
    pub const fn from_state(transport: T, state: ScpState) -> Self {
        Self {
            transport,
            state: Some(state),
        }
    }

    /// Whether the session is still usable
    pub const fn is_established(&self) -> bool {
        self.state.is_some()
    }

    /// Session state, `None` once closed
    pub const fn state(&self) -> Option<&ScpState> {
        self.state.as_ref()
    }

    /// Underlying transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Send a command through the secure channel
    ///
    /// Any error closes the channel.
    pub fn transmit(&mut self, command: &Command) -> Result<Response> {
        let Some(state) = self.state.as_mut() else {
            return Err(Error::ChannelClosed);
        };

        let result = state.wrap(command).and_then(|wrapped| {
            trace!(
                ins = format_args!("{:#04x}", command.ins),
                counter = state.chaining().counter(),
                "Sending wrapped command"
            );
            let response = transmit(&mut self.transport, &wrapped)?;
            state.unwrap(response)
        });

        result.inspect_err(|e| self.fail(e))
    }

    fn fail(&mut self, error: &Error) {
        warn!(%error, kind = ?error.kind(), "Closing secure channel");
        self.state = None;
    }

    /// Drop the session; its keys are zeroed
    pub fn close(&mut self) {
        if self.state.take().is_some() {
            debug!("Secure channel closed");
        }
    }

    /// Close the session and return the raw transport
    pub fn into_inner(mut self) -> T {
        self.close();
        self.transport
    }
}

impl<T: CardTransport> CardTransport for ScpChannel<T> {
    type Error = Error;

    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes> {
        let command = Command::from_bytes(command)?;
        Ok(self.transmit(&command)?.to_bytes())
    }

    fn is_connected(&self) -> bool {
        self.is_established() && self.transport.is_connected()
    }

    fn reset(&mut self) -> Result<()> {
        self.close();
        self.transport.reset().map_err(|e| Error::Apdu(e.into()))
    }
}
