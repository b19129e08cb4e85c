//! SCP03 handshake
//!
//! Mutual authentication with pre-shared AES keys:
//!
//! 1. INITIALIZE UPDATE sends the host challenge and returns the card challenge
//!    and card cryptogram.
//! 2. Session keys are derived from both challenges and the card cryptogram is
//!    checked locally. On mismatch the handshake stops here: EXTERNAL
//!    AUTHENTICATE would burn one of the card's limited authentication
//!    attempts.
//! 3. EXTERNAL AUTHENTICATE sends the host cryptogram, MACed from the zero
//!    chaining value, and selects the security level.

use tracing::{debug, trace, warn};

use crate::{
    Error, Result,
    commands::{
        ExternalAuthenticateCommand, InitializeUpdateCommand, InitializeUpdateResponse,
        expect_success,
    },
    constants::{
        derivation,
        sizes::{BLOCK, CHALLENGE},
    },
    crypto::constant_time_eq,
    handshake::{HandshakeState, SecureChannelHandshake, guarded, transmit},
    kdf::{derive_cryptogram, derive_session_keys},
    keys::Scp03KeyParameters,
    state::{ScpState, SecurityLevel},
};
use scpkit_apdu_core::CardTransport;

/// SCP03 handshake state machine
#[derive(Debug)]
pub struct Scp03Handshake<'a> {
    params: &'a Scp03KeyParameters,
    host_challenge: Option<[u8; CHALLENGE]>,
    security_level: SecurityLevel,
    state: HandshakeState,
}

impl<'a> Scp03Handshake<'a> {
    /// Create a handshake for the given key parameters
    pub fn new(params: &'a Scp03KeyParameters) -> Self {
        Self {
            params,
            host_challenge: None,
            security_level: SecurityLevel::default(),
            state: HandshakeState::Unauthenticated,
        }
    }

    /// Use a fixed host challenge instead of a random one
    pub const fn with_host_challenge(mut self, host_challenge: [u8; CHALLENGE]) -> Self {
        self.host_challenge = Some(host_challenge);
        self
    }

    /// Request a security level other than full protection
    pub const fn with_security_level(mut self, security_level: SecurityLevel) -> Self {
        self.security_level = security_level;
        self
    }
}

impl SecureChannelHandshake for Scp03Handshake<'_> {
    fn perform<T: CardTransport>(&mut self, transport: &mut T) -> Result<ScpState> {
        if self.state != HandshakeState::Unauthenticated {
            return Err(Error::InvalidState("SCP03 handshake already performed"));
        }

        let params = self.params;
        let security_level = self.security_level;
        let kvn = params.key_ref().kvn();
        let init_update = match self.host_challenge {
            Some(challenge) => InitializeUpdateCommand::with_challenge(kvn, challenge),
            None => InitializeUpdateCommand::with_random_challenge(kvn),
        };
        let host_challenge = *init_update.host_challenge();

        guarded(&mut self.state, |state| {
            debug!(key_ref = %params.key_ref(), "Starting SCP03 handshake");

            let response = transmit(transport, &init_update.to_command())?;
            expect_success("INITIALIZE UPDATE", &response)?;
            let init = InitializeUpdateResponse::parse(response.data())?;
            trace!(
                card_challenge = %hex::encode(init.card_challenge),
                scp_parameter = format_args!("{:#04x}", init.scp_parameter()),
                "INITIALIZE UPDATE response"
            );

            let keys = derive_session_keys(params.keys(), &host_challenge, &init.card_challenge)?;
            let expected = derive_cryptogram(
                derivation::CARD_CRYPTOGRAM,
                keys.mac(),
                &host_challenge,
                &init.card_challenge,
            )?;
            if !constant_time_eq(&expected, &init.card_cryptogram) {
                warn!(kvn = init.kvn(), "Card cryptogram mismatch");
                return Err(Error::AuthenticationFailed("card cryptogram mismatch"));
            }
            *state = HandshakeState::ChallengeExchanged;

            let host_cryptogram = derive_cryptogram(
                derivation::HOST_CRYPTOGRAM,
                keys.mac(),
                &host_challenge,
                &init.card_challenge,
            )?;

            let mut scp_state = ScpState::new(keys, [0u8; BLOCK], security_level);
            let command = scp_state.mac_command(
                &ExternalAuthenticateCommand::with_host_cryptogram(security_level, host_cryptogram)
                    .to_command(),
            )?;
            let response = transmit(transport, &command)?;
            expect_success("EXTERNAL AUTHENTICATE", &response)?;

            *state = HandshakeState::Authenticated;
            debug!(?security_level, "SCP03 channel established");
            Ok(scp_state)
        })
    }

    fn state(&self) -> HandshakeState {
        self.state
    }
}
