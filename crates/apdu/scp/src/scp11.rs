//! SCP11 handshake
//!
//! Elliptic curve key agreement over P-256 (GlobalPlatform Amendment F):
//!
//! - SCP11a/c first present the OCE certificate chain with PERFORM SECURITY
//!   OPERATION, leaf last.
//! - The host sends an ephemeral public key with INTERNAL AUTHENTICATE (SCP11b)
//!   or EXTERNAL AUTHENTICATE (SCP11a/c) and receives the card's ephemeral key
//!   and a receipt.
//! - The shared secret is `ECDH(eSK.OCE, ePK.SD) || ECDH(SK.OCE, PK.SD)`, where
//!   SCP11b uses the ephemeral key in place of the static OCE key. The X9.63
//!   KDF turns it into a receipt key and the four session keys.
//! - The receipt, a CMAC over the command data and the card's ephemeral key
//!   record, authenticates the card and seeds the MAC chain.

use p256::SecretKey;
use scpkit_apdu_core::CardTransport;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::{
    Error, Result,
    commands::{
        KeyAgreementCommand, KeyAgreementResponse, PerformSecurityOperationCommand,
        expect_success,
    },
    constants::{scp11, sizes::BLOCK},
    crypto::{cmac, constant_time_eq, ecdh, x963_kdf},
    handshake::{HandshakeState, SecureChannelHandshake, guarded, transmit},
    keys::{Scp11KeyParameters, ScpKind},
    state::{ScpState, SecurityLevel, SessionKeys},
};

/// Shared info of the X9.63 KDF: key usage, key type, key length
const SHARED_INFO: [u8; 3] = [scp11::KEY_USAGE, scp11::KEY_TYPE_AES, scp11::KEY_LENGTH];

/// SCP11 handshake state machine
#[derive(Debug)]
pub struct Scp11Handshake<'a> {
    params: &'a Scp11KeyParameters,
    ephemeral_key: Option<SecretKey>,
    state: HandshakeState,
}

impl<'a> Scp11Handshake<'a> {
    /// Create a handshake for the given key parameters
    pub const fn new(params: &'a Scp11KeyParameters) -> Self {
        Self {
            params,
            ephemeral_key: None,
            state: HandshakeState::Unauthenticated,
        }
    }

    /// Use a fixed ephemeral key instead of a freshly generated one
    pub fn with_ephemeral_key(mut self, ephemeral_key: SecretKey) -> Self {
        self.ephemeral_key = Some(ephemeral_key);
        self
    }
}

impl SecureChannelHandshake for Scp11Handshake<'_> {
    fn perform<T: CardTransport>(&mut self, transport: &mut T) -> Result<ScpState> {
        if self.state != HandshakeState::Unauthenticated {
            return Err(Error::InvalidState("SCP11 handshake already performed"));
        }

        let params = self.params;
        let esk_oce = self
            .ephemeral_key
            .take()
            .unwrap_or_else(|| SecretKey::random(&mut rand_v8::thread_rng()));

        guarded(&mut self.state, |state| {
            let key_ref = params.key_ref();
            debug!(%key_ref, "Starting SCP11 handshake");

            if matches!(key_ref.kind(), ScpKind::Scp11a | ScpKind::Scp11c) {
                send_certificates(transport, params)?;
                *state = HandshakeState::CertificateVerified;
            }

            let command = KeyAgreementCommand::new(key_ref, &esk_oce.public_key())?;
            let name = match key_ref.kind() {
                ScpKind::Scp11b => "INTERNAL AUTHENTICATE",
                _ => "EXTERNAL AUTHENTICATE",
            };
            let response = transmit(transport, &command.to_command())?;
            expect_success(name, &response)?;
            let agreement = KeyAgreementResponse::parse(response.data())?;

            let sk_oce = params.sk_oce_ecka()?;
            let ka1 = ecdh(&esk_oce, &agreement.epk_sd);
            let ka2 = ecdh(sk_oce.as_ref().unwrap_or(&esk_oce), params.pk_sd_ecka());

            let mut z = Zeroizing::new(Vec::with_capacity(64));
            z.extend_from_slice(ka1.raw_secret_bytes());
            z.extend_from_slice(ka2.raw_secret_bytes());

            let length = scp11::DERIVED_KEYS * scp11::KEY_LENGTH as usize;
            let material = x963_kdf(&z, &SHARED_INFO, length);
            let (receipt_key, session) = material.split_at(BLOCK);

            let expected = cmac(receipt_key, &[command.data(), &agreement.epk_sd_record])?;
            if !constant_time_eq(&expected, &agreement.receipt) {
                warn!(%key_ref, "Receipt verification failed");
                return Err(Error::AuthenticationFailed("receipt mismatch"));
            }
            *state = HandshakeState::KeyAgreed;

            let keys = SessionKeys::new(
                &session[..BLOCK],
                &session[BLOCK..2 * BLOCK],
                &session[2 * BLOCK..3 * BLOCK],
                &session[3 * BLOCK..],
            )?;

            *state = HandshakeState::Authenticated;
            debug!(%key_ref, "SCP11 channel established");
            Ok(ScpState::new(keys, agreement.receipt, SecurityLevel::FULL))
        })
    }

    fn state(&self) -> HandshakeState {
        self.state
    }
}

fn send_certificates<T: CardTransport>(
    transport: &mut T,
    params: &Scp11KeyParameters,
) -> Result<()> {
    let oce_key_ref = params
        .oce_key_ref()
        .ok_or(Error::InvalidParameters("missing OCE key reference"))?;
    let certificates = params.certificates();

    for (i, certificate) in certificates.iter().enumerate() {
        let last = i + 1 == certificates.len();
        let command =
            PerformSecurityOperationCommand::with_certificate(oce_key_ref, certificate.clone(), last);
        for apdu in command.to_commands() {
            let response = transmit(transport, &apdu)?;
            expect_success("PERFORM SECURITY OPERATION", &response)?;
        }
    }

    debug!(count = certificates.len(), "OCE certificates accepted");
    Ok(())
}
