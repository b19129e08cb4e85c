//! Common test utilities
//!
//! [`SimulatedCard`] plays the security domain side of SCP03 and SCP11 on top
//! of the crate's own primitives, then serves a small echo applet over the
//! secure channel.
#![allow(dead_code)]

use bytes::{Bytes, BytesMut};
use hex_literal::hex;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use scpkit_apdu_core::{CardTransport, Command, Response, TransportError};
use scpkit_scp::{
    PublicKey, SecretKey, SecurityLevel, SessionKeys, StaticKeys,
    constants::derivation,
    crypto::{Block, cbc_decrypt, cbc_encrypt, cmac, ecdh, encrypt_block, x963_kdf},
    kdf, tlv,
};

/// Card challenge returned by INITIALIZE UPDATE
pub const CARD_CHALLENGE: [u8; 8] = hex!("A1A2A3A4A5A6A7A8");

/// Applet reply to commands without data
pub const CARD_DATA: [u8; 4] = hex!("CAFEBABE");

/// Instruction the applet answers with a bare error status
pub const INS_NOT_FOUND: u8 = 0xE4;

/// Initialise a test subscriber; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Deterministic P-256 key for tests
pub fn secret(byte: u8) -> SecretKey {
    SecretKey::from_slice(&[byte; 32]).unwrap()
}

#[derive(Debug)]
enum Credentials {
    Scp03(StaticKeys),
    Scp11 {
        sk_sd: SecretKey,
        esk_sd: SecretKey,
        pk_oce: Option<PublicKey>,
    },
}

#[derive(Debug)]
struct Session {
    keys: SessionKeys,
    mac_chain: Block,
    counter: u32,
    level: SecurityLevel,
}

/// Security domain simulator
#[derive(Debug)]
pub struct SimulatedCard {
    credentials: Credentials,
    pending: Option<([u8; 8], SessionKeys)>,
    session: Option<Session>,
    chunk: BytesMut,
    /// Raw command APDUs as received
    pub commands: Vec<Bytes>,
    /// OCE certificates received with PERFORM SECURITY OPERATION
    pub certificates: Vec<Bytes>,
    /// Command payloads after unwrapping, as seen by the applet
    pub received: Vec<Bytes>,
    /// Corrupt the card cryptogram in INITIALIZE UPDATE
    pub wrong_cryptogram: bool,
    /// Corrupt every R-MAC
    pub tamper_rmac: bool,
}

impl SimulatedCard {
    fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            pending: None,
            session: None,
            chunk: BytesMut::new(),
            commands: Vec::new(),
            certificates: Vec::new(),
            received: Vec::new(),
            wrong_cryptogram: false,
            tamper_rmac: false,
        }
    }

    /// Card holding an SCP03 key set
    pub fn scp03(keys: StaticKeys) -> Self {
        Self::new(Credentials::Scp03(keys))
    }

    /// Card holding SK.SD.ECKA; `pk_oce` is the key from the OCE leaf
    /// certificate (SCP11a/c)
    pub fn scp11(sk_sd: SecretKey, esk_sd: SecretKey, pk_oce: Option<PublicKey>) -> Self {
        Self::new(Credentials::Scp11 {
            sk_sd,
            esk_sd,
            pk_oce,
        })
    }

    /// Whether a secure session is active on the card
    pub const fn has_session(&self) -> bool {
        self.session.is_some()
    }

    fn process(&mut self, command: &Command) -> Response {
        match (command.cla, command.ins) {
            (0x80, 0x50) => self.initialize_update(command),
            (0x84, 0x82) if self.pending.is_some() => self.external_authenticate(command),
            (0x80 | 0x90, 0x2A) => self.perform_security_operation(command),
            (0x80, 0x82 | 0x88) => self.key_agreement(command),
            (cla, _) if cla & 0x04 != 0 => self.secure_command(command),
            _ => Response::error((0x6E, 0x00)),
        }
    }

    fn initialize_update(&mut self, command: &Command) -> Response {
        let Credentials::Scp03(keys) = &self.credentials else {
            return Response::error((0x6D, 0x00));
        };
        let Ok(host_challenge) = <[u8; 8]>::try_from(command.data()) else {
            return Response::error((0x67, 0x00));
        };

        let session = kdf::derive_session_keys(keys, &host_challenge, &CARD_CHALLENGE).unwrap();
        let mut cryptogram = kdf::derive_cryptogram(
            derivation::CARD_CRYPTOGRAM,
            session.mac(),
            &host_challenge,
            &CARD_CHALLENGE,
        )
        .unwrap();
        if self.wrong_cryptogram {
            cryptogram[0] ^= 0xFF;
        }

        let mut data = vec![0u8; 10];
        data.extend_from_slice(&[command.p1, 0x03, 0x00]);
        data.extend_from_slice(&CARD_CHALLENGE);
        data.extend_from_slice(&cryptogram);

        self.session = None;
        self.pending = Some((host_challenge, session));
        Response::success(Some(data.into()))
    }

    fn external_authenticate(&mut self, command: &Command) -> Response {
        let Some((host_challenge, keys)) = self.pending.take() else {
            return Response::error((0x69, 0x85));
        };
        let data = command.data();
        if data.len() != 16 {
            return Response::error((0x67, 0x00));
        }
        let (cryptogram, mac) = data.split_at(8);

        let expected_mac = cmac(keys.mac(), &[&[0u8; 16], &mac_header(command), cryptogram]).unwrap();
        let expected_cryptogram = kdf::derive_cryptogram(
            derivation::HOST_CRYPTOGRAM,
            keys.mac(),
            &host_challenge,
            &CARD_CHALLENGE,
        )
        .unwrap();
        if expected_mac[..8] != *mac || expected_cryptogram[..] != *cryptogram {
            return Response::error((0x63, 0x00));
        }
        let Ok(level) = SecurityLevel::new(command.p1) else {
            return Response::error((0x6A, 0x86));
        };

        self.session = Some(Session {
            keys,
            mac_chain: expected_mac,
            counter: 0,
            level,
        });
        Response::success(None)
    }

    fn perform_security_operation(&mut self, command: &Command) -> Response {
        self.chunk.extend_from_slice(command.data());
        if command.cla & 0x10 == 0 {
            self.certificates.push(self.chunk.split().freeze());
        }
        Response::success(None)
    }

    fn key_agreement(&mut self, command: &Command) -> Response {
        let Credentials::Scp11 {
            sk_sd,
            esk_sd,
            pk_oce,
        } = &self.credentials
        else {
            return Response::error((0x6D, 0x00));
        };

        let records = tlv::decode_all(command.data()).unwrap();
        assert_eq!(records[0].tag(), 0xA6);
        assert_eq!(records[1].tag(), 0x5F49);
        let epk_oce = PublicKey::from_sec1_bytes(records[1].value()).unwrap();

        let mut z = ecdh(esk_sd, &epk_oce).raw_secret_bytes().to_vec();
        z.extend_from_slice(ecdh(sk_sd, pk_oce.as_ref().unwrap_or(&epk_oce)).raw_secret_bytes());
        let material = x963_kdf(&z, &hex!("3C8810"), 80);

        let epk_sd_record = tlv::encode(
            0x5F49,
            esk_sd.public_key().to_encoded_point(false).as_bytes(),
        )
        .unwrap();
        let receipt = cmac(&material[..16], &[command.data(), &epk_sd_record]).unwrap();

        let keys = SessionKeys::new(
            &material[16..32],
            &material[32..48],
            &material[48..64],
            &material[64..80],
        )
        .unwrap();
        self.session = Some(Session {
            keys,
            mac_chain: receipt,
            counter: 0,
            level: SecurityLevel::FULL,
        });

        let mut data = epk_sd_record.to_vec();
        data.extend_from_slice(&tlv::encode(0x86, &receipt).unwrap());
        Response::success(Some(data.into()))
    }

    fn secure_command(&mut self, command: &Command) -> Response {
        let Some(session) = self.session.as_mut() else {
            return Response::error((0x69, 0x82));
        };
        let data = command.data();
        if data.len() < 8 {
            return Response::error((0x69, 0x88));
        }
        let (body, mac) = data.split_at(data.len() - 8);

        let expected = cmac(
            session.keys.mac(),
            &[&session.mac_chain, &mac_header(command), body],
        )
        .unwrap();
        if expected[..8] != *mac {
            self.session = None;
            return Response::error((0x69, 0x88));
        }
        session.mac_chain = expected;
        session.counter += 1;

        let plaintext = if session.level.command_encryption() && !body.is_empty() {
            let iv = encrypt_block(session.keys.enc(), &icv(0x00, session.counter)).unwrap();
            cbc_decrypt(session.keys.enc(), &iv, body).unwrap()
        } else {
            body.to_vec()
        };
        self.received.push(plaintext.clone().into());

        if command.ins == INS_NOT_FOUND {
            return Response::error((0x6A, 0x88));
        }
        let reply = if plaintext.is_empty() {
            CARD_DATA.to_vec()
        } else {
            plaintext
        };
        if !session.level.response_mac() {
            return Response::success(Some(reply.into()));
        }

        let mut body = if session.level.response_encryption() {
            let iv = encrypt_block(session.keys.enc(), &icv(0x80, session.counter)).unwrap();
            cbc_encrypt(session.keys.enc(), &iv, &reply).unwrap()
        } else {
            reply
        };
        let mut rmac = cmac(
            session.keys.rmac(),
            &[&session.mac_chain, &body, &[0x90, 0x00]],
        )
        .unwrap();
        if self.tamper_rmac {
            rmac[0] ^= 0x01;
        }
        body.extend_from_slice(&rmac[..8]);
        Response::success(Some(body.into()))
    }
}

impl CardTransport for SimulatedCard {
    type Error = TransportError;

    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, Self::Error> {
        self.commands.push(Bytes::copy_from_slice(command));
        let command =
            Command::from_bytes(command).map_err(|e| TransportError::other(e.to_string()))?;
        Ok(self.process(&command).to_bytes())
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn reset(&mut self) -> Result<(), Self::Error> {
        self.pending = None;
        self.session = None;
        Ok(())
    }
}

/// Header and Lc of a received command, as covered by its C-MAC
fn mac_header(command: &Command) -> Vec<u8> {
    let mut header = BytesMut::from(&[command.cla, command.ins, command.p1, command.p2][..]);
    Command::encode_lc(command.data().len(), command.is_extended(), &mut header).unwrap();
    header.to_vec()
}

fn icv(marker: u8, counter: u32) -> Block {
    let mut block = [0u8; 16];
    block[0] = marker;
    block[12..].copy_from_slice(&counter.to_be_bytes());
    block
}
