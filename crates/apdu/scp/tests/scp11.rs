//! SCP11 handshakes and channel against a simulated security domain

mod common;

use bytes::Bytes;
use common::{SimulatedCard, init_tracing, secret};
use hex_literal::hex;
use scpkit_apdu_core::Command;
use scpkit_scp::{
    Error, ErrorKind, HandshakeState, KeyReference, OceKeyReference, Scp11Handshake,
    Scp11KeyParameters, ScpChannel, SecureChannelHandshake, SecurityLevel, constants::kid,
};

fn oce_certificates() -> Vec<Bytes> {
    vec![
        Bytes::copy_from_slice(&hex!("7F210A 9301AA 5F200401020304")),
        Bytes::from(vec![0x42; 300]),
    ]
}

#[test]
fn test_scp11b_end_to_end() {
    init_tracing();

    let sk_sd = secret(0x21);
    let params = Scp11KeyParameters::scp11b(
        KeyReference::new(kid::SCP11B, 0x01).unwrap(),
        sk_sd.public_key(),
    )
    .unwrap();
    let card = SimulatedCard::scp11(sk_sd, secret(0x22), None);

    let mut channel = ScpChannel::open_scp11(card, &params).unwrap();
    let state = channel.state().unwrap();
    assert_eq!(state.security_level(), SecurityLevel::FULL);
    assert_eq!(state.chaining().counter(), 0);
    let receipt = *state.chaining().mac_chain();

    assert_eq!(channel.transport().commands.len(), 1);
    assert_eq!(&channel.transport().commands[0][..4], hex!("80880113"));

    let payload = hex!("0102030405060708090A");
    let response = channel
        .transmit(&Command::new_with_data(0x80, 0xE2, 0x00, 0x00, payload.to_vec()))
        .unwrap();
    assert_eq!(response.data(), payload);
    assert_ne!(channel.state().unwrap().chaining().mac_chain(), &receipt);
    assert_eq!(channel.transport().received[0].as_ref(), payload);
}

#[test]
fn test_scp11a_uploads_certificates_then_agrees() {
    let sk_sd = secret(0x31);
    let sk_oce = secret(0x33);
    let pk_oce = sk_oce.public_key();

    let params = Scp11KeyParameters::new(
        KeyReference::new(kid::SCP11A, 0x03).unwrap(),
        sk_sd.public_key(),
        Some(OceKeyReference::new(0x10, 0x03)),
        Some(sk_oce),
        oce_certificates(),
    )
    .unwrap();
    let card = SimulatedCard::scp11(sk_sd, secret(0x32), Some(pk_oce));

    let mut handshake = Scp11Handshake::new(&params);
    let mut channel = ScpChannel::open(card, &mut handshake).unwrap();
    assert_eq!(handshake.state(), HandshakeState::Authenticated);

    let card = channel.transport();
    assert_eq!(card.certificates, oce_certificates());
    // One APDU for the first certificate, two for the chained leaf, then
    // EXTERNAL AUTHENTICATE
    assert_eq!(card.commands.len(), 4);
    assert_eq!(&card.commands[3][..4], hex!("80820311"));

    let response = channel
        .transmit(&Command::new(0x80, 0xCA, 0x00, 0x66).with_le(0))
        .unwrap();
    assert_eq!(response.data(), common::CARD_DATA);
}

#[test]
fn test_scp11c_uses_static_oce_key() {
    let sk_sd = secret(0x41);
    let sk_oce = secret(0x43);
    let pk_oce = sk_oce.public_key();

    let params = Scp11KeyParameters::new(
        KeyReference::new(kid::SCP11C, 0x01).unwrap(),
        sk_sd.public_key(),
        Some(OceKeyReference::new(0x10, 0x01)),
        Some(sk_oce),
        vec![Bytes::copy_from_slice(&hex!("7F2103 930101"))],
    )
    .unwrap();

    let mut channel =
        ScpChannel::open_scp11(SimulatedCard::scp11(sk_sd, secret(0x42), Some(pk_oce)), &params)
            .unwrap();
    assert_eq!(&channel.transport().commands[1][..4], hex!("80820115"));
    assert!(channel.transmit(&Command::new(0x80, 0xF2, 0x80, 0x00)).is_ok());
}

#[test]
fn test_scp11_wrong_card_key_fails_receipt() {
    let params = Scp11KeyParameters::scp11b(
        KeyReference::new(kid::SCP11B, 0x01).unwrap(),
        secret(0x51).public_key(),
    )
    .unwrap();
    let mut card = SimulatedCard::scp11(secret(0x52), secret(0x53), None);

    let mut handshake = Scp11Handshake::new(&params);
    let err = ScpChannel::open(&mut card, &mut handshake).unwrap_err();
    assert!(matches!(err, Error::AuthenticationFailed(_)));
    assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
    assert_eq!(handshake.state(), HandshakeState::Error);
}

#[test]
fn test_scp11_parameter_invariants() {
    let err = Scp11KeyParameters::new(
        KeyReference::new(kid::SCP11B, 0x01).unwrap(),
        secret(0x61).public_key(),
        Some(OceKeyReference::new(0x10, 0x01)),
        None,
        Vec::new(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameters);

    let err = Scp11KeyParameters::new(
        KeyReference::new(kid::SCP11A, 0x01).unwrap(),
        secret(0x61).public_key(),
        Some(OceKeyReference::new(0x10, 0x01)),
        Some(secret(0x62)),
        Vec::new(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameters);

    assert!(matches!(
        KeyReference::new(0x02, 0x01),
        Err(Error::InvalidKeyId(0x02))
    ));
}

#[test]
fn test_scp11_dispose_zeroes_oce_key() {
    let mut params = Scp11KeyParameters::new(
        KeyReference::new(kid::SCP11A, 0x01).unwrap(),
        secret(0x71).public_key(),
        Some(OceKeyReference::new(0x10, 0x01)),
        Some(secret(0x72)),
        oce_certificates(),
    )
    .unwrap();
    assert_eq!(params.sk_oce_ecka_bytes(), Some(&[0x72; 32][..]));

    params.dispose();
    assert_eq!(params.sk_oce_ecka_bytes(), Some(&[0u8; 32][..]));
    assert!(params.sk_oce_ecka().is_err());
}
