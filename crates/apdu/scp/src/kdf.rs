//! SCP03 key derivation
//!
//! NIST SP 800-108 KDF in counter mode with AES-CMAC as the PRF, laid out as
//! GlobalPlatform Amendment D section 6.2.2 prescribes. Each PRF block is
//! computed over the derivation data
//!
//! ```text
//! 00 * 11 || label || 00 || L (bits, 2 bytes BE) || i || context
//! ```
//!
//! where `context` is the host challenge followed by the card challenge.

use zeroize::Zeroizing;

use crate::{
    Result,
    constants::{
        derivation,
        sizes::{BLOCK, CHALLENGE, CRYPTOGRAM},
    },
    crypto::cmac,
    keys::{KeyMaterial, StaticKeys},
    state::SessionKeys,
};

/// Zero bytes preceding the label in the derivation data
const LABEL_PREFIX_LEN: usize = 11;

/// Derive `length_bits` of output keyed by `key`
pub fn derive(
    key: &[u8],
    label: u8,
    context: &[u8],
    length_bits: u16,
) -> Result<Zeroizing<Vec<u8>>> {
    let length = length_bits as usize / 8;
    let mut output = Zeroizing::new(Vec::with_capacity(length + BLOCK));
    let mut data = Zeroizing::new(Vec::with_capacity(LABEL_PREFIX_LEN + 5 + context.len()));

    let mut counter: u8 = 1;
    while output.len() < length {
        data.clear();
        data.extend_from_slice(&[0u8; LABEL_PREFIX_LEN]);
        data.push(label);
        data.push(0x00);
        data.extend_from_slice(&length_bits.to_be_bytes());
        data.push(counter);
        data.extend_from_slice(context);

        output.extend_from_slice(&cmac(key, &[&data])?);
        counter = counter.wrapping_add(1);
    }

    output.truncate(length);
    Ok(output)
}

fn challenge_context(
    host_challenge: &[u8; CHALLENGE],
    card_challenge: &[u8; CHALLENGE],
) -> [u8; 2 * CHALLENGE] {
    let mut context = [0u8; 2 * CHALLENGE];
    context[..CHALLENGE].copy_from_slice(host_challenge);
    context[CHALLENGE..].copy_from_slice(card_challenge);
    context
}

/// Derive the session keys of one SCP03 channel
///
/// S-ENC comes from the static ENC key, S-MAC and S-RMAC from the static MAC
/// key. The DEK is used as is.
pub fn derive_session_keys(
    keys: &StaticKeys,
    host_challenge: &[u8; CHALLENGE],
    card_challenge: &[u8; CHALLENGE],
) -> Result<SessionKeys> {
    let context = challenge_context(host_challenge, card_challenge);
    let bits = (keys.key_len() * 8) as u16;

    let enc = derive(keys.enc(), derivation::S_ENC, &context, bits)?;
    let mac = derive(keys.mac(), derivation::S_MAC, &context, bits)?;
    let rmac = derive(keys.mac(), derivation::S_RMAC, &context, bits)?;

    Ok(SessionKeys {
        enc: KeyMaterial::new(&enc)?,
        mac: KeyMaterial::new(&mac)?,
        rmac: KeyMaterial::new(&rmac)?,
        dek: KeyMaterial::new(keys.dek())?,
    })
}

/// Compute a card or host cryptogram from the session MAC key
pub fn derive_cryptogram(
    label: u8,
    mac_key: &[u8],
    host_challenge: &[u8; CHALLENGE],
    card_challenge: &[u8; CHALLENGE],
) -> Result<[u8; CRYPTOGRAM]> {
    let context = challenge_context(host_challenge, card_challenge);
    let output = derive(mac_key, label, &context, (CRYPTOGRAM * 8) as u16)?;
    let mut cryptogram = [0u8; CRYPTOGRAM];
    cryptogram.copy_from_slice(&output);
    Ok(cryptogram)
}
