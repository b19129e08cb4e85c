//! Cryptographic primitives for SCP03 and SCP11
//!
//! AES in ECB (IV derivation) and CBC mode with ISO 7816-4 padding, AES-CMAC,
//! P-256 ECDH and the ANSI X9.63 key derivation function. AES functions accept
//! 16, 24 or 32 byte keys and select the cipher from the key length.

use aes::{Aes128, Aes192, Aes256};
use cipher::{
    BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit, block_padding::Iso7816,
};
use cmac::{Cmac, Mac};
use p256::{PublicKey, SecretKey, ecdh::SharedSecret};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::{Error, Result, constants::sizes::BLOCK};

/// One AES block
pub type Block = [u8; BLOCK];

/// Run `$body` with `$cipher` aliased to the AES variant matching the key length
macro_rules! with_aes {
    ($key:expr, $cipher:ident => $body:expr) => {
        match $key.len() {
            16 => {
                type $cipher = Aes128;
                $body
            }
            24 => {
                type $cipher = Aes192;
                $body
            }
            32 => {
                type $cipher = Aes256;
                $body
            }
            other => Err(Error::invalid_length(16, other)),
        }
    };
}

/// Encrypt a single block (AES-ECB)
pub fn encrypt_block(key: &[u8], input: &Block) -> Result<Block> {
    with_aes!(key, C => {
        let cipher = C::new_from_slice(key).map_err(|_| Error::Crypto("invalid AES key"))?;
        let mut block = aes::Block::from(*input);
        cipher.encrypt_block(&mut block);
        let mut output = [0u8; BLOCK];
        output.copy_from_slice(&block);
        Ok(output)
    })
}

/// Encrypt `data` in CBC mode, appending ISO 7816-4 padding
pub fn cbc_encrypt(key: &[u8], iv: &Block, data: &[u8]) -> Result<Vec<u8>> {
    with_aes!(key, C => {
        let encryptor = cbc::Encryptor::<C>::new_from_slices(key, iv)
            .map_err(|_| Error::Crypto("invalid AES key"))?;
        Ok(encryptor.encrypt_padded_vec_mut::<Iso7816>(data))
    })
}

/// Decrypt `data` in CBC mode and strip ISO 7816-4 padding
pub fn cbc_decrypt(key: &[u8], iv: &Block, data: &[u8]) -> Result<Vec<u8>> {
    with_aes!(key, C => {
        let decryptor = cbc::Decryptor::<C>::new_from_slices(key, iv)
            .map_err(|_| Error::Crypto("invalid AES key"))?;
        decryptor
            .decrypt_padded_vec_mut::<Iso7816>(data)
            .map_err(|_| Error::MalformedData("invalid padding in encrypted data"))
    })
}

/// AES-CMAC over the concatenation of `parts`
pub fn cmac(key: &[u8], parts: &[&[u8]]) -> Result<Block> {
    with_aes!(key, C => {
        let mut mac = <Cmac<C> as Mac>::new_from_slice(key)
            .map_err(|_| Error::Crypto("invalid CMAC key"))?;
        for part in parts {
            mac.update(part);
        }
        let tag = mac.finalize().into_bytes();
        let mut output = [0u8; BLOCK];
        output.copy_from_slice(&tag);
        Ok(output)
    })
}

/// Constant-time equality of two byte strings
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// ECDH over P-256
pub fn ecdh(secret: &SecretKey, public: &PublicKey) -> SharedSecret {
    p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), public.as_affine())
}

/// ANSI X9.63 KDF with SHA-256
///
/// `output = H(Z || 00000001 || info) || H(Z || 00000002 || info) || ...`,
/// truncated to `length` bytes.
pub fn x963_kdf(z: &[u8], shared_info: &[u8], length: usize) -> Zeroizing<Vec<u8>> {
    let mut output = Zeroizing::new(Vec::with_capacity(length + 32));
    let mut counter: u32 = 1;
    while output.len() < length {
        let mut hasher = Sha256::new();
        hasher.update(z);
        hasher.update(counter.to_be_bytes());
        hasher.update(shared_info);
        output.extend_from_slice(&hasher.finalize());
        counter += 1;
    }
    output.truncate(length);
    output
}
