//! Key parameter model
//!
//! Value types describing which key slot a secure channel targets and the key
//! material needed to engage it: static AES keys for SCP03, EC keys and an
//! OCE certificate chain for SCP11. Every secret holder zeroes its bytes on
//! drop and can be disposed of early with `dispose`.

use std::fmt;

use bytes::Bytes;
use p256::{PublicKey, SecretKey};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{Error, Result, constants::kid};

/// Largest secret held by [`KeyMaterial`] (AES-256 or a P-256 scalar)
const MAX_SECRET_LEN: usize = 32;

/// Owned secret bytes, zeroed on drop
///
/// Zeroing keeps the length, so reads after disposal return zeros of the
/// original size. A secret has exactly one owner and cannot be cloned:
///
/// ```compile_fail
/// fn duplicate<T: Clone>(_: &T) {}
/// let key = scpkit_scp::KeyMaterial::new(&[0x40; 16]).unwrap();
/// duplicate(&key);
/// ```
pub struct KeyMaterial {
    bytes: [u8; MAX_SECRET_LEN],
    len: usize,
}

impl KeyMaterial {
    /// Copy `bytes` into a new secret
    pub fn new(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() || bytes.len() > MAX_SECRET_LEN {
            return Err(Error::InvalidParameters("unsupported key length"));
        }
        let mut material = Self {
            bytes: [0; MAX_SECRET_LEN],
            len: bytes.len(),
        };
        material.bytes[..bytes.len()].copy_from_slice(bytes);
        Ok(material)
    }

    /// Secret bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Length in bytes
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Always false; an empty secret cannot be constructed
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Zeroize for KeyMaterial {
    fn zeroize(&mut self) {
        self.bytes.zeroize();
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for KeyMaterial {}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyMaterial(<{} bytes redacted>)", self.len)
    }
}

/// SCP protocol selected by a key identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScpKind {
    /// SCP03, static AES keys
    Scp03,
    /// SCP11a, mutual authentication
    Scp11a,
    /// SCP11b, card authentication only
    Scp11b,
    /// SCP11c, mutual authentication for offline scripting
    Scp11c,
}

impl ScpKind {
    /// Map a key identifier to its protocol
    pub const fn from_kid(id: u8) -> Option<Self> {
        match id {
            kid::SCP03 => Some(Self::Scp03),
            kid::SCP11A => Some(Self::Scp11a),
            kid::SCP11B => Some(Self::Scp11b),
            kid::SCP11C => Some(Self::Scp11c),
            _ => None,
        }
    }

    /// Whether this is one of the SCP11 variants
    pub const fn is_scp11(self) -> bool {
        !matches!(self, Self::Scp03)
    }
}

/// Reference to a secure channel key set on the card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyReference {
    kid: u8,
    kvn: u8,
}

impl KeyReference {
    /// Create a key reference, rejecting identifiers that name no SCP protocol
    pub fn new(kid: u8, kvn: u8) -> Result<Self> {
        match ScpKind::from_kid(kid) {
            Some(_) => Ok(Self { kid, kvn }),
            None => Err(Error::InvalidKeyId(kid)),
        }
    }

    /// Key identifier
    pub const fn kid(&self) -> u8 {
        self.kid
    }

    /// Key version number
    pub const fn kvn(&self) -> u8 {
        self.kvn
    }

    /// Protocol selected by this reference
    pub const fn kind(&self) -> ScpKind {
        match ScpKind::from_kid(self.kid) {
            Some(kind) => kind,
            // Unreachable, validated at construction
            None => ScpKind::Scp03,
        }
    }
}

impl fmt::Display for KeyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KID={:#04x}, KVN={:#04x}", self.kid, self.kvn)
    }
}

/// Reference to the off-card entity key used for SCP11a/c
///
/// Its identifier names an OCE key slot rather than a protocol, so any value is
/// accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OceKeyReference {
    /// Key identifier
    pub kid: u8,
    /// Key version number
    pub kvn: u8,
}

impl OceKeyReference {
    /// Create an OCE key reference
    pub const fn new(kid: u8, kvn: u8) -> Self {
        Self { kid, kvn }
    }
}

/// Static SCP03 key set (K-ENC, K-MAC, K-DEK)
#[derive(Debug, Zeroize)]
pub struct StaticKeys {
    enc: KeyMaterial,
    mac: KeyMaterial,
    dek: KeyMaterial,
}

impl StaticKeys {
    /// GlobalPlatform default test key
    pub const DEFAULT_KEY: [u8; 16] = [
        0x40, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49, 0x4A, 0x4B, 0x4C, 0x4D, 0x4E,
        0x4F,
    ];

    /// Create a key set; all keys must share one AES key length
    pub fn new(enc: &[u8], mac: &[u8], dek: &[u8]) -> Result<Self> {
        if !matches!(enc.len(), 16 | 24 | 32) {
            return Err(Error::InvalidParameters("static keys must be 16, 24 or 32 bytes"));
        }
        if mac.len() != enc.len() || dek.len() != enc.len() {
            return Err(Error::InvalidParameters("static keys differ in length"));
        }
        Ok(Self {
            enc: KeyMaterial::new(enc)?,
            mac: KeyMaterial::new(mac)?,
            dek: KeyMaterial::new(dek)?,
        })
    }

    /// Key set with all three keys set to [`Self::DEFAULT_KEY`]
    pub fn default_keys() -> Self {
        let key = || KeyMaterial {
            bytes: {
                let mut bytes = [0; MAX_SECRET_LEN];
                bytes[..16].copy_from_slice(&Self::DEFAULT_KEY);
                bytes
            },
            len: 16,
        };
        Self {
            enc: key(),
            mac: key(),
            dek: key(),
        }
    }

    /// Channel encryption key
    pub fn enc(&self) -> &[u8] {
        self.enc.as_bytes()
    }

    /// Channel MAC key
    pub fn mac(&self) -> &[u8] {
        self.mac.as_bytes()
    }

    /// Data encryption key
    pub fn dek(&self) -> &[u8] {
        self.dek.as_bytes()
    }

    /// Key length in bytes
    pub const fn key_len(&self) -> usize {
        self.enc.len()
    }

    /// Zero all three keys; safe to call more than once
    pub fn dispose(&mut self) {
        self.zeroize();
    }
}

/// Parameters for opening an SCP03 channel
#[derive(Debug)]
pub struct Scp03KeyParameters {
    key_ref: KeyReference,
    keys: StaticKeys,
}

impl Scp03KeyParameters {
    /// Pair a key reference with its static keys
    pub fn new(key_ref: KeyReference, keys: StaticKeys) -> Result<Self> {
        if key_ref.kind().is_scp11() {
            return Err(Error::InvalidParameters("SCP03 requires KID 0x01"));
        }
        Ok(Self { key_ref, keys })
    }

    /// Default keys on the factory key set (KVN 0xFF)
    pub fn default_keys() -> Self {
        Self {
            key_ref: KeyReference {
                kid: kid::SCP03,
                kvn: 0xFF,
            },
            keys: StaticKeys::default_keys(),
        }
    }

    /// Target key set
    pub const fn key_ref(&self) -> KeyReference {
        self.key_ref
    }

    /// Static keys
    pub const fn keys(&self) -> &StaticKeys {
        &self.keys
    }

    /// Zero the static keys; safe to call more than once
    pub fn dispose(&mut self) {
        self.keys.dispose();
    }
}

/// Parameters for opening an SCP11 channel
#[derive(Debug)]
pub struct Scp11KeyParameters {
    key_ref: KeyReference,
    pk_sd_ecka: PublicKey,
    oce_key_ref: Option<OceKeyReference>,
    sk_oce_ecka: Option<KeyMaterial>,
    certificates: Vec<Bytes>,
}

impl Scp11KeyParameters {
    /// Create SCP11 parameters
    ///
    /// SCP11b takes no OCE credentials at all. SCP11a and SCP11c need the OCE
    /// key reference, its private key and a non-empty certificate chain (leaf
    /// last).
    pub fn new(
        key_ref: KeyReference,
        pk_sd_ecka: PublicKey,
        oce_key_ref: Option<OceKeyReference>,
        sk_oce_ecka: Option<SecretKey>,
        certificates: Vec<Bytes>,
    ) -> Result<Self> {
        match key_ref.kind() {
            ScpKind::Scp03 => {
                return Err(Error::InvalidParameters("SCP11 requires an SCP11 key identifier"));
            }
            ScpKind::Scp11b => {
                if oce_key_ref.is_some() || sk_oce_ecka.is_some() || !certificates.is_empty() {
                    return Err(Error::InvalidParameters(
                        "SCP11b does not take OCE credentials",
                    ));
                }
            }
            ScpKind::Scp11a | ScpKind::Scp11c => {
                if oce_key_ref.is_none() || sk_oce_ecka.is_none() || certificates.is_empty() {
                    return Err(Error::InvalidParameters(
                        "SCP11a/c require OCE key reference, private key and certificates",
                    ));
                }
            }
        }

        let sk_oce_ecka = sk_oce_ecka
            .map(|sk| {
                let mut bytes = sk.to_bytes();
                let material = KeyMaterial::new(&bytes);
                bytes.as_mut_slice().zeroize();
                material
            })
            .transpose()?;

        Ok(Self {
            key_ref,
            pk_sd_ecka,
            oce_key_ref,
            sk_oce_ecka,
            certificates,
        })
    }

    /// SCP11b parameters: only the card's public key is needed
    pub fn scp11b(key_ref: KeyReference, pk_sd_ecka: PublicKey) -> Result<Self> {
        Self::new(key_ref, pk_sd_ecka, None, None, Vec::new())
    }

    /// Target key set
    pub const fn key_ref(&self) -> KeyReference {
        self.key_ref
    }

    /// Static public key of the security domain (PK.SD.ECKA)
    pub const fn pk_sd_ecka(&self) -> &PublicKey {
        &self.pk_sd_ecka
    }

    /// OCE key reference (SCP11a/c)
    pub const fn oce_key_ref(&self) -> Option<OceKeyReference> {
        self.oce_key_ref
    }

    /// Raw bytes of the OCE private key (SCP11a/c)
    pub fn sk_oce_ecka_bytes(&self) -> Option<&[u8]> {
        self.sk_oce_ecka.as_ref().map(KeyMaterial::as_bytes)
    }

    /// OCE private key (SCP11a/c)
    ///
    /// Fails once the parameters have been disposed.
    pub fn sk_oce_ecka(&self) -> Result<Option<SecretKey>> {
        self.sk_oce_ecka
            .as_ref()
            .map(|material| {
                SecretKey::from_slice(material.as_bytes())
                    .map_err(|_| Error::InvalidParameters("OCE private key unavailable"))
            })
            .transpose()
    }

    /// OCE certificate chain, leaf last
    pub fn certificates(&self) -> &[Bytes] {
        &self.certificates
    }

    /// Zero the OCE private key; safe to call more than once
    pub fn dispose(&mut self) {
        if let Some(sk) = self.sk_oce_ecka.as_mut() {
            sk.zeroize();
        }
    }
}
