//! Secure messaging state shared by SCP03 and SCP11
//!
//! [`ScpState`] holds the session keys and the chaining state of one
//! authenticated channel and applies the command and response transformations
//! of GlobalPlatform Amendment D:
//!
//! - Command data is encrypted with S-ENC in CBC mode. The IV is the encryption
//!   counter, as a 16 byte big-endian block, encrypted with S-ENC.
//! - The C-MAC is an AES-CMAC with S-MAC over the previous MAC chaining value,
//!   the modified header, Lc and the (encrypted) data. The full 16 byte result
//!   becomes the next chaining value and its first 8 bytes are appended.
//! - The R-MAC is an AES-CMAC with S-RMAC over the chaining value, the response
//!   data and the status word. Response data is decrypted with an IV derived
//!   from `80 || counter`.

use std::fmt;

use bytes::{BufMut, BytesMut};
use scpkit_apdu_core::{Command, Response, command::SHORT_MAX_DATA};
use tracing::{trace, warn};
use zeroize::Zeroize;

use crate::{
    Error, Result,
    constants::{
        cla,
        security_level::{C_DECRYPTION, C_MAC, R_ENCRYPTION, R_MAC},
        sizes::{BLOCK, MAC},
    },
    crypto::{Block, cbc_decrypt, cbc_encrypt, cmac, constant_time_eq, encrypt_block},
    keys::KeyMaterial,
};

/// Session keys of one channel
#[derive(Debug, Zeroize)]
pub struct SessionKeys {
    pub(crate) enc: KeyMaterial,
    pub(crate) mac: KeyMaterial,
    pub(crate) rmac: KeyMaterial,
    pub(crate) dek: KeyMaterial,
}

impl SessionKeys {
    /// Assemble session keys from raw bytes
    pub fn new(enc: &[u8], mac: &[u8], rmac: &[u8], dek: &[u8]) -> Result<Self> {
        Ok(Self {
            enc: KeyMaterial::new(enc)?,
            mac: KeyMaterial::new(mac)?,
            rmac: KeyMaterial::new(rmac)?,
            dek: KeyMaterial::new(dek)?,
        })
    }

    /// Session encryption key (S-ENC)
    pub fn enc(&self) -> &[u8] {
        self.enc.as_bytes()
    }

    /// Session command MAC key (S-MAC)
    pub fn mac(&self) -> &[u8] {
        self.mac.as_bytes()
    }

    /// Session response MAC key (S-RMAC)
    pub fn rmac(&self) -> &[u8] {
        self.rmac.as_bytes()
    }

    /// Data encryption key
    pub fn dek(&self) -> &[u8] {
        self.dek.as_bytes()
    }
}

/// Security level of a channel (EXTERNAL AUTHENTICATE P1)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SecurityLevel(u8);

impl SecurityLevel {
    /// C-MAC only
    pub const C_MAC: Self = Self(C_MAC);
    /// C-MAC and command encryption
    pub const C_MAC_C_DECRYPTION: Self = Self(C_MAC | C_DECRYPTION);
    /// C-MAC, command encryption and R-MAC
    pub const C_DECRYPTION_R_MAC: Self = Self(C_MAC | C_DECRYPTION | R_MAC);
    /// Every protection (C-MAC, C-DECRYPTION, R-MAC, R-ENCRYPTION)
    pub const FULL: Self = Self(C_MAC | C_DECRYPTION | R_MAC | R_ENCRYPTION);

    /// Validate a raw security level byte
    ///
    /// C-MAC is mandatory, encryption needs the matching MAC.
    pub fn new(bits: u8) -> Result<Self> {
        let known = C_MAC | C_DECRYPTION | R_MAC | R_ENCRYPTION;
        let valid = bits & !known == 0
            && bits & C_MAC != 0
            && (bits & R_ENCRYPTION == 0 || bits & R_MAC != 0)
            && (bits & R_ENCRYPTION == 0 || bits & C_DECRYPTION != 0);
        if valid {
            Ok(Self(bits))
        } else {
            Err(Error::InvalidParameters("unsupported security level"))
        }
    }

    /// Raw byte
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Command data is encrypted
    pub const fn command_encryption(self) -> bool {
        self.0 & C_DECRYPTION != 0
    }

    /// Responses carry an R-MAC
    pub const fn response_mac(self) -> bool {
        self.0 & R_MAC != 0
    }

    /// Response data is encrypted
    pub const fn response_encryption(self) -> bool {
        self.0 & R_ENCRYPTION != 0
    }
}

impl Default for SecurityLevel {
    fn default() -> Self {
        Self::FULL
    }
}

impl fmt::Debug for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecurityLevel({:#04x})", self.0)
    }
}

/// Encryption counter and MAC chaining value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainingState {
    counter: u32,
    mac_chain: Block,
}

impl ChainingState {
    /// Fresh chaining state after a handshake
    pub const fn new(mac_chain: Block) -> Self {
        Self {
            counter: 0,
            mac_chain,
        }
    }

    /// Number of commands wrapped so far
    pub const fn counter(&self) -> u32 {
        self.counter
    }

    /// Current MAC chaining value
    pub const fn mac_chain(&self) -> &Block {
        &self.mac_chain
    }

    fn next_counter(&self) -> Result<u32> {
        self.counter.checked_add(1).ok_or(Error::CounterExhausted)
    }
}

/// State of an authenticated secure channel
#[derive(Debug)]
pub struct ScpState {
    keys: SessionKeys,
    chaining: ChainingState,
    security_level: SecurityLevel,
}

impl ScpState {
    /// Create the state handed over by a completed handshake
    pub fn new(keys: SessionKeys, mac_chain: Block, security_level: SecurityLevel) -> Self {
        Self {
            keys,
            chaining: ChainingState::new(mac_chain),
            security_level,
        }
    }

    /// Session keys
    pub const fn keys(&self) -> &SessionKeys {
        &self.keys
    }

    /// Chaining state
    pub const fn chaining(&self) -> &ChainingState {
        &self.chaining
    }

    /// Negotiated security level
    pub const fn security_level(&self) -> SecurityLevel {
        self.security_level
    }

    /// Protect an outgoing command
    ///
    /// Advances the encryption counter even when the command carries no data.
    /// A command that cannot be wrapped leaves the state untouched.
    pub fn wrap(&mut self, command: &Command) -> Result<Command> {
        let counter = self.chaining.next_counter()?;

        let data = if self.security_level.command_encryption() && !command.data().is_empty() {
            let iv = encrypt_block(self.keys.enc(), &command_icv(counter))?;
            cbc_encrypt(self.keys.enc(), &iv, command.data())?
        } else {
            command.data().to_vec()
        };

        trace!(counter, data_len = data.len(), "Wrapping command");
        let wrapped = self.mac(command, data)?;
        self.chaining.counter = counter;
        Ok(wrapped)
    }

    /// Append a C-MAC without encrypting or advancing the counter
    pub fn mac_command(&mut self, command: &Command) -> Result<Command> {
        self.mac(command, command.data().to_vec())
    }

    fn mac(&mut self, command: &Command, mut data: Vec<u8>) -> Result<Command> {
        let cla = command.cla | cla::SECURE_MESSAGING;
        let lc = data.len() + MAC;
        let extended = lc > SHORT_MAX_DATA || command.le.is_some_and(|le| le > 0xFF);

        let mut header = BytesMut::with_capacity(7);
        header.put_slice(&[cla, command.ins, command.p1, command.p2]);
        Command::encode_lc(lc, extended, &mut header)?;

        let mac = cmac(
            self.keys.mac(),
            &[&self.chaining.mac_chain, &header, &data],
        )?;
        self.chaining.mac_chain = mac;
        data.extend_from_slice(&mac[..MAC]);

        let mut wrapped = Command::new(cla, command.ins, command.p1, command.p2).with_data(data);
        wrapped.le = command.le;
        Ok(wrapped)
    }

    /// Verify and decrypt an incoming response
    ///
    /// Responses without data carry no R-MAC and pass through unchanged.
    pub fn unwrap(&mut self, response: Response) -> Result<Response> {
        if !self.security_level.response_mac() || response.data().is_empty() {
            return Ok(response);
        }

        let data = response.data();
        if data.len() < MAC {
            warn!(len = data.len(), "Response too short to carry an R-MAC");
            return Err(Error::ResponseMacMismatch);
        }

        let (body, rmac) = data.split_at(data.len() - MAC);
        let status = response.status().to_bytes();
        let expected = cmac(self.keys.rmac(), &[&self.chaining.mac_chain, body, &status])?;
        if !constant_time_eq(&expected[..MAC], rmac) {
            warn!(counter = self.chaining.counter, "R-MAC verification failed");
            return Err(Error::ResponseMacMismatch);
        }

        let body = if self.security_level.response_encryption() && !body.is_empty() {
            let iv = encrypt_block(self.keys.enc(), &response_icv(self.chaining.counter))?;
            cbc_decrypt(self.keys.enc(), &iv, body)?
        } else {
            body.to_vec()
        };

        Ok(Response::new(Some(body.into()), response.status()))
    }
}

#[cfg(test)]
impl ScpState {
    pub(crate) const fn exhaust_counter(&mut self) {
        self.chaining.counter = u32::MAX;
    }
}

/// Command ICV input: counter as a 16 byte big-endian block
fn command_icv(counter: u32) -> Block {
    let mut block = [0u8; BLOCK];
    block[BLOCK - 4..].copy_from_slice(&counter.to_be_bytes());
    block
}

/// Response ICV input: `80` followed by the counter as 15 byte big-endian value
fn response_icv(counter: u32) -> Block {
    let mut block = command_icv(counter);
    block[0] = 0x80;
    block
}
