//! Constants used by the secure channel protocols
//!
//! This module contains the values defined by GlobalPlatform Card Specification
//! v2.3 Amendment D (SCP03) and Amendment F (SCP11): command classes,
//! instruction codes, key identifiers, derivation constants and BER-TLV tags.

/// Command classes
pub mod cla {
    /// ISO 7816-4 interindustry class
    pub const ISO: u8 = 0x00;
    /// GlobalPlatform proprietary command class
    pub const GP: u8 = 0x80;
    /// Secure messaging indicator, OR-ed into the class byte of wrapped commands
    pub const SECURE_MESSAGING: u8 = 0x04;
    /// GlobalPlatform command class with secure messaging
    pub const MAC: u8 = GP | SECURE_MESSAGING;
    /// ISO 7816-4 command chaining bit (more commands follow)
    pub const CHAINING: u8 = 0x10;
}

/// Instruction codes
pub mod ins {
    /// INITIALIZE UPDATE (SCP03)
    pub const INITIALIZE_UPDATE: u8 = 0x50;
    /// EXTERNAL AUTHENTICATE (SCP03, SCP11a, SCP11c)
    pub const EXTERNAL_AUTHENTICATE: u8 = 0x82;
    /// INTERNAL AUTHENTICATE (SCP11b)
    pub const INTERNAL_AUTHENTICATE: u8 = 0x88;
    /// PERFORM SECURITY OPERATION (OCE certificate upload, SCP11a/c)
    pub const PERFORM_SECURITY_OPERATION: u8 = 0x2A;
    /// GET RESPONSE, fetches the rest of a 61xx response
    pub const GET_RESPONSE: u8 = 0xC0;
}

/// Key identifiers of the secure channel protocols
pub mod kid {
    /// SCP03 static key set
    pub const SCP03: u8 = 0x01;
    /// SCP11a (mutual authentication)
    pub const SCP11A: u8 = 0x11;
    /// SCP11b (card authentication only)
    pub const SCP11B: u8 = 0x13;
    /// SCP11c (mutual authentication, offline scripting)
    pub const SCP11C: u8 = 0x15;
}

/// Secure channel protocol identifiers as reported in key information
pub mod scp {
    /// SCP03
    pub const SCP03: u8 = 0x03;
    /// SCP11
    pub const SCP11: u8 = 0x11;
}

/// Security level bits (EXTERNAL AUTHENTICATE P1)
pub mod security_level {
    /// Command MAC
    pub const C_MAC: u8 = 0x01;
    /// Command decryption (command data is encrypted)
    pub const C_DECRYPTION: u8 = 0x02;
    /// Response MAC
    pub const R_MAC: u8 = 0x10;
    /// Response encryption
    pub const R_ENCRYPTION: u8 = 0x20;
}

/// SCP03 KDF derivation constants (label byte)
pub mod derivation {
    /// Card cryptogram
    pub const CARD_CRYPTOGRAM: u8 = 0x00;
    /// Host cryptogram
    pub const HOST_CRYPTOGRAM: u8 = 0x01;
    /// Session encryption key
    pub const S_ENC: u8 = 0x04;
    /// Session command MAC key
    pub const S_MAC: u8 = 0x06;
    /// Session response MAC key
    pub const S_RMAC: u8 = 0x07;
}

/// SCP11 key agreement parameters
pub mod scp11 {
    /// Key usage qualifier: C-MAC, C-DECRYPTION, R-MAC, R-ENCRYPTION
    pub const KEY_USAGE: u8 = 0x3C;
    /// Key type: AES
    pub const KEY_TYPE_AES: u8 = 0x88;
    /// Session key length in bytes
    pub const KEY_LENGTH: u8 = 16;
    /// Number of keys derived from the shared secret (receipt, S-ENC, S-MAC, S-RMAC, DEK)
    pub const DERIVED_KEYS: usize = 5;
}

/// BER-TLV tags used by the handshakes
pub mod tags {
    /// Control reference template for key agreement
    pub const CONTROL_REFERENCE: u16 = 0xA6;
    /// SCP identifier and parameters
    pub const SCP_PARAMETERS: u16 = 0x90;
    /// Key usage qualifier
    pub const KEY_USAGE: u16 = 0x95;
    /// Key type
    pub const KEY_TYPE: u16 = 0x80;
    /// Key length
    pub const KEY_LENGTH: u16 = 0x81;
    /// Ephemeral public key
    pub const EPHEMERAL_PUBLIC_KEY: u16 = 0x5F49;
    /// Receipt
    pub const RECEIPT: u16 = 0x86;
}

/// Sizes of protocol fields
pub mod sizes {
    /// SCP03 host and card challenges
    pub const CHALLENGE: usize = 8;
    /// Cryptograms and truncated MACs
    pub const CRYPTOGRAM: usize = 8;
    /// Truncated C-MAC / R-MAC appended to APDUs
    pub const MAC: usize = 8;
    /// AES block size, also the width of the MAC chaining value
    pub const BLOCK: usize = 16;
    /// Key diversification data in the INITIALIZE UPDATE response
    pub const DIVERSIFICATION_DATA: usize = 10;
    /// Key information in the INITIALIZE UPDATE response
    pub const KEY_INFO: usize = 3;
    /// Sequence counter (pseudo-random card challenge mode)
    pub const SEQUENCE_COUNTER: usize = 3;
    /// Data field of a short APDU
    pub const SHORT_APDU_DATA: usize = 255;
}
