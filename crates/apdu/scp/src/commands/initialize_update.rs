//! INITIALIZE UPDATE command
//!
//! First command of the SCP03 handshake: sends the host challenge and returns
//! the card challenge and card cryptogram.

use scpkit_apdu_core::Command;

use crate::{
    Error, Result,
    constants::{
        cla, ins,
        sizes::{CHALLENGE, CRYPTOGRAM, DIVERSIFICATION_DATA, KEY_INFO, SEQUENCE_COUNTER},
    },
};

/// INITIALIZE UPDATE command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitializeUpdateCommand {
    kvn: u8,
    host_challenge: [u8; CHALLENGE],
}

impl InitializeUpdateCommand {
    /// Create a new INITIALIZE UPDATE command for key set `kvn`
    pub const fn with_challenge(kvn: u8, host_challenge: [u8; CHALLENGE]) -> Self {
        Self {
            kvn,
            host_challenge,
        }
    }

    /// Create a new INITIALIZE UPDATE command with a random host challenge
    pub fn with_random_challenge(kvn: u8) -> Self {
        Self::with_challenge(kvn, rand::random())
    }

    /// Host challenge carried by this command
    pub const fn host_challenge(&self) -> &[u8; CHALLENGE] {
        &self.host_challenge
    }

    /// Build the APDU
    pub fn to_command(&self) -> Command {
        Command::new_with_data(
            cla::GP,
            ins::INITIALIZE_UPDATE,
            self.kvn,
            0x00,
            self.host_challenge.to_vec(),
        )
        .with_le(0)
    }
}

/// Successful INITIALIZE UPDATE response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializeUpdateResponse {
    /// Key diversification data
    pub key_diversification_data: [u8; DIVERSIFICATION_DATA],
    /// Key information: KVN, SCP identifier, SCP parameter
    pub key_info: [u8; KEY_INFO],
    /// Card challenge
    pub card_challenge: [u8; CHALLENGE],
    /// Card cryptogram
    pub card_cryptogram: [u8; CRYPTOGRAM],
    /// Sequence counter, present when the card generates pseudo-random challenges
    pub sequence_counter: Option<[u8; SEQUENCE_COUNTER]>,
}

const BASE_LEN: usize = DIVERSIFICATION_DATA + KEY_INFO + CHALLENGE + CRYPTOGRAM;

impl InitializeUpdateResponse {
    /// Parse the response data field
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() != BASE_LEN && data.len() != BASE_LEN + SEQUENCE_COUNTER {
            return Err(Error::invalid_length(BASE_LEN, data.len()));
        }

        let (key_diversification_data, rest) = data.split_at(DIVERSIFICATION_DATA);
        let (key_info, rest) = rest.split_at(KEY_INFO);
        let (card_challenge, rest) = rest.split_at(CHALLENGE);
        let (card_cryptogram, rest) = rest.split_at(CRYPTOGRAM);

        let response = Self {
            key_diversification_data: to_array(key_diversification_data)?,
            key_info: to_array(key_info)?,
            card_challenge: to_array(card_challenge)?,
            card_cryptogram: to_array(card_cryptogram)?,
            sequence_counter: (!rest.is_empty()).then(|| to_array(rest)).transpose()?,
        };

        if response.scp_id() != crate::constants::scp::SCP03 {
            return Err(Error::UnsupportedScpVersion(response.scp_id()));
        }
        Ok(response)
    }

    /// Key version number of the key set used by the card
    pub const fn kvn(&self) -> u8 {
        self.key_info[0]
    }

    /// Secure channel protocol identifier
    pub const fn scp_id(&self) -> u8 {
        self.key_info[1]
    }

    /// SCP03 "i" parameter
    pub const fn scp_parameter(&self) -> u8 {
        self.key_info[2]
    }
}

fn to_array<const N: usize>(slice: &[u8]) -> Result<[u8; N]> {
    slice
        .try_into()
        .map_err(|_| Error::invalid_length(N, slice.len()))
}
