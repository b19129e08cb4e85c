//! EXTERNAL AUTHENTICATE command (SCP03)
//!
//! Authenticates the host to the card with the host cryptogram and selects the
//! security level of the session. The command is sent with a C-MAC computed
//! from the zero chaining value; see [`crate::ScpState::mac_command`].

use scpkit_apdu_core::Command;

use crate::{
    constants::{cla, ins, sizes::CRYPTOGRAM},
    state::SecurityLevel,
};

/// EXTERNAL AUTHENTICATE command for SCP03
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalAuthenticateCommand {
    security_level: SecurityLevel,
    host_cryptogram: [u8; CRYPTOGRAM],
}

impl ExternalAuthenticateCommand {
    /// Create a new EXTERNAL AUTHENTICATE command with host cryptogram
    pub const fn with_host_cryptogram(
        security_level: SecurityLevel,
        host_cryptogram: [u8; CRYPTOGRAM],
    ) -> Self {
        Self {
            security_level,
            host_cryptogram,
        }
    }

    /// Build the APDU, before the C-MAC is appended
    pub fn to_command(&self) -> Command {
        Command::new_with_data(
            cla::MAC,
            ins::EXTERNAL_AUTHENTICATE,
            self.security_level.bits(),
            0x00,
            self.host_cryptogram.to_vec(),
        )
    }
}
