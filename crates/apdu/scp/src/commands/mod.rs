//! Handshake command definitions
//!
//! Builders for the APDUs exchanged while opening a secure channel and parsers
//! for their responses.

pub mod external_authenticate;
pub mod initialize_update;
pub mod key_agreement;
pub mod perform_security_operation;

pub use external_authenticate::ExternalAuthenticateCommand;
pub use initialize_update::{InitializeUpdateCommand, InitializeUpdateResponse};
pub use key_agreement::{KeyAgreementCommand, KeyAgreementResponse};
pub use perform_security_operation::PerformSecurityOperationCommand;

use scpkit_apdu_core::Response;
use tracing::{Level, info, warn};

use crate::{Error, Result};

/// Fail with [`Error::Rejected`] unless the card answered 90 00
pub(crate) fn expect_success(command: &'static str, response: &Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    if status.tracing_level() == Level::INFO {
        info!(command, %status, description = status.description(), "Command rejected");
    } else {
        warn!(command, %status, description = status.description(), "Command rejected");
    }
    Err(Error::Rejected { command, status })
}
