//! PERFORM SECURITY OPERATION command
//!
//! Presents one OCE certificate to the card during SCP11a/c. Certificates
//! larger than a short APDU are sent with ISO 7816-4 command chaining.

use bytes::Bytes;
use scpkit_apdu_core::Command;

use crate::{
    constants::{cla, ins, sizes::SHORT_APDU_DATA},
    keys::OceKeyReference,
};

/// Bit of P2 signalling that further certificates follow
const MORE_CERTIFICATES: u8 = 0x80;

/// PERFORM SECURITY OPERATION command carrying one certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformSecurityOperationCommand {
    oce_key_ref: OceKeyReference,
    certificate: Bytes,
    last: bool,
}

impl PerformSecurityOperationCommand {
    /// Create the command for `certificate`; `last` marks the leaf certificate
    pub fn with_certificate(
        oce_key_ref: OceKeyReference,
        certificate: Bytes,
        last: bool,
    ) -> Self {
        Self {
            oce_key_ref,
            certificate,
            last,
        }
    }

    /// Build the APDUs, chained when the certificate exceeds one short APDU
    pub fn to_commands(&self) -> Vec<Command> {
        let p1 = self.oce_key_ref.kvn;
        let p2 = if self.last {
            self.oce_key_ref.kid
        } else {
            self.oce_key_ref.kid | MORE_CERTIFICATES
        };

        if self.certificate.is_empty() {
            return vec![Command::new(cla::GP, ins::PERFORM_SECURITY_OPERATION, p1, p2)];
        }

        let chunks = self.certificate.len().div_ceil(SHORT_APDU_DATA);
        (0..chunks)
            .map(|i| {
                let start = i * SHORT_APDU_DATA;
                let end = (start + SHORT_APDU_DATA).min(self.certificate.len());
                let class = if i + 1 < chunks {
                    cla::GP | cla::CHAINING
                } else {
                    cla::GP
                };
                Command::new_with_data(
                    class,
                    ins::PERFORM_SECURITY_OPERATION,
                    p1,
                    p2,
                    self.certificate.slice(start..end),
                )
            })
            .collect()
    }
}
