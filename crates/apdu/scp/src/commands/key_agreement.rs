//! SCP11 key agreement (INTERNAL / EXTERNAL AUTHENTICATE)
//!
//! SCP11b uses INTERNAL AUTHENTICATE, SCP11a and SCP11c use EXTERNAL
//! AUTHENTICATE. Both carry a control reference template describing the
//! session keys followed by the host's ephemeral public key, and return the
//! card's ephemeral public key with a receipt.

use bytes::{BufMut, Bytes, BytesMut};
use p256::{PublicKey, elliptic_curve::sec1::ToEncodedPoint};
use scpkit_apdu_core::Command;

use crate::{
    Error, Result,
    constants::{cla, ins, scp, scp11, sizes::BLOCK, tags},
    keys::{KeyReference, ScpKind},
    tlv::{self, Tlv},
};

/// Key agreement command of the SCP11 handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAgreementCommand {
    key_ref: KeyReference,
    data: Bytes,
}

impl KeyAgreementCommand {
    /// Create the key agreement command for `key_ref` with the host's
    /// ephemeral public key
    pub fn new(key_ref: KeyReference, epk_oce: &PublicKey) -> Result<Self> {
        let kind = key_ref.kind();
        if !kind.is_scp11() {
            return Err(Error::InvalidParameters("key agreement requires an SCP11 key"));
        }
        let params = match kind {
            ScpKind::Scp11a => 0x01,
            ScpKind::Scp11c => 0x03,
            _ => 0x00,
        };

        let crt = Tlv::constructed(
            tags::CONTROL_REFERENCE,
            &[
                Tlv::new(tags::SCP_PARAMETERS, vec![scp::SCP11, params]),
                Tlv::new(tags::KEY_USAGE, vec![scp11::KEY_USAGE]),
                Tlv::new(tags::KEY_TYPE, vec![scp11::KEY_TYPE_AES]),
                Tlv::new(tags::KEY_LENGTH, vec![scp11::KEY_LENGTH]),
            ],
        )?;

        let point = epk_oce.to_encoded_point(false);
        let mut data = BytesMut::new();
        crt.encode_into(&mut data)?;
        data.put(tlv::encode(tags::EPHEMERAL_PUBLIC_KEY, point.as_bytes())?);

        Ok(Self {
            key_ref,
            data: data.freeze(),
        })
    }

    /// Command data field, also the first input of the receipt
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Build the APDU
    pub fn to_command(&self) -> Command {
        let ins = match self.key_ref.kind() {
            ScpKind::Scp11b => ins::INTERNAL_AUTHENTICATE,
            _ => ins::EXTERNAL_AUTHENTICATE,
        };
        Command::new_with_data(
            cla::GP,
            ins,
            self.key_ref.kvn(),
            self.key_ref.kid(),
            self.data.clone(),
        )
        .with_le(0)
    }
}

/// Key agreement response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAgreementResponse {
    /// Card ephemeral public key (ePK.SD.ECKA)
    pub epk_sd: PublicKey,
    /// The encoded ephemeral public key record, as covered by the receipt
    pub epk_sd_record: Bytes,
    /// Receipt
    pub receipt: [u8; BLOCK],
}

impl KeyAgreementResponse {
    /// Parse the response data field
    pub fn parse(data: &[u8]) -> Result<Self> {
        let (epk, rest) = tlv::decode(data)?;
        if epk.tag() != tags::EPHEMERAL_PUBLIC_KEY {
            return Err(Error::MalformedData("expected ephemeral public key"));
        }
        let epk_sd_record = Bytes::copy_from_slice(&data[..data.len() - rest.len()]);

        let (receipt, rest) = tlv::decode(rest)?;
        if receipt.tag() != tags::RECEIPT || !rest.is_empty() {
            return Err(Error::MalformedData("expected receipt"));
        }
        let receipt: [u8; BLOCK] = receipt
            .value()
            .try_into()
            .map_err(|_| Error::invalid_length(BLOCK, receipt.value().len()))?;

        let epk_sd = PublicKey::from_sec1_bytes(epk.value())
            .map_err(|_| Error::AuthenticationFailed("card ephemeral key is not a P-256 point"))?;

        Ok(Self {
            epk_sd,
            epk_sd_record,
            receipt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::kid;
    use hex_literal::hex;
    use p256::SecretKey;

    fn public_key(byte: u8) -> PublicKey {
        SecretKey::from_slice(&[byte; 32]).unwrap().public_key()
    }

    #[test]
    fn test_key_agreement_command_scp11b() {
        let key_ref = KeyReference::new(kid::SCP11B, 0x01).unwrap();
        let epk = public_key(0x33);
        let cmd = KeyAgreementCommand::new(key_ref, &epk).unwrap();

        let data = cmd.data();
        assert_eq!(&data[..15], hex!("A60D 90021100 95013C 800188 810110"));
        assert_eq!(&data[15..18], hex!("5F4941"));
        assert_eq!(&data[18..], epk.to_encoded_point(false).as_bytes());

        let apdu = cmd.to_command();
        assert_eq!(apdu.cla, 0x80);
        assert_eq!(apdu.ins, 0x88);
        assert_eq!((apdu.p1, apdu.p2), (0x01, 0x13));
    }

    #[test]
    fn test_key_agreement_command_scp11a_and_c() {
        let epk = public_key(0x33);

        let cmd = KeyAgreementCommand::new(KeyReference::new(kid::SCP11A, 0x03).unwrap(), &epk)
            .unwrap();
        assert_eq!(&cmd.data()[2..6], hex!("90021101"));
        assert_eq!(cmd.to_command().ins, 0x82);

        let cmd = KeyAgreementCommand::new(KeyReference::new(kid::SCP11C, 0x03).unwrap(), &epk)
            .unwrap();
        assert_eq!(&cmd.data()[2..6], hex!("90021103"));

        assert!(
            KeyAgreementCommand::new(KeyReference::new(kid::SCP03, 0x01).unwrap(), &epk).is_err()
        );
    }

    #[test]
    fn test_key_agreement_response() {
        let epk = public_key(0x44);
        let point = epk.to_encoded_point(false);
        let mut data = tlv::encode(0x5F49, point.as_bytes()).unwrap().to_vec();
        data.extend_from_slice(&tlv::encode(0x86, &[0xAB; 16]).unwrap());

        let response = KeyAgreementResponse::parse(&data).unwrap();
        assert_eq!(response.epk_sd, epk);
        assert_eq!(response.epk_sd_record.as_ref(), &data[..68]);
        assert_eq!(response.receipt, [0xAB; 16]);
    }

    #[test]
    fn test_key_agreement_response_errors() {
        // Receipt too short
        let point = public_key(0x44).to_encoded_point(false);
        let mut data = tlv::encode(0x5F49, point.as_bytes()).unwrap().to_vec();
        data.extend_from_slice(&hex!("8602ABCD"));
        assert!(KeyAgreementResponse::parse(&data).is_err());

        // Not a curve point
        let mut data = tlv::encode(0x5F49, &[0x04; 65]).unwrap().to_vec();
        data.extend_from_slice(&tlv::encode(0x86, &[0xAB; 16]).unwrap());
        assert!(matches!(
            KeyAgreementResponse::parse(&data),
            Err(Error::AuthenticationFailed(_))
        ));

        // Records in the wrong order
        assert!(KeyAgreementResponse::parse(&hex!("8601AA")).is_err());
    }
}
