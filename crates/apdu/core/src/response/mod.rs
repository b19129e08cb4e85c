//! APDU response definitions
//!
//! This module provides the [`Response`] type for ISO/IEC 7816-4 response APDUs.

pub mod status;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::{Error, Result};
use status::StatusWord;

/// Basic APDU response structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response payload data
    payload: Option<Bytes>,
    /// Status word
    status: StatusWord,
}

impl Response {
    /// Create a new response with payload and status
    pub fn new(payload: Option<Bytes>, status: impl Into<StatusWord>) -> Self {
        Self {
            payload: payload.filter(|p| !p.is_empty()),
            status: status.into(),
        }
    }

    /// Create a success response
    pub fn success(payload: Option<Bytes>) -> Self {
        Self::new(payload, StatusWord::new(0x90, 0x00))
    }

    /// Create an error response from a status word
    pub fn error(status: impl Into<StatusWord>) -> Self {
        Self::new(None, status)
    }

    /// Parse response from raw bytes (including status word)
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let len = data.len();
        if len < 2 {
            return Err(Error::IncompleteResponse(len));
        }

        let status = StatusWord::new(data[len - 2], data[len - 1]);
        let payload = (len > 2).then(|| Bytes::copy_from_slice(&data[..len - 2]));

        trace!(
            sw1 = format_args!("{:#04x}", status.sw1),
            sw2 = format_args!("{:#04x}", status.sw2),
            payload_len = len - 2,
            "Parsed APDU response"
        );

        Ok(Self { payload, status })
    }

    /// Get the response payload data
    pub const fn payload(&self) -> &Option<Bytes> {
        &self.payload
    }

    /// Get the response payload, empty when the card returned none
    pub fn data(&self) -> &[u8] {
        self.payload.as_deref().unwrap_or_default()
    }

    /// Get the status word
    pub const fn status(&self) -> StatusWord {
        self.status
    }

    /// Check if the response indicates success
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Convert to the payload, failing on a non-success status word
    pub fn into_result(self) -> Result<Bytes> {
        if self.is_success() {
            Ok(self.payload.unwrap_or_default())
        } else {
            Err(Error::Status {
                status: self.status,
            })
        }
    }

    /// Serialize the response back to raw bytes (payload followed by SW1 SW2)
    pub fn to_bytes(&self) -> Bytes {
        let data = self.data();
        let mut buf = BytesMut::with_capacity(data.len() + 2);
        buf.put_slice(data);
        buf.put_u8(self.status.sw1);
        buf.put_u8(self.status.sw2);
        buf.freeze()
    }
}

impl TryFrom<&[u8]> for Response {
    type Error = Error;

    fn try_from(data: &[u8]) -> Result<Self> {
        Self::from_bytes(data)
    }
}

impl From<Response> for Bytes {
    fn from(response: Response) -> Self {
        response.to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_from_bytes() {
        let resp = Response::from_bytes(&[0x01, 0x02, 0x03, 0x90, 0x00]).unwrap();
        assert_eq!(resp.data(), &[0x01, 0x02, 0x03]);
        assert_eq!(resp.status(), StatusWord::new(0x90, 0x00));
        assert!(resp.is_success());

        let resp = Response::from_bytes(&[0x90, 0x00]).unwrap();
        assert!(resp.payload().is_none());
        assert!(resp.is_success());

        assert!(matches!(
            Response::from_bytes(&[0x01]),
            Err(Error::IncompleteResponse(1))
        ));
    }

    #[test]
    fn test_response_into_result() {
        let success = Response::success(Some(Bytes::from_static(&[0x01, 0x02, 0x03])));
        assert_eq!(success.into_result().unwrap().as_ref(), &[0x01, 0x02, 0x03]);

        let error = Response::error((0x6A, 0x82));
        match error.into_result() {
            Err(Error::Status { status }) => assert_eq!(status.to_u16(), 0x6A82),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_response_round_trip_bytes() {
        let raw = [0xDE, 0xAD, 0x63, 0xC2];
        let resp = Response::from_bytes(&raw).unwrap();
        assert_eq!(resp.to_bytes().as_ref(), &raw);
    }
}
