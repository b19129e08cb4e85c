//! APDU command definitions
//!
//! This module provides the [`Command`] type for ISO/IEC 7816-4 command APDUs.
//! Short encoding is used whenever the command fits in it; extended length
//! encoding is selected automatically otherwise, which secure messaging relies on
//! once a MAC has been appended to a large payload.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Error, Result};

/// Expected length type for APDU commands
///
/// `0` requests the maximum response length for the chosen encoding.
pub type ExpectedLength = u16;

/// Largest data field that fits the short encoding
pub const SHORT_MAX_DATA: usize = 255;

/// Largest data field that fits the extended encoding
pub const EXTENDED_MAX_DATA: usize = 65535;

/// Generic APDU command structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command class byte
    pub cla: u8,
    /// Instruction byte
    pub ins: u8,
    /// Parameter 1
    pub p1: u8,
    /// Parameter 2
    pub p2: u8,
    /// Command data (optional)
    pub data: Option<Bytes>,
    /// Expected length (optional)
    pub le: Option<ExpectedLength>,
}

impl Command {
    /// Create a new command with just the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: None,
        }
    }

    /// Create a new command with data payload
    pub fn new_with_data<T: Into<Bytes>>(cla: u8, ins: u8, p1: u8, p2: u8, data: T) -> Self {
        Self::new(cla, ins, p1, p2).with_data(data)
    }

    /// Set the data field
    pub fn with_data<T: Into<Bytes>>(mut self, data: T) -> Self {
        let data = data.into();
        self.data = (!data.is_empty()).then_some(data);
        self
    }

    /// Set the expected length field
    pub const fn with_le(mut self, le: ExpectedLength) -> Self {
        self.le = Some(le);
        self
    }

    /// Command payload, empty when the command carries no data
    pub fn data(&self) -> &[u8] {
        self.data.as_deref().unwrap_or_default()
    }

    /// Whether the command needs extended length encoding
    pub fn is_extended(&self) -> bool {
        self.data().len() > SHORT_MAX_DATA || self.le.is_some_and(|le| le > 0xFF)
    }

    /// Encode the Lc field for a data field of `len` bytes
    ///
    /// Secure messaging needs this on its own: the MAC covers the header and Lc of
    /// the command as it will be sent, before the MAC itself exists.
    pub fn encode_lc(len: usize, extended: bool, buffer: &mut BytesMut) -> Result<()> {
        if len > EXTENDED_MAX_DATA {
            return Err(Error::DataTooLong(len));
        }
        if extended {
            buffer.put_u8(0x00);
            buffer.put_u16(len as u16);
        } else {
            buffer.put_u8(len as u8);
        }
        Ok(())
    }

    /// Calculate length of serialized command
    pub fn command_length(&self) -> usize {
        let extended = self.is_extended();
        let data_len = self.data().len();
        let mut length = 4;

        if data_len > 0 {
            length += data_len + if extended { 3 } else { 1 };
        }

        if self.le.is_some() {
            length += match (extended, data_len > 0) {
                (false, _) => 1,
                (true, true) => 2,
                (true, false) => 3,
            };
        }

        length
    }

    /// Convert to raw APDU bytes
    pub fn to_bytes(&self) -> Result<Bytes> {
        let extended = self.is_extended();
        let data = self.data();
        let mut buffer = BytesMut::with_capacity(self.command_length());

        buffer.put_u8(self.cla);
        buffer.put_u8(self.ins);
        buffer.put_u8(self.p1);
        buffer.put_u8(self.p2);

        if !data.is_empty() {
            Self::encode_lc(data.len(), extended, &mut buffer)?;
            buffer.put_slice(data);
        }

        if let Some(le) = self.le {
            if extended {
                if data.is_empty() {
                    buffer.put_u8(0x00);
                }
                buffer.put_u16(le);
            } else {
                buffer.put_u8(le as u8);
            }
        }

        Ok(buffer.freeze())
    }

    /// Parse a command from raw bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::InvalidCommandLength(data.len()));
        }

        let mut command = Self::new(data[0], data[1], data[2], data[3]);
        let body = &data[4..];

        match body {
            // Case 1
            [] => {}
            // Case 2 short
            [le] => command.le = Some(*le as ExpectedLength),
            // Extended length
            [0x00, rest @ ..] if rest.len() >= 2 => {
                let n = u16::from_be_bytes([rest[0], rest[1]]) as usize;
                let rest = &rest[2..];
                if rest.is_empty() {
                    // Case 2 extended
                    command.le = Some(n as ExpectedLength);
                } else {
                    if n == 0 || rest.len() < n {
                        return Err(Error::InvalidCommandLength(data.len()));
                    }
                    command.data = Some(Bytes::copy_from_slice(&rest[..n]));
                    match &rest[n..] {
                        [] => {}
                        [hi, lo] => command.le = Some(u16::from_be_bytes([*hi, *lo])),
                        _ => return Err(Error::InvalidCommandLength(data.len())),
                    }
                }
            }
            // Case 3 / 4 short
            [lc, rest @ ..] => {
                let lc = *lc as usize;
                if lc == 0 || rest.len() < lc {
                    return Err(Error::InvalidCommandLength(data.len()));
                }
                command.data = Some(Bytes::copy_from_slice(&rest[..lc]));
                match &rest[lc..] {
                    [] => {}
                    [le] => command.le = Some(*le as ExpectedLength),
                    _ => return Err(Error::InvalidCommandLength(data.len())),
                }
            }
        }

        Ok(command)
    }
}
