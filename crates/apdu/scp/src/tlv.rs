//! BER-TLV codec
//!
//! A compact codec for the tag-length-value records carried by the handshake
//! commands. Tags are limited to one or two bytes and lengths to four length
//! bytes, which covers every data object used by SCP03 and SCP11.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Error, Result};

/// Largest number of long-form length bytes accepted when decoding
const MAX_LENGTH_BYTES: usize = 4;

/// A single tag-length-value record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv {
    tag: u16,
    value: Bytes,
}

impl Tlv {
    /// Create a new record
    pub fn new(tag: u16, value: impl Into<Bytes>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }

    /// Create a constructed record whose value is the encoding of `children`
    pub fn constructed(tag: u16, children: &[Self]) -> Result<Self> {
        let mut value = BytesMut::new();
        for child in children {
            child.encode_into(&mut value)?;
        }
        Ok(Self::new(tag, value.freeze()))
    }

    /// Numeric tag
    pub const fn tag(&self) -> u16 {
        self.tag
    }

    /// Value bytes
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Encode this record
    pub fn to_bytes(&self) -> Result<Bytes> {
        encode(self.tag, &self.value)
    }

    /// Append the encoding of this record to `buffer`
    pub fn encode_into(&self, buffer: &mut BytesMut) -> Result<()> {
        put_tag(self.tag, buffer)?;
        put_length(self.value.len(), buffer);
        buffer.put_slice(&self.value);
        Ok(())
    }
}

/// Whether `tag` can be expressed in the one or two byte tag form
///
/// A one byte tag must not have its low five bits all set, and the first byte
/// of a two byte tag must.
pub const fn is_valid_tag(tag: u16) -> bool {
    if tag <= 0xFF {
        tag as u8 & 0x1F != 0x1F
    } else {
        (tag >> 8) as u8 & 0x1F == 0x1F
    }
}

fn put_tag(tag: u16, buffer: &mut BytesMut) -> Result<()> {
    if !is_valid_tag(tag) {
        return Err(Error::MalformedData("tag cannot be encoded"));
    }
    if tag <= 0xFF {
        buffer.put_u8(tag as u8);
    } else {
        buffer.put_u16(tag);
    }
    Ok(())
}

fn put_length(length: usize, buffer: &mut BytesMut) {
    if length < 0x80 {
        buffer.put_u8(length as u8);
        return;
    }
    let bytes = length.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    let significant = &bytes[skip..];
    buffer.put_u8(0x80 | significant.len() as u8);
    buffer.put_slice(significant);
}

/// Encode a single record
pub fn encode(tag: u16, value: &[u8]) -> Result<Bytes> {
    let mut buffer = BytesMut::with_capacity(value.len() + 2 + MAX_LENGTH_BYTES);
    put_tag(tag, &mut buffer)?;
    put_length(value.len(), &mut buffer);
    buffer.put_slice(value);
    Ok(buffer.freeze())
}

/// Decode one record from the front of `buffer`, returning it with the remainder
pub fn decode(buffer: &[u8]) -> Result<(Tlv, &[u8])> {
    let (tag, rest) = match buffer {
        [] => return Err(Error::MalformedData("missing tag")),
        [first, rest @ ..] if first & 0x1F != 0x1F => (*first as u16, rest),
        [first, second, rest @ ..] => (u16::from_be_bytes([*first, *second]), rest),
        [_] => return Err(Error::MalformedData("truncated two byte tag")),
    };

    let (length, rest) = match rest {
        [] => return Err(Error::MalformedData("missing length")),
        [0x80, ..] => return Err(Error::MalformedData("indefinite length")),
        [l, rest @ ..] if *l < 0x80 => (*l as usize, rest),
        [l, rest @ ..] => {
            let n = (*l & 0x7F) as usize;
            if n > MAX_LENGTH_BYTES {
                return Err(Error::MalformedData("length field too long"));
            }
            if rest.len() < n {
                return Err(Error::MalformedData("truncated length"));
            }
            let length = rest[..n]
                .iter()
                .fold(0usize, |acc, b| (acc << 8) | *b as usize);
            (length, &rest[n..])
        }
    };

    if rest.len() < length {
        return Err(Error::invalid_length(length, rest.len()));
    }

    let (value, remainder) = rest.split_at(length);
    Ok((Tlv::new(tag, Bytes::copy_from_slice(value)), remainder))
}

/// Decode a concatenation of records, preserving order
pub fn decode_all(mut buffer: &[u8]) -> Result<Vec<Tlv>> {
    let mut records = Vec::new();
    while !buffer.is_empty() {
        let (record, rest) = decode(buffer)?;
        records.push(record);
        buffer = rest;
    }
    Ok(records)
}

/// Decode a concatenation of records into a tag lookup
pub fn decode_map(buffer: &[u8]) -> Result<TlvMap> {
    Ok(decode_all(buffer)?.into_iter().collect())
}

/// Records keyed by tag, in first-seen order
///
/// A repeated tag replaces the earlier value but keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlvMap {
    entries: Vec<(u16, Bytes)>,
}

impl TlvMap {
    /// Create an empty map
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert a value, replacing any earlier value with the same tag
    pub fn insert(&mut self, tag: u16, value: Bytes) {
        match self.entries.iter_mut().find(|(t, _)| *t == tag) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((tag, value)),
        }
    }

    /// Look up the value of a tag
    pub fn get(&self, tag: u16) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, v)| v.as_ref())
    }

    /// Look up the value of a tag, failing when it is absent
    pub fn require(&self, tag: u16) -> Result<&[u8]> {
        self.get(tag)
            .ok_or(Error::MalformedData("missing data object"))
    }

    /// Whether the tag is present
    pub fn contains(&self, tag: u16) -> bool {
        self.get(tag).is_some()
    }

    /// Number of distinct tags
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over tags and values in order
    pub fn iter(&self) -> impl Iterator<Item = (u16, &[u8])> {
        self.entries.iter().map(|(t, v)| (*t, v.as_ref()))
    }
}

impl FromIterator<Tlv> for TlvMap {
    fn from_iter<I: IntoIterator<Item = Tlv>>(iter: I) -> Self {
        let mut map = Self::new();
        for record in iter {
            map.insert(record.tag, record.value);
        }
        map
    }
}
