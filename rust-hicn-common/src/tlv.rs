//! TLV (Type‑Length‑Value) encoding and decoding utilities.
//!
//! MAP-Me control messages are carried as a compact TLV tree: a single
//! message container holding the prefix, message type and sequence number.

use crate::error::Error;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/* ---------------------------------------------------------------- *
 * TLV type constants (single‑byte)
 * ---------------------------------------------------------------- */

pub const TLV_MAPME: u8        = 0x64;
pub const TLV_PREFIX: u8       = 0x65;
pub const TLV_MESSAGE_TYPE: u8 = 0x66;
pub const TLV_SEQUENCE: u8     = 0x67;

/* ---------------------------------------------------------------- *
 * Encoding helpers
 * ---------------------------------------------------------------- */

/// Encode the variable‑width TLV *length* field.
///
/// * `< 253`  → 1 byte
/// * `≤ 65 535`  → marker 253 + 2‑byte length
/// * otherwise → marker 254 + 4‑byte length
pub fn encode_tlv_length(length: usize, buf: &mut BytesMut) {
    if length < 253 {
        buf.put_u8(length as u8);
    } else if length <= 65_535 {
        buf.put_u8(253);
        buf.put_u16(length as u16);
    } else {
        buf.put_u8(254);
        buf.put_u32(length as u32);
    }
}

/* ---------------------------------------------------------------- *
 * Decoding helpers
 * ---------------------------------------------------------------- */

/// Decode the TLV *length* field.
pub fn decode_tlv_length(buf: &mut impl Buf) -> Result<usize, Error> {
    if !buf.has_remaining() {
        return Err(Error::Tlv("Buffer underflow when decoding TLV length".into()));
    }

    match buf.get_u8() {
        n @ 0..=252 => Ok(n as usize),
        253 => {
            if buf.remaining() < 2 {
                return Err(Error::Tlv("Buffer underflow when decoding 16‑bit TLV length".into()));
            }
            Ok(buf.get_u16() as usize)
        }
        254 => {
            if buf.remaining() < 4 {
                return Err(Error::Tlv("Buffer underflow when decoding 32‑bit TLV length".into()));
            }
            Ok(buf.get_u32() as usize)
        }
        255 => Err(Error::Tlv("64‑bit TLV lengths not supported".into())),
    }
}

/* ---------------------------------------------------------------- *
 * TLV element wrapper
 * ---------------------------------------------------------------- */

/// A generic TLV element consisting of *type*, *length* and *value*.
#[derive(Debug, Clone, PartialEq)]
pub struct TlvElement {
    pub tlv_type: u8,
    pub value: Bytes,
}

impl TlvElement {
    pub fn new(tlv_type: u8, value: impl Into<Bytes>) -> Self {
        Self {
            tlv_type,
            value: value.into(),
        }
    }

    /// Total number of bytes when this element is encoded.
    pub fn len(&self) -> usize {
        1 + tlv_length_size(self.value.len()) + self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Fails unless this element has type `tlv_type`.
    pub fn expect_type(&self, tlv_type: u8) -> Result<(), Error> {
        if self.tlv_type != tlv_type {
            return Err(Error::Tlv(format!(
                "Expected TLV type {:#04x}, got {:#04x}",
                tlv_type, self.tlv_type
            )));
        }
        Ok(())
    }

    /// Encode this element into `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.tlv_type);
        encode_tlv_length(self.value.len(), buf);
        buf.extend_from_slice(&self.value);
    }

    /// Decode a single element from the front of `buf`.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, Error> {
        if buf.remaining() < 2 {
            return Err(Error::Tlv("Buffer too small for TLV header".into()));
        }

        let tlv_type = buf.get_u8();
        let length = decode_tlv_length(buf)?;

        if buf.remaining() < length {
            return Err(Error::Tlv(format!(
                "Buffer underflow: TLV value requires {} bytes but only {} available",
                length,
                buf.remaining()
            )));
        }

        let value = buf.copy_to_bytes(length);
        Ok(Self { tlv_type, value })
    }

    /// Decode every nested element carried in this element's value.
    pub fn children(&self) -> Result<Vec<TlvElement>, Error> {
        let mut buf = self.value.clone();
        let mut children = Vec::new();
        while buf.has_remaining() {
            children.push(TlvElement::decode(&mut buf)?);
        }
        Ok(children)
    }
}

/// Number of bytes required to encode `length` with the variable‑width scheme.
pub fn tlv_length_size(length: usize) -> usize {
    if length < 253 {
        1
    } else if length <= 65_535 {
        3
    } else {
        5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_widths() {
        let mut buf = BytesMut::new();
        encode_tlv_length(100, &mut buf);
        assert_eq!(&buf[..], &[100]);

        buf.clear();
        encode_tlv_length(1000, &mut buf);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf[0], 253);
        assert_eq!(decode_tlv_length(&mut &buf[..]).unwrap(), 1000);

        buf.clear();
        encode_tlv_length(100_000, &mut buf);
        assert_eq!(buf.len(), 5);
        assert_eq!(buf[0], 254);
        assert_eq!(decode_tlv_length(&mut &buf[..]).unwrap(), 100_000);
    }

    #[test]
    fn test_element_decode_errors() {
        assert!(TlvElement::decode(&mut &[TLV_SEQUENCE][..]).is_err());
        // Declares 4 bytes of value, carries 2.
        assert!(TlvElement::decode(&mut &[TLV_SEQUENCE, 4, 0, 1][..]).is_err());
        assert!(decode_tlv_length(&mut &[255u8][..]).is_err());
    }

    #[test]
    fn test_nested_children() {
        let mut inner = BytesMut::new();
        TlvElement::new(TLV_MESSAGE_TYPE, vec![1u8]).encode(&mut inner);
        TlvElement::new(TLV_SEQUENCE, vec![0u8, 0, 0, 7]).encode(&mut inner);
        let outer = TlvElement::new(TLV_MAPME, inner.freeze());

        let mut wire = BytesMut::new();
        outer.encode(&mut wire);
        assert_eq!(wire.len(), outer.len());

        let decoded = TlvElement::decode(&mut wire.freeze()).unwrap();
        let children = decoded.children().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].tlv_type, TLV_MESSAGE_TYPE);
        assert_eq!(children[1].value.as_ref(), &[0, 0, 0, 7]);
        assert!(children[1].expect_type(TLV_PREFIX).is_err());
    }
}
