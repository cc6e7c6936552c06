//! MAP-Me control messages.
//!
//! An Interest Update (IU) announces a producer location for a prefix with a
//! sequence number; the receiving forwarder answers with an acknowledgment
//! carrying the same prefix and sequence number. Notifications follow the
//! same layout with their own message types.
//!
//! Wire layout:
//!
//! ```text
//! MAPME { PREFIX { len, addr.. }, MESSAGE_TYPE { kind }, SEQUENCE { seq (u32 BE) } }
//! ```

use crate::error::Error;
use crate::prefix::Prefix;
use crate::tlv::{self, TlvElement};
use crate::types::Seq;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// MAP-Me message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    Update = 1,
    UpdateAck = 2,
    Notification = 3,
    NotificationAck = 4,
}

impl MessageType {
    pub fn from_u8(value: u8) -> Result<Self, Error> {
        match value {
            1 => Ok(MessageType::Update),
            2 => Ok(MessageType::UpdateAck),
            3 => Ok(MessageType::Notification),
            4 => Ok(MessageType::NotificationAck),
            other => Err(Error::Packet(format!("unknown MAP-Me message type {}", other))),
        }
    }

    pub fn is_ack(self) -> bool {
        matches!(self, MessageType::UpdateAck | MessageType::NotificationAck)
    }

    /// The acknowledgment type answering this message. Acks map to themselves.
    pub fn ack(self) -> Self {
        match self {
            MessageType::Update | MessageType::UpdateAck => MessageType::UpdateAck,
            MessageType::Notification | MessageType::NotificationAck => {
                MessageType::NotificationAck
            }
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageType::Update => "IU",
            MessageType::UpdateAck => "IU-Ack",
            MessageType::Notification => "IN",
            MessageType::NotificationAck => "IN-Ack",
        };
        f.write_str(s)
    }
}

/// Logical fields of a control message besides its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapMeParams {
    pub kind: MessageType,
    pub seq: Seq,
}

impl MapMeParams {
    pub fn update(seq: Seq) -> Self {
        Self {
            kind: MessageType::Update,
            seq,
        }
    }
}

/// Encode a control message into `buf`.
pub fn encode_into(buf: &mut BytesMut, prefix: &Prefix, params: &MapMeParams) {
    let mut inner = BytesMut::with_capacity(32);
    prefix.to_tlv().encode(&mut inner);
    TlvElement::new(tlv::TLV_MESSAGE_TYPE, vec![params.kind as u8]).encode(&mut inner);
    let mut seq = BytesMut::with_capacity(4);
    seq.put_u32(params.seq);
    TlvElement::new(tlv::TLV_SEQUENCE, seq.freeze()).encode(&mut inner);

    TlvElement::new(tlv::TLV_MAPME, inner.freeze()).encode(buf);
}

/// Encode a control message into a fresh buffer.
pub fn encode(prefix: &Prefix, params: &MapMeParams) -> Bytes {
    let mut buf = BytesMut::with_capacity(40);
    encode_into(&mut buf, prefix, params);
    buf.freeze()
}

/// Decode a control message.
pub fn decode(packet: &[u8]) -> Result<(Prefix, MapMeParams), Error> {
    let mut buf = packet;
    let outer = TlvElement::decode(&mut buf)?;
    outer.expect_type(tlv::TLV_MAPME)?;

    let mut prefix = None;
    let mut kind = None;
    let mut seq = None;

    for element in outer.children()? {
        match element.tlv_type {
            tlv::TLV_PREFIX => prefix = Some(Prefix::from_tlv(&element)?),
            tlv::TLV_MESSAGE_TYPE => {
                if element.value.len() != 1 {
                    return Err(Error::Packet("message type must be one byte".into()));
                }
                kind = Some(MessageType::from_u8(element.value[0])?);
            }
            tlv::TLV_SEQUENCE => {
                if element.value.len() != 4 {
                    return Err(Error::Packet("sequence number must be four bytes".into()));
                }
                seq = Some(element.value.clone().get_u32());
            }
            // Unknown elements are skipped.
            _ => {}
        }
    }

    let prefix = prefix.ok_or_else(|| Error::Packet("missing prefix".into()))?;
    let kind = kind.ok_or_else(|| Error::Packet("missing message type".into()))?;
    let seq = seq.ok_or_else(|| Error::Packet("missing sequence number".into()))?;

    Ok((prefix, MapMeParams { kind, seq }))
}

/// Turn the message held in `packet` into its acknowledgment, in place.
///
/// Only the message type byte changes: prefix and sequence number are kept,
/// so the ack can be sent back on the ingress face as is.
pub fn forge_ack(packet: &mut BytesMut, params: &MapMeParams) -> Result<(), Error> {
    let offset = locate(packet, tlv::TLV_MESSAGE_TYPE)?;
    packet[offset] = params.kind.ack() as u8;
    Ok(())
}

/// Offset in `packet` of the value of the first child element of type
/// `tlv_type` inside the message container.
fn locate(packet: &[u8], tlv_type: u8) -> Result<usize, Error> {
    let mut buf = packet;
    if !buf.has_remaining() {
        return Err(Error::Packet("empty packet".into()));
    }
    let outer_type = buf.get_u8();
    if outer_type != tlv::TLV_MAPME {
        return Err(Error::Packet(format!("not a MAP-Me message: {:#04x}", outer_type)));
    }
    let outer_len = tlv::decode_tlv_length(&mut buf)?;
    let end = packet.len() - buf.remaining() + outer_len;
    if end > packet.len() {
        return Err(Error::Packet("truncated MAP-Me message".into()));
    }

    while packet.len() - buf.remaining() < end {
        let element_type = buf.get_u8();
        let length = tlv::decode_tlv_length(&mut buf)?;
        let offset = packet.len() - buf.remaining();
        if offset + length > end {
            return Err(Error::Packet("truncated MAP-Me element".into()));
        }
        if element_type == tlv_type {
            return Ok(offset);
        }
        buf.advance(length);
    }

    Err(Error::Packet(format!("element {:#04x} not found", tlv_type)))
}
