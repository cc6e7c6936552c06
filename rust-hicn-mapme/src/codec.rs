//! Control message codec seam.

use bytes::{Bytes, BytesMut};
use rust_hicn_common::{message, message::MapMeParams, Prefix};

use crate::error::MapMeError;

/// Parses and forges MAP-Me control packets.
pub trait Codec: Send + Sync {
    fn decode(&self, packet: &[u8]) -> Result<(Prefix, MapMeParams), MapMeError>;

    /// Rewrite the message in `packet` into its acknowledgment, in place.
    fn forge_ack(&self, packet: &mut BytesMut, params: &MapMeParams) -> Result<(), MapMeError>;

    fn forge_update(&self, prefix: &Prefix, params: &MapMeParams) -> Bytes;
}

/// Codec for the TLV wire format.
#[derive(Debug, Default, Clone, Copy)]
pub struct TlvCodec;

impl Codec for TlvCodec {
    fn decode(&self, packet: &[u8]) -> Result<(Prefix, MapMeParams), MapMeError> {
        Ok(message::decode(packet)?)
    }

    fn forge_ack(&self, packet: &mut BytesMut, params: &MapMeParams) -> Result<(), MapMeError> {
        Ok(message::forge_ack(packet, params)?)
    }

    fn forge_update(&self, prefix: &Prefix, params: &MapMeParams) -> Bytes {
        message::encode(prefix, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_hicn_common::message::MessageType;

    #[test]
    fn test_forged_ack_decodes() {
        let codec = TlvCodec;
        let prefix: Prefix = "b001::/64".parse().unwrap();
        let params = MapMeParams::update(9);

        let mut packet = BytesMut::from(&codec.forge_update(&prefix, &params)[..]);
        codec.forge_ack(&mut packet, &params).unwrap();

        let (decoded, ack) = codec.decode(&packet).unwrap();
        assert_eq!(decoded, prefix);
        assert_eq!(ack.kind, MessageType::UpdateAck);
        assert_eq!(ack.seq, 9);
    }

    #[test]
    fn test_garbage_is_a_decode_error() {
        let err = TlvCodec.decode(&[0x01, 0x02, 0x03]).unwrap_err();
        assert!(matches!(err, MapMeError::Decode(_)));
    }
}
