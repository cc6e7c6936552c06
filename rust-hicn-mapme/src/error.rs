//! Error types for MAP-Me processing.
//!
//! Every variant is recovered locally by the caller: the offending packet or
//! operation is dropped and processing continues.

use rust_hicn_common::{types::FaceId, Prefix};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MapMeError {
    /// Malformed control message. Dropped without ack.
    #[error("malformed MAP-Me message: {0}")]
    Decode(String),

    /// Control message for a prefix without a FIB entry. Dropped without ack.
    #[error("no FIB entry for prefix {0}")]
    PrefixNotFound(Prefix),

    /// The FIB entry is not backed by an hICN forwarding object.
    #[error("prefix {0} is not served by an hICN forwarding object")]
    UnsupportedForwardingObject(Prefix),

    /// No free next-hop slot left in the entry.
    #[error("next hop capacity exceeded ({0} slots)")]
    CapacityExceeded(usize),

    /// Reference to a face that no longer exists.
    #[error("invalid face {0}")]
    FaceInvalid(FaceId),

    /// MAP-Me is administratively disabled.
    #[error("MAP-Me is disabled")]
    Disabled,

    /// The event manager queue is full; the event was dropped.
    #[error("MAP-Me event queue full")]
    QueueFull,

    /// The event manager has stopped.
    #[error("MAP-Me event manager is not running")]
    Closed,

    #[error("failed to transmit on {0}: {1}")]
    Transmit(FaceId, String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<rust_hicn_common::Error> for MapMeError {
    fn from(err: rust_hicn_common::Error) -> Self {
        MapMeError::Decode(err.to_string())
    }
}

impl From<config::ConfigError> for MapMeError {
    fn from(err: config::ConfigError) -> Self {
        MapMeError::Config(err.to_string())
    }
}
