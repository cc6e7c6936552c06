//! Error types for the hICN implementation.

use thiserror::Error;

/// Errors raised while handling names and wire-level control messages.
#[derive(Error, Debug)]
pub enum Error {
    /// Error related to TLV encoding/decoding.
    #[error("TLV error: {0}")]
    Tlv(String),

    /// Error related to MAP-Me packet processing.
    #[error("MAP-Me packet error: {0}")]
    Packet(String),

    /// Malformed name prefix.
    #[error("invalid prefix: {0}")]
    Prefix(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Other error: {0}")]
    Other(String),
}
