//! Common types and utilities for the hICN (hybrid Information-Centric Networking)
//! MAP-Me implementation.
//!
//! This crate provides the vocabulary shared by the mobility core and the
//! command-line tooling: face identifiers, name prefixes, the MAP-Me control
//! message model and its TLV wire encoding, and metric primitives.

pub mod error;
pub mod message;
pub mod metrics;
pub mod prefix;
pub mod tlv;
pub mod types;

/// Reexport of common types
pub use error::Error;
pub use prefix::Prefix;
pub type Result<T> = std::result::Result<T, Error>;
