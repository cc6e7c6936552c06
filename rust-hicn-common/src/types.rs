//! Common types shared between the mobility core and its collaborators.

use serde::{Deserialize, Serialize};
use std::fmt;

/// MAP-Me sequence number.
///
/// Compared with plain integer ordering: wraparound is not handled.
pub type Seq = u32;

/// Sentinel for "no mobility event seen yet".
pub const INVALID_SEQ: Seq = 0;

/// Default number of next-hop slots per forwarding entry, shared by the
/// current and previous-hop partitions.
pub const MAX_NEXTHOPS: usize = 10;

/// Unique identifier for a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FaceId(pub u32);

impl fmt::Display for FaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FaceId({})", self.0)
    }
}

impl From<u32> for FaceId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Face type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum FaceKind {
    /// Face bound to a neighbour over an IP adjacency.
    Ip = 0,
    /// UDP tunnel face.
    Udp = 1,
    /// Local producer application face.
    App = 2,
}

/// Network protocol a face sends on. Decides the output node used for acks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaceProto {
    Ip4,
    Ip6,
}

impl fmt::Display for FaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaceKind::Ip => write!(f, "ip"),
            FaceKind::Udp => write!(f, "udp"),
            FaceKind::App => write!(f, "app"),
        }
    }
}
