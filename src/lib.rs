//! hICN MAP-Me
//!
//! Facade over the workspace crates: the shared wire and name types in
//! [`common`] and the mobility core in [`mapme`].

pub use rust_hicn_common as common;
pub use rust_hicn_mapme as mapme;

pub use rust_hicn_common::{types::FaceId, Prefix};
pub use rust_hicn_mapme::{MapMe, MapMeConfig, MapMeError};
