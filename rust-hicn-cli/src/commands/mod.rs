//! Subcommand implementations for the MAP-Me CLI

pub mod config;
pub mod iu;
pub mod simulate;
