//! `config` command: print the effective configuration

use anyhow::{Context, Result};
use rust_hicn_mapme::MapMeConfig;

pub fn show(config: &MapMeConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;
    println!("{}", json);
    Ok(())
}
