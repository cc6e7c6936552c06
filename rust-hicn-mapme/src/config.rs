//! MAP-Me configuration.
//!
//! Settings are read from an optional file (format picked from the
//! extension) and overridden by `HICN_MAPME_*` environment variables.

use log::debug;
use rust_hicn_common::types::MAX_NEXTHOPS;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::MapMeError;

/// Environment variable prefix for overrides, e.g. `HICN_MAPME_RETX_MS=100`.
pub const ENV_PREFIX: &str = "HICN_MAPME";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapMeConfig {
    /// Process Interest Updates at all.
    pub enabled: bool,

    /// Retransmission period of an unacknowledged IU (in milliseconds).
    pub retx_ms: u64,

    /// Retransmissions before an IU is given up.
    pub retx_count: u32,

    /// Capacity of the event manager queue.
    pub event_queue_size: usize,

    /// Next-hop slots per forwarding entry.
    pub max_nexthops: usize,
}

impl Default for MapMeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retx_ms: 50,
            retx_count: 3,
            event_queue_size: 1024,
            max_nexthops: MAX_NEXTHOPS,
        }
    }
}

impl MapMeConfig {
    /// Load the configuration from `path` (if any) layered under the
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self, MapMeError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            debug!("Loading MAP-Me configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: MapMeConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MapMeError> {
        if self.max_nexthops == 0 || self.max_nexthops > u8::MAX as usize {
            return Err(MapMeError::Config(format!(
                "max_nexthops must be within 1..=255, got {}",
                self.max_nexthops
            )));
        }
        if self.event_queue_size == 0 {
            return Err(MapMeError::Config("event_queue_size must be positive".into()));
        }
        Ok(())
    }

    pub fn retx_period(&self) -> Duration {
        Duration::from_millis(self.retx_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = MapMeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_nexthops, MAX_NEXTHOPS);
        assert_eq!(config.retx_period(), Duration::from_millis(50));
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "retx_ms = 200\nmax_nexthops = 4").unwrap();

        let config = MapMeConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.retx_ms, 200);
        assert_eq!(config.max_nexthops, 4);
        assert_eq!(config.retx_count, 3);
        assert!(config.enabled);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "max_nexthops = 0").unwrap();

        let err = MapMeConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, MapMeError::Config(_)));

        let config = MapMeConfig {
            event_queue_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
