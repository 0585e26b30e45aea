// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::logging::LoggingConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, time::Duration};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    #[serde(default = "SyncConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub enable_verbose_logging: bool,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: Self::default_poll_interval_ms(),
            enable_verbose_logging: false,
            logging: LoggingConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Delay between two reconciliation iterations of one account. Defaults to 6 seconds.
    pub const fn default_poll_interval_ms() -> u64 {
        6_000
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to load config at {}", path.to_string_lossy()))?;
        let reader = BufReader::new(file);
        serde_yaml::from_reader(reader)
            .with_context(|| format!("Failed to parse config at {}", path.to_string_lossy()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_config_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "enable_verbose_logging: true").unwrap();
        let config = SyncConfig::load(file.path()).unwrap();
        assert!(config.enable_verbose_logging);
        assert_eq!(config.poll_interval(), Duration::from_secs(6));
        assert!(!config.logging.json);
    }

    #[test]
    fn test_load_config_rejects_unknown_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "poll_interval_ms: 1000\nunknown_field: 1").unwrap();
        assert!(SyncConfig::load(file.path()).is_err());
    }
}
