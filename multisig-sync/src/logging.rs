// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human readable output.
    #[serde(default)]
    pub json: bool,
    /// Used when RUST_LOG is not set.
    #[serde(default = "LoggingConfig::default_level")]
    pub default_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            default_level: Self::default_level(),
        }
    }
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

/// Installs the global tracing subscriber.
pub fn setup_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_level))
        .context("Invalid log filter")?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_thread_names(true);
    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Setting default tracing subscriber failed: {}", e))
}
