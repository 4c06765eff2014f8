//! # Engine Configuration
//!
//! Configuration for the checkout engine.
//!
//! ## Configuration File Format
//! ```toml
//! # warung.toml
//! [pricing]
//! tax_rate_bps = 1000     # 10% sales tax
//!
//! [propagation]
//! max_attempts = 3        # bounded retry for post-commit writes
//! initial_backoff_ms = 100
//! max_backoff_secs = 2
//! ```
//!
//! Every field has a default, so a missing file or an empty table is
//! fine; the defaults match a plain 10%-tax counter.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use warung_core::TaxRate;

// =============================================================================
// Errors
// =============================================================================

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

// =============================================================================
// Engine Config
// =============================================================================

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Pricing settings.
    #[serde(default)]
    pub pricing: PricingConfig,

    /// Post-commit propagation retry policy.
    #[serde(default)]
    pub propagation: PropagationConfig,
}

impl EngineConfig {
    /// Loads configuration from a TOML file, falling back to defaults
    /// when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            info!(path = %path.display(), "No config file, using defaults");
            return Ok(EngineConfig::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&contents)?;

        debug!(
            tax_rate_bps = config.pricing.tax_rate_bps,
            max_attempts = config.propagation.max_attempts,
            "Engine config loaded"
        );

        Ok(config)
    }

    /// The configured tax rate.
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.pricing.tax_rate_bps)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            pricing: PricingConfig::default(),
            propagation: PropagationConfig::default(),
        }
    }
}

// =============================================================================
// Pricing Config
// =============================================================================

/// Pricing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Sales tax rate in basis points (1000 = 10%).
    #[serde(default = "default_tax_rate_bps")]
    pub tax_rate_bps: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        PricingConfig {
            tax_rate_bps: default_tax_rate_bps(),
        }
    }
}

fn default_tax_rate_bps() -> u32 {
    1000
}

// =============================================================================
// Propagation Config
// =============================================================================

/// Retry policy for the post-commit writes (cash ledger, customer
/// aggregate). Bounded: once attempts run out the failure goes to the
/// reconciliation queue instead of blocking the lane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropagationConfig {
    /// Total attempts per step, first try included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff between attempts (milliseconds).
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Backoff ceiling (seconds).
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        PropagationConfig {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_secs: default_max_backoff_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_secs() -> u64 {
    2
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.pricing.tax_rate_bps, 1000);
        assert_eq!(config.tax_rate().bps(), 1000);
        assert_eq!(config.propagation.max_attempts, 3);
    }

    #[test]
    fn test_parse_partial_file() {
        let config: EngineConfig = toml::from_str(
            r#"
            [pricing]
            tax_rate_bps = 1100
            "#,
        )
        .unwrap();

        assert_eq!(config.pricing.tax_rate_bps, 1100);
        // Missing table falls back wholesale
        assert_eq!(config.propagation.max_attempts, 3);
    }

    #[test]
    fn test_parse_empty_file() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config.pricing.tax_rate_bps, 1000);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = EngineConfig::load("/nonexistent/warung.toml").unwrap();
        assert_eq!(config.pricing.tax_rate_bps, 1000);
    }
}
