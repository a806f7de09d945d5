//! Configuration System
//!
//! Engine configuration loaded from `factlog.toml` with environment
//! variable overrides (`FACTLOG_*` prefix).
//!
//! ## Example
//!
//! ```toml
//! # factlog.toml
//! strict_heads = true
//! max_saturation_rounds = 10000
//! rule_catalog = "/var/lib/factlog/rules.json"
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! FACTLOG_STRICT_HEADS=false
//! FACTLOG_MAX_SATURATION_ROUNDS=500
//! ```

use crate::error::{Error, Result};
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fail a transaction when a rule conclusion does not become fully
    /// ground; when false the conclusion is logged and skipped.
    #[serde(default = "default_true")]
    pub strict_heads: bool,

    /// Upper bound on saturation rounds per transaction. Zero means
    /// unbounded; termination of recursive rule sets is then the rule
    /// author's responsibility.
    #[serde(default)]
    pub max_saturation_rounds: u64,

    /// Optional path of the persistent rule catalog.
    #[serde(default)]
    pub rule_catalog: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            strict_heads: true,
            max_saturation_rounds: 0,
            rule_catalog: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from `factlog.toml` in the working directory
    /// plus `FACTLOG_*` environment variables.
    pub fn load() -> Result<Self> {
        Self::load_from("factlog.toml")
    }

    /// Load configuration from an explicit TOML file plus `FACTLOG_*`
    /// environment variables. A missing file yields the defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("FACTLOG_"))
            .extract()
            .map_err(|error| Error::Config(error.to_string()))
    }
}
