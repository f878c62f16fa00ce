//! Registry configuration.
//!
//! Configuration is plain data, loadable from TOML:
//!
//! ```toml
//! lookup = "vector"
//! hash = "minimal_perfect"
//! runtime_checks = true
//! trace = false
//! output = "stderr"
//!
//! [hash_search]
//! seed = 13081963
//! max_passes = 10
//! max_attempts = 100000
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable that switches trace mode on.
pub const TRACE_ENV: &str = "OPENDISPATCH_TRACE";

/// Errors loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// How type identifiers are mapped to v-tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupStrategy {
    /// Hash map keyed by identifier.
    Map,
    /// Vector indexed by the configured [`HashStrategy`].
    #[default]
    Vector,
}

/// Hash function used by [`LookupStrategy::Vector`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashStrategy {
    /// The identifier is the index. Only for small, dense identifiers.
    Identity,
    /// `(M * x) >> S`, may leave holes in the table.
    #[default]
    FastPerfect,
    /// Pilot and displacement search, no holes.
    MinimalPerfect,
}

/// Where the default error handler writes diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Output {
    None,
    #[default]
    Stderr,
}

/// Bounds of the randomized hash factor search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashConfig {
    /// Seed of the random multiplier sequence.
    pub seed: u64,

    /// Passes of the minimal perfect hash search, each with fresh factors.
    pub max_passes: usize,

    /// Attempt budget. The minimal perfect hash scales it up with the
    /// number of identifiers.
    pub max_attempts: usize,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            seed: 13_081_963,
            max_passes: 10,
            max_attempts: 100_000,
        }
    }
}

/// Configuration of a [`Registry`](crate::Registry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Type-to-vtable lookup strategy.
    pub lookup: LookupStrategy,

    /// Hash function for the vector lookup.
    pub hash: HashStrategy,

    /// Verify that looked up identifiers were registered.
    pub runtime_checks: bool,

    /// Log resolution details while initializing.
    pub trace: bool,

    /// Diagnostic output of the default error handler.
    pub output: Output,

    /// Hash factor search bounds.
    pub hash_search: HashConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            lookup: LookupStrategy::default(),
            hash: HashStrategy::default(),
            runtime_checks: true,
            trace: false,
            output: Output::default(),
            hash_search: HashConfig::default(),
        }
    }
}

impl RegistryConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Apply overrides from the environment.
    pub fn with_env(mut self) -> Self {
        if let Ok(value) = std::env::var(TRACE_ENV) {
            self.trace = !matches!(value.trim(), "" | "0" | "false" | "off");
        }
        self
    }

    pub fn with_lookup(mut self, lookup: LookupStrategy) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn with_hash(mut self, hash: HashStrategy) -> Self {
        self.lookup = LookupStrategy::Vector;
        self.hash = hash;
        self
    }

    pub fn with_runtime_checks(mut self, enabled: bool) -> Self {
        self.runtime_checks = enabled;
        self
    }

    pub fn with_output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }
}
