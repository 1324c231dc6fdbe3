//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - `ioc.toml` (project defaults, optional)
//! - Environment variables (`IOC_*` prefix)
//!
//! The compiler core never reads these sources itself — only binaries or
//! embedding applications call [`CompilerConfig::load`]; the library always
//! accepts a [`CompilerConfig`] value as a plain argument.
//!
//! ## Example
//!
//! ```toml
//! # ioc.toml
//! [budget]
//! max_nodes = 5000
//!
//! [optimizer]
//! default_passes = ["dead_code_elimination", "common_subexpression_elimination"]
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! IOC_BUDGET__MAX_NODES=5000
//! IOC_OPTIMIZER__DEFAULT_STRATEGY=fastest_runtime
//! ```

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Upper bound on node count, per invariant 7. Configurable downward only —
/// [`crate::security::validate_program`] never honors a value above this.
pub const HARD_MAX_NODES: usize = 10_000;

/// Upper bound on serialized program size in bytes, per invariant 7.
pub const HARD_MAX_SERIALIZED_BYTES: usize = 10 * 1024 * 1024;

/// Upper bound on generated code size in bytes, per §4.4/§4.8.
pub const HARD_MAX_GENERATED_CODE_BYTES: usize = 100 * 1024;

/// Top-level compiler configuration, merged from defaults, an optional
/// `ioc.toml`, and `IOC_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerConfig {
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Maximum node count accepted by the security validator. Clamped to
    /// [`HARD_MAX_NODES`] regardless of what is configured here.
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,

    /// Maximum serialized program size in bytes. Clamped to
    /// [`HARD_MAX_SERIALIZED_BYTES`].
    #[serde(default = "default_max_serialized_bytes")]
    pub max_serialized_bytes: usize,

    /// Maximum generated-code size in bytes. Clamped to
    /// [`HARD_MAX_GENERATED_CODE_BYTES`].
    #[serde(default = "default_max_generated_code_bytes")]
    pub max_generated_code_bytes: usize,
}

/// Per-complexity-class resource budgets, keyed informally by name since
/// TOML tables don't index well by an enum; [`crate::budget`] maps these
/// back onto [`crate::capability::ComplexityClass`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u64,
    #[serde(default = "default_max_time_ms")]
    pub max_time_ms: u64,
    #[serde(default = "default_max_stack_depth")]
    pub max_stack_depth: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        BudgetConfig {
            max_iterations: default_max_iterations(),
            max_time_ms: default_max_time_ms(),
            max_stack_depth: default_max_stack_depth(),
        }
    }
}

/// Optimizer pass-manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    #[serde(default = "default_passes")]
    pub default_passes: Vec<String>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            default_passes: default_passes(),
        }
    }
}

/// Default backend-selection strategy, used when a caller doesn't name one
/// explicitly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DefaultBackendStrategy {
    FastestCompile,
    FastestRuntime,
    MostPortable,
    Balanced,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_strategy")]
    pub default_strategy: DefaultBackendStrategy,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            default_strategy: default_backend_strategy(),
        }
    }
}

/// Structured logging configuration consumed when a binary installs a
/// `tracing-subscriber`; the library itself only emits `tracing` spans and
/// events and never installs a subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_max_nodes() -> usize {
    HARD_MAX_NODES
}
fn default_max_serialized_bytes() -> usize {
    HARD_MAX_SERIALIZED_BYTES
}
fn default_max_generated_code_bytes() -> usize {
    HARD_MAX_GENERATED_CODE_BYTES
}
fn default_max_iterations() -> u64 {
    10_000_000
}
fn default_max_time_ms() -> u64 {
    5_000
}
fn default_max_stack_depth() -> usize {
    256
}
fn default_passes() -> Vec<String> {
    vec![
        "dead_code_elimination".to_string(),
        "common_subexpression_elimination".to_string(),
        "filter_fusion".to_string(),
        "map_fusion".to_string(),
        "filter_before_map".to_string(),
    ]
}
fn default_backend_strategy() -> DefaultBackendStrategy {
    DefaultBackendStrategy::Balanced
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl CompilerConfig {
    /// Load configuration from default locations: `ioc.toml` in the current
    /// directory, then `IOC_*` environment variables. Clamps every
    /// caps-style field to its hard maximum after extraction.
    pub fn load() -> Result<Self, figment::Error> {
        let mut config: CompilerConfig = Figment::new()
            .merge(Toml::file("ioc.toml"))
            .merge(Env::prefixed("IOC_").split("__"))
            .extract()?;
        config.clamp();
        Ok(config)
    }

    /// Load configuration from a specific TOML file path.
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        let mut config: CompilerConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("IOC_").split("__"))
            .extract()?;
        config.clamp();
        Ok(config)
    }

    fn clamp(&mut self) {
        self.max_nodes = self.max_nodes.min(HARD_MAX_NODES);
        self.max_serialized_bytes = self.max_serialized_bytes.min(HARD_MAX_SERIALIZED_BYTES);
        self.max_generated_code_bytes = self
            .max_generated_code_bytes
            .min(HARD_MAX_GENERATED_CODE_BYTES);
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            budget: BudgetConfig::default(),
            optimizer: OptimizerConfig::default(),
            backend: BackendConfig::default(),
            logging: LoggingConfig::default(),
            max_nodes: default_max_nodes(),
            max_serialized_bytes: default_max_serialized_bytes(),
            max_generated_code_bytes: default_max_generated_code_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_respects_hard_caps() {
        let config = CompilerConfig::default();
        assert_eq!(config.max_nodes, HARD_MAX_NODES);
        assert_eq!(config.max_serialized_bytes, HARD_MAX_SERIALIZED_BYTES);
    }

    #[test]
    fn clamp_never_raises_above_hard_caps() {
        let mut config = CompilerConfig::default();
        config.max_nodes = HARD_MAX_NODES * 10;
        config.clamp();
        assert_eq!(config.max_nodes, HARD_MAX_NODES);
    }

    #[test]
    fn config_serialization_round_trips_through_toml() {
        let config = CompilerConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[budget]"));
        assert!(toml_str.contains("[optimizer]"));
    }
}
