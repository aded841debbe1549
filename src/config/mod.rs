//! Engine Configuration Module
//!
//! Classification keywords and thresholds loaded from TOML, replacing the
//! constants the report scripts used to hardcode.
//!
//! ## Loading Order
//!
//! 1. `HARVEST_OPS_CONFIG` environment variable (path to TOML file)
//! 2. `harvest_ops.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! // In main():
//! config::init(EngineConfig::load());
//!
//! // Anywhere in the codebase:
//! let threshold = config::get().intervals.outlier_threshold_hours;
//! ```
//!
//! Components also take their section by value at construction, so tests
//! can run with alternate thresholds without touching the global.

mod engine_config;
pub mod defaults;
pub mod validation;

pub use engine_config::*;

use std::sync::OnceLock;

/// Global engine configuration, initialized once at startup.
static ENGINE_CONFIG: OnceLock<EngineConfig> = OnceLock::new();

/// Initialize the global engine configuration.
///
/// Only the first call takes effect; later calls are logged and ignored.
pub fn init(config: EngineConfig) {
    if ENGINE_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Get a reference to the global engine configuration.
///
/// Falls back to (and pins) the built-in defaults when `init()` was never
/// called.
pub fn get() -> &'static EngineConfig {
    ENGINE_CONFIG.get_or_init(EngineConfig::default)
}

/// Check whether the config has been initialized.
pub fn is_initialized() -> bool {
    ENGINE_CONFIG.get().is_some()
}
