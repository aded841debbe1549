//! Engine Configuration - classification keywords and thresholds as TOML values
//!
//! Each struct implements `Default` with the values from `defaults.rs`, so a
//! run without any config file behaves exactly like the built-in policy.

use super::defaults;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one processing run.
///
/// Load with `EngineConfig::load()` which searches:
/// 1. `$HARVEST_OPS_CONFIG` env var
/// 2. `./harvest_ops.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interval builder thresholds
    #[serde(default)]
    pub intervals: IntervalConfig,

    /// State classifier keyword lists
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Washing / roller-cleaning extraction rules
    #[serde(default)]
    pub side_tables: SideTableConfig,

    /// Offender ranking
    #[serde(default)]
    pub offenders: OffenderConfig,

    /// Consistency diagnostics
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

impl EngineConfig {
    /// Load configuration using the standard search order:
    /// 1. `$HARVEST_OPS_CONFIG` environment variable
    /// 2. `./harvest_ops.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded engine config from {}", defaults::CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", defaults::CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", defaults::CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(defaults::LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded engine config from ./{}", defaults::LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", defaults::LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No {} found, using built-in defaults", defaults::LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    ///
    /// Unknown keys are reported as warnings only; existing configs always
    /// keep working.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in &super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Override the offender ranking size, re-running validation.
    pub fn with_offender_top_n(mut self, top_n: usize) -> Result<Self, ConfigError> {
        self.offenders.top_n = top_n;
        self.validate()?;
        Ok(self)
    }

    /// Validate thresholds and keyword lists for internal consistency.
    ///
    /// Rules:
    /// - The outlier threshold must be a positive finite number of hours
    /// - Keyword lists used by the classifier must be non-empty, with no blank entries
    /// - Each side-table matcher needs at least one code or keyword
    /// - The offender ranking keeps at least one entry
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let threshold = self.intervals.outlier_threshold_hours;
        if !threshold.is_finite() || threshold <= 0.0 {
            errors.push(format!(
                "intervals.outlier_threshold_hours = {threshold} must be a finite value > 0"
            ));
        }

        let c = &self.classifier;
        if !c.idle_speed_max_kmh.is_finite() || c.idle_speed_max_kmh < 0.0 {
            errors.push(format!(
                "classifier.idle_speed_max_kmh = {} must be a finite value >= 0",
                c.idle_speed_max_kmh
            ));
        }
        Self::check_keywords(&c.maintenance_keywords, "classifier.maintenance_keywords", &mut errors);
        Self::check_keywords(&c.stopped_keywords, "classifier.stopped_keywords", &mut errors);
        Self::check_keywords(&c.productive_keywords, "classifier.productive_keywords", &mut errors);

        Self::check_matcher(&self.side_tables.washing, "side_tables.washing", &mut errors);
        Self::check_matcher(&self.side_tables.rollers, "side_tables.rollers", &mut errors);

        if self.offenders.top_n == 0 {
            errors.push("offenders.top_n must be > 0".to_string());
        }

        let tol = self.diagnostics.idle_tolerance_hours;
        if !tol.is_finite() || tol < 0.0 {
            errors.push(format!(
                "diagnostics.idle_tolerance_hours = {tol} must be a finite value >= 0"
            ));
        }

        let (range_errors, range_warnings) = super::validation::validate_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_keywords(keywords: &[String], name: &str, errors: &mut Vec<String>) {
        if keywords.is_empty() {
            errors.push(format!("{name} must contain at least one keyword"));
        }
        // A blank keyword is a substring of every label
        if keywords.iter().any(|k| k.trim().is_empty()) {
            errors.push(format!("{name} must not contain blank keywords"));
        }
    }

    fn check_matcher(matcher: &OperationMatchConfig, name: &str, errors: &mut Vec<String>) {
        if matcher.codes.is_empty() && matcher.keywords.is_empty() {
            errors.push(format!("{name} needs at least one code or keyword"));
        }
        if matcher.keywords.iter().any(|k| k.trim().is_empty()) {
            errors.push(format!("{name}.keywords must not contain blank keywords"));
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Interval Builder
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalConfig {
    /// Deltas above this (hours) are zeroed as data gaps
    #[serde(default = "default_outlier_threshold")]
    pub outlier_threshold_hours: f64,
}

fn default_outlier_threshold() -> f64 { defaults::OUTLIER_THRESHOLD_HOURS }

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            outlier_threshold_hours: default_outlier_threshold(),
        }
    }
}

// ============================================================================
// State Classifier
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_maintenance_keywords")]
    pub maintenance_keywords: Vec<String>,

    #[serde(default = "default_stopped_keywords")]
    pub stopped_keywords: Vec<String>,

    #[serde(default = "default_productive_keywords")]
    pub productive_keywords: Vec<String>,

    /// Speeds at or below this count as stopped
    #[serde(default = "default_idle_speed_max")]
    pub idle_speed_max_kmh: f64,
}

fn owned(keywords: &[&str]) -> Vec<String> {
    keywords.iter().map(|k| (*k).to_string()).collect()
}

fn default_maintenance_keywords() -> Vec<String> { owned(defaults::MAINTENANCE_KEYWORDS) }
fn default_stopped_keywords() -> Vec<String> { owned(defaults::STOPPED_KEYWORDS) }
fn default_productive_keywords() -> Vec<String> { owned(defaults::PRODUCTIVE_KEYWORDS) }
fn default_idle_speed_max() -> f64 { defaults::IDLE_SPEED_MAX_KMH }

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            maintenance_keywords: default_maintenance_keywords(),
            stopped_keywords: default_stopped_keywords(),
            productive_keywords: default_productive_keywords(),
            idle_speed_max_kmh: default_idle_speed_max(),
        }
    }
}

// ============================================================================
// Side Tables
// ============================================================================

/// Matches records whose operation code carries one of `codes` as its
/// numeric prefix, or whose description contains one of `keywords`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationMatchConfig {
    #[serde(default)]
    pub codes: Vec<i64>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideTableConfig {
    #[serde(default = "default_washing")]
    pub washing: OperationMatchConfig,

    #[serde(default = "default_rollers")]
    pub rollers: OperationMatchConfig,
}

fn default_washing() -> OperationMatchConfig {
    OperationMatchConfig {
        codes: Vec::new(),
        keywords: owned(defaults::WASHING_KEYWORDS),
    }
}

fn default_rollers() -> OperationMatchConfig {
    OperationMatchConfig {
        codes: Vec::new(),
        keywords: owned(defaults::ROLLER_KEYWORDS),
    }
}

impl Default for SideTableConfig {
    fn default() -> Self {
        Self {
            washing: default_washing(),
            rollers: default_rollers(),
        }
    }
}

// ============================================================================
// Offenders
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffenderConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_top_n() -> usize { defaults::OFFENDER_TOP_N }

impl Default for OffenderConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
        }
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    #[serde(default = "default_idle_tolerance")]
    pub idle_tolerance_hours: f64,
}

fn default_idle_tolerance() -> f64 { defaults::IDLE_TOLERANCE_HOURS }

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            idle_tolerance_hours: default_idle_tolerance(),
        }
    }
}
