//! Checks run on a config document beyond what serde enforces.
//!
//! `validate_unknown_keys` reads the raw document as a `toml::Value` before
//! it is deserialized and reports every dotted key the engine does not
//! read, with the nearest valid key as a hint. Serde silently drops such
//! keys, so a misspelt threshold would otherwise fall back to its default
//! without notice. Unknown keys only warn.
//!
//! `validate_ranges` flags values that parse fine but make no sense for
//! 1 Hz field telemetry.

use std::collections::BTreeSet;
use std::fmt;

/// Largest edit distance at which a known key is offered as a hint.
const MAX_HINT_DISTANCE: usize = 3;

/// Non-fatal finding about a config document.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// Dotted key the finding refers to
    pub field: String,
    pub message: String,
    /// Closest valid key, for unknown-key findings
    pub suggestion: Option<String>,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.suggestion {
            Some(hint) => write!(f, "{} (did you mean '{hint}'?)", self.message),
            None => f.write_str(&self.message),
        }
    }
}

// ============================================================================
// Key Inventory
// ============================================================================

/// Every dotted key an `EngineConfig` document may contain.
///
/// Derived from the serialized defaults, so a new config field is known
/// as soon as it exists on the struct.
pub fn known_config_keys() -> BTreeSet<String> {
    toml::Value::try_from(super::EngineConfig::default())
        .map(|doc| dotted_key_paths(&doc).into_iter().collect())
        .unwrap_or_default()
}

/// Dotted paths of every key in a TOML document, tables included.
/// `[side_tables.washing] codes = []` yields `side_tables`,
/// `side_tables.washing` and `side_tables.washing.codes`.
pub fn dotted_key_paths(doc: &toml::Value) -> Vec<String> {
    let mut paths = Vec::new();
    let mut pending: Vec<(String, &toml::Value)> = vec![(String::new(), doc)];

    while let Some((parent, value)) = pending.pop() {
        let Some(table) = value.as_table() else {
            continue;
        };
        for (name, child) in table {
            let path = if parent.is_empty() {
                name.clone()
            } else {
                format!("{parent}.{name}")
            };
            if child.is_table() {
                pending.push((path.clone(), child));
            }
            paths.push(path);
        }
    }
    paths
}

// ============================================================================
// Hints
// ============================================================================

/// Character-level edit distance (insert, delete, substitute).
fn edit_distance(from: &str, to: &str) -> usize {
    let target: Vec<char> = to.chars().collect();
    // row[j] = distance between the prefix of `from` seen so far and target[..j]
    let mut row: Vec<usize> = (0..=target.len()).collect();

    for (i, source_char) in from.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, target_char) in target.iter().enumerate() {
            let above = row[j + 1];
            let substitute = diagonal + usize::from(source_char != *target_char);
            row[j + 1] = substitute.min(above + 1).min(row[j] + 1);
            diagonal = above;
        }
    }
    row[target.len()]
}

/// Nearest known key within `MAX_HINT_DISTANCE` edits. On equal distance
/// the alphabetically first key wins.
pub fn suggest_correction(unknown: &str, known: &BTreeSet<String>) -> Option<String> {
    let mut best: Option<(usize, &String)> = None;
    for candidate in known {
        let distance = edit_distance(unknown, candidate);
        if distance > MAX_HINT_DISTANCE {
            continue;
        }
        if best.map_or(true, |(d, _)| distance < d) {
            best = Some((distance, candidate));
        }
    }
    best.map(|(_, key)| key.clone())
}

// ============================================================================
// Unknown Keys
// ============================================================================

/// Warnings for keys in `raw_toml` that no config field reads.
///
/// A document that does not parse yields nothing here; the serde pass
/// reports it as a `ConfigError::Parse`.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(doc) = raw_toml.parse::<toml::Value>() else {
        return Vec::new();
    };
    let known = known_config_keys();

    let mut warnings = Vec::new();
    for key in dotted_key_paths(&doc) {
        if known.contains(&key) {
            continue;
        }
        warnings.push(ValidationWarning {
            message: format!("Unknown config key '{key}'"),
            suggestion: suggest_correction(&key, &known),
            field: key,
        });
    }
    warnings
}

// ============================================================================
// Range Validation
// ============================================================================

/// Plausibility checks on a parsed EngineConfig.
///
/// Returns (errors, warnings). Errors are values that can only produce
/// garbage reports; warnings are suspicious but not fatal.
pub fn validate_ranges(config: &super::EngineConfig) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // One sample gap can never exceed a full day of a daily extract
    let threshold = config.intervals.outlier_threshold_hours;
    if threshold.is_finite() && threshold > 24.0 {
        errors.push(format!(
            "intervals.outlier_threshold_hours = {threshold:.2} exceeds 24 h; gap suppression would never apply"
        ));
    } else if threshold.is_finite() && threshold > 2.0 {
        warnings.push(ValidationWarning {
            field: "intervals.outlier_threshold_hours".to_string(),
            message: format!(
                "outlier_threshold_hours = {threshold:.2} is outside typical range (0.05-2 h) for 1 Hz telemetry"
            ),
            suggestion: None,
        });
    }

    // Field machines rarely creep faster than walking pace while "stopped"
    let speed = config.classifier.idle_speed_max_kmh;
    if speed.is_finite() && speed > 5.0 {
        warnings.push(ValidationWarning {
            field: "classifier.idle_speed_max_kmh".to_string(),
            message: format!("idle_speed_max_kmh = {speed:.1} is outside typical range (0-5 km/h)"),
            suggestion: None,
        });
    }

    // A keyword in both lists makes the productive rule unreachable for it
    let c = &config.classifier;
    for keyword in &c.stopped_keywords {
        if c.productive_keywords
            .iter()
            .any(|p| p.eq_ignore_ascii_case(keyword))
        {
            warnings.push(ValidationWarning {
                field: "classifier.productive_keywords".to_string(),
                message: format!("keyword '{keyword}' is listed as both stopped and productive"),
                suggestion: None,
            });
        }
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================
