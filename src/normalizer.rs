//! Record Normalizer
//!
//! Canonicalizes the heterogeneous encodings found in telemetry exports
//! into the fixed internal vocabulary of `TelemetryRecord`.
//!
//! Every function here is total: malformed input maps to a safe default
//! (flag off, timestamp unknown, speed zero) instead of an error, so one
//! bad sample never aborts a whole-dataset report.

use crate::types::{RawFlag, RawNumber, RawRecord, TelemetryRecord};
use chrono::NaiveDateTime;
use tracing::debug;

// ============================================================================
// Flag Table
// ============================================================================

/// Text encodings that mean "on". Compared after trim + upper-case.
const TRUE_TOKENS: &[&str] = &["1", "SIM", "S", "VERDADEIRO", "TRUE", "LIGADO"];

/// Text encodings that mean "off".
const FALSE_TOKENS: &[&str] = &["0", "NAO", "NÃO", "N", "FALSO", "FALSE", "DESLIGADO"];

/// Map a raw flag onto a canonical boolean.
///
/// Native booleans are matched before any numeric or textual coercion.
/// Numeric text missing from the token table follows the float rule.
/// Unrecognized values fail closed to `false`: an ambiguous reading must
/// never count as "engine on".
#[allow(clippy::float_cmp)]
pub fn normalize_flag(raw: &RawFlag) -> bool {
    match raw {
        RawFlag::Bool(b) => *b,
        RawFlag::Int(i) => *i == 1,
        RawFlag::Float(f) => *f == 1.0,
        RawFlag::Text(s) => {
            let token = s.trim().to_uppercase();
            if TRUE_TOKENS.contains(&token.as_str()) {
                true
            } else if FALSE_TOKENS.contains(&token.as_str()) {
                false
            } else if let Ok(value) = token.replace(',', ".").parse::<f64>() {
                // Spreadsheet exports write numeric flags as "1.0" / "1,0"
                value == 1.0
            } else {
                debug!(value = %s, "Unrecognized flag encoding, treating as off");
                false
            }
        }
        RawFlag::Missing => false,
    }
}

// ============================================================================
// Timestamps
// ============================================================================

/// Layouts seen in the telemetry exports, tried in order.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M",
];

/// Parse a date+time string. Returns `None` for anything unparseable.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let parsed = TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok());
    if parsed.is_none() {
        debug!(value = %s, "Unparseable timestamp");
    }
    parsed
}

// ============================================================================
// Speed
// ============================================================================

/// Parse a speed in km/h. Accepts `,` or `.` as decimal separator.
///
/// Negative, non-finite and unparseable values become `0.0`.
pub fn parse_speed(raw: &RawNumber) -> f64 {
    let value = match raw {
        RawNumber::Float(f) => *f,
        RawNumber::Text(s) => s.trim().replace(',', ".").parse::<f64>().unwrap_or_else(|_| {
            if !s.trim().is_empty() {
                debug!(value = %s, "Unparseable speed, using 0");
            }
            0.0
        }),
        RawNumber::Missing => 0.0,
    };
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

// ============================================================================
// Record
// ============================================================================

/// Normalize one raw sample.
pub fn normalize_record(raw: RawRecord) -> TelemetryRecord {
    TelemetryRecord {
        machine_id: raw.machine_id,
        timestamp: parse_timestamp(&raw.timestamp),
        operational_state: raw.operational_state.trim().to_uppercase(),
        engine_on: normalize_flag(&raw.engine_on),
        speed_kmh: parse_speed(&raw.speed),
        operation_code: raw.operation_code.trim().to_string(),
        elevator_on: normalize_flag(&raw.elevator),
    }
}

/// Normalize a batch of raw samples, preserving input order.
pub fn normalize_all(raw: Vec<RawRecord>) -> Vec<TelemetryRecord> {
    raw.into_iter().map(normalize_record).collect()
}
