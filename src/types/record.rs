//! Telemetry record types: raw samples as delivered by the extractor and
//! their normalized form.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ============================================================================
// Raw Field Encodings
// ============================================================================

/// A boolean-ish field as it arrives from the source extract.
///
/// Different telemetry exports encode the same flag as native booleans,
/// integers, floats or free text (`"LIGADO"`, `"S"`, `"1"`...). The
/// normalizer maps every variant onto a canonical `bool`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum RawFlag {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    #[default]
    Missing,
}

impl From<bool> for RawFlag {
    fn from(value: bool) -> Self {
        RawFlag::Bool(value)
    }
}

impl From<i64> for RawFlag {
    fn from(value: i64) -> Self {
        RawFlag::Int(value)
    }
}

impl From<&str> for RawFlag {
    fn from(value: &str) -> Self {
        RawFlag::Text(value.to_string())
    }
}

/// A numeric field that may arrive as text (e.g. `"12,5"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum RawNumber {
    Float(f64),
    Text(String),
    #[default]
    Missing,
}

impl From<f64> for RawNumber {
    fn from(value: f64) -> Self {
        RawNumber::Float(value)
    }
}

impl From<&str> for RawNumber {
    fn from(value: &str) -> Self {
        RawNumber::Text(value.to_string())
    }
}

// ============================================================================
// Raw Record
// ============================================================================

/// One telemetry sample before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Fleet code of the machine
    pub machine_id: u32,
    /// Date + time as text, second resolution
    pub timestamp: String,
    /// Operating state label, e.g. "PARADA", "PRODUTIVA", "MANUTENÇÃO"
    pub operational_state: String,
    pub engine_on: RawFlag,
    /// Ground speed in km/h
    pub speed: RawNumber,
    /// Operation code with description, e.g. "8040 - MANUTENCAO CORRETIVA"
    pub operation_code: String,
    /// Elevator-head engaged flag (harvesters only)
    #[serde(default)]
    pub elevator: RawFlag,
}

impl RawRecord {
    /// Convenience constructor used by adapters and tests.
    pub fn new(
        machine_id: u32,
        timestamp: impl Into<String>,
        operational_state: impl Into<String>,
        engine_on: impl Into<RawFlag>,
        speed: impl Into<RawNumber>,
        operation_code: impl Into<String>,
    ) -> Self {
        Self {
            machine_id,
            timestamp: timestamp.into(),
            operational_state: operational_state.into(),
            engine_on: engine_on.into(),
            speed: speed.into(),
            operation_code: operation_code.into(),
            elevator: RawFlag::Missing,
        }
    }

    #[must_use]
    pub fn with_elevator(mut self, elevator: impl Into<RawFlag>) -> Self {
        self.elevator = elevator.into();
        self
    }
}

// ============================================================================
// Normalized Record
// ============================================================================

/// A telemetry sample in canonical form. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub machine_id: u32,
    /// `None` when the source timestamp could not be parsed
    pub timestamp: Option<NaiveDateTime>,
    /// Trimmed, upper-cased state label
    pub operational_state: String,
    pub engine_on: bool,
    /// Always finite and >= 0
    pub speed_kmh: f64,
    pub operation_code: String,
    pub elevator_on: bool,
}
