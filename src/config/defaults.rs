//! System-wide default constants.
//!
//! Every value here is the built-in default of a field in `EngineConfig`;
//! a `harvest_ops.toml` file may override any of them.

// ============================================================================
// Config Loading
// ============================================================================

/// Environment variable pointing at a TOML config file.
pub const CONFIG_ENV_VAR: &str = "HARVEST_OPS_CONFIG";

/// Config file looked up in the current working directory.
pub const LOCAL_CONFIG_FILE: &str = "harvest_ops.toml";

// ============================================================================
// Interval Builder
// ============================================================================

/// Deltas above this many hours are a data-collection break, not elapsed
/// operating time.
pub const OUTLIER_THRESHOLD_HOURS: f64 = 0.50;

// ============================================================================
// State Classifier
// ============================================================================

/// Maximum speed (km/h) at which a running machine counts as stopped.
pub const IDLE_SPEED_MAX_KMH: f64 = 0.0;

/// State labels containing any of these are maintenance downtime.
pub const MAINTENANCE_KEYWORDS: &[&str] = &["MANUTEN"];

/// State labels containing any of these are a stopped/available condition.
pub const STOPPED_KEYWORDS: &[&str] = &[
    "PARADA",
    "PARADO",
    "DISPONIVEL",
    "DISPONÍVEL",
    "OCIOSO",
    "OCIOSA",
];

/// State labels containing any of these are productive operation.
pub const PRODUCTIVE_KEYWORDS: &[&str] = &[
    "PRODUTIV",
    "TRABALHANDO",
    "OPERANDO",
    "EFETIVO",
    "EFETIVA",
];

// ============================================================================
// Side Tables
// ============================================================================

/// Operation descriptions containing these are washing stops.
pub const WASHING_KEYWORDS: &[&str] = &["LAVAGEM"];

/// Operation descriptions containing these are roller-cleaning stops.
pub const ROLLER_KEYWORDS: &[&str] = &["ROLETE", "LIMPEZA DE ROLO", "LIMPEZA ROLO"];

/// Number of entries kept in the offender ranking.
pub const OFFENDER_TOP_N: usize = 5;

// ============================================================================
// Diagnostics
// ============================================================================

/// Slack (hours) allowed before idle > engine-on is reported. Absorbs
/// floating-point summation noise.
pub const IDLE_TOLERANCE_HOURS: f64 = 1e-6;
