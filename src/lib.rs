//! harvest-ops: Fleet Telemetry Segmentation and Aggregation
//!
//! Turns raw machine telemetry (engine state, speed, operation code) from an
//! agricultural harvest fleet into classified time intervals, per-machine
//! operating-time aggregates, and per-machine panels for reporting.
//!
//! ## Pipeline
//!
//! ```text
//! RawRecord ──► normalizer ──► intervals (+ classifier) ──► aggregator ──┐
//!                                   │                                    ├──► panel
//!                                   └──► side_tables (washing, rollers,  │
//!                                        offenders) + production ────────┘
//! ```
//!
//! - **Normalizer**: canonical booleans, timestamps and speeds
//! - **Interval Builder**: time-sorted, clamped, outlier-suppressed deltas
//! - **Classifier**: category of each interval from its closing record
//! - **Aggregator**: per-machine totals, ratios and consistency warnings
//! - **Panel Composer**: aggregate + side tables, every section always present

pub mod config;
pub mod types;
pub mod normalizer;
pub mod classifier;
pub mod intervals;
pub mod aggregator;
pub mod side_tables;
pub mod panel;
pub mod ingest;

// Re-export engine configuration
pub use config::EngineConfig;

// Re-export commonly used types
pub use types::{
    AggregateWarning, Category, CodeOrLabel, FleetSummary, Interval, MachineAggregate,
    OffenderRow, Panel, ProductionRow, RawFlag, RawNumber, RawRecord, SideTableRow, SideTables,
    TelemetryRecord,
};

// Re-export pipeline stages
pub use aggregator::{FleetProcessor, FleetRun};
pub use classifier::StateClassifier;
pub use intervals::IntervalBuilder;
pub use panel::{PanelComposer, PanelScope};
pub use side_tables::SideTableExtractor;
