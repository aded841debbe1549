//! Shared data structures for the fleet telemetry engine
//!
//! This module defines the core types flowing through the pipeline:
//! - Stage 1: RawRecord -> TelemetryRecord (normalizer)
//! - Stage 2-3: Interval with its Category (interval builder + classifier)
//! - Stage 4: MachineAggregate, FleetSummary (aggregator)
//! - Stage 5: SideTables -> Panel (panel composer)

mod record;
mod interval;
mod aggregate;
mod panel;

pub use record::*;
pub use interval::*;
pub use aggregate::*;
pub use panel::*;
