//! Per-machine and per-fleet aggregate types

use super::Category;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Guarded division: a zero (or non-finite) denominator yields exactly 0.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 && denominator.is_finite() && numerator.is_finite() {
        numerator / denominator
    } else {
        0.0
    }
}

/// Diagnostic attached to an aggregate. Never fatal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AggregateWarning {
    /// Idle-engine time exceeds engine-on time, which points at an
    /// upstream classification defect.
    IdleExceedsEngineOn {
        idle_engine_hours: f64,
        engine_on_hours: f64,
    },
}

impl std::fmt::Display for AggregateWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregateWarning::IdleExceedsEngineOn {
                idle_engine_hours,
                engine_on_hours,
            } => write!(
                f,
                "idle-engine hours ({idle_engine_hours:.3}) exceed engine-on hours ({engine_on_hours:.3})"
            ),
        }
    }
}

/// Summary of one machine over one processed dataset.
///
/// Built once from the full interval set of the machine; never partially
/// updated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineAggregate {
    pub machine_id: u32,
    pub interval_count: usize,
    /// Intervals whose delta was zeroed as a data gap
    pub suppressed_gaps: usize,
    pub total_hours: f64,
    /// Every category is present, zero when unused
    pub hours_by_category: BTreeMap<Category, f64>,
    pub engine_on_hours: f64,
    pub idle_engine_hours: f64,
    /// Productive hours with the elevator head engaged
    pub elevator_hours: f64,
    /// idle_engine_hours / engine_on_hours
    pub idle_ratio: f64,
    /// (total - maintenance) / total
    pub availability: f64,
    /// productive / (total - maintenance)
    pub utilization: f64,
    /// elevator_hours / productive
    pub elevator_efficiency: f64,
    #[serde(default)]
    pub warnings: Vec<AggregateWarning>,
}

impl MachineAggregate {
    /// A zeroed aggregate for a machine with no intervals.
    pub fn empty(machine_id: u32) -> Self {
        Self {
            machine_id,
            interval_count: 0,
            suppressed_gaps: 0,
            total_hours: 0.0,
            hours_by_category: Category::ALL.iter().map(|c| (*c, 0.0)).collect(),
            engine_on_hours: 0.0,
            idle_engine_hours: 0.0,
            elevator_hours: 0.0,
            idle_ratio: 0.0,
            availability: 0.0,
            utilization: 0.0,
            elevator_efficiency: 0.0,
            warnings: Vec::new(),
        }
    }

    /// Hours spent in `category` (0 when absent).
    pub fn hours(&self, category: Category) -> f64 {
        self.hours_by_category.get(&category).copied().unwrap_or(0.0)
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Roll-up of all machine aggregates of one run.
///
/// Fleet ratios are computed from summed hours, not averaged per machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetSummary {
    pub machine_count: usize,
    pub total_hours: f64,
    pub hours_by_category: BTreeMap<Category, f64>,
    pub engine_on_hours: f64,
    pub idle_engine_hours: f64,
    pub idle_ratio: f64,
    pub availability: f64,
    pub utilization: f64,
    /// Machines that carry at least one consistency warning
    pub machines_with_warnings: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_zero_denominator() {
        assert_eq!(ratio(0.0, 0.0), 0.0);
        assert_eq!(ratio(5.0, 0.0), 0.0);
        assert!(!ratio(0.0, 0.0).is_nan());
    }

    #[test]
    fn test_ratio_regular() {
        assert!((ratio(1.0, 4.0) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_ratio_non_finite_inputs() {
        assert_eq!(ratio(f64::NAN, 2.0), 0.0);
        assert_eq!(ratio(1.0, f64::INFINITY), 0.0);
    }

    #[test]
    fn test_empty_aggregate_has_every_category() {
        let agg = MachineAggregate::empty(7034);
        assert_eq!(agg.hours_by_category.len(), Category::ALL.len());
        assert_eq!(agg.hours(Category::IdleEngine), 0.0);
        assert!(!agg.has_warnings());
    }
}
