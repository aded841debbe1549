//! Per-Machine Aggregator
//!
//! Sums classified interval durations per machine and derives the
//! operational ratios. Also drives a whole fleet run:
//!
//! ```text
//! RawRecord[] -> normalize -> group by machine -> (par) build + aggregate -> FleetRun
//! ```
//!
//! Machines share no mutable state, so the per-machine stage fans out over
//! `rayon`. Results are keyed by machine id, which makes the output
//! independent of scheduling order.

use crate::config::{DiagnosticsConfig, EngineConfig};
use crate::intervals::{group_by_machine, IntervalBuilder};
use crate::normalizer::normalize_all;
use crate::types::{
    ratio, AggregateWarning, Category, FleetSummary, Interval, MachineAggregate, RawRecord,
    TelemetryRecord,
};
use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{info, warn};

// ============================================================================
// Machine Aggregate
// ============================================================================

/// Build the aggregate of one machine from its full interval set.
///
/// Ratios use guarded division and are fractions in [0, 1]. An
/// idle > engine-on inconsistency is attached as a warning; the aggregate
/// is still returned as computed.
pub fn aggregate_machine(
    machine_id: u32,
    intervals: &[Interval],
    diagnostics: &DiagnosticsConfig,
) -> MachineAggregate {
    let mut agg = MachineAggregate::empty(machine_id);

    for interval in intervals {
        let hours = interval.duration_hours;
        *agg.hours_by_category.entry(interval.category).or_insert(0.0) += hours;
        agg.total_hours += hours;
        if interval.engine_on {
            agg.engine_on_hours += hours;
        }
        if interval.category == Category::Productive && interval.elevator_on {
            agg.elevator_hours += hours;
        }
        if interval.gap_suppressed {
            agg.suppressed_gaps += 1;
        }
    }
    agg.interval_count = intervals.len();

    let productive = agg.hours(Category::Productive);
    let maintenance = agg.hours(Category::Maintenance);
    let operable = (agg.total_hours - maintenance).max(0.0);

    agg.idle_engine_hours = agg.hours(Category::IdleEngine);
    agg.idle_ratio = ratio(agg.idle_engine_hours, agg.engine_on_hours);
    agg.availability = ratio(operable, agg.total_hours);
    agg.utilization = ratio(productive, operable);
    agg.elevator_efficiency = ratio(agg.elevator_hours, productive);

    if agg.idle_engine_hours > agg.engine_on_hours + diagnostics.idle_tolerance_hours {
        let warning = AggregateWarning::IdleExceedsEngineOn {
            idle_engine_hours: agg.idle_engine_hours,
            engine_on_hours: agg.engine_on_hours,
        };
        warn!(machine_id, "{}", warning);
        agg.warnings.push(warning);
    }

    agg
}

/// Keep only intervals that start on `date`. Intervals with an unknown
/// start carry zero duration and are dropped.
pub fn intervals_on(intervals: &[Interval], date: NaiveDate) -> Vec<Interval> {
    intervals
        .iter()
        .filter(|i| i.start_time.map(|t| t.date()) == Some(date))
        .cloned()
        .collect()
}

// ============================================================================
// Fleet Summary
// ============================================================================

/// Roll machine aggregates up into fleet totals. Ratios are recomputed
/// from the summed hours.
pub fn summarize_fleet<'a, I>(aggregates: I) -> FleetSummary
where
    I: IntoIterator<Item = &'a MachineAggregate>,
{
    let mut hours_by_category: BTreeMap<Category, f64> =
        Category::ALL.iter().map(|c| (*c, 0.0)).collect();
    let mut machine_count = 0;
    let mut total_hours = 0.0;
    let mut engine_on_hours = 0.0;
    let mut idle_engine_hours = 0.0;
    let mut machines_with_warnings = Vec::new();

    for agg in aggregates {
        machine_count += 1;
        total_hours += agg.total_hours;
        engine_on_hours += agg.engine_on_hours;
        idle_engine_hours += agg.idle_engine_hours;
        for (category, hours) in &agg.hours_by_category {
            *hours_by_category.entry(*category).or_insert(0.0) += hours;
        }
        if agg.has_warnings() {
            machines_with_warnings.push(agg.machine_id);
        }
    }

    let productive = hours_by_category.get(&Category::Productive).copied().unwrap_or(0.0);
    let maintenance = hours_by_category.get(&Category::Maintenance).copied().unwrap_or(0.0);
    let operable = (total_hours - maintenance).max(0.0);

    FleetSummary {
        machine_count,
        total_hours,
        hours_by_category,
        engine_on_hours,
        idle_engine_hours,
        idle_ratio: ratio(idle_engine_hours, engine_on_hours),
        availability: ratio(operable, total_hours),
        utilization: ratio(productive, operable),
        machines_with_warnings,
    }
}

// ============================================================================
// Fleet Run
// ============================================================================

/// Everything computed from one dataset.
#[derive(Debug, Clone)]
pub struct FleetRun {
    /// Normalized records, in input order
    pub records: Vec<TelemetryRecord>,
    pub intervals: BTreeMap<u32, Vec<Interval>>,
    pub aggregates: BTreeMap<u32, MachineAggregate>,
    pub summary: FleetSummary,
}

impl FleetRun {
    /// Aggregate of one machine, optionally restricted to one day.
    ///
    /// Returns a zeroed aggregate for unknown machines.
    pub fn aggregate_for(
        &self,
        machine_id: u32,
        date: Option<NaiveDate>,
        diagnostics: &DiagnosticsConfig,
    ) -> MachineAggregate {
        match (self.intervals.get(&machine_id), date) {
            (None, _) => MachineAggregate::empty(machine_id),
            (Some(_), None) => self
                .aggregates
                .get(&machine_id)
                .cloned()
                .unwrap_or_else(|| MachineAggregate::empty(machine_id)),
            (Some(intervals), Some(day)) => {
                aggregate_machine(machine_id, &intervals_on(intervals, day), diagnostics)
            }
        }
    }

    /// All intervals of the run, ordered by machine id then time.
    pub fn all_intervals(&self) -> impl Iterator<Item = &Interval> {
        self.intervals.values().flatten()
    }
}

/// Runs normalization, interval building and aggregation over a dataset.
#[derive(Debug, Clone)]
pub struct FleetProcessor {
    builder: IntervalBuilder,
    diagnostics: DiagnosticsConfig,
}

impl FleetProcessor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            builder: IntervalBuilder::from_config(config),
            diagnostics: config.diagnostics.clone(),
        }
    }

    /// Processor wired from the process-wide configuration.
    pub fn from_global() -> Self {
        Self::new(crate::config::get())
    }

    pub fn builder(&self) -> &IntervalBuilder {
        &self.builder
    }

    pub fn diagnostics(&self) -> &DiagnosticsConfig {
        &self.diagnostics
    }

    /// Process a complete dataset. Record order is irrelevant.
    pub fn run(&self, raw: Vec<RawRecord>) -> FleetRun {
        let records = normalize_all(raw);
        self.run_normalized(records)
    }

    /// Process records that are already normalized.
    pub fn run_normalized(&self, records: Vec<TelemetryRecord>) -> FleetRun {
        let groups = group_by_machine(&records);

        let per_machine: Vec<(u32, Vec<Interval>, MachineAggregate)> = groups
            .into_par_iter()
            .map(|(machine_id, machine_records)| {
                let intervals = self.builder.build(&machine_records);
                let agg = aggregate_machine(machine_id, &intervals, &self.diagnostics);
                (machine_id, intervals, agg)
            })
            .collect();

        let mut intervals = BTreeMap::new();
        let mut aggregates = BTreeMap::new();
        for (machine_id, machine_intervals, agg) in per_machine {
            intervals.insert(machine_id, machine_intervals);
            aggregates.insert(machine_id, agg);
        }

        let summary = summarize_fleet(aggregates.values());
        info!(
            records = records.len(),
            machines = summary.machine_count,
            total_hours = summary.total_hours,
            idle_ratio = summary.idle_ratio,
            "Fleet run complete"
        );

        FleetRun {
            records,
            intervals,
            aggregates,
            summary,
        }
    }
}

impl Default for FleetProcessor {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(category: Category, hours: f64, engine_on: bool) -> Interval {
        Interval {
            machine_id: 7034,
            start_time: crate::normalizer::parse_timestamp("2024-05-10 08:00:00"),
            duration_hours: hours,
            category,
            operation_code: "8010".to_string(),
            engine_on,
            elevator_on: false,
            gap_suppressed: false,
        }
    }

    #[test]
    fn test_category_totals_partition_total() {
        let intervals = vec![
            interval(Category::Productive, 0.25, true),
            interval(Category::IdleEngine, 0.10, true),
            interval(Category::Maintenance, 0.20, false),
            interval(Category::Available, 0.05, false),
            interval(Category::Productive, 0.15, true),
        ];
        let agg = aggregate_machine(7034, &intervals, &DiagnosticsConfig::default());
        let sum: f64 = agg.hours_by_category.values().sum();
        assert!((sum - agg.total_hours).abs() < 1e-9);
        assert!((agg.hours(Category::Productive) - 0.40).abs() < 1e-9);
        assert_eq!(agg.interval_count, 5);
    }

    #[test]
    fn test_ratios() {
        let intervals = vec![
            interval(Category::Productive, 0.3, true),
            interval(Category::IdleEngine, 0.1, true),
            interval(Category::Maintenance, 0.1, false),
        ];
        let agg = aggregate_machine(7034, &intervals, &DiagnosticsConfig::default());
        assert!((agg.engine_on_hours - 0.4).abs() < 1e-9);
        assert!((agg.idle_ratio - 0.25).abs() < 1e-9);
        assert!((agg.availability - 0.8).abs() < 1e-9);
        assert!((agg.utilization - 0.75).abs() < 1e-9);
        assert!(agg.warnings.is_empty());
    }

    #[test]
    fn test_no_engine_time_gives_zero_ratio() {
        let agg = aggregate_machine(7034, &[], &DiagnosticsConfig::default());
        assert_eq!(agg.idle_ratio, 0.0);
        assert_eq!(agg.availability, 0.0);
        assert_eq!(agg.utilization, 0.0);
        assert_eq!(agg.elevator_efficiency, 0.0);
        assert!(!agg.idle_ratio.is_nan());
    }

    #[test]
    fn test_all_maintenance_has_zero_utilization() {
        let intervals = vec![interval(Category::Maintenance, 0.4, true)];
        let agg = aggregate_machine(7034, &intervals, &DiagnosticsConfig::default());
        assert_eq!(agg.availability, 0.0);
        assert_eq!(agg.utilization, 0.0);
    }

    #[test]
    fn test_idle_exceeding_engine_on_is_warning_not_error() {
        // Idle interval with engine off can only come from a defective upstream
        let intervals = vec![interval(Category::IdleEngine, 0.2, false)];
        let agg = aggregate_machine(7034, &intervals, &DiagnosticsConfig::default());
        assert_eq!(agg.warnings.len(), 1);
        assert!(matches!(
            agg.warnings[0],
            AggregateWarning::IdleExceedsEngineOn { .. }
        ));
        // Not silently corrected
        assert!((agg.idle_engine_hours - 0.2).abs() < 1e-9);
        assert_eq!(agg.idle_ratio, 0.0);
    }

    #[test]
    fn test_elevator_efficiency() {
        let mut engaged = interval(Category::Productive, 0.3, true);
        engaged.elevator_on = true;
        let intervals = vec![engaged, interval(Category::Productive, 0.1, true)];
        let agg = aggregate_machine(7034, &intervals, &DiagnosticsConfig::default());
        assert!((agg.elevator_hours - 0.3).abs() < 1e-9);
        assert!((agg.elevator_efficiency - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_suppressed_gaps_counted() {
        let mut gap = interval(Category::Productive, 0.0, true);
        gap.gap_suppressed = true;
        let agg = aggregate_machine(7034, &[gap], &DiagnosticsConfig::default());
        assert_eq!(agg.suppressed_gaps, 1);
        assert_eq!(agg.total_hours, 0.0);
    }

    #[test]
    fn test_summarize_fleet_recomputes_ratios() {
        let a = aggregate_machine(
            1,
            &[interval(Category::IdleEngine, 0.1, true), interval(Category::Productive, 0.1, true)],
            &DiagnosticsConfig::default(),
        );
        let b = aggregate_machine(
            2,
            &[interval(Category::Productive, 0.3, true)],
            &DiagnosticsConfig::default(),
        );
        let summary = summarize_fleet([&a, &b]);
        assert_eq!(summary.machine_count, 2);
        assert!((summary.engine_on_hours - 0.5).abs() < 1e-9);
        assert!((summary.idle_ratio - 0.2).abs() < 1e-9);
        assert!(summary.machines_with_warnings.is_empty());
    }

    #[test]
    fn test_summarize_empty_fleet() {
        let summary = summarize_fleet(std::iter::empty());
        assert_eq!(summary.machine_count, 0);
        assert_eq!(summary.idle_ratio, 0.0);
        assert_eq!(summary.hours_by_category.len(), Category::ALL.len());
    }

    #[test]
    fn test_intervals_on_filters_by_start_date() {
        let mut other_day = interval(Category::Productive, 0.1, true);
        other_day.start_time = crate::normalizer::parse_timestamp("2024-05-11 00:00:05");
        let intervals = vec![interval(Category::Productive, 0.2, true), other_day];
        let day = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let filtered = intervals_on(&intervals, day);
        assert_eq!(filtered.len(), 1);
        assert!((filtered[0].duration_hours - 0.2).abs() < 1e-9);
    }
}
