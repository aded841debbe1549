//! Interval Builder
//!
//! Turns the samples of one machine into a sequence of intervals, one per
//! consecutive pair of samples after sorting by time:
//!
//! ```text
//! records:    r0 ---- r1 ---- r2 ---- r3
//! intervals:     i0      i1      i2          (len = records - 1)
//! ```
//!
//! Each delta is clamped at zero (duplicate or out-of-order timestamps) and
//! zeroed when it exceeds the outlier threshold (collection break). A
//! zeroed interval is still emitted so record and interval counts stay
//! consistent. The later record of each pair decides the classification.

use crate::classifier::StateClassifier;
use crate::config::{EngineConfig, IntervalConfig};
use crate::types::{Interval, TelemetryRecord};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use tracing::debug;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Clamped and outlier-suppressed elapsed time between two samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub hours: f64,
    pub suppressed: bool,
}

/// Elapsed hours from `prev` to `next` after clamping and outlier
/// suppression. Unknown timestamps on either side yield a zero step.
pub fn step_hours(
    prev: Option<NaiveDateTime>,
    next: Option<NaiveDateTime>,
    outlier_threshold_hours: f64,
) -> Step {
    let (Some(prev), Some(next)) = (prev, next) else {
        return Step { hours: 0.0, suppressed: false };
    };

    #[allow(clippy::cast_precision_loss)]
    let raw = (next - prev).num_milliseconds() as f64 / MILLIS_PER_HOUR;
    let clamped = raw.max(0.0);

    if clamped > outlier_threshold_hours {
        Step { hours: 0.0, suppressed: true }
    } else {
        Step { hours: clamped, suppressed: false }
    }
}

/// Stable sort by timestamp; unknown timestamps sort first and ties keep
/// their original order.
pub fn sort_by_time(records: &[TelemetryRecord]) -> Vec<&TelemetryRecord> {
    let mut sorted: Vec<&TelemetryRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.timestamp);
    sorted
}

/// Group records by machine id, preserving relative order within a machine.
pub fn group_by_machine(records: &[TelemetryRecord]) -> BTreeMap<u32, Vec<TelemetryRecord>> {
    let mut groups: BTreeMap<u32, Vec<TelemetryRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.machine_id).or_default().push(record.clone());
    }
    groups
}

/// Builds classified intervals from normalized records.
#[derive(Debug, Clone)]
pub struct IntervalBuilder {
    config: IntervalConfig,
    classifier: StateClassifier,
}

impl IntervalBuilder {
    pub fn new(config: IntervalConfig, classifier: StateClassifier) -> Self {
        Self { config, classifier }
    }

    /// Builder wired from a full engine config.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.intervals.clone(), StateClassifier::new(&config.classifier))
    }

    pub fn outlier_threshold_hours(&self) -> f64 {
        self.config.outlier_threshold_hours
    }

    pub fn classifier(&self) -> &StateClassifier {
        &self.classifier
    }

    /// Build the intervals of a single machine. Input order is irrelevant.
    ///
    /// Zero or one record yields no intervals.
    pub fn build(&self, records: &[TelemetryRecord]) -> Vec<Interval> {
        let sorted = sort_by_time(records);
        let threshold = self.config.outlier_threshold_hours;

        let intervals: Vec<Interval> = sorted
            .windows(2)
            .map(|pair| {
                let (prev, next) = (pair[0], pair[1]);
                let step = step_hours(prev.timestamp, next.timestamp, threshold);
                Interval {
                    machine_id: next.machine_id,
                    start_time: prev.timestamp,
                    duration_hours: step.hours,
                    category: self.classifier.classify_record(next),
                    operation_code: next.operation_code.clone(),
                    engine_on: next.engine_on,
                    elevator_on: next.elevator_on,
                    gap_suppressed: step.suppressed,
                }
            })
            .collect();

        if let Some(first) = sorted.first() {
            let gaps = intervals.iter().filter(|i| i.gap_suppressed).count();
            debug!(
                machine_id = first.machine_id,
                records = sorted.len(),
                intervals = intervals.len(),
                suppressed_gaps = gaps,
                "Built intervals"
            );
        }

        intervals
    }

    /// Build intervals for a mixed-machine record set, one entry per machine.
    pub fn build_fleet(&self, records: &[TelemetryRecord]) -> BTreeMap<u32, Vec<Interval>> {
        group_by_machine(records)
            .into_iter()
            .map(|(machine_id, machine_records)| (machine_id, self.build(&machine_records)))
            .collect()
    }
}

impl Default for IntervalBuilder {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize_record;
    use crate::types::{Category, RawRecord};

    fn rec(machine: u32, ts: &str, state: &str, engine: bool, speed: f64) -> TelemetryRecord {
        normalize_record(RawRecord::new(machine, ts, state, engine, speed, "8010 - COLHEITA"))
    }

    fn wide_builder(threshold: f64) -> IntervalBuilder {
        IntervalBuilder::new(
            IntervalConfig { outlier_threshold_hours: threshold },
            StateClassifier::default(),
        )
    }

    #[test]
    fn test_idle_engine_interval_with_wide_threshold() {
        let records = vec![
            rec(7034, "2024-05-10 08:30:00", "PARADA", true, 0.0),
            rec(7034, "2024-05-10 09:15:00", "PARADA", true, 0.0),
        ];
        let intervals = wide_builder(1.0).build(&records);
        assert_eq!(intervals.len(), 1);
        assert!((intervals[0].duration_hours - 0.75).abs() < 1e-12);
        assert_eq!(intervals[0].category, Category::IdleEngine);
        assert_eq!(intervals[0].machine_id, 7034);
    }

    #[test]
    fn test_gap_above_default_threshold_is_zeroed() {
        let records = vec![
            rec(7034, "2024-05-10 08:00:00", "PRODUTIVA", true, 5.0),
            rec(7034, "2024-05-10 08:40:00", "PRODUTIVA", true, 5.0),
        ];
        let intervals = IntervalBuilder::default().build(&records);
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].duration_hours, 0.0);
        assert!(intervals[0].gap_suppressed);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let records = vec![
            rec(1, "2024-05-10 08:00:00", "PRODUTIVA", true, 5.0),
            rec(1, "2024-05-10 08:30:00", "PRODUTIVA", true, 5.0),
        ];
        let intervals = IntervalBuilder::default().build(&records);
        assert!((intervals[0].duration_hours - 0.5).abs() < 1e-12);
        assert!(!intervals[0].gap_suppressed);
    }

    #[test]
    fn test_single_record_yields_nothing() {
        let records = vec![rec(1, "2024-05-10 08:00:00", "PARADA", true, 0.0)];
        assert!(IntervalBuilder::default().build(&records).is_empty());
        assert!(IntervalBuilder::default().build(&[]).is_empty());
    }

    #[test]
    fn test_identical_timestamps_zero_duration() {
        let records = vec![
            rec(1, "2024-05-10 08:00:00", "PARADA", true, 0.0),
            rec(1, "2024-05-10 08:00:00", "PARADA", true, 0.0),
        ];
        let intervals = IntervalBuilder::default().build(&records);
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].duration_hours, 0.0);
        assert!(!intervals[0].gap_suppressed);
    }

    #[test]
    fn test_tied_timestamps_keep_input_order() {
        let tied = |first: &str, second: &str| {
            vec![
                rec(1, "2024-05-10 08:00:00", first, true, 5.0),
                rec(1, "2024-05-10 08:00:00", second, false, 0.0),
                rec(1, "2024-05-10 08:00:10", "PARADA", true, 0.0),
            ]
        };

        let records = tied("PRODUTIVA", "MANUTENCAO");
        let order: Vec<&str> = sort_by_time(&records)
            .iter()
            .map(|r| r.operational_state.as_str())
            .collect();
        assert_eq!(order, ["PRODUTIVA", "MANUTENCAO", "PARADA"]);

        let intervals = IntervalBuilder::default().build(&records);
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].category, Category::Maintenance);
        assert_eq!(intervals[0].duration_hours, 0.0);
        assert_eq!(intervals[1].category, Category::IdleEngine);
        assert!((intervals[1].duration_hours - 10.0 / 3600.0).abs() < 1e-12);

        // Swapping the tied pair swaps which one closes the zero-length step
        let swapped = IntervalBuilder::default().build(&tied("MANUTENCAO", "PRODUTIVA"));
        assert_eq!(swapped[0].category, Category::Productive);
        assert_eq!(swapped[1].category, Category::IdleEngine);
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let records = vec![
            rec(1, "2024-05-10 08:00:20", "PRODUTIVA", true, 5.0),
            rec(1, "2024-05-10 08:00:00", "PARADA", true, 0.0),
            rec(1, "2024-05-10 08:00:10", "MANUTENCAO", false, 0.0),
        ];
        let intervals = IntervalBuilder::default().build(&records);
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].category, Category::Maintenance);
        assert_eq!(intervals[1].category, Category::Productive);
        for i in &intervals {
            assert!((i.duration_hours - 10.0 / 3600.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_later_record_decides_category() {
        let records = vec![
            rec(1, "2024-05-10 08:00:00", "PRODUTIVA", true, 5.0),
            rec(1, "2024-05-10 08:00:01", "PARADA", true, 0.0),
        ];
        let intervals = IntervalBuilder::default().build(&records);
        assert_eq!(intervals[0].category, Category::IdleEngine);
        assert_eq!(
            intervals[0].start_time,
            crate::normalizer::parse_timestamp("2024-05-10 08:00:00")
        );
    }

    #[test]
    fn test_unparseable_timestamp_gives_zero_step() {
        let records = vec![
            rec(1, "garbage", "PRODUTIVA", true, 5.0),
            rec(1, "2024-05-10 08:00:00", "PRODUTIVA", true, 5.0),
            rec(1, "2024-05-10 08:00:30", "PRODUTIVA", true, 5.0),
        ];
        let intervals = IntervalBuilder::default().build(&records);
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].duration_hours, 0.0);
        assert!(intervals[0].start_time.is_none());
        assert!((intervals[1].duration_hours - 30.0 / 3600.0).abs() < 1e-12);
    }

    #[test]
    fn test_rebuild_on_sorted_input_is_identical() {
        let records = vec![
            rec(1, "2024-05-10 08:00:00", "PARADA", true, 0.0),
            rec(1, "2024-05-10 08:00:05", "PRODUTIVA", true, 5.0),
            rec(1, "2024-05-10 08:01:00", "PARADA", false, 0.0),
        ];
        let builder = IntervalBuilder::default();
        let sorted: Vec<TelemetryRecord> = sort_by_time(&records).into_iter().cloned().collect();
        assert_eq!(builder.build(&records), builder.build(&sorted));
        assert_eq!(builder.build(&sorted), builder.build(&sorted));
    }

    #[test]
    fn test_build_fleet_separates_machines() {
        let records = vec![
            rec(2, "2024-05-10 08:00:00", "PARADA", true, 0.0),
            rec(1, "2024-05-10 08:00:00", "PARADA", true, 0.0),
            rec(2, "2024-05-10 08:00:10", "PARADA", true, 0.0),
            rec(1, "2024-05-10 08:00:20", "PARADA", true, 0.0),
            rec(3, "2024-05-10 08:00:00", "PARADA", true, 0.0),
        ];
        let fleet = IntervalBuilder::default().build_fleet(&records);
        assert_eq!(fleet.len(), 3);
        assert_eq!(fleet[&1].len(), 1);
        assert_eq!(fleet[&2].len(), 1);
        assert!(fleet[&3].is_empty());
        assert!((fleet[&1][0].duration_hours - 20.0 / 3600.0).abs() < 1e-12);
    }

    #[test]
    fn test_step_hours_negative_is_clamped() {
        let a = crate::normalizer::parse_timestamp("2024-05-10 08:00:10");
        let b = crate::normalizer::parse_timestamp("2024-05-10 08:00:00");
        let step = step_hours(a, b, 0.5);
        assert_eq!(step.hours, 0.0);
        assert!(!step.suppressed);
    }
}
