//! Side-Table Extractors
//!
//! Washing and roller-cleaning stops are not states of the primary
//! classifier; they are recognised by dedicated operation codes. This
//! module pulls them out of the normalized records as separate interval
//! runs, and ranks the operations that consume the most non-productive
//! time ("offenders"). The resulting rows feed the panel composer exactly
//! like tables supplied by an external source would.

use crate::aggregator::FleetRun;
use crate::config::{EngineConfig, OperationMatchConfig};
use crate::intervals::{group_by_machine, sort_by_time, step_hours};
use crate::types::{
    ratio, Category, CodeOrLabel, Interval, OffenderRow, SideTableRow, SideTables, TelemetryRecord,
};
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::debug;

// ============================================================================
// Operation Codes
// ============================================================================

fn code_prefix() -> Option<&'static Regex> {
    static CODE_PREFIX: OnceLock<Option<Regex>> = OnceLock::new();
    CODE_PREFIX
        .get_or_init(|| Regex::new(r"^\s*(\d+)").ok())
        .as_ref()
}

/// Extract the numeric code of an operation label.
///
/// `"8040 - MANUTENCAO CORRETIVA"` -> `Code(8040)`; labels without a
/// leading number stay as `Label`.
pub fn parse_operation_code(raw: &str) -> CodeOrLabel {
    code_prefix()
        .and_then(|re| re.captures(raw))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .map_or_else(|| CodeOrLabel::Label(raw.trim().to_string()), CodeOrLabel::Code)
}

/// Keep an operation label as received: a bare number becomes `Code`,
/// anything else (including `"7032 - LAVAGEM"`) stays a `Label`.
pub fn verbatim_code(raw: &str) -> CodeOrLabel {
    let trimmed = raw.trim();
    match trimmed.parse::<i64>() {
        Ok(code) if !trimmed.starts_with('+') => CodeOrLabel::Code(code),
        _ => CodeOrLabel::Label(trimmed.to_string()),
    }
}

/// Recognises one family of operations by code or keyword.
#[derive(Debug, Clone)]
pub struct OperationMatcher {
    codes: Vec<i64>,
    keywords: Vec<String>,
}

impl OperationMatcher {
    pub fn new(config: &OperationMatchConfig) -> Self {
        Self {
            codes: config.codes.clone(),
            keywords: config
                .keywords
                .iter()
                .map(|k| k.trim().to_uppercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn matches(&self, operation_code: &str) -> bool {
        if let CodeOrLabel::Code(code) = parse_operation_code(operation_code) {
            if self.codes.contains(&code) {
                return true;
            }
        }
        let upper = operation_code.to_uppercase();
        self.keywords.iter().any(|k| upper.contains(k.as_str()))
    }
}

// ============================================================================
// Operation Runs
// ============================================================================

/// A maximal sequence of consecutive intervals closed by matching records.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRun {
    pub machine_id: u32,
    /// Operation label of the first matching record
    pub operation_code: String,
    /// Per-step intervals, all `Category::Washing`
    pub intervals: Vec<Interval>,
}

impl OperationRun {
    pub fn start_time(&self) -> Option<NaiveDateTime> {
        self.intervals.first().and_then(|i| i.start_time)
    }

    pub fn duration_hours(&self) -> f64 {
        self.intervals.iter().map(|i| i.duration_hours).sum()
    }
}

/// Extract runs of matching operations from a mixed-machine record set.
///
/// Within a machine (sorted by time) an interval belongs to a run when
/// the record closing it matches. A non-matching record or a suppressed
/// collection gap ends the current run.
pub fn extract_operation_runs(
    records: &[TelemetryRecord],
    matcher: &OperationMatcher,
    outlier_threshold_hours: f64,
) -> Vec<OperationRun> {
    let mut runs = Vec::new();

    for (machine_id, machine_records) in group_by_machine(records) {
        let sorted = sort_by_time(&machine_records);
        let mut current: Option<OperationRun> = None;

        for pair in sorted.windows(2) {
            let (prev, next) = (pair[0], pair[1]);
            if !matcher.matches(&next.operation_code) {
                runs.extend(current.take());
                continue;
            }

            let step = step_hours(prev.timestamp, next.timestamp, outlier_threshold_hours);
            if step.suppressed {
                runs.extend(current.take());
            }

            let run = current.get_or_insert_with(|| OperationRun {
                machine_id,
                operation_code: next.operation_code.clone(),
                intervals: Vec::new(),
            });
            run.intervals.push(Interval {
                machine_id,
                start_time: prev.timestamp,
                duration_hours: step.hours,
                category: Category::Washing,
                operation_code: next.operation_code.clone(),
                engine_on: next.engine_on,
                elevator_on: next.elevator_on,
                gap_suppressed: step.suppressed,
            });
        }
        runs.extend(current.take());
    }

    runs
}

/// Fold runs into one row per (machine, day).
pub fn fold_runs(runs: &[OperationRun]) -> Vec<SideTableRow> {
    let mut grouped: BTreeMap<(u32, Option<NaiveDate>), (u32, f64)> = BTreeMap::new();
    for run in runs {
        let key = (run.machine_id, run.start_time().map(|t| t.date()));
        let entry = grouped.entry(key).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += run.duration_hours();
    }

    grouped
        .into_iter()
        .map(|((machine_id, data), (intervalos, tempo_total_horas))| SideTableRow {
            data,
            equipamento: CodeOrLabel::from(machine_id),
            intervalos,
            tempo_total_horas,
        })
        .collect()
}

// ============================================================================
// Offenders
// ============================================================================

/// Rank (machine, operation) pairs by non-productive hours, per day.
///
/// Productive and zero-length intervals are ignored. For each day the top
/// `top_n` pairs are kept, ordered by hours descending (ties: machine id,
/// then operation label). `porcentagem` is the pair's share of that day's
/// non-productive hours, in percent.
pub fn rank_offenders<'a, I>(intervals: I, top_n: usize) -> Vec<OffenderRow>
where
    I: IntoIterator<Item = &'a Interval>,
{
    let mut by_day: BTreeMap<Option<NaiveDate>, BTreeMap<(u32, String), f64>> = BTreeMap::new();
    for interval in intervals {
        if interval.category == Category::Productive || interval.duration_hours <= 0.0 {
            continue;
        }
        let day = interval.start_time.map(|t| t.date());
        *by_day
            .entry(day)
            .or_default()
            .entry((interval.machine_id, interval.operation_code.clone()))
            .or_insert(0.0) += interval.duration_hours;
    }

    let mut rows = Vec::new();
    for (day, pairs) in by_day {
        let total: f64 = pairs.values().sum();
        let mut ranked: Vec<((u32, String), f64)> = pairs.into_iter().collect();
        ranked.sort_by(|(ka, ha), (kb, hb)| hb.total_cmp(ha).then_with(|| ka.cmp(kb)));

        rows.extend(ranked.into_iter().take(top_n).map(|((machine_id, op), hours)| OffenderRow {
            data: day,
            equipamento: CodeOrLabel::from(machine_id),
            operacao: verbatim_code(&op),
            tempo_horas: hours,
            porcentagem: ratio(hours, total) * 100.0,
        }));
    }
    rows
}

// ============================================================================
// Extractor
// ============================================================================

/// Builds every telemetry-derived side table of a run.
///
/// Production is not derivable from telemetry and is left empty for the
/// caller to fill.
#[derive(Debug, Clone)]
pub struct SideTableExtractor {
    washing: OperationMatcher,
    rollers: OperationMatcher,
    outlier_threshold_hours: f64,
    top_n: usize,
}

impl SideTableExtractor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            washing: OperationMatcher::new(&config.side_tables.washing),
            rollers: OperationMatcher::new(&config.side_tables.rollers),
            outlier_threshold_hours: config.intervals.outlier_threshold_hours,
            top_n: config.offenders.top_n,
        }
    }

    pub fn washing_runs(&self, records: &[TelemetryRecord]) -> Vec<OperationRun> {
        extract_operation_runs(records, &self.washing, self.outlier_threshold_hours)
    }

    pub fn roller_runs(&self, records: &[TelemetryRecord]) -> Vec<OperationRun> {
        extract_operation_runs(records, &self.rollers, self.outlier_threshold_hours)
    }

    pub fn extract(&self, run: &FleetRun) -> SideTables {
        let washing = fold_runs(&self.washing_runs(&run.records));
        let rollers = fold_runs(&self.roller_runs(&run.records));
        let offenders = rank_offenders(run.all_intervals(), self.top_n);
        debug!(
            washing_rows = washing.len(),
            roller_rows = rollers.len(),
            offenders = offenders.len(),
            "Extracted side tables"
        );
        SideTables {
            washing,
            rollers,
            offenders,
            production: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize_record;
    use crate::types::RawRecord;

    fn rec(machine: u32, ts: &str, op: &str) -> TelemetryRecord {
        normalize_record(RawRecord::new(machine, ts, "PARADA", true, 0.0, op))
    }

    fn washing() -> OperationMatcher {
        OperationMatcher::new(&EngineConfig::default().side_tables.washing)
    }

    #[test]
    fn test_parse_operation_code() {
        assert_eq!(parse_operation_code("8040 - MANUTENCAO CORRETIVA"), CodeOrLabel::Code(8040));
        assert_eq!(parse_operation_code(" 7034"), CodeOrLabel::Code(7034));
        assert_eq!(
            parse_operation_code("SEM APONTAMENTO"),
            CodeOrLabel::Label("SEM APONTAMENTO".to_string())
        );
    }

    #[test]
    fn test_verbatim_code_keeps_descriptions() {
        assert_eq!(verbatim_code("7034"), CodeOrLabel::Code(7034));
        assert_eq!(
            verbatim_code("7032 - LAVAGEM"),
            CodeOrLabel::Label("7032 - LAVAGEM".to_string())
        );
    }

    #[test]
    fn test_matcher_by_code_and_keyword() {
        let m = OperationMatcher::new(&OperationMatchConfig {
            codes: vec![8120],
            keywords: vec!["lavagem".to_string()],
        });
        assert!(m.matches("8120 - HIGIENIZACAO"));
        assert!(m.matches("8300 - Lavagem de equipamento"));
        assert!(!m.matches("8010 - COLHEITA"));
        assert!(!m.matches("81200 - OUTRO"));
    }

    #[test]
    fn test_extract_single_run() {
        let records = vec![
            rec(7034, "2024-05-10 08:00:00", "8010 - COLHEITA"),
            rec(7034, "2024-05-10 08:00:10", "8300 - LAVAGEM"),
            rec(7034, "2024-05-10 08:00:20", "8300 - LAVAGEM"),
            rec(7034, "2024-05-10 08:00:30", "8010 - COLHEITA"),
        ];
        let runs = extract_operation_runs(&records, &washing(), 0.5);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].intervals.len(), 2);
        assert!((runs[0].duration_hours() - 20.0 / 3600.0).abs() < 1e-12);
        assert!(runs[0].intervals.iter().all(|i| i.category == Category::Washing));
    }

    #[test]
    fn test_interruption_splits_runs() {
        let records = vec![
            rec(7034, "2024-05-10 08:00:00", "8300 - LAVAGEM"),
            rec(7034, "2024-05-10 08:00:10", "8300 - LAVAGEM"),
            rec(7034, "2024-05-10 08:00:20", "8010 - COLHEITA"),
            rec(7034, "2024-05-10 08:00:30", "8300 - LAVAGEM"),
        ];
        let runs = extract_operation_runs(&records, &washing(), 0.5);
        assert_eq!(runs.len(), 2);
    }

    #[test]
    fn test_collection_gap_splits_runs() {
        let records = vec![
            rec(7034, "2024-05-10 08:00:00", "8300 - LAVAGEM"),
            rec(7034, "2024-05-10 08:00:10", "8300 - LAVAGEM"),
            rec(7034, "2024-05-10 10:00:00", "8300 - LAVAGEM"),
            rec(7034, "2024-05-10 10:00:10", "8300 - LAVAGEM"),
        ];
        let runs = extract_operation_runs(&records, &washing(), 0.5);
        assert_eq!(runs.len(), 2);
        let total: f64 = runs.iter().map(OperationRun::duration_hours).sum();
        assert!((total - 20.0 / 3600.0).abs() < 1e-12);
    }

    #[test]
    fn test_fold_runs_per_machine() {
        let records = vec![
            rec(1, "2024-05-10 08:00:00", "8300 - LAVAGEM"),
            rec(1, "2024-05-10 08:00:10", "8300 - LAVAGEM"),
            rec(1, "2024-05-10 08:00:20", "8010 - COLHEITA"),
            rec(1, "2024-05-10 08:00:30", "8300 - LAVAGEM"),
            rec(2, "2024-05-10 08:00:00", "8010 - COLHEITA"),
            rec(2, "2024-05-10 08:00:36", "8300 - LAVAGEM"),
        ];
        let rows = fold_runs(&extract_operation_runs(&records, &washing(), 0.5));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].equipamento, CodeOrLabel::Code(1));
        assert_eq!(rows[0].intervalos, 2);
        assert!((rows[0].tempo_total_horas - 20.0 / 3600.0).abs() < 1e-12);
        assert_eq!(rows[1].equipamento, CodeOrLabel::Code(2));
        assert!((rows[1].tempo_total_horas - 0.01).abs() < 1e-12);
        assert_eq!(rows[0].data, NaiveDate::from_ymd_opt(2024, 5, 10));
    }

    fn offender_interval(machine: u32, op: &str, category: Category, hours: f64) -> Interval {
        Interval {
            machine_id: machine,
            start_time: crate::normalizer::parse_timestamp("2024-05-10 08:00:00"),
            duration_hours: hours,
            category,
            operation_code: op.to_string(),
            engine_on: true,
            elevator_on: false,
            gap_suppressed: false,
        }
    }

    #[test]
    fn test_rank_offenders_orders_and_limits() {
        let intervals = vec![
            offender_interval(1, "8040 - MANUTENCAO CORRETIVA", Category::Maintenance, 0.3),
            offender_interval(2, "8200 - AGUARDANDO TRANSBORDO", Category::IdleEngine, 0.5),
            offender_interval(1, "8040 - MANUTENCAO CORRETIVA", Category::Maintenance, 0.1),
            offender_interval(3, "8210 - REFEICAO", Category::Available, 0.2),
            offender_interval(1, "8010 - COLHEITA", Category::Productive, 5.0),
        ];
        let rows = rank_offenders(&intervals, 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].equipamento, CodeOrLabel::Code(2));
        assert!((rows[0].tempo_horas - 0.5).abs() < 1e-12);
        assert!((rows[0].porcentagem - 45.454_545).abs() < 1e-4);
        assert_eq!(rows[1].equipamento, CodeOrLabel::Code(1));
        assert!((rows[1].tempo_horas - 0.4).abs() < 1e-12);
        assert_eq!(
            rows[1].operacao,
            CodeOrLabel::Label("8040 - MANUTENCAO CORRETIVA".to_string())
        );
    }

    #[test]
    fn test_rank_offenders_empty() {
        assert!(rank_offenders(std::iter::empty(), 5).is_empty());
    }
}
