//! Delimited-Text Extract Adapter
//!
//! Reads the daily/weekly telemetry extracts produced by the fleet
//! management export into `RawRecord`s. This is the outer collaborator of
//! the engine: the core modules never touch files, the CLI calls this.
//!
//! The export comes in two flavours that differ only in delimiter (`;`
//! from spreadsheet tools, `,` from the API dump); the delimiter is
//! detected from the header row. Column names are matched against a list
//! of known aliases, case-insensitively.
//!
//! # Usage
//!
//! ```ignore
//! use harvest_ops::ingest;
//!
//! let records = ingest::load_records("extracts/2024-05-10.csv")?;
//! let run = FleetProcessor::from_global().run(records);
//! ```

use crate::types::{CodeOrLabel, ProductionRow, RawFlag, RawNumber, RawRecord};
use chrono::NaiveDate;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Errors raised while reading an extract.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Extract I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Extract is empty: no header row")]
    Empty,

    #[error("Required column '{0}' not found in header")]
    MissingColumn(&'static str),
}

// ============================================================================
// CSV Quote-Aware Parsing
// ============================================================================

/// Split a delimited line respecting quoted fields (handles delimiters
/// inside quotes and `""` escapes).
fn split_fields(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            c if c == delimiter && !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

/// `;` wins when the header contains more semicolons than commas.
fn detect_delimiter(header: &str) -> char {
    let semis = header.matches(';').count();
    let commas = header.matches(',').count();
    if semis > commas {
        ';'
    } else {
        ','
    }
}

// ============================================================================
// Column Mapping
// ============================================================================

const MACHINE_ALIASES: &[&str] = &["frota", "equipamento", "machine_id", "maquina"];
const TIMESTAMP_ALIASES: &[&str] = &["data_hora", "datahora", "timestamp", "data hora"];
const DATE_ALIASES: &[&str] = &["data", "date"];
const TIME_ALIASES: &[&str] = &["hora", "time"];
const STATE_ALIASES: &[&str] = &["estado_operacional", "estado", "operational_state", "status"];
const ENGINE_ALIASES: &[&str] = &["motor_ligado", "motor", "engine_on", "ignicao"];
const SPEED_ALIASES: &[&str] = &["velocidade", "speed", "velocidade_kmh"];
const OPERATION_ALIASES: &[&str] = &["operacao", "operation_code", "codigo_operacao"];
const ELEVATOR_ALIASES: &[&str] = &["elevador", "elevator", "elevador_ligado"];
const TONNAGE_ALIASES: &[&str] = &["toneladas", "tonnage", "producao"];

/// Header positions of the known columns.
#[derive(Debug, Clone, Default)]
struct ColumnMap {
    machine: Option<usize>,
    timestamp: Option<usize>,
    date: Option<usize>,
    time: Option<usize>,
    state: Option<usize>,
    engine: Option<usize>,
    speed: Option<usize>,
    operation: Option<usize>,
    elevator: Option<usize>,
    tonnage: Option<usize>,
}

impl ColumnMap {
    fn from_header(columns: &[String]) -> Self {
        let normalized: Vec<String> = columns
            .iter()
            .map(|c| c.trim().trim_start_matches('\u{feff}').to_lowercase())
            .collect();
        let find = |aliases: &[&str]| normalized.iter().position(|c| aliases.contains(&c.as_str()));

        Self {
            machine: find(MACHINE_ALIASES),
            timestamp: find(TIMESTAMP_ALIASES),
            date: find(DATE_ALIASES),
            time: find(TIME_ALIASES),
            state: find(STATE_ALIASES),
            engine: find(ENGINE_ALIASES),
            speed: find(SPEED_ALIASES),
            operation: find(OPERATION_ALIASES),
            elevator: find(ELEVATOR_ALIASES),
            tonnage: find(TONNAGE_ALIASES),
        }
    }

    fn validate_telemetry(&self) -> Result<(), IngestError> {
        if self.machine.is_none() {
            return Err(IngestError::MissingColumn("frota"));
        }
        if self.timestamp.is_none() && (self.date.is_none() || self.time.is_none()) {
            return Err(IngestError::MissingColumn("data_hora"));
        }
        if self.state.is_none() {
            return Err(IngestError::MissingColumn("estado"));
        }
        if self.engine.is_none() {
            return Err(IngestError::MissingColumn("motor_ligado"));
        }
        Ok(())
    }
}

fn field(fields: &[String], idx: Option<usize>) -> Option<&str> {
    idx.and_then(|i| fields.get(i)).map(|s| s.trim())
}

fn text_flag(value: Option<&str>) -> RawFlag {
    match value {
        Some(v) if !v.is_empty() => RawFlag::Text(v.to_string()),
        _ => RawFlag::Missing,
    }
}

/// Parse a machine id cell; tolerates `"7034.0"` from spreadsheet exports.
fn parse_machine_id(value: &str) -> Option<u32> {
    let v = value.trim();
    v.parse::<u32>()
        .ok()
        .or_else(|| v.strip_suffix(".0").and_then(|s| s.parse::<u32>().ok()))
}

// ============================================================================
// Telemetry Extract
// ============================================================================

/// Load a telemetry extract from disk.
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<RawRecord>, IngestError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| IngestError::Io(path.to_path_buf(), e))?;
    let records = read_records(file).map_err(|e| match e {
        IngestError::Io(_, inner) => IngestError::Io(path.to_path_buf(), inner),
        other => other,
    })?;
    info!(path = %path.display(), records = records.len(), "Loaded telemetry extract");
    Ok(records)
}

/// Read a telemetry extract from any reader.
///
/// Rows whose machine id cannot be parsed are skipped with a warning;
/// every other malformed cell is passed through for the normalizer to
/// default.
pub fn read_records<R: Read>(reader: R) -> Result<Vec<RawRecord>, IngestError> {
    let mut lines = BufReader::new(reader).lines();
    let header = match lines.next() {
        Some(line) => line.map_err(|e| IngestError::Io(PathBuf::new(), e))?,
        None => return Err(IngestError::Empty),
    };
    let delimiter = detect_delimiter(&header);
    let map = ColumnMap::from_header(&split_fields(&header, delimiter));
    map.validate_telemetry()?;

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (line_no, line) in lines.enumerate() {
        let line = line.map_err(|e| IngestError::Io(PathBuf::new(), e))?;
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_fields(&line, delimiter);

        let Some(machine_id) = field(&fields, map.machine).and_then(parse_machine_id) else {
            skipped += 1;
            warn!(line = line_no + 2, "Skipping row with unparseable machine id");
            continue;
        };

        let timestamp = match map.timestamp {
            Some(_) => field(&fields, map.timestamp).unwrap_or_default().to_string(),
            None => format!(
                "{} {}",
                field(&fields, map.date).unwrap_or_default(),
                field(&fields, map.time).unwrap_or_default()
            ),
        };

        records.push(RawRecord {
            machine_id,
            timestamp,
            operational_state: field(&fields, map.state).unwrap_or_default().to_string(),
            engine_on: text_flag(field(&fields, map.engine)),
            speed: field(&fields, map.speed)
                .filter(|v| !v.is_empty())
                .map_or(RawNumber::Missing, RawNumber::from),
            operation_code: field(&fields, map.operation).unwrap_or_default().to_string(),
            elevator: text_flag(field(&fields, map.elevator)),
        });
    }

    if skipped > 0 {
        warn!(skipped, "Rows skipped while reading extract");
    }
    Ok(records)
}

// ============================================================================
// Production Extract
// ============================================================================

/// Load a production table (`equipamento;toneladas[;data]`).
pub fn load_production(path: impl AsRef<Path>) -> Result<Vec<ProductionRow>, IngestError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| IngestError::Io(path.to_path_buf(), e))?;
    read_production(file).map_err(|e| match e {
        IngestError::Io(_, inner) => IngestError::Io(path.to_path_buf(), inner),
        other => other,
    })
}

/// Read a production table from any reader.
///
/// The `equipamento` cell is kept as received: numeric cells become
/// codes, anything else a label. Unparseable tonnage counts as zero.
pub fn read_production<R: Read>(reader: R) -> Result<Vec<ProductionRow>, IngestError> {
    let mut lines = BufReader::new(reader).lines();
    let header = match lines.next() {
        Some(line) => line.map_err(|e| IngestError::Io(PathBuf::new(), e))?,
        None => return Err(IngestError::Empty),
    };
    let delimiter = detect_delimiter(&header);
    let map = ColumnMap::from_header(&split_fields(&header, delimiter));
    if map.machine.is_none() {
        return Err(IngestError::MissingColumn("equipamento"));
    }
    if map.tonnage.is_none() {
        return Err(IngestError::MissingColumn("toneladas"));
    }

    let mut rows = Vec::new();
    for line in lines {
        let line = line.map_err(|e| IngestError::Io(PathBuf::new(), e))?;
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_fields(&line, delimiter);
        let machine = field(&fields, map.machine).unwrap_or_default();
        let equipamento = parse_machine_id(machine)
            .map_or_else(|| CodeOrLabel::from(machine), CodeOrLabel::from);
        let toneladas = field(&fields, map.tonnage)
            .and_then(|v| v.replace(',', ".").parse::<f64>().ok())
            .filter(|t| t.is_finite())
            .unwrap_or(0.0);
        let data = field(&fields, map.date).and_then(parse_date);

        rows.push(ProductionRow {
            data,
            equipamento,
            toneladas,
        });
    }
    Ok(rows)
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%d/%m/%Y"))
        .ok()
}
