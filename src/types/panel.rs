//! Side-table rows and the composed Panel payload.
//!
//! Field names follow the reporting layer's vocabulary (`lavagem`, `roletes`,
//! `ofensores`, ...) because these structures are handed unchanged to the
//! spreadsheet writer and the payload publisher.

use super::MachineAggregate;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// Heterogeneous Identifiers
// ============================================================================

/// An identifier that arrives either as a number or as a descriptive label.
///
/// Offender and side tables are built by different exporters: some write
/// the fleet code as an integer (`7034`), others write a label
/// (`"7032 - COLHEDORA"`). The value is kept exactly as received and only
/// resolved to a machine id when unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CodeOrLabel {
    Code(i64),
    Label(String),
}

impl CodeOrLabel {
    /// Resolve to a machine id: a `Code` in range, or a `Label` that is
    /// entirely digits. Anything else is ambiguous and yields `None`.
    pub fn machine_id(&self) -> Option<u32> {
        match self {
            CodeOrLabel::Code(code) => u32::try_from(*code).ok(),
            CodeOrLabel::Label(label) => {
                let trimmed = label.trim();
                if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
                    trimmed.parse().ok()
                } else {
                    None
                }
            }
        }
    }

    /// True when this value unambiguously names `machine_id`.
    pub fn refers_to(&self, machine_id: u32) -> bool {
        self.machine_id() == Some(machine_id)
    }
}

impl From<u32> for CodeOrLabel {
    fn from(value: u32) -> Self {
        CodeOrLabel::Code(i64::from(value))
    }
}

impl From<&str> for CodeOrLabel {
    fn from(value: &str) -> Self {
        CodeOrLabel::Label(value.to_string())
    }
}

impl std::fmt::Display for CodeOrLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodeOrLabel::Code(code) => write!(f, "{code}"),
            CodeOrLabel::Label(label) => write!(f, "{label}"),
        }
    }
}

// ============================================================================
// Side-Table Rows
// ============================================================================

/// One machine's washing or roller-cleaning totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideTableRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<NaiveDate>,
    pub equipamento: CodeOrLabel,
    pub intervalos: u32,
    pub tempo_total_horas: f64,
}

/// One entry of the operation-wide offender ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffenderRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<NaiveDate>,
    pub equipamento: CodeOrLabel,
    pub operacao: CodeOrLabel,
    pub tempo_horas: f64,
    /// Share of non-productive time, in percent
    pub porcentagem: f64,
}

/// Harvested tonnage attributed to one machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<NaiveDate>,
    pub equipamento: CodeOrLabel,
    pub toneladas: f64,
}

/// Independently aggregated tables sharing the machine-id key space.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideTables {
    #[serde(default)]
    pub washing: Vec<SideTableRow>,
    #[serde(default)]
    pub rollers: Vec<SideTableRow>,
    #[serde(default)]
    pub offenders: Vec<OffenderRow>,
    #[serde(default)]
    pub production: Vec<ProductionRow>,
}

// ============================================================================
// Panel Sections
// ============================================================================

/// Per-machine entry of a washing/roller section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideTableEntry {
    pub equipamento: CodeOrLabel,
    pub intervalos: u32,
    pub tempo_total_horas: f64,
}

/// Washing or roller-cleaning section. Always present; zeroed when the
/// source has no matching rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideTableSection {
    pub tem_dados: bool,
    pub total_intervalos: u32,
    pub tempo_total_horas: f64,
    pub equipamentos: Vec<SideTableEntry>,
}

impl SideTableSection {
    pub fn empty() -> Self {
        Self {
            tem_dados: false,
            total_intervalos: 0,
            tempo_total_horas: 0.0,
            equipamentos: Vec::new(),
        }
    }
}

/// Offender entry as it appears in the Panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffenderEntry {
    pub equipamento: CodeOrLabel,
    pub operacao: CodeOrLabel,
    pub tempo_horas: f64,
    pub porcentagem: f64,
}

/// Production section (single machine or whole front).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionSection {
    pub tem_dados: bool,
    pub toneladas: f64,
}

impl ProductionSection {
    pub fn empty() -> Self {
        Self {
            tem_dados: false,
            toneladas: 0.0,
        }
    }
}

/// Machine/date-scoped report merging the machine aggregate with every
/// side aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    pub frota: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<NaiveDate>,
    pub resumo: MachineAggregate,
    pub lavagem: SideTableSection,
    pub roletes: SideTableSection,
    pub ofensores: Vec<OffenderEntry>,
    pub producao_frota: ProductionSection,
    pub producao_frente: ProductionSection,
}
