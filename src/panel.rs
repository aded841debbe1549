//! Panel Composer
//!
//! Merges a machine aggregate with independently computed side tables
//! (washing, roller cleaning, offenders, production) into one Panel.
//!
//! Every section is always present. A side table that is empty, or has
//! no rows for the requested machine/date, yields a section with
//! `tem_dados = false` and zeroed numbers, so consumers never null-check
//! the shape.

use crate::types::{
    CodeOrLabel, MachineAggregate, OffenderEntry, OffenderRow, Panel, ProductionRow,
    ProductionSection, SideTableEntry, SideTableRow, SideTableSection, SideTables,
};
use chrono::NaiveDate;
use tracing::debug;

/// Machine and (optional) day a panel is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelScope {
    pub machine_id: u32,
    pub date: Option<NaiveDate>,
}

impl PanelScope {
    pub fn new(machine_id: u32, date: Option<NaiveDate>) -> Self {
        Self { machine_id, date }
    }

    /// A row matches when either side leaves the date open, or both agree.
    pub fn matches_date(&self, row_date: Option<NaiveDate>) -> bool {
        match (self.date, row_date) {
            (Some(scope), Some(row)) => scope == row,
            _ => true,
        }
    }

    fn matches_machine(&self, equipamento: &CodeOrLabel) -> bool {
        equipamento.refers_to(self.machine_id)
    }
}

/// Stateless composer; kept as a type so callers can hold one alongside
/// the other pipeline stages.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanelComposer;

impl PanelComposer {
    pub fn new() -> Self {
        Self
    }

    /// Compose one panel. `aggregate` is the machine's aggregate for the
    /// scope, or `None` when the machine produced no intervals.
    pub fn compose(
        &self,
        scope: &PanelScope,
        aggregate: Option<&MachineAggregate>,
        tables: &SideTables,
    ) -> Panel {
        let resumo = aggregate
            .cloned()
            .unwrap_or_else(|| MachineAggregate::empty(scope.machine_id));

        let panel = Panel {
            frota: scope.machine_id,
            data: scope.date,
            resumo,
            lavagem: side_section(scope, &tables.washing),
            roletes: side_section(scope, &tables.rollers),
            ofensores: offender_section(scope, &tables.offenders),
            producao_frota: production_section(
                tables
                    .production
                    .iter()
                    .filter(|r| scope.matches_date(r.data) && scope.matches_machine(&r.equipamento)),
            ),
            producao_frente: production_section(
                tables.production.iter().filter(|r| scope.matches_date(r.data)),
            ),
        };

        debug!(
            machine_id = scope.machine_id,
            lavagem = panel.lavagem.tem_dados,
            roletes = panel.roletes.tem_dados,
            ofensores = panel.ofensores.len(),
            producao_frota = panel.producao_frota.tem_dados,
            producao_frente = panel.producao_frente.tem_dados,
            "Composed panel"
        );
        panel
    }
}

/// Washing / roller section for the scoped machine.
fn side_section(scope: &PanelScope, rows: &[SideTableRow]) -> SideTableSection {
    let matching: Vec<&SideTableRow> = rows
        .iter()
        .filter(|r| scope.matches_date(r.data) && scope.matches_machine(&r.equipamento))
        .collect();

    if matching.is_empty() {
        return SideTableSection::empty();
    }

    SideTableSection {
        tem_dados: true,
        total_intervalos: matching.iter().map(|r| r.intervalos).sum(),
        tempo_total_horas: matching.iter().map(|r| r.tempo_total_horas).sum(),
        equipamentos: matching
            .into_iter()
            .map(|r| SideTableEntry {
                equipamento: r.equipamento.clone(),
                intervalos: r.intervalos,
                tempo_total_horas: r.tempo_total_horas,
            })
            .collect(),
    }
}

/// Offender rows are an operation-wide ranking: kept verbatim, in source
/// order, regardless of which machine they name.
fn offender_section(scope: &PanelScope, rows: &[OffenderRow]) -> Vec<OffenderEntry> {
    rows.iter()
        .filter(|r| scope.matches_date(r.data))
        .map(|r| OffenderEntry {
            equipamento: r.equipamento.clone(),
            operacao: r.operacao.clone(),
            tempo_horas: r.tempo_horas,
            porcentagem: r.porcentagem,
        })
        .collect()
}

fn production_section<'a, I>(rows: I) -> ProductionSection
where
    I: Iterator<Item = &'a ProductionRow>,
{
    let mut section = ProductionSection::empty();
    for row in rows {
        section.tem_dados = true;
        if row.toneladas.is_finite() {
            section.toneladas += row.toneladas;
        }
    }
    section
}
