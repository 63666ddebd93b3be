//! Dashboard aggregation.
//!
//! Framework-agnostic summaries of the recorded audits: a per-machine grid indexed by
//! audit sequence, and a machine × question matrix. Both are read-only.

use crate::{
    core::catalog::{list_machines, list_questions},
    entities::{Audit, audit, machine, question},
    errors::Result,
};
use sea_orm::{QueryOrder, prelude::*};
use serde::Serialize;
use std::collections::HashMap;

/// One machine's row on the dashboard grid.
#[derive(Debug, Clone, Serialize)]
pub struct MachineRow {
    /// The machine
    pub machine: machine::Model,
    /// Cell `k - 1` holds the audit with `audit_sequence == k`, if any
    pub cells: Vec<Option<audit::Model>>,
    /// Audits with status OK
    pub ok_count: usize,
    /// Audits with status NOK
    pub nok_count: usize,
    /// Audits whose corrective action is marked resolved
    pub resolved_count: usize,
    /// All audits for the machine, including those beyond the grid width
    pub total_audits: usize,
}

/// The full dashboard grid.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardGrid {
    /// Number of sequence columns
    pub max_sequence: usize,
    /// One row per machine, in import order
    pub rows: Vec<MachineRow>,
}

/// Audits for one machine/question pair, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct MatrixCell {
    /// Machine ID
    pub machine_id: i64,
    /// Question ID
    pub question_id: i64,
    /// Recorded audits
    pub audits: Vec<audit::Model>,
}

/// Machine × question view of all audits.
#[derive(Debug, Clone, Serialize)]
pub struct AuditMatrix {
    /// Machines, in import order
    pub machines: Vec<machine::Model>,
    /// Questions, in import order
    pub questions: Vec<question::Model>,
    /// Only pairs that have at least one audit
    pub cells: Vec<MatrixCell>,
}

/// Builds the fixed-width sequence grid for every machine.
///
/// Audits with a sequence above `max_sequence` are not placed in the grid but are still
/// included in the counts.
pub async fn build_grid(db: &DatabaseConnection, max_sequence: usize) -> Result<DashboardGrid> {
    let machines = list_machines(db).await?;
    let mut by_machine = audits_by_machine(db).await?;

    let rows = machines
        .into_iter()
        .map(|machine| {
            let audits = by_machine.remove(&machine.id).unwrap_or_default();
            build_row(machine, audits, max_sequence)
        })
        .collect();

    Ok(DashboardGrid { max_sequence, rows })
}

fn build_row(machine: machine::Model, audits: Vec<audit::Model>, max_sequence: usize) -> MachineRow {
    let ok_count = audits.iter().filter(|a| a.status == "OK").count();
    let nok_count = audits.iter().filter(|a| a.status == "NOK").count();
    let resolved_count = audits.iter().filter(|a| a.action_completed).count();
    let total_audits = audits.len();

    let mut cells = vec![None; max_sequence];
    for audit in audits {
        let slot = usize::try_from(audit.audit_sequence)
            .ok()
            .and_then(|seq| seq.checked_sub(1))
            .filter(|&idx| idx < max_sequence);
        if let Some(idx) = slot {
            cells[idx] = Some(audit);
        }
    }

    MachineRow {
        machine,
        cells,
        ok_count,
        nok_count,
        resolved_count,
        total_audits,
    }
}

async fn audits_by_machine(db: &DatabaseConnection) -> Result<HashMap<i64, Vec<audit::Model>>> {
    let audits = Audit::find()
        .order_by_asc(audit::Column::MachineId)
        .order_by_asc(audit::Column::AuditSequence)
        .all(db)
        .await?;

    let mut grouped: HashMap<i64, Vec<audit::Model>> = HashMap::new();
    for audit in audits {
        grouped.entry(audit.machine_id).or_default().push(audit);
    }
    Ok(grouped)
}

/// Groups every audit by its machine/question pair.
pub async fn build_matrix(db: &DatabaseConnection) -> Result<AuditMatrix> {
    let machines = list_machines(db).await?;
    let questions = list_questions(db).await?;
    let audits = Audit::find()
        .order_by_asc(audit::Column::CreatedAt)
        .order_by_asc(audit::Column::Id)
        .all(db)
        .await?;

    let mut grouped: HashMap<(i64, i64), Vec<audit::Model>> = HashMap::new();
    for audit in audits {
        grouped
            .entry((audit.machine_id, audit.question_id))
            .or_default()
            .push(audit);
    }

    let mut cells: Vec<MatrixCell> = grouped
        .into_iter()
        .map(|((machine_id, question_id), audits)| MatrixCell {
            machine_id,
            question_id,
            audits,
        })
        .collect();
    cells.sort_by_key(|c| (c.machine_id, c.question_id));

    Ok(AuditMatrix {
        machines,
        questions,
        cells,
    })
}
