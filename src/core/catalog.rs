//! Catalog business logic - machines and questions.
//!
//! Machines and questions only change through a full import, which wipes every audit,
//! pairing token, machine and question and then starts a fresh cycle. Import data
//! arrives either as a [`Catalog`] (e.g. from catalog.toml) or as a two-sheet
//! [`TabularDocument`], the shape a spreadsheet front-end produces. Export produces
//! the same document shape, so an export can be fed straight back into an import.

use crate::{
    config::catalog::{Catalog, QuestionSpec},
    core::{
        pairing,
        photo::{PhotoStore, remove_photos_best_effort},
    },
    entities::{Audit, Machine, PairingToken, Question, machine, question},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

/// Sheet name for the machine list in exported documents.
pub const MACHINES_SHEET: &str = "Maszyny";
/// Sheet name for the question list in exported documents.
pub const QUESTIONS_SHEET: &str = "Pytania";

/// One sheet of tabular data. The first row of the source is kept as `header`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    /// Sheet name
    pub name: String,
    /// Column headers
    pub header: Vec<String>,
    /// Data rows; rows may be shorter than the header
    pub rows: Vec<Vec<String>>,
}

/// A workbook-like document: an ordered list of sheets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabularDocument {
    /// Sheets in workbook order
    pub sheets: Vec<Sheet>,
}

/// Counts reported after a successful import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Machines now in the database
    pub machines: usize,
    /// Questions now in the database
    pub questions: usize,
    /// Tokens in the freshly started cycle
    pub tokens: usize,
    /// Audits that were discarded with the old catalog
    pub discarded_audits: usize,
}

impl TryFrom<&TabularDocument> for Catalog {
    type Error = Error;

    /// Reads machines from the first sheet and questions from the second.
    ///
    /// Machines come from the first column; blank cells are dropped. Questions come
    /// from the first two columns (code, description); rows missing either are skipped.
    fn try_from(document: &TabularDocument) -> Result<Self> {
        let [machine_sheet, question_sheet, ..] = document.sheets.as_slice() else {
            return Err(Error::Import {
                message: "The document must contain at least 2 sheets (machines and questions)"
                    .to_string(),
            });
        };

        if question_sheet.header.len() < 2 {
            return Err(Error::Import {
                message: format!(
                    "Sheet '{}' must have two columns: code and description",
                    question_sheet.name
                ),
            });
        }

        let machines = machine_sheet
            .rows
            .iter()
            .filter_map(|row| row.first())
            .map(|cell| cell.trim())
            .filter(|name| !name.is_empty())
            .map(String::from)
            .collect();

        let questions = question_sheet
            .rows
            .iter()
            .filter_map(|row| match row.as_slice() {
                [code, description, ..] => {
                    let (code, description) = (code.trim(), description.trim());
                    (!code.is_empty() && !description.is_empty())
                        .then(|| QuestionSpec::new(code, description))
                }
                _ => None,
            })
            .collect();

        Ok(Self {
            machines,
            questions,
        })
    }
}

/// Checks a catalog before anything is written.
///
/// Values are trimmed; an empty machine or question list, blank entries and duplicate
/// machine names or question codes are rejected.
pub fn validate_catalog(catalog: &Catalog) -> Result<Catalog> {
    let machines: Vec<String> = catalog
        .machines
        .iter()
        .map(|name| name.trim().to_string())
        .collect();
    let questions: Vec<QuestionSpec> = catalog
        .questions
        .iter()
        .map(|q| QuestionSpec::new(q.code.trim(), q.description.trim()))
        .collect();

    if machines.is_empty() {
        return Err(Error::Import {
            message: "No machines found in the import data".to_string(),
        });
    }
    if questions.is_empty() {
        return Err(Error::Import {
            message: "No questions found in the import data".to_string(),
        });
    }
    if machines.iter().any(String::is_empty) {
        return Err(Error::Import {
            message: "Machine names cannot be empty".to_string(),
        });
    }
    if questions
        .iter()
        .any(|q| q.code.is_empty() || q.description.is_empty())
    {
        return Err(Error::Import {
            message: "Every question needs a code and a description".to_string(),
        });
    }

    let mut seen = HashSet::new();
    if let Some(dup) = machines.iter().find(|name| !seen.insert(name.as_str())) {
        return Err(Error::Import {
            message: format!("Duplicate machine name: {dup}"),
        });
    }
    let mut seen = HashSet::new();
    if let Some(dup) = questions.iter().find(|q| !seen.insert(q.code.as_str())) {
        return Err(Error::Import {
            message: format!("Duplicate question code: {}", dup.code),
        });
    }

    Ok(Catalog {
        machines,
        questions,
    })
}

/// Replaces all machines and questions and starts a new audit cycle.
///
/// Validation happens before the transaction, so malformed input leaves the database
/// untouched. Existing audits are deleted together with the old catalog; their photos
/// are removed afterwards on a best-effort basis.
pub async fn replace_catalog<P: PhotoStore>(
    db: &DatabaseConnection,
    photos: &P,
    catalog: &Catalog,
) -> Result<ImportSummary> {
    let catalog = validate_catalog(catalog)?;

    let txn = db.begin().await?;

    let orphaned_photos = crate::core::audit::all_photo_references(&txn).await?;

    PairingToken::delete_many().exec(&txn).await?;
    let discarded = Audit::delete_many().exec(&txn).await?.rows_affected;
    Machine::delete_many().exec(&txn).await?;
    Question::delete_many().exec(&txn).await?;

    let now = chrono::Utc::now();
    Machine::insert_many(catalog.machines.iter().map(|name| machine::ActiveModel {
        name: Set(name.clone()),
        audit_counter: Set(0),
        created_at: Set(now),
        ..Default::default()
    }))
    .exec(&txn)
    .await?;
    Question::insert_many(catalog.questions.iter().map(|q| question::ActiveModel {
        code: Set(q.code.clone()),
        description: Set(q.description.clone()),
        created_at: Set(now),
        ..Default::default()
    }))
    .exec(&txn)
    .await?;

    let tokens = pairing::start_new_cycle_in(&txn).await?;

    txn.commit().await?;

    remove_photos_best_effort(photos, &orphaned_photos).await;

    info!(
        "Imported {} machines and {} questions ({} audits discarded)",
        catalog.machines.len(),
        catalog.questions.len(),
        discarded
    );

    Ok(ImportSummary {
        machines: catalog.machines.len(),
        questions: catalog.questions.len(),
        tokens,
        discarded_audits: usize::try_from(discarded)?,
    })
}

/// Imports `catalog` only if the database has no machines yet.
///
/// Returns `None` when existing data was left alone.
pub async fn import_if_empty<P: PhotoStore>(
    db: &DatabaseConnection,
    photos: &P,
    catalog: &Catalog,
) -> Result<Option<ImportSummary>> {
    if Machine::find().count(db).await? > 0 {
        return Ok(None);
    }
    replace_catalog(db, photos, catalog).await.map(Some)
}

/// Produces the two-sheet document for the current catalog. Read-only.
pub async fn export_document(db: &DatabaseConnection) -> Result<TabularDocument> {
    let machines = list_machines(db).await?;
    let questions = list_questions(db).await?;

    Ok(TabularDocument {
        sheets: vec![
            Sheet {
                name: MACHINES_SHEET.to_string(),
                header: vec![MACHINES_SHEET.to_string()],
                rows: machines.into_iter().map(|m| vec![m.name]).collect(),
            },
            Sheet {
                name: QUESTIONS_SHEET.to_string(),
                header: vec!["code".to_string(), "description".to_string()],
                rows: questions
                    .into_iter()
                    .map(|q| vec![q.code, q.description])
                    .collect(),
            },
        ],
    })
}

/// All machines in import order.
pub async fn list_machines(db: &DatabaseConnection) -> Result<Vec<machine::Model>> {
    Machine::find()
        .order_by_asc(machine::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// All questions in import order.
pub async fn list_questions(db: &DatabaseConnection) -> Result<Vec<question::Model>> {
    Question::find()
        .order_by_asc(question::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a machine by ID.
pub async fn get_machine_by_id<C>(db: &C, machine_id: i64) -> Result<Option<machine::Model>>
where
    C: ConnectionTrait,
{
    Machine::find_by_id(machine_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a question by ID.
pub async fn get_question_by_id<C>(db: &C, question_id: i64) -> Result<Option<question::Model>>
where
    C: ConnectionTrait,
{
    Question::find_by_id(question_id)
        .one(db)
        .await
        .map_err(Into::into)
}
