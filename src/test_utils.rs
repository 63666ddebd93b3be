//! Shared test utilities.
//!
//! This module provides common helper functions for setting up test databases,
//! loading small catalogs and recording audits with sensible defaults.

use crate::{
    config::catalog::{Catalog, QuestionSpec},
    core::{
        audit::{AuditSubmission, record_audit},
        catalog::replace_catalog,
        pairing,
        photo::{PhotoStore, PhotoUpload},
    },
    entities::{self, Machine, PairingToken, machine, pairing_token, question},
    errors::{Error, Result},
};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Photo store that accepts everything and keeps nothing.
pub struct NoopPhotoStore;

impl PhotoStore for NoopPhotoStore {
    async fn store(&self, upload: PhotoUpload) -> Result<String> {
        Ok(format!("uploads/{}", upload.filename))
    }

    async fn remove(&self, _reference: &str) -> Result<()> {
        Ok(())
    }

    async fn size(&self, _reference: &str) -> Result<Option<u64>> {
        Ok(None)
    }
}

/// Photo store whose uploads always fail.
pub struct FailingPhotoStore;

impl PhotoStore for FailingPhotoStore {
    async fn store(&self, _upload: PhotoUpload) -> Result<String> {
        Err(Error::ExternalService {
            message: "upload service unavailable".to_string(),
        })
    }

    async fn remove(&self, _reference: &str) -> Result<()> {
        Ok(())
    }

    async fn size(&self, _reference: &str) -> Result<Option<u64>> {
        Ok(None)
    }
}

/// Two machines (A, B) and two questions (X, Y).
pub fn small_catalog() -> Catalog {
    Catalog {
        machines: vec!["A".to_string(), "B".to_string()],
        questions: vec![
            QuestionSpec::new("X", "Czy stanowisko jest czyste?"),
            QuestionSpec::new("Y", "Czy narzędzia są na miejscu?"),
        ],
    }
}

/// Database loaded with [`small_catalog`] and a fresh 4-token cycle.
pub async fn setup_with_catalog() -> Result<DatabaseConnection> {
    let db = setup_test_db().await?;
    replace_catalog(&db, &NoopPhotoStore, &small_catalog()).await?;
    Ok(db)
}

/// Inserts machines and questions directly, without starting a cycle.
pub async fn create_catalog(
    db: &DatabaseConnection,
    machines: &[&str],
    questions: &[&str],
) -> Result<()> {
    let now = chrono::Utc::now();
    for name in machines {
        machine::ActiveModel {
            name: Set((*name).to_string()),
            audit_counter: Set(0),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }
    for code in questions {
        question::ActiveModel {
            code: Set((*code).to_string()),
            description: Set(format!("Pytanie {code}")),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

/// Looks up a machine that the test knows exists.
pub async fn machine_by_name(db: &DatabaseConnection, name: &str) -> Result<machine::Model> {
    Machine::find()
        .filter(machine::Column::Name.eq(name))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("machine", name))
}

/// Unconsumed tokens for one machine.
pub async fn open_tokens_for_machine(
    db: &DatabaseConnection,
    machine_id: i64,
) -> Result<Vec<entities::pairing_token::Model>> {
    PairingToken::find()
        .filter(pairing_token::Column::MachineId.eq(machine_id))
        .filter(pairing_token::Column::Consumed.eq(false))
        .all(db)
        .await
        .map_err(Into::into)
}

/// Records an audit on the next open token with default fields.
pub async fn record_test_audit(
    db: &DatabaseConnection,
    status: &str,
) -> Result<entities::audit::Model> {
    let token = match pairing::next_pair(db).await? {
        Some(token) => token,
        None => {
            pairing::start_new_cycle(db).await?;
            pairing::next_pair(db)
                .await?
                .ok_or_else(|| Error::validation("no pairs available"))?
        }
    };
    submit(db, token.id, status).await
}

/// Records an audit for a specific machine, starting a new cycle when its tokens run out.
pub async fn record_audit_for_machine(
    db: &DatabaseConnection,
    machine_id: i64,
) -> Result<entities::audit::Model> {
    let mut open = open_tokens_for_machine(db, machine_id).await?;
    if open.is_empty() {
        pairing::start_new_cycle(db).await?;
        open = open_tokens_for_machine(db, machine_id).await?;
    }
    let token = open
        .pop()
        .ok_or_else(|| Error::not_found("pairing token", machine_id))?;
    submit(db, token.id, "OK").await
}

async fn submit(
    db: &DatabaseConnection,
    token_id: i64,
    status: &str,
) -> Result<entities::audit::Model> {
    let recorded = record_audit(
        db,
        &NoopPhotoStore,
        AuditSubmission {
            token_id,
            status: status.to_string(),
            description: "Test audit".to_string(),
            auditor_name: Some("test_auditor".to_string()),
            action_completed: false,
            photo: None,
        },
    )
    .await?;
    Ok(recorded.audit)
}
