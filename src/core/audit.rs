//! Audit recorder - Persists audit results and corrective actions.
//!
//! Recording an audit consumes its pairing token and inserts the audit in one database
//! transaction: either both happen or neither does. The per-machine `audit_sequence` is
//! taken from the machine's counter with an atomic increment inside that transaction, so
//! concurrent submissions for the same machine never share a sequence number.
//!
//! Photos are stored before the transaction starts and are best-effort: a failed upload
//! yields an audit without a photo and a warning on the returned [`RecordedAudit`].

use crate::{
    core::{
        pairing,
        photo::{PhotoStore, PhotoUpload, remove_photos_best_effort, store_photo_best_effort},
    },
    entities::{Audit, Machine, audit, machine},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tracing::info;

/// Outcome of an audit question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditStatus {
    /// Requirement met
    #[serde(rename = "OK")]
    Ok,
    /// Requirement not met
    #[serde(rename = "NOK")]
    Nok,
}

impl AuditStatus {
    /// Value stored in the `status` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Nok => "NOK",
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OK" => Ok(Self::Ok),
            "NOK" => Ok(Self::Nok),
            _ => Err(Error::validation(format!(
                "Status must be OK or NOK, got {s:?}"
            ))),
        }
    }
}

/// An audit result as submitted by the auditor.
#[derive(Debug, Clone)]
pub struct AuditSubmission {
    /// Pairing token the result answers
    pub token_id: i64,
    /// Raw status text (`"OK"` or `"NOK"`)
    pub status: String,
    /// Observations; required
    pub description: String,
    /// Auditor's name; blank is treated as absent
    pub auditor_name: Option<String>,
    /// Whether the follow-up is already done
    pub action_completed: bool,
    /// Optional evidence photo
    pub photo: Option<PhotoUpload>,
}

/// A corrective action for an existing audit.
#[derive(Debug, Clone)]
pub struct CorrectiveActionSubmission {
    /// Audit being corrected
    pub audit_id: i64,
    /// What was done; required
    pub description: String,
    /// Whether the problem is resolved
    pub resolved: bool,
    /// Optional photo of the corrected state
    pub photo: Option<PhotoUpload>,
}

/// A stored audit plus any photo problem that was swallowed on the way.
#[derive(Debug, Clone, Serialize)]
pub struct RecordedAudit {
    /// The persisted audit
    pub audit: audit::Model,
    /// Set when a photo was supplied but could not be stored
    pub photo_warning: Option<String>,
}

/// Records an audit result against an open pairing token.
///
/// # Errors
/// - [`Error::Validation`] for a bad status or empty description
/// - [`Error::InvalidOrAlreadyUsed`] if the token is unknown or already consumed
/// - [`Error::Database`] if the write fails; nothing is persisted in that case
pub async fn record_audit<P: PhotoStore>(
    db: &DatabaseConnection,
    photos: &P,
    submission: AuditSubmission,
) -> Result<RecordedAudit> {
    let status: AuditStatus = submission.status.parse()?;
    let description = submission.description.trim().to_string();
    if description.is_empty() {
        return Err(Error::validation("Description cannot be empty"));
    }
    let auditor_name = submission
        .auditor_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());

    // Fail fast before touching the photo store; the transaction re-checks atomically.
    let token_id = submission.token_id;
    match pairing::get_token_by_id(db, token_id).await? {
        Some(token) if !token.consumed => {}
        _ => return Err(Error::InvalidOrAlreadyUsed { token_id }),
    }

    let photo = store_photo_best_effort(photos, submission.photo).await;

    let result = insert_audit(
        db,
        NewAudit {
            token_id,
            status,
            description,
            auditor_name,
            action_completed: submission.action_completed,
            photo_path: photo.reference.clone(),
        },
    )
    .await;

    match result {
        Ok(audit) => {
            info!(
                "Recorded audit {} ({}) for machine {} with sequence {}",
                audit.id, audit.status, audit.machine_id, audit.audit_sequence
            );
            Ok(RecordedAudit {
                audit,
                photo_warning: photo.warning,
            })
        }
        Err(e) => {
            if let Some(reference) = photo.reference {
                remove_photos_best_effort(photos, &[reference]).await;
            }
            Err(e)
        }
    }
}

struct NewAudit {
    token_id: i64,
    status: AuditStatus,
    description: String,
    auditor_name: Option<String>,
    action_completed: bool,
    photo_path: Option<String>,
}

/// Consumes the token, bumps the machine counter and inserts the audit in one transaction.
async fn insert_audit(db: &DatabaseConnection, new: NewAudit) -> Result<audit::Model> {
    let txn = db.begin().await?;

    pairing::consume(&txn, new.token_id).await?;
    let token = pairing::get_token_by_id(&txn, new.token_id)
        .await?
        .ok_or(Error::InvalidOrAlreadyUsed {
            token_id: new.token_id,
        })?;

    let audit_sequence = next_audit_sequence(&txn, token.machine_id).await?;

    let audit = audit::ActiveModel {
        machine_id: Set(token.machine_id),
        question_id: Set(token.question_id),
        status: Set(new.status.as_str().to_string()),
        description: Set(new.description),
        photo_path: Set(new.photo_path),
        auditor_name: Set(new.auditor_name),
        audit_sequence: Set(audit_sequence),
        created_at: Set(chrono::Utc::now()),
        action_completed: Set(new.action_completed),
        action_description: Set(None),
        action_photo_path: Set(None),
        resolved_at: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    Ok(audit)
}

/// Atomically increments the machine's audit counter and returns the new value.
///
/// Uses `UPDATE machines SET audit_counter = audit_counter + 1` rather than reading
/// and writing back, so two transactions cannot hand out the same number.
pub async fn next_audit_sequence<C>(db: &C, machine_id: i64) -> Result<i64>
where
    C: ConnectionTrait,
{
    let updated = Machine::update_many()
        .col_expr(
            machine::Column::AuditCounter,
            Expr::col(machine::Column::AuditCounter).add(1),
        )
        .filter(machine::Column::Id.eq(machine_id))
        .exec(db)
        .await?;
    if updated.rows_affected == 0 {
        return Err(Error::not_found("machine", machine_id));
    }

    Machine::find_by_id(machine_id)
        .one(db)
        .await?
        .map(|m| m.audit_counter)
        .ok_or_else(|| Error::not_found("machine", machine_id))
}

/// Attaches (or replaces) the corrective action on an audit.
///
/// Overwrites any previous corrective action; the resolution timestamp is set to now.
/// A replaced action photo is removed from the photo store.
pub async fn record_corrective_action<P: PhotoStore>(
    db: &DatabaseConnection,
    photos: &P,
    submission: CorrectiveActionSubmission,
) -> Result<RecordedAudit> {
    let description = submission.description.trim().to_string();
    if description.is_empty() {
        return Err(Error::validation("Corrective action description cannot be empty"));
    }

    let audit_id = submission.audit_id;
    if get_audit_by_id(db, audit_id).await?.is_none() {
        return Err(Error::not_found("audit", audit_id));
    }

    let photo = store_photo_best_effort(photos, submission.photo).await;

    let (audit, previous_photo) = match update_corrective_action(
        db,
        audit_id,
        description,
        submission.resolved,
        photo.reference.clone(),
    )
    .await
    {
        Ok(updated) => updated,
        Err(e) => {
            if let Some(reference) = photo.reference {
                remove_photos_best_effort(photos, &[reference]).await;
            }
            return Err(e);
        }
    };

    if let Some(old) = previous_photo.filter(|old| Some(old) != audit.action_photo_path.as_ref()) {
        remove_photos_best_effort(photos, &[old]).await;
    }

    info!(
        "Recorded corrective action for audit {} (resolved: {})",
        audit.id, audit.action_completed
    );

    Ok(RecordedAudit {
        audit,
        photo_warning: photo.warning,
    })
}

/// Re-reads the audit and writes the action fields in one transaction.
///
/// Returns the updated audit and the action photo it replaced.
async fn update_corrective_action(
    db: &DatabaseConnection,
    audit_id: i64,
    description: String,
    resolved: bool,
    photo_path: Option<String>,
) -> Result<(audit::Model, Option<String>)> {
    let txn = db.begin().await?;

    let existing = Audit::find_by_id(audit_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("audit", audit_id))?;
    let previous_photo = existing.action_photo_path.clone();

    let mut active: audit::ActiveModel = existing.into();
    active.action_description = Set(Some(description));
    active.action_photo_path = Set(photo_path);
    active.action_completed = Set(resolved);
    active.resolved_at = Set(Some(chrono::Utc::now()));

    let audit = active.update(&txn).await.map_err(|e| match e {
        DbErr::RecordNotUpdated => Error::not_found("audit", audit_id),
        other => other.into(),
    })?;

    txn.commit().await?;
    Ok((audit, previous_photo))
}

/// Finds an audit by ID.
pub async fn get_audit_by_id(
    db: &DatabaseConnection,
    audit_id: i64,
) -> Result<Option<audit::Model>> {
    Audit::find_by_id(audit_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Latest audit recorded for a machine/question pair.
pub async fn latest_audit_for_pair(
    db: &DatabaseConnection,
    machine_id: i64,
    question_id: i64,
) -> Result<Option<audit::Model>> {
    Audit::find()
        .filter(audit::Column::MachineId.eq(machine_id))
        .filter(audit::Column::QuestionId.eq(question_id))
        .order_by_desc(audit::Column::CreatedAt)
        .order_by_desc(audit::Column::Id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// The `limit` most recent audits, newest first.
pub async fn recent_audits(db: &DatabaseConnection, limit: u64) -> Result<Vec<audit::Model>> {
    Audit::find()
        .order_by_desc(audit::Column::CreatedAt)
        .order_by_desc(audit::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Every photo reference held by any audit, evidence and action photos alike.
pub async fn all_photo_references<C>(db: &C) -> Result<Vec<String>>
where
    C: ConnectionTrait,
{
    let rows: Vec<(Option<String>, Option<String>)> = Audit::find()
        .select_only()
        .column(audit::Column::PhotoPath)
        .column(audit::Column::ActionPhotoPath)
        .into_tuple()
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .flat_map(|(photo, action_photo)| photo.into_iter().chain(action_photo))
        .collect())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::PairingToken;
    use crate::test_utils::*;

    fn submission(token_id: i64, status: &str, description: &str) -> AuditSubmission {
        AuditSubmission {
            token_id,
            status: status.to_string(),
            description: description.to_string(),
            auditor_name: Some("Jan".to_string()),
            action_completed: false,
            photo: None,
        }
    }

    fn photo() -> PhotoUpload {
        PhotoUpload {
            bytes: vec![1, 2, 3],
            filename: "brud.jpg".to_string(),
        }
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("OK".parse::<AuditStatus>().unwrap(), AuditStatus::Ok);
        assert_eq!(" nok ".parse::<AuditStatus>().unwrap(), AuditStatus::Nok);
        assert!(matches!(
            "MAYBE".parse::<AuditStatus>(),
            Err(Error::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_record_audit_validation() -> Result<()> {
        let db = setup_with_catalog().await?;
        let token = pairing::next_pair(&db).await?.unwrap();

        let result = record_audit(&db, &NoopPhotoStore, submission(token.id, "", "opis")).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result =
            record_audit(&db, &NoopPhotoStore, submission(token.id, "OK", "   ")).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        // Rejected input leaves the token open and writes nothing
        assert!(!pairing::get_token_by_id(&db, token.id).await?.unwrap().consumed);
        assert_eq!(Audit::find().count(&db).await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_record_audit_sequence_per_machine() -> Result<()> {
        let db = setup_with_catalog().await?;
        let machine = machine_by_name(&db, "A").await?;
        let tokens = open_tokens_for_machine(&db, machine.id).await?;

        let first = record_audit(
            &db,
            &NoopPhotoStore,
            submission(tokens[0].id, "NOK", "maszyna zabrudzona"),
        )
        .await?;
        assert_eq!(first.audit.audit_sequence, 1);
        assert_eq!(first.audit.status, "NOK");
        assert_eq!(first.audit.machine_id, machine.id);
        assert!(first.audit.photo_path.is_none());

        let second =
            record_audit(&db, &NoopPhotoStore, submission(tokens[1].id, "OK", "czysto")).await?;
        assert_eq!(second.audit.audit_sequence, 2);
        assert_ne!(second.audit.question_id, first.audit.question_id);

        // Another machine starts its own sequence
        let other = machine_by_name(&db, "B").await?;
        let other_tokens = open_tokens_for_machine(&db, other.id).await?;
        let third =
            record_audit(&db, &NoopPhotoStore, submission(other_tokens[0].id, "OK", "ok")).await?;
        assert_eq!(third.audit.audit_sequence, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_sequence_continues_across_cycles() -> Result<()> {
        let db = setup_with_catalog().await?;
        let machine = machine_by_name(&db, "A").await?;

        for expected in 1..=4 {
            let token = open_tokens_for_machine(&db, machine.id).await?.into_iter().next();
            let token = match token {
                Some(token) => token,
                None => {
                    crate::core::pairing::start_new_cycle(&db).await?;
                    open_tokens_for_machine(&db, machine.id).await?.remove(0)
                }
            };
            let recorded =
                record_audit(&db, &NoopPhotoStore, submission(token.id, "OK", "ok")).await?;
            assert_eq!(recorded.audit.audit_sequence, expected);
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_record_audit_rejects_used_token() -> Result<()> {
        let db = setup_with_catalog().await?;
        let token = crate::core::pairing::next_pair(&db).await?.unwrap();

        record_audit(&db, &NoopPhotoStore, submission(token.id, "OK", "ok")).await?;
        let replay = record_audit(&db, &NoopPhotoStore, submission(token.id, "OK", "ok")).await;
        assert!(matches!(replay, Err(Error::InvalidOrAlreadyUsed { .. })));

        let audits = Audit::find().count(&db).await?;
        assert_eq!(audits, 1);

        let unknown = record_audit(&db, &NoopPhotoStore, submission(4242, "OK", "ok")).await;
        assert!(matches!(
            unknown,
            Err(Error::InvalidOrAlreadyUsed { token_id: 4242 })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_submissions_have_one_winner() -> Result<()> {
        let db = setup_with_catalog().await?;
        let token = crate::core::pairing::next_pair(&db).await?.unwrap();

        let (a, b) = tokio::join!(
            record_audit(&db, &NoopPhotoStore, submission(token.id, "OK", "pierwszy")),
            record_audit(&db, &NoopPhotoStore, submission(token.id, "NOK", "drugi")),
        );
        assert_eq!(usize::from(a.is_ok()) + usize::from(b.is_ok()), 1);
        assert!(matches!(
            a.err().or(b.err()),
            Some(Error::InvalidOrAlreadyUsed { .. })
        ));

        let audits = Audit::find()
            .filter(audit::Column::MachineId.eq(token.machine_id))
            .count(&db)
            .await?;
        assert_eq!(audits, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_failed_photo_does_not_block_audit() -> Result<()> {
        let db = setup_with_catalog().await?;
        let token = crate::core::pairing::next_pair(&db).await?.unwrap();

        let mut with_photo = submission(token.id, "NOK", "brak oznaczeń");
        with_photo.photo = Some(photo());
        let recorded = record_audit(&db, &FailingPhotoStore, with_photo).await?;

        assert!(recorded.audit.photo_path.is_none());
        assert!(recorded.photo_warning.is_some());
        let stored = PairingToken::find_by_id(token.id).one(&db).await?.unwrap();
        assert!(stored.consumed);

        Ok(())
    }

    #[tokio::test]
    async fn test_photo_reference_is_saved() -> Result<()> {
        let db = setup_with_catalog().await?;
        let dir = tempfile::tempdir()?;
        let store = crate::core::photo::LocalPhotoStore::new(dir.path());
        let token = crate::core::pairing::next_pair(&db).await?.unwrap();

        let mut with_photo = submission(token.id, "NOK", "rozlany olej");
        with_photo.photo = Some(photo());
        let recorded = record_audit(&db, &store, with_photo).await?;

        let reference = recorded.audit.photo_path.unwrap();
        assert!(reference.starts_with("uploads/"));
        assert_eq!(store.size(&reference).await?, Some(3));
        assert!(recorded.photo_warning.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_blank_auditor_name_is_dropped() -> Result<()> {
        let db = setup_with_catalog().await?;
        let token = crate::core::pairing::next_pair(&db).await?.unwrap();

        let mut anonymous = submission(token.id, "OK", "ok");
        anonymous.auditor_name = Some("  ".to_string());
        let recorded = record_audit(&db, &NoopPhotoStore, anonymous).await?;
        assert!(recorded.audit.auditor_name.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_corrective_action_overwrites_previous() -> Result<()> {
        let db = setup_with_catalog().await?;
        let recorded = record_test_audit(&db, "NOK").await?;
        assert!(recorded.action_description.is_none());
        assert!(recorded.resolved_at.is_none());

        let first = record_corrective_action(
            &db,
            &NoopPhotoStore,
            CorrectiveActionSubmission {
                audit_id: recorded.id,
                description: "posprzątano".to_string(),
                resolved: false,
                photo: None,
            },
        )
        .await?;
        let first_time = first.audit.resolved_at.unwrap();

        let second = record_corrective_action(
            &db,
            &NoopPhotoStore,
            CorrectiveActionSubmission {
                audit_id: recorded.id,
                description: "wymieniono uszczelkę".to_string(),
                resolved: true,
                photo: None,
            },
        )
        .await?;

        let stored = get_audit_by_id(&db, recorded.id).await?.unwrap();
        assert_eq!(stored.action_description.as_deref(), Some("wymieniono uszczelkę"));
        assert!(stored.action_completed);
        assert!(stored.resolved_at.unwrap() >= first_time);
        assert_eq!(second.audit.action_description, stored.action_description);
        // Original result is untouched
        assert_eq!(stored.status, "NOK");
        assert_eq!(stored.audit_sequence, recorded.audit_sequence);

        Ok(())
    }

    #[tokio::test]
    async fn test_corrective_action_replaces_photo() -> Result<()> {
        let db = setup_with_catalog().await?;
        let dir = tempfile::tempdir()?;
        let store = crate::core::photo::LocalPhotoStore::new(dir.path());
        let recorded = record_test_audit(&db, "NOK").await?;

        let action = |description: &str| CorrectiveActionSubmission {
            audit_id: recorded.id,
            description: description.to_string(),
            resolved: true,
            photo: Some(photo()),
        };

        let first = record_corrective_action(&db, &store, action("pierwsza")).await?;
        let first_photo = first.audit.action_photo_path.unwrap();
        let second = record_corrective_action(&db, &store, action("druga")).await?;
        let second_photo = second.audit.action_photo_path.unwrap();

        assert_ne!(first_photo, second_photo);
        assert_eq!(store.size(&first_photo).await?, None);
        assert_eq!(store.size(&second_photo).await?, Some(3));

        Ok(())
    }

    #[tokio::test]
    async fn test_corrective_action_errors() -> Result<()> {
        let db = setup_with_catalog().await?;

        let missing = record_corrective_action(
            &db,
            &NoopPhotoStore,
            CorrectiveActionSubmission {
                audit_id: 777,
                description: "naprawiono".to_string(),
                resolved: true,
                photo: None,
            },
        )
        .await;
        assert!(matches!(missing, Err(Error::NotFound { entity: "audit", .. })));

        let recorded = record_test_audit(&db, "NOK").await?;
        let blank = record_corrective_action(
            &db,
            &NoopPhotoStore,
            CorrectiveActionSubmission {
                audit_id: recorded.id,
                description: " ".to_string(),
                resolved: true,
                photo: None,
            },
        )
        .await;
        assert!(matches!(blank, Err(Error::Validation { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_failed_insert_rolls_back_token_and_counter() -> Result<()> {
        let db = setup_with_catalog().await?;
        let dir = tempfile::tempdir()?;
        let store = crate::core::photo::LocalPhotoStore::new(dir.path());
        let token = pairing::next_pair(&db).await?.unwrap();

        db.execute_unprepared("DROP TABLE audits").await?;

        let mut failing = submission(token.id, "NOK", "wyciek oleju");
        failing.photo = Some(photo());
        let result = record_audit(&db, &store, failing).await;
        assert!(matches!(result, Err(Error::Database(_))));

        let token = pairing::get_token_by_id(&db, token.id).await?.unwrap();
        assert!(!token.consumed);
        let machine = Machine::find_by_id(token.machine_id).one(&db).await?.unwrap();
        assert_eq!(machine.audit_counter, 0);
        // The photo stored for the failed audit is cleaned up
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_corrective_action_on_vanished_audit() -> Result<()> {
        let db = setup_with_catalog().await?;
        let recorded = record_test_audit(&db, "NOK").await?;
        Audit::delete_by_id(recorded.id).exec(&db).await?;

        let result =
            update_corrective_action(&db, recorded.id, "naprawiono".to_string(), true, None)
                .await;
        assert!(matches!(result, Err(Error::NotFound { entity: "audit", .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_photo_references_read_inside_transaction() -> Result<()> {
        let db = setup_with_catalog().await?;
        let recorded = record_test_audit(&db, "NOK").await?;

        let txn = db.begin().await?;
        let mut active: audit::ActiveModel = recorded.into();
        active.photo_path = Set(Some("uploads/nowe.jpg".to_string()));
        active.update(&txn).await?;

        // The transaction sees its own uncommitted reference
        let references = all_photo_references(&txn).await?;
        assert_eq!(references, vec!["uploads/nowe.jpg".to_string()]);
        txn.rollback().await?;

        assert!(all_photo_references(&db).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_latest_audit_for_pair() -> Result<()> {
        let db = setup_with_catalog().await?;
        let recorded = record_test_audit(&db, "OK").await?;

        let latest = latest_audit_for_pair(&db, recorded.machine_id, recorded.question_id)
            .await?
            .unwrap();
        assert_eq!(latest.id, recorded.id);

        let none = latest_audit_for_pair(&db, recorded.machine_id, 9999).await?;
        assert!(none.is_none());

        assert_eq!(recent_audits(&db, 10).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_next_audit_sequence_unknown_machine() -> Result<()> {
        let db = setup_test_db().await?;
        assert!(matches!(
            next_audit_sequence(&db, 1).await,
            Err(Error::NotFound { .. })
        ));
        Ok(())
    }
}
