//! Administrative full reset.
//!
//! Deletes every audit, every pairing token and every audit photo, zeroes the per-machine
//! sequence counters and starts a fresh cycle. Machines and questions are kept. The
//! operation is irreversible and gated by a passphrase from the settings.

use crate::{
    core::{
        audit::all_photo_references,
        pairing,
        photo::{PhotoStore, remove_photos_best_effort},
    },
    entities::{Audit, Machine, PairingToken, machine},
    errors::{Error, Result},
};
use sea_orm::{TransactionTrait, prelude::*, sea_query::Expr};
use serde::Serialize;
use tracing::{info, warn};

/// What a full reset removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResetSummary {
    /// Audits deleted
    pub audits_deleted: u64,
    /// Photos removed from the store
    pub photos_removed: usize,
    /// Tokens in the new cycle
    pub tokens_created: usize,
}

/// Checks `given` against the configured passphrase.
///
/// With no passphrase configured the reset is disabled entirely.
pub fn authorize(given: &str, configured: Option<&str>) -> Result<()> {
    let Some(expected) = configured else {
        return Err(Error::Unauthorized {
            message: "Reset is disabled: no admin passphrase configured".to_string(),
        });
    };

    if given == expected {
        Ok(())
    } else {
        warn!("Rejected admin reset with wrong passphrase");
        Err(Error::Unauthorized {
            message: "Wrong passphrase".to_string(),
        })
    }
}

/// Wipes all audit data and starts a new cycle.
pub async fn reset_everything<P: PhotoStore>(
    db: &DatabaseConnection,
    photos: &P,
    passphrase: &str,
    configured: Option<&str>,
) -> Result<ResetSummary> {
    authorize(passphrase, configured)?;

    let txn = db.begin().await?;
    let references = all_photo_references(&txn).await?;
    PairingToken::delete_many().exec(&txn).await?;
    let audits_deleted = Audit::delete_many().exec(&txn).await?.rows_affected;
    Machine::update_many()
        .col_expr(machine::Column::AuditCounter, Expr::value(0_i64))
        .exec(&txn)
        .await?;
    let tokens_created = pairing::start_new_cycle_in(&txn).await?;
    txn.commit().await?;

    let photos_removed = remove_photos_best_effort(photos, &references).await;

    info!(
        "Full reset: {} audits and {} photos deleted, {} tokens in new cycle",
        audits_deleted, photos_removed, tokens_created
    );

    Ok(ResetSummary {
        audits_deleted,
        photos_removed,
        tokens_created,
    })
}
