//! Audit entity - The recorded result of auditing one machine against one question.
//!
//! Each audit has a `status` (`"OK"`/`"NOK"`), a free-text description, an optional
//! photo reference and a per-machine `audit_sequence`. The `action_*` columns and
//! `resolved_at` form the corrective-action sub-record; they stay `NULL` until a
//! corrective action is submitted and are the only columns updated afterwards.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Audit database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audits")]
pub struct Model {
    /// Unique identifier for the audit
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the audited machine
    pub machine_id: i64,
    /// ID of the question that was answered
    pub question_id: i64,
    /// `"OK"` or `"NOK"`
    pub status: String,
    /// Auditor's observations
    #[sea_orm(column_type = "Text")]
    pub description: String,
    /// Reference returned by the photo store, if a photo was kept
    pub photo_path: Option<String>,
    /// Name the auditor typed in, if any
    pub auditor_name: Option<String>,
    /// 1-based ordinal of this audit among the machine's audits
    pub audit_sequence: i64,
    /// When the audit was recorded
    pub created_at: DateTimeUtc,
    /// Whether the follow-up action has been completed successfully
    pub action_completed: bool,
    /// Corrective action taken
    #[sea_orm(column_type = "Text", nullable)]
    pub action_description: Option<String>,
    /// Photo of the corrected state
    pub action_photo_path: Option<String>,
    /// When the corrective action was last submitted
    pub resolved_at: Option<DateTimeUtc>,
}

/// Defines relationships between Audit and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each audit belongs to one machine
    #[sea_orm(
        belongs_to = "super::machine::Entity",
        from = "Column::MachineId",
        to = "super::machine::Column::Id"
    )]
    Machine,
    /// Each audit answers one question
    #[sea_orm(
        belongs_to = "super::question::Entity",
        from = "Column::QuestionId",
        to = "super::question::Column::Id"
    )]
    Question,
}

impl Related<super::machine::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Machine.def()
    }
}

impl Related<super::question::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Question.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
