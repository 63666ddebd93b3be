//! Pairing token entity - One unit of audit work in the current cycle.
//!
//! A cycle holds exactly one token per (machine, question) pair, enforced by a
//! composite unique index created alongside the table. Tokens are handed out in
//! ascending `priority`, which is shuffled when the cycle is generated.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Pairing token database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pairing_tokens")]
pub struct Model {
    /// Unique identifier for the token, used as the session reference by clients
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the machine to audit
    pub machine_id: i64,
    /// ID of the question to ask
    pub question_id: i64,
    /// Random hand-out order within the cycle
    pub priority: i64,
    /// Set once an audit has been recorded against this token
    pub consumed: bool,
    /// When the cycle containing this token was generated
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `PairingToken` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each token targets one machine
    #[sea_orm(
        belongs_to = "super::machine::Entity",
        from = "Column::MachineId",
        to = "super::machine::Column::Id"
    )]
    Machine,
    /// Each token targets one question
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
