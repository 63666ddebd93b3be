//! Question entity - One checklist item of the 5S audit.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Question database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "questions")]
pub struct Model {
    /// Unique identifier for the question
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Short question code (e.g., "5S-01")
    #[sea_orm(unique)]
    pub code: String,
    /// Full question text shown to the auditor
    #[sea_orm(column_type = "Text")]
    pub description: String,
    /// When the question was imported
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Question and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One question has many audits
    #[sea_orm(has_many = "super::audit::Entity")]
    Audits,
    /// One question appears in many pairing tokens
    #[sea_orm(has_many = "super::pairing_token::Entity")]
    PairingTokens,
}

impl Related<super::audit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Audits.def()
    }
}

impl Related<super::pairing_token::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PairingTokens.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
