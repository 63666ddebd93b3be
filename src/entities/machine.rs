//! Machine entity - A piece of equipment on the shop floor that gets audited.
//!
//! Machines are created by a catalog import and are never edited afterwards.
//! The `audit_counter` column hands out per-machine audit sequence numbers.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Machine database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "machines")]
pub struct Model {
    /// Unique identifier for the machine
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Machine name as it appears on the floor (e.g., "MARTIN")
    #[sea_orm(unique)]
    pub name: String,
    /// Number of audit sequence numbers handed out so far
    pub audit_counter: i64,
    /// When the machine was imported
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Machine and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One machine has many audits
    #[sea_orm(has_many = "super::audit::Entity")]
    Audits,
    /// One machine appears in many pairing tokens
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
