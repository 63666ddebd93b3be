//! Database configuration module.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs. The one constraint the entity macros
//! cannot express, the composite `(machine_id, question_id)` uniqueness on pairing tokens,
//! is added as a separate index.

use crate::entities::{Audit, Machine, PairingToken, Question, pairing_token};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};

/// Default database location used when `DATABASE_URL` is not set.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/audit_5s.sqlite?mode=rwc";

/// Establishes a connection to the database at `database_url`.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    Database::connect(database_url).await.map_err(Into::into)
}

/// Creates all tables and indexes if they do not exist yet.
///
/// Parent tables are created before the tables that reference them so the foreign keys
/// generated from the `belongs_to` relations resolve.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let machine_table = schema.create_table_from_entity(Machine).if_not_exists().to_owned();
    let question_table = schema.create_table_from_entity(Question).if_not_exists().to_owned();
    let audit_table = schema.create_table_from_entity(Audit).if_not_exists().to_owned();
    let token_table = schema
        .create_table_from_entity(PairingToken)
        .if_not_exists()
        .to_owned();

    db.execute(builder.build(&machine_table)).await?;
    db.execute(builder.build(&question_table)).await?;
    db.execute(builder.build(&audit_table)).await?;
    db.execute(builder.build(&token_table)).await?;

    let unique_pair = Index::create()
        .name("idx_pairing_tokens_machine_question")
        .table(PairingToken)
        .col(pairing_token::Column::MachineId)
        .col(pairing_token::Column::QuestionId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&unique_pair)).await?;

    Ok(())
}
