//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod audit;
pub mod machine;
pub mod pairing_token;
pub mod question;

// Re-export specific types to avoid conflicts
pub use audit::{Column as AuditColumn, Entity as Audit, Model as AuditModel};
pub use machine::{Column as MachineColumn, Entity as Machine, Model as MachineModel};
pub use pairing_token::{
    Column as PairingTokenColumn, Entity as PairingToken, Model as PairingTokenModel,
};
pub use question::{Column as QuestionColumn, Entity as Question, Model as QuestionModel};
