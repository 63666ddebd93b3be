/// Database configuration and connection management
pub mod database;

/// Machine/question catalog loading from catalog.toml
pub mod catalog;

/// Runtime settings from environment variables
pub mod settings;

pub use settings::Settings;
