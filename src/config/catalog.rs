//! Catalog configuration loading from catalog.toml
//!
//! The catalog is the list of machines and checklist questions the audit cycles are
//! built from. It can be seeded from a TOML file on first start, and the same
//! [`Catalog`] type is what every import path (file, two-sheet document) produces
//! before it reaches the database.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Machines and questions to load into the database
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Catalog {
    /// Machine names, in import order
    pub machines: Vec<String>,
    /// Checklist questions, in import order
    pub questions: Vec<QuestionSpec>,
}

/// A single checklist question as it appears in import data
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct QuestionSpec {
    /// Short question code, unique within the catalog
    pub code: String,
    /// Question text
    pub description: String,
}

impl QuestionSpec {
    /// Creates a question spec from borrowed strings.
    pub fn new(code: &str, description: &str) -> Self {
        Self {
            code: code.to_string(),
            description: description.to_string(),
        }
    }
}

/// Loads a catalog from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing
pub fn load_catalog<P: AsRef<Path>>(path: P) -> Result<Catalog> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read catalog file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse catalog file: {e}"),
    })
}

/// Built-in sample catalog for trying the system without an import file.
#[must_use]
pub fn sample_catalog() -> Catalog {
    Catalog {
        machines: ["MARTIN", "JUMBO", "DOMINO", "HEIDELBERG", "KOLBUS"]
            .into_iter()
            .map(String::from)
            .collect(),
        questions: vec![
            QuestionSpec::new("5S-01", "Czy miejsce pracy jest czyste i uporządkowane?"),
            QuestionSpec::new("5S-02", "Czy wszystkie narzędzia są na swoich miejscach?"),
            QuestionSpec::new("5S-03", "Czy na stanowisku nie ma niepotrzebnych przedmiotów?"),
            QuestionSpec::new("5S-04", "Czy instrukcje są widoczne i aktualne?"),
            QuestionSpec::new("5S-05", "Czy maszyna jest czysta i sprawna?"),
            QuestionSpec::new("5S-06", "Czy przestrzegane są zasady bezpieczeństwa?"),
            QuestionSpec::new("5S-07", "Czy oznaczenia są czytelne i kompletne?"),
        ],
    }
}
