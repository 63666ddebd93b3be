//! Multipart form reading for audit submissions.

use crate::{
    core::photo::PhotoUpload,
    errors::{Error, Result},
};
use axum::extract::Multipart;
use std::collections::HashMap;

/// Text fields and file fields of a multipart submission.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, PhotoUpload>,
}

impl FormData {
    /// Drains `multipart` into memory.
    ///
    /// File fields with an empty filename or no content are treated as "no file", which
    /// is what browsers send for an untouched file input.
    pub async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let bytes = field.bytes().await.map_err(bad_form)?;
                    if !filename.is_empty() && !bytes.is_empty() {
                        form.files.insert(
                            name,
                            PhotoUpload {
                                bytes: bytes.to_vec(),
                                filename,
                            },
                        );
                    }
                }
                None => {
                    let value = field.text().await.map_err(bad_form)?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    /// Text value of a field, if present.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Text value of a required field.
    pub fn required(&self, name: &str) -> Result<&str> {
        self.text(name)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::validation(format!("Field '{name}' is required")))
    }

    /// Integer value of a required field.
    pub fn required_i64(&self, name: &str) -> Result<i64> {
        let raw = self.required(name)?;
        raw.trim()
            .parse()
            .map_err(|_| Error::validation(format!("Field '{name}' must be a number")))
    }

    /// Checkbox-style boolean; absent means `false`.
    pub fn flag(&self, name: &str) -> bool {
        self.text(name).is_some_and(|v| {
            matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "on" | "yes"
            )
        })
    }

    /// Takes an uploaded file out of the form.
    pub fn take_file(&mut self, name: &str) -> Option<PhotoUpload> {
        self.files.remove(name)
    }
}

fn bad_form(e: axum::extract::multipart::MultipartError) -> Error {
    Error::validation(format!("Malformed form data: {}", e.body_text()))
}
