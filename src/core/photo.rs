//! Photo storage for audit evidence.
//!
//! The recorder only needs three things from a photo backend: store bytes and get back
//! an opaque reference, remove a reference, and report the stored size. [`PhotoStore`]
//! captures that contract; [`LocalPhotoStore`] implements it on the local filesystem.
//!
//! Photo failures never fail an audit. [`store_photo_best_effort`] is the single place
//! where a store error is turned into "no photo" plus a logged warning.

use crate::{
    entities::{Audit, audit},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, QuerySelect, prelude::*};
use serde::Serialize;
use std::{
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, warn};

/// Extensions accepted as-is.
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// Extensions accepted only when a transcoder to JPEG is configured.
pub const TRANSCODED_EXTENSIONS: [&str; 2] = ["heic", "heif"];

/// Converts HEIC/HEIF bytes to JPEG bytes.
pub type Transcode = Arc<dyn Fn(&[u8]) -> Result<Vec<u8>> + Send + Sync>;

/// Raw photo as received from the client.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    /// File contents
    pub bytes: Vec<u8>,
    /// Client-supplied filename, used for the extension and as a name hint
    pub filename: String,
}

/// Photo backend used by the audit recorder.
pub trait PhotoStore: Send + Sync {
    /// Persists the upload and returns a reference to store on the audit.
    fn store(&self, upload: PhotoUpload) -> impl Future<Output = Result<String>> + Send;

    /// Deletes a previously stored photo. Unknown references are not an error.
    fn remove(&self, reference: &str) -> impl Future<Output = Result<()>> + Send;

    /// Size in bytes of a stored photo, or `None` if it no longer exists.
    fn size(&self, reference: &str) -> impl Future<Output = Result<Option<u64>>> + Send;
}

/// Result of a best-effort photo store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoOutcome {
    /// Reference to put on the record, `None` if no photo is kept
    pub reference: Option<String>,
    /// Why the photo was dropped, if it was
    pub warning: Option<String>,
}

/// Stores `upload` if there is one, downgrading any failure to "no photo".
pub async fn store_photo_best_effort<P: PhotoStore>(
    store: &P,
    upload: Option<PhotoUpload>,
) -> PhotoOutcome {
    let Some(upload) = upload else {
        return PhotoOutcome::default();
    };

    let filename = upload.filename.clone();
    match store.store(upload).await {
        Ok(reference) => {
            debug!("Stored photo {} as {}", filename, reference);
            PhotoOutcome {
                reference: Some(reference),
                warning: None,
            }
        }
        Err(e) => {
            warn!("Photo {} not saved, continuing without it: {}", filename, e);
            PhotoOutcome {
                reference: None,
                warning: Some(e.to_string()),
            }
        }
    }
}

/// Removes every reference, logging failures instead of returning them.
pub async fn remove_photos_best_effort<P: PhotoStore>(store: &P, references: &[String]) -> usize {
    let mut removed = 0;
    for reference in references {
        match store.remove(reference).await {
            Ok(()) => removed += 1,
            Err(e) => warn!("Could not remove photo {}: {}", reference, e),
        }
    }
    removed
}

/// Photo store writing into a local directory.
///
/// References have the form `<public_prefix>/<file name>`, e.g. `uploads/20240101_120000_000000_a.jpg`.
#[derive(Clone)]
pub struct LocalPhotoStore {
    root: PathBuf,
    public_prefix: String,
    transcoder: Option<Transcode>,
}

impl std::fmt::Debug for LocalPhotoStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalPhotoStore")
            .field("root", &self.root)
            .field("public_prefix", &self.public_prefix)
            .field("transcoder", &self.transcoder.is_some())
            .finish()
    }
}

impl LocalPhotoStore {
    /// Creates a store rooted at `root` that hands out `uploads/...` references.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            public_prefix: "uploads".to_string(),
            transcoder: None,
        }
    }

    /// Enables HEIC/HEIF uploads, converting them with `transcoder`.
    #[must_use]
    pub fn with_transcoder(mut self, transcoder: Transcode) -> Self {
        self.transcoder = Some(transcoder);
        self
    }

    /// Directory photos are written to.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the upload directory and checks that it is writable.
    pub async fn ensure_ready(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        let probe = self.root.join(".write_test");
        tokio::fs::write(&probe, b"ok").await?;
        tokio::fs::remove_file(&probe).await?;
        Ok(())
    }

    /// Reads a stored photo back; `None` if the file is gone.
    pub async fn read(&self, reference: &str) -> Result<Option<Vec<u8>>> {
        let path = self.resolve(reference)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn resolve(&self, reference: &str) -> Result<PathBuf> {
        let name = reference
            .strip_prefix(&self.public_prefix)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(reference);

        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(Error::ExternalService {
                message: format!("Invalid photo reference {reference:?}"),
            });
        }
        Ok(self.root.join(name))
    }
}

impl PhotoStore for LocalPhotoStore {
    async fn store(&self, upload: PhotoUpload) -> Result<String> {
        if upload.bytes.is_empty() {
            return Err(Error::ExternalService {
                message: format!("Photo {} is empty", upload.filename),
            });
        }

        let (stem, extension) = split_filename(&upload.filename);
        let (bytes, extension) = if ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            (upload.bytes, extension)
        } else if TRANSCODED_EXTENSIONS.contains(&extension.as_str()) {
            let transcoder = self.transcoder.as_ref().ok_or_else(|| Error::ExternalService {
                message: format!("No converter available for .{extension} photos"),
            })?;
            (transcoder(&upload.bytes)?, "jpg".to_string())
        } else {
            return Err(Error::ExternalService {
                message: format!("File type not allowed: {}", upload.filename),
            });
        };

        let file_name = format!(
            "{}{}.{}",
            chrono::Local::now().format("%Y%m%d_%H%M%S_%6f_"),
            secure_stem(&stem),
            extension
        );

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Error::ExternalService {
                message: format!("Cannot create upload directory {:?}: {e}", self.root),
            })?;
        tokio::fs::write(self.root.join(&file_name), &bytes)
            .await
            .map_err(|e| Error::ExternalService {
                message: format!("Cannot write photo {file_name}: {e}"),
            })?;

        Ok(format!("{}/{}", self.public_prefix, file_name))
    }

    async fn remove(&self, reference: &str) -> Result<()> {
        let path = self.resolve(reference)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::ExternalService {
                message: format!("Cannot remove photo {reference}: {e}"),
            }),
        }
    }

    async fn size(&self, reference: &str) -> Result<Option<u64>> {
        let path = self.resolve(reference)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::ExternalService {
                message: format!("Cannot inspect photo {reference}: {e}"),
            }),
        }
    }
}

/// Splits a filename into stem and lowercase extension.
fn split_filename(filename: &str) -> (String, String) {
    match filename.rsplit_once('.') {
        Some((stem, ext)) => (stem.to_string(), ext.to_ascii_lowercase()),
        None => (filename.to_string(), String::new()),
    }
}

/// Reduces a client filename stem to `[A-Za-z0-9._-]`.
fn secure_stem(stem: &str) -> String {
    let base = stem.rsplit(['/', '\\']).next().unwrap_or(stem);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_');

    if cleaned.is_empty() {
        "photo".to_string()
    } else {
        cleaned.to_string()
    }
}

/// State of one audit's photo on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PhotoState {
    /// The audit has no photo reference
    NoPhoto,
    /// The referenced file exists
    Present {
        /// File size in bytes
        bytes: u64,
    },
    /// The reference points at a file that is gone
    Missing,
}

/// Photo check result for one audit.
#[derive(Debug, Clone, Serialize)]
pub struct PhotoCheck {
    /// Audit the photo belongs to
    pub audit_id: i64,
    /// Stored reference, if any
    pub photo_path: Option<String>,
    /// What was found
    pub state: PhotoState,
}

/// Checks whether the photos of the `limit` most recent audits still exist.
pub async fn verify_recent_photos<P: PhotoStore>(
    db: &DatabaseConnection,
    store: &P,
    limit: u64,
) -> Result<Vec<PhotoCheck>> {
    let audits: Vec<audit::Model> = Audit::find()
        .order_by_desc(audit::Column::CreatedAt)
        .order_by_desc(audit::Column::Id)
        .limit(limit)
        .all(db)
        .await?;

    let mut checks = Vec::with_capacity(audits.len());
    for audit in audits {
        let state = match audit.photo_path.as_deref() {
            None => PhotoState::NoPhoto,
            Some(reference) => match store.size(reference).await {
                Ok(Some(bytes)) => PhotoState::Present { bytes },
                Ok(None) => PhotoState::Missing,
                Err(e) => {
                    warn!("Photo check failed for audit {}: {}", audit.id, e);
                    PhotoState::Missing
                }
            },
        };
        checks.push(PhotoCheck {
            audit_id: audit.id,
            photo_path: audit.photo_path,
            state,
        });
    }

    Ok(checks)
}
