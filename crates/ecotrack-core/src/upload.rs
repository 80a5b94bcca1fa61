//! Uploaded invoice files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::UploadError;

/// An accepted upload stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Location of the stored copy.
    pub path: PathBuf,

    /// Name the file was uploaded under.
    pub original_name: String,

    /// Declared MIME type.
    pub mime_type: String,

    /// Size in bytes.
    pub size: u64,
}

impl UploadedFile {
    /// Copy `source` into `upload_dir` under a unique name.
    ///
    /// Only PDFs and images up to `max_bytes` are accepted. Without a declared
    /// MIME type it is guessed from the file extension.
    pub fn accept(
        source: &Path,
        upload_dir: &Path,
        declared_mime: Option<&str>,
        max_bytes: u64,
    ) -> Result<Self, UploadError> {
        let size = std::fs::metadata(source)?.len();
        if size > max_bytes {
            return Err(UploadError::TooLarge {
                size,
                limit: max_bytes,
            });
        }

        let mime_type = declared_mime
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| {
                mime_guess::from_path(source)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string()
            });
        if !is_supported_mime(&mime_type) {
            return Err(UploadError::UnsupportedType(mime_type));
        }

        let original_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("invoice")
            .to_string();

        std::fs::create_dir_all(upload_dir)?;
        let stored_name = format!("{}-{}", uuid::Uuid::new_v4().simple(), original_name);
        let path = upload_dir.join(stored_name);
        std::fs::copy(source, &path)?;

        debug!("Accepted upload {} as {}", original_name, path.display());

        Ok(Self {
            path,
            original_name,
            mime_type,
            size,
        })
    }

    /// Read the stored bytes.
    pub fn read(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }

    /// Delete the stored copy. A file that is already gone is not an error.
    pub fn remove(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed upload {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove upload {}: {}", self.path.display(), e),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// PDFs and images only.
pub fn is_supported_mime(mime: &str) -> bool {
    mime == "application/pdf" || mime.starts_with("image/")
}
