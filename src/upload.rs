//! Upload validation and temp-file staging for `/predict`.
//!
//! Detectors take a file path, so each upload is written to a uniquely named
//! temp file in the upload directory. [`StagedUpload`] removes the file when
//! dropped: after success or detector failure, and after a panicking worker
//! in builds that unwind. The release profile sets `panic = "abort"`, so
//! there a panic ends the process before any drop runs.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::config::ALLOWED_EXTENSIONS;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No file provided")]
    NoFile,
    #[error("No file selected")]
    EmptyFilename,
    #[error("Invalid file type. Only PNG, JPG, JPEG allowed")]
    InvalidType,
    #[error("Uploaded file is empty")]
    EmptyFile,
    #[error("Failed to stage upload: {0}")]
    Io(#[from] std::io::Error),
}

/// True when `filename` has an allowed extension (after the last dot).
pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Check the client-supplied filename before reading the body.
pub fn validate_filename(filename: &str) -> Result<(), UploadError> {
    if filename.is_empty() {
        return Err(UploadError::EmptyFilename);
    }
    if !allowed_file(filename) {
        return Err(UploadError::InvalidType);
    }
    Ok(())
}

/// Detect image MIME type from magic bytes.
pub fn detect_mime_from_bytes(bytes: &[u8]) -> &'static str {
    // JPEG: FF D8 FF
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return "image/jpeg";
    }
    // PNG: 89 50 4E 47
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        return "image/png";
    }
    "application/octet-stream"
}

/// Sanitize a filename to prevent path traversal.
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .filter(|&c| c != '/' && c != '\\' && c != '\0')
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let sanitized = sanitized.replace("..", "");

    let sanitized: String = sanitized.chars().take(100).collect();

    if sanitized.is_empty() {
        "upload".into()
    } else {
        sanitized
    }
}

/// An uploaded image written to disk. Deleted on drop.
#[derive(Debug)]
pub struct StagedUpload {
    file: NamedTempFile,
    filename: String,
    size: usize,
    mime: &'static str,
}

impl StagedUpload {
    /// Validate content and write it into `dir` as `{unix_ts}_{random}_{name}`.
    pub fn stage(dir: &Path, filename: &str, bytes: &[u8]) -> Result<Self, UploadError> {
        validate_filename(filename)?;
        if bytes.is_empty() {
            return Err(UploadError::EmptyFile);
        }

        let mime = detect_mime_from_bytes(bytes);
        if mime == "application/octet-stream" {
            return Err(UploadError::InvalidType);
        }
        let declared = mime_guess::from_path(filename).first_raw().unwrap_or("unknown");
        if declared != mime {
            tracing::debug!(declared, detected = mime, "Upload extension disagrees with content");
        }

        std::fs::create_dir_all(dir)?;
        let safe = sanitize_filename(filename);
        let mut file = tempfile::Builder::new()
            .prefix(&format!("{}_", chrono::Utc::now().timestamp()))
            .suffix(&format!("_{safe}"))
            .tempfile_in(dir)?;
        file.write_all(bytes)?;
        file.flush()?;

        Ok(Self {
            file,
            filename: safe,
            size: bytes.len(),
            mime,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn to_path_buf(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }

    /// Sanitized client filename.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn mime(&self) -> &'static str {
        self.mime
    }
}
