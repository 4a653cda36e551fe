//! Local staging of uploaded documents
//!
//! Each request gets its own temporary directory; dropping the
//! [`StagingArea`] removes it together with every staged file.

use bytes::Bytes;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::error::Result;

/// One file part received from the client
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    /// Client-supplied file name
    pub file_name: String,
    /// Normalized MIME type (no parameters, lowercase)
    pub mime_type: String,
    pub data: Bytes,
}

impl DocumentUpload {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }
}

/// A file written to the staging directory
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub path: PathBuf,
    /// Name shown to the provider (the client's original file name)
    pub display_name: String,
    pub mime_type: String,
    pub size: usize,
}

/// Per-request temporary directory holding staged uploads
pub struct StagingArea {
    dir: TempDir,
    files: Vec<StagedFile>,
}

impl StagingArea {
    /// Create a fresh directory under `parent`
    pub fn new(parent: &Path) -> Result<Self> {
        std::fs::create_dir_all(parent)?;
        let dir = tempfile::Builder::new()
            .prefix("docverify-")
            .tempdir_in(parent)?;

        tracing::debug!(dir = %dir.path().display(), "created staging directory");
        Ok(Self {
            dir,
            files: Vec::new(),
        })
    }

    /// Write an upload to disk
    pub async fn stage(&mut self, upload: &DocumentUpload) -> Result<&StagedFile> {
        let index = self.files.len() + 1;
        let path = self
            .dir
            .path()
            .join(format!("{:02}_{}", index, sanitize_file_name(&upload.file_name)));

        tokio::fs::write(&path, &upload.data).await?;

        self.files.push(StagedFile {
            path,
            display_name: upload.file_name.clone(),
            mime_type: upload.mime_type.clone(),
            size: upload.data.len(),
        });

        // Just pushed
        Ok(&self.files[self.files.len() - 1])
    }

    pub fn files(&self) -> &[StagedFile] {
        &self.files
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Reduce a client file name to a safe single path component
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
