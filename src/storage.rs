use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::models::FileInfo;

/// Largest accepted upload (16 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;

/// Public URL prefix under which stored files are served.
pub const FILES_URL_PREFIX: &str = "/api/files";

// Upper bound on `_N` suffixes tried before giving up on a name.
const MAX_NAME_ATTEMPTS: u32 = 10_000;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid filename")]
    InvalidName,

    #[error("file type not allowed: .{0}")]
    NotAllowed(String),

    #[error("file too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },

    #[error("file not found")]
    NotFound,

    #[error("path escapes the upload directory")]
    Traversal,

    #[error("storage i/o error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound => StorageError::NotFound,
            _ => StorageError::Io(err.to_string()),
        }
    }
}

/// StoredFile
///
/// Outcome of a successful upload. `filename` is the final on-disk name, which differs from
/// the sanitized original when a collision forced a `_N` suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub filename: String,
    pub original_name: String,
    pub size: u64,
    pub content_type: String,
    pub category: String,
}

impl StoredFile {
    pub fn url(&self) -> String {
        format!("{FILES_URL_PREFIX}/{}", self.filename)
    }
}

/// StorageService
///
/// Contract for the upload store. Handlers only ever see this trait, so tests can point the
/// router at a temporary directory.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the upload root if needed. Called once at startup.
    async fn ensure_root(&self) -> Result<(), StorageError>;

    /// Validates and writes an upload under a fresh, never-overwriting name.
    async fn store(&self, original_name: &str, data: &[u8]) -> Result<StoredFile, StorageError>;

    /// Reads a stored file, returning its bytes and content type.
    async fn read(&self, name: &str) -> Result<(Vec<u8>, String), StorageError>;

    async fn info(&self, name: &str) -> Result<FileInfo, StorageError>;

    /// Lists stored files, newest first.
    async fn list(&self) -> Result<Vec<FileInfo>, StorageError>;

    async fn delete(&self, name: &str) -> Result<(), StorageError>;
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;

// --- Local Disk Implementation ---

/// LocalDiskStorage
///
/// Stores uploads as flat files directly under `root`.
#[derive(Debug, Clone)]
pub struct LocalDiskStorage {
    root: PathBuf,
    max_size: u64,
}

impl LocalDiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_max_size(root, MAX_UPLOAD_BYTES)
    }

    pub fn with_max_size(root: impl Into<PathBuf>, max_size: u64) -> Self {
        Self {
            root: root.into(),
            max_size,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// existing_path
    ///
    /// Maps a client-supplied name to a file inside the root. The name must be a single
    /// plain path component, and the canonical result must still live under the canonical
    /// root, which also catches symlinks pointing outside.
    async fn existing_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            (None, _) => return Err(StorageError::NotFound),
            _ => return Err(StorageError::Traversal),
        }

        let root = fs::canonicalize(&self.root).await?;
        let target = fs::canonicalize(self.root.join(name)).await?;
        if !target.starts_with(&root) {
            warn!(name = %name, "rejected file path outside upload root");
            return Err(StorageError::Traversal);
        }
        if !fs::metadata(&target).await?.is_file() {
            return Err(StorageError::NotFound);
        }
        Ok(target)
    }

    async fn describe(&self, path: &Path) -> Result<FileInfo, StorageError> {
        let metadata = fs::metadata(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = extension_of(&filename).unwrap_or_default();

        let modified: DateTime<Utc> = metadata.modified()?.into();
        let created: DateTime<Utc> = metadata.created().map(Into::into).unwrap_or(modified);

        Ok(FileInfo {
            url: format!("{FILES_URL_PREFIX}/{filename}"),
            size: metadata.len(),
            content_type: content_type_for(&extension).to_string(),
            category: file_category(&extension).unwrap_or("other").to_string(),
            created,
            modified,
            filename,
        })
    }
}

#[async_trait]
impl StorageService for LocalDiskStorage {
    async fn ensure_root(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).await?;
        info!(path = %self.root.display(), "upload directory ready");
        Ok(())
    }

    async fn store(&self, original_name: &str, data: &[u8]) -> Result<StoredFile, StorageError> {
        let filename = sanitize_filename(original_name).ok_or(StorageError::InvalidName)?;
        let (stem, extension) = match filename.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, ext),
            _ => return Err(StorageError::NotAllowed(String::new())),
        };
        let normalized_ext = extension.to_ascii_lowercase();
        let category = file_category(&normalized_ext)
            .ok_or_else(|| StorageError::NotAllowed(normalized_ext.clone()))?;

        let size = data.len() as u64;
        if size > self.max_size {
            return Err(StorageError::TooLarge {
                size,
                max: self.max_size,
            });
        }

        fs::create_dir_all(&self.root).await?;

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let candidate = if attempt == 0 {
                filename.clone()
            } else {
                format!("{stem}_{attempt}.{extension}")
            };
            let path = self.root.join(&candidate);

            // create_new fails instead of truncating, so concurrent uploads of the same name
            // each end up with their own file.
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };

            let written = async {
                file.write_all(data).await?;
                file.flush().await
            }
            .await;
            if let Err(e) = written {
                let _ = fs::remove_file(&path).await;
                return Err(StorageError::Io(e.to_string()));
            }

            debug!(filename = %candidate, size, "stored upload");
            return Ok(StoredFile {
                filename: candidate,
                original_name: original_name.to_string(),
                size,
                content_type: content_type_for(&normalized_ext).to_string(),
                category: category.to_string(),
            });
        }

        Err(StorageError::Io(format!("no free filename for {filename}")))
    }

    async fn read(&self, name: &str) -> Result<(Vec<u8>, String), StorageError> {
        let path = self.existing_path(name).await?;
        let data = fs::read(&path).await?;
        let extension = extension_of(name).unwrap_or_default();
        Ok((data, content_type_for(&extension).to_string()))
    }

    async fn info(&self, name: &str) -> Result<FileInfo, StorageError> {
        let path = self.existing_path(name).await?;
        self.describe(&path).await
    }

    async fn list(&self) -> Result<Vec<FileInfo>, StorageError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(self.describe(&entry.path()).await?);
            }
        }
        files.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.filename.cmp(&b.filename)));
        Ok(files)
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let path = self.existing_path(name).await?;
        fs::remove_file(&path).await?;
        info!(filename = %name, "deleted upload");
        Ok(())
    }
}

// --- Filename & Type Helpers ---

/// sanitize_filename
///
/// Keeps the final path component, turns whitespace into `_`, drops everything outside
/// `[A-Za-z0-9._-]` and strips leading dots and underscores. `None` when nothing is left.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned: String = last
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    let trimmed = cleaned.trim_start_matches(['.', '_']);
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Allowed extensions, grouped the way the frontend displays them.
pub fn file_category(extension: &str) -> Option<&'static str> {
    match extension {
        "png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" => Some("images"),
        "pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx" | "txt" => Some("documents"),
        "zip" | "rar" | "7z" | "tar" | "gz" => Some("archives"),
        "csv" | "json" | "xml" => Some("other"),
        _ => None,
    }
}

pub fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "txt" => "text/plain; charset=utf-8",
        "zip" => "application/zip",
        "rar" => "application/vnd.rar",
        "7z" => "application/x-7z-compressed",
        "tar" => "application/x-tar",
        "gz" => "application/gzip",
        "csv" => "text/csv",
        "json" => "application/json",
        "xml" => "application/xml",
        _ => "application/octet-stream",
    }
}

fn extension_of(name: &str) -> Option<String> {
    name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())
}
