use std::path::{Path, PathBuf};

/// Errors from the object store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The local file to upload could not be read.
    #[error("Cannot read upload source {path}: {reason}")]
    Source { path: PathBuf, reason: String },

    /// The store rejected or failed the upload.
    #[error("Upload of {bucket}/{key} failed: {reason}")]
    Upload {
        bucket: String,
        key: String,
        reason: String,
    },
}

/// Upload boundary.
///
/// An upload either stores the whole object or fails; no partial object
/// is left visible under `key`.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body_path: &Path,
        content_type: &str,
    ) -> Result<(), StorageError>;
}
