//! Well-known keys outside the per-endpoint cache namespace.

/// `Vec<UploadedFileRecord>` of the last successful batch.
pub const UPLOADED_FILES: &str = "uploadedFiles";

/// Set once every endpoint cache has been warmed after an upload.
pub const DATA_READY: &str = "dataLoaded";

/// Set when the last upload batch fully succeeded.
pub const FILE_UPLOADED: &str = "fileUploaded";

/// Bookkeeping keys removed by a full reset.
pub const BOOKKEEPING: [&str; 3] = [UPLOADED_FILES, DATA_READY, FILE_UPLOADED];
