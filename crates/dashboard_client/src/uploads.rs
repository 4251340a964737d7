//! Upload bookkeeping and the upload-to-ready batch flow.
//!
//! A batch moves `Idle → Uploading → Preloading → Ready`, or ends in
//! `PartialFailure` when any file fails. Records of uploaded files are
//! written only for a fully successful batch and are always replaced whole.

use chrono::{DateTime, Utc};
use common::{now_millis, Error, UploadedFileRecord};
use futures_util::future::join_all;
use local_store::{keys, KeyValueStoreExt};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::DashboardClient;
use crate::endpoints::Endpoint;

/// Metadata of a local file selected for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct FileDescriptor {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub last_modified_millis: i64,
}

impl FileDescriptor {
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let meta = std::fs::metadata(path)?;
        Self::from_metadata(path, &meta)
    }

    /// Async counterpart of [`from_path`](Self::from_path).
    pub async fn load(path: &Path) -> Result<Self, Error> {
        let meta = tokio::fs::metadata(path).await?;
        Self::from_metadata(path, &meta)
    }

    fn from_metadata(path: &Path, meta: &std::fs::Metadata) -> Result<Self, Error> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Other(format!("not a file: {}", path.display())))?;
        let last_modified_millis = meta
            .modified()
            .map(|t| DateTime::<Utc>::from(t).timestamp_millis())
            .unwrap_or(0);

        Ok(Self {
            path: path.to_path_buf(),
            mime_type: mime_for(&name).to_string(),
            name,
            size: meta.len(),
            last_modified_millis,
        })
    }

    /// The backend only accepts `.csv` files.
    pub fn is_csv(&self) -> bool {
        Path::new(&self.name)
            .extension()
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false)
    }

    fn to_record(&self, uploaded_at_millis: i64) -> UploadedFileRecord {
        UploadedFileRecord {
            name: self.name.clone(),
            size: self.size,
            mime_type: self.mime_type.clone(),
            last_modified_millis: self.last_modified_millis,
            uploaded_at_millis,
        }
    }
}

fn mime_for(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => "text/csv",
        "json" => "application/json",
        "txt" => "text/plain",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Idle,
    Uploading,
    Preloading,
    Ready,
    PartialFailure,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileStatus {
    Uploaded { stored_as: Option<String> },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileOutcome {
    pub name: String,
    pub status: FileStatus,
}

impl FileOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, FileStatus::Uploaded { .. })
    }
}

#[derive(Debug, Clone)]
pub struct UploadReport {
    pub phase: UploadPhase,
    pub files: Vec<FileOutcome>,
    /// Whether the preload pass completed and set the data-ready flag.
    pub data_ready: bool,
}

impl UploadReport {
    pub fn failed(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files.iter().filter(|f| !f.succeeded())
    }
}

fn advance(phase: &mut UploadPhase, next: UploadPhase) {
    debug!("Upload phase {:?} -> {:?}", phase, next);
    *phase = next;
}

impl DashboardClient {
    /// Replace the uploaded-file records with `files`, stamped now.
    pub fn save_uploaded_files(
        &self,
        files: &[FileDescriptor],
    ) -> Result<Vec<UploadedFileRecord>, Error> {
        let now = now_millis();
        let records: Vec<UploadedFileRecord> = files.iter().map(|f| f.to_record(now)).collect();
        self.store().set_as(keys::UPLOADED_FILES, &records)?;
        Ok(records)
    }

    /// Records of the last successful batch; empty when none.
    pub fn get_uploaded_files(&self) -> Vec<UploadedFileRecord> {
        self.store()
            .get_as(keys::UPLOADED_FILES)
            .unwrap_or_default()
    }

    /// Drop every endpoint cache entry and all upload bookkeeping.
    ///
    /// Files already on the backend are untouched; the next read of any
    /// endpoint goes to the network.
    pub fn clear_all_cache(&self) -> Result<(), Error> {
        let store = self.store();
        let mut failures = Vec::new();
        let all_keys = Endpoint::ALL
            .iter()
            .map(|e| e.cache_key())
            .chain(keys::BOOKKEEPING);
        for key in all_keys {
            if let Err(e) = store.remove(key) {
                warn!("Failed to clear {}: {}", key, e);
                failures.push(format!("{}: {}", key, e));
            }
        }

        if failures.is_empty() {
            info!("Cleared local cache");
            Ok(())
        } else {
            Err(Error::Store(format!(
                "could not clear {} key(s): {}",
                failures.len(),
                failures.join("; ")
            )))
        }
    }

    /// Upload a batch of files, then warm every cache.
    ///
    /// The local cache is cleared first. Non-CSV files are rejected without a
    /// network call. Files are sent concurrently and each outcome is
    /// reported. Records, the uploaded flag and the preload only happen when
    /// every file succeeded.
    pub async fn upload_batch(
        &self,
        paths: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Result<UploadReport, Error> {
        let mut phase = UploadPhase::Idle;
        if paths.is_empty() {
            return Err(Error::Other("no files selected for upload".into()));
        }

        self.clear_all_cache()?;
        advance(&mut phase, UploadPhase::Uploading);

        let attempts = join_all(paths.iter().map(|p| self.upload_one(p, cancel))).await;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut descriptors = Vec::new();
        let mut files = Vec::with_capacity(attempts.len());
        for (outcome, descriptor) in attempts {
            if let (true, Some(d)) = (outcome.succeeded(), descriptor) {
                descriptors.push(d);
            }
            files.push(outcome);
        }

        if files.iter().any(|f| !f.succeeded()) {
            advance(&mut phase, UploadPhase::PartialFailure);
            for f in files.iter().filter(|f| !f.succeeded()) {
                warn!("Upload of {} failed: {:?}", f.name, f.status);
            }
            return Ok(UploadReport {
                phase,
                files,
                data_ready: false,
            });
        }

        self.save_uploaded_files(&descriptors)?;
        self.store().set_as(keys::FILE_UPLOADED, &true)?;
        info!("Uploaded {} file(s)", descriptors.len());

        advance(&mut phase, UploadPhase::Preloading);
        let data_ready = self.preload_all_data(cancel).await;
        advance(&mut phase, UploadPhase::Ready);

        Ok(UploadReport {
            phase,
            files,
            data_ready,
        })
    }

    async fn upload_one(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> (FileOutcome, Option<FileDescriptor>) {
        let fallback_name = path.display().to_string();
        let failed = |name: String, reason: String| {
            (
                FileOutcome {
                    name,
                    status: FileStatus::Failed { reason },
                },
                None::<FileDescriptor>,
            )
        };

        let descriptor = match FileDescriptor::load(path).await {
            Ok(d) => d,
            Err(e) => return failed(fallback_name, e.to_string()),
        };
        if !descriptor.is_csv() {
            return failed(descriptor.name, "only CSV files are accepted".into());
        }

        let contents = match tokio::fs::read(path).await {
            Ok(c) => c,
            Err(e) => return failed(descriptor.name, e.to_string()),
        };

        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            r = self.upload_file(&descriptor.name, &descriptor.mime_type, contents) => r,
        };

        match sent {
            Ok(reply) => (
                FileOutcome {
                    name: descriptor.name.clone(),
                    status: FileStatus::Uploaded {
                        stored_as: reply.filename,
                    },
                },
                Some(descriptor),
            ),
            Err(e) => failed(descriptor.name, e.user_message()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_client, MockTransport};
    use local_store::{KeyValueStore, MemoryStore};
    use serde_json::json;
    use std::fs;

    fn write_file(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_save_then_get_records() {
        let transport = MockTransport::new();
        let store = MemoryStore::new();
        let client = test_client(&transport, &store);
        let dir = tempfile::tempdir().unwrap();
        let a = FileDescriptor::from_path(&write_file(dir.path(), "df_Orders.csv", "a,b\n1,2\n")).unwrap();
        let b = FileDescriptor::from_path(&write_file(dir.path(), "df_Products.csv", "x\n")).unwrap();

        let before = now_millis();
        client.save_uploaded_files(&[a.clone(), b.clone()]).unwrap();
        let after = now_millis();

        let records = client.get_uploaded_files();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "df_Orders.csv");
        assert_eq!(records[0].size, 8);
        assert_eq!(records[1].name, "df_Products.csv");
        assert_eq!(records[1].size, 2);
        assert_eq!(records[0].mime_type, "text/csv");
        for r in &records {
            assert!(r.uploaded_at_millis >= before && r.uploaded_at_millis <= after);
        }
    }

    #[test]
    fn test_save_replaces_wholesale() {
        let transport = MockTransport::new();
        let store = MemoryStore::new();
        let client = test_client(&transport, &store);
        let dir = tempfile::tempdir().unwrap();
        let a = FileDescriptor::from_path(&write_file(dir.path(), "a.csv", "1")).unwrap();
        let b = FileDescriptor::from_path(&write_file(dir.path(), "b.csv", "2")).unwrap();

        client.save_uploaded_files(&[a.clone(), b]).unwrap();
        client.save_uploaded_files(&[a]).unwrap();
        assert_eq!(client.get_uploaded_files().len(), 1);
    }

    #[test]
    fn test_get_without_records_is_empty() {
        let transport = MockTransport::new();
        let store = MemoryStore::new();
        store.set_raw(keys::UPLOADED_FILES, "[{broken");
        let client = test_client(&transport, &store);
        assert!(client.get_uploaded_files().is_empty());
    }

    #[tokio::test]
    async fn test_clear_forces_live_calls() {
        let transport = MockTransport::new();
        transport.respond_all();
        let store = MemoryStore::new();
        let client = test_client(&transport, &store);
        let token = CancellationToken::new();

        assert!(client.preload_all_data(&token).await);
        store.set(keys::UPLOADED_FILES, &json!([])).unwrap();
        store.set(keys::FILE_UPLOADED, &json!(true)).unwrap();
        let warmed_calls = transport.total_calls();

        client.clear_all_cache().unwrap();
        for e in Endpoint::ALL {
            assert!(!store.contains(e.cache_key()));
        }
        assert!(!client.is_data_ready());
        assert!(!store.contains(keys::UPLOADED_FILES));
        assert!(!store.contains(keys::FILE_UPLOADED));

        for e in Endpoint::ALL {
            client.fetch(e, &token).await.unwrap();
        }
        assert_eq!(transport.total_calls(), warmed_calls + Endpoint::ALL.len());
    }

    #[tokio::test]
    async fn test_clear_then_fetch_sees_new_data() {
        let transport = MockTransport::new();
        transport.respond_seq(
            "/reorder/charts/top-safety-stock",
            vec![
                json!({"data": [{"category": "old", "value": 1}]}),
                json!({"data": [{"category": "new", "value": 2}]}),
            ],
        );
        let store = MemoryStore::new();
        let client = test_client(&transport, &store);
        let token = CancellationToken::new();

        assert_eq!(client.top_safety_stock(&token).await.unwrap()[0].category, "old");
        assert_eq!(client.top_safety_stock(&token).await.unwrap()[0].category, "old");
        client.clear_all_cache().unwrap();
        assert_eq!(client.top_safety_stock(&token).await.unwrap()[0].category, "new");
    }

    #[tokio::test]
    async fn test_batch_success_reaches_ready() {
        let transport = MockTransport::new();
        transport.respond_all();
        let store = MemoryStore::new();
        let client = test_client(&transport, &store);
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![
            write_file(dir.path(), "df_Orders.csv", "order_id\n1\n"),
            write_file(dir.path(), "df_OrderItems.csv", "order_id,price\n1,9.9\n"),
        ];

        let report = client
            .upload_batch(&paths, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.phase, UploadPhase::Ready);
        assert!(report.data_ready);
        assert_eq!(report.failed().count(), 0);
        assert_eq!(client.get_uploaded_files().len(), 2);
        assert!(store.get_as::<bool>(keys::FILE_UPLOADED).unwrap());
        assert!(client.is_data_ready());
        assert_eq!(transport.uploaded().len(), 2);
    }

    #[tokio::test]
    async fn test_batch_partial_failure() {
        let transport = MockTransport::new();
        transport.respond_all();
        transport.reject_upload("df_Products.csv");
        let store = MemoryStore::new();
        let client = test_client(&transport, &store);
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![
            write_file(dir.path(), "df_Orders.csv", "order_id\n1\n"),
            write_file(dir.path(), "df_Products.csv", "product_id\n1\n"),
            write_file(dir.path(), "notes.txt", "hello"),
        ];

        let report = client
            .upload_batch(&paths, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.phase, UploadPhase::PartialFailure);
        assert!(!report.data_ready);
        let failed: Vec<_> = report.failed().map(|f| f.name.as_str()).collect();
        assert_eq!(failed, vec!["df_Products.csv", "notes.txt"]);
        assert_eq!(
            report.files[1].status,
            FileStatus::Failed {
                reason: "Server returned 400: Invalid file type".into()
            }
        );
        assert!(client.get_uploaded_files().is_empty());
        assert!(!client.is_data_ready());
        // The text file never reached the backend.
        assert_eq!(transport.calls("/upload/"), 2);
        for e in Endpoint::ALL {
            assert_eq!(transport.calls(e.path()), 0);
        }
    }

    #[tokio::test]
    async fn test_batch_clears_previous_state() {
        let transport = MockTransport::new();
        transport.reject_upload("bad.csv");
        let store = MemoryStore::new();
        store.set(keys::DATA_READY, &json!(true)).unwrap();
        store.set("topReorderPoints", &json!({"value": [1], "stored_at_millis": 0})).unwrap();
        let client = test_client(&transport, &store);
        let dir = tempfile::tempdir().unwrap();

        let report = client
            .upload_batch(&[write_file(dir.path(), "bad.csv", "x")], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.phase, UploadPhase::PartialFailure);
        assert!(!store.contains(keys::DATA_READY));
        assert!(!store.contains("topReorderPoints"));
    }

    #[tokio::test]
    async fn test_empty_selection_is_an_error() {
        let transport = MockTransport::new();
        let store = MemoryStore::new();
        let client = test_client(&transport, &store);
        assert!(client.upload_batch(&[], &CancellationToken::new()).await.is_err());
    }

    /// Refuses to remove one key; everything else goes to the inner store.
    struct StickyStore {
        inner: MemoryStore,
        stuck: &'static str,
    }

    impl KeyValueStore for StickyStore {
        fn get(&self, key: &str) -> Option<serde_json::Value> {
            self.inner.get(key)
        }
        fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), Error> {
            self.inner.set(key, value)
        }
        fn remove(&self, key: &str) -> Result<(), Error> {
            if key == self.stuck {
                return Err(Error::Store(format!("locked: {}", key)));
            }
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_clear_keeps_going_after_a_failed_remove() {
        let inner = MemoryStore::new();
        for e in Endpoint::ALL {
            inner.set(e.cache_key(), &json!({"value": [1], "stored_at_millis": 0})).unwrap();
        }
        for key in keys::BOOKKEEPING {
            inner.set(key, &json!(true)).unwrap();
        }
        let client = DashboardClient::new(
            MockTransport::new(),
            std::sync::Arc::new(StickyStore {
                inner: inner.clone(),
                stuck: "analysisSummary",
            }),
            &common::DashboardConfig::default(),
        );

        let err = client.clear_all_cache().unwrap_err();

        assert!(matches!(err, Error::Store(_)));
        assert!(err.to_string().contains("analysisSummary"));
        assert!(inner.contains("analysisSummary"));
        assert_eq!(inner.len(), 1);
        assert!(!inner.contains(keys::DATA_READY));
    }

    #[tokio::test]
    async fn test_async_load_matches_sync_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "df_Sellers.csv", "seller_id\ns1\n");

        let loaded = FileDescriptor::load(&path).await.unwrap();

        assert_eq!(loaded, FileDescriptor::from_path(&path).unwrap());
        assert_eq!(loaded.size, 13);
        assert!(FileDescriptor::load(Path::new("/definitely/not/here.csv")).await.is_err());
    }

    #[test]
    fn test_missing_file_descriptor_errors() {
        assert!(FileDescriptor::from_path(Path::new("/definitely/not/here.csv")).is_err());
    }

    #[test]
    fn test_mime_by_extension() {
        assert_eq!(mime_for("A.CSV"), "text/csv");
        assert_eq!(mime_for("report.xlsx"), "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet");
        assert_eq!(mime_for("noext"), "application/octet-stream");
    }
}
