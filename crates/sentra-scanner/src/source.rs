//! The `DataSource` abstraction and test/reference implementations.
//!
//! Low-level per-format readers (PDF/Excel/OCR, database drivers, object
//! store clients) are external collaborators; the orchestrator only sees
//! this trait. An *item* is the scheduling unit (one file, one table); a
//! *record* is one classifiable value with its location and context.

use crate::error::{Result, ScanError};
use async_trait::async_trait;
use sentra_core::{DataLocation, Timestamp};
use sentra_db::targets::ScanTarget;
use sentra_engine::ContextHints;
use sentra_tracker::SchemaSnapshot;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{debug, warn};

/// One scannable item: a file, a table, an object prefix.
#[derive(Debug, Clone)]
pub struct ItemDescriptor {
    /// Stable item identifier (path, table name)
    pub id: String,
    /// Display name used for metadata heuristics
    pub name: String,
    /// Field (column) names for structured items; empty for files
    pub fields: Vec<String>,
    /// Item-level modification timestamp, when the source exposes one
    pub updated_at: Option<Timestamp>,
}

/// One classifiable value read from an item.
#[derive(Debug, Clone)]
pub struct SourceRecord {
    /// Unit id for change tracking (row id, file path)
    pub unit_id: String,
    /// Raw content bytes
    pub content: Vec<u8>,
    /// Structural context for scoring
    pub hints: ContextHints,
    /// Location attached to findings from this record
    pub location: DataLocation,
    /// Row/file modification timestamp, when known
    pub updated_at: Option<Timestamp>,
}

impl SourceRecord {
    /// Content as UTF-8 text, lossy.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }
}

/// A source of scannable content, addressed by target.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Verify the source is reachable and credentials resolve.
    async fn check(&self, target: &ScanTarget) -> Result<()>;

    /// Structural descriptor for drift comparison. Metadata only, no
    /// content reads.
    async fn schema_snapshot(&self, target: &ScanTarget) -> Result<SchemaSnapshot>;

    /// Enumerate the target's items. Metadata only.
    async fn list_items(&self, target: &ScanTarget) -> Result<Vec<ItemDescriptor>>;

    /// Read one item's records, up to `limit` when given.
    async fn read_item(
        &self,
        target: &ScanTarget,
        item_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<SourceRecord>>;
}

/// In-memory source for tests and embedding.
///
/// Items and records are preloaded; reachability and per-item read
/// failures can be injected to exercise the orchestrator's error paths.
/// All mutators take `&self` so a source already shared via `Arc` can be
/// reconfigured mid-test.
#[derive(Debug, Default)]
pub struct MemorySource {
    items: Mutex<Vec<ItemDescriptor>>,
    records: Mutex<HashMap<String, Vec<SourceRecord>>>,
    schema: Mutex<SchemaSnapshot>,
    unreachable: AtomicBool,
    failing_items: Mutex<Vec<String>>,
}

impl MemorySource {
    /// Empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item with its records.
    pub fn add_item(&self, item: ItemDescriptor, records: Vec<SourceRecord>) {
        self.records
            .lock()
            .expect("records lock")
            .insert(item.id.clone(), records);
        self.items.lock().expect("items lock").push(item);
    }

    /// Replace an item's records.
    pub fn set_records(&self, item_id: &str, records: Vec<SourceRecord>) {
        self.records
            .lock()
            .expect("records lock")
            .insert(item_id.to_string(), records);
    }

    /// Set the schema snapshot returned to callers.
    pub fn set_schema(&self, schema: SchemaSnapshot) {
        *self.schema.lock().expect("schema lock") = schema;
    }

    /// Make `check` fail, simulating an unreachable source.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Make reads of the given item fail, simulating a broken file.
    pub fn fail_item(&self, item_id: &str) {
        self.failing_items
            .lock()
            .expect("failing_items lock")
            .push(item_id.to_string());
    }
}

#[async_trait]
impl DataSource for MemorySource {
    async fn check(&self, target: &ScanTarget) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ScanError::SourceUnreachable {
                target_id: sentra_core::TargetId::new(&target.id)
                    .map_err(|e| ScanError::InvalidTarget(e.to_string()))?,
                reason: "simulated outage".to_string(),
            });
        }
        Ok(())
    }

    async fn schema_snapshot(&self, _target: &ScanTarget) -> Result<SchemaSnapshot> {
        Ok(self.schema.lock().expect("schema lock").clone())
    }

    async fn list_items(&self, _target: &ScanTarget) -> Result<Vec<ItemDescriptor>> {
        Ok(self.items.lock().expect("items lock").clone())
    }

    async fn read_item(
        &self,
        _target: &ScanTarget,
        item_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<SourceRecord>> {
        {
            let failing = self.failing_items.lock().expect("failing_items lock");
            if failing.iter().any(|f| f == item_id) {
                return Err(ScanError::ItemRead {
                    item: item_id.to_string(),
                    reason: "simulated read failure".to_string(),
                });
            }
        }

        let records = self
            .records
            .lock()
            .expect("records lock")
            .get(item_id)
            .cloned()
            .ok_or_else(|| ScanError::ItemRead {
                item: item_id.to_string(),
                reason: "unknown item".to_string(),
            })?;

        Ok(match limit {
            Some(n) => records.into_iter().take(n).collect(),
            None => records,
        })
    }
}

/// Maximum file size the filesystem source will read (100MB).
const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum directory depth to scan.
const MAX_SCAN_DEPTH: usize = 10;

/// Filesystem-backed source: one item per regular file under the target URI.
///
/// This is the reference `DataSource`; production format readers (PDF,
/// spreadsheets, OCR) sit behind the same trait elsewhere.
#[derive(Debug, Default)]
pub struct FilesystemSource;

impl FilesystemSource {
    /// Create a filesystem source.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    async fn walk(
        dir: PathBuf,
        depth: usize,
        items: &mut Vec<ItemDescriptor>,
    ) -> std::io::Result<()> {
        if depth > MAX_SCAN_DEPTH {
            return Ok(());
        }

        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            if metadata.is_dir() {
                Box::pin(Self::walk(path, depth + 1, items)).await?;
            } else if metadata.is_file() {
                if metadata.len() > MAX_FILE_SIZE {
                    debug!(path = %path.display(), "skipping oversized file");
                    continue;
                }

                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let updated_at = metadata
                    .modified()
                    .ok()
                    .map(|t| Timestamp::from_datetime(chrono::DateTime::<chrono::Utc>::from(t)));

                items.push(ItemDescriptor {
                    id: path.to_string_lossy().into_owned(),
                    name,
                    fields: Vec::new(),
                    updated_at,
                });
            }
        }

        Ok(())
    }
}

#[async_trait]
impl DataSource for FilesystemSource {
    async fn check(&self, target: &ScanTarget) -> Result<()> {
        let target_id = sentra_core::TargetId::new(&target.id)
            .map_err(|e| ScanError::InvalidTarget(e.to_string()))?;

        let metadata = tokio::fs::metadata(&target.uri)
            .await
            .map_err(|e| ScanError::SourceUnreachable {
                target_id: target_id.clone(),
                reason: e.to_string(),
            })?;

        if !metadata.is_dir() {
            return Err(ScanError::InvalidTarget(format!(
                "filesystem target uri is not a directory: {}",
                target.uri
            )));
        }

        Ok(())
    }

    async fn schema_snapshot(&self, target: &ScanTarget) -> Result<SchemaSnapshot> {
        // Directory layout as schema: each directory is a container, its
        // files are fields typed by extension.
        let items = self.list_items(target).await?;
        let mut snapshot = SchemaSnapshot::default();

        let mut by_dir: HashMap<String, Vec<(String, String)>> = HashMap::new();
        for item in items {
            let path = PathBuf::from(&item.id);
            let dir = path
                .parent()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();
            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_else(|| "unknown".to_string());
            by_dir.entry(dir).or_default().push((item.name, ext));
        }

        for (dir, files) in by_dir {
            snapshot.add_container(dir, files);
        }

        Ok(snapshot)
    }

    async fn list_items(&self, target: &ScanTarget) -> Result<Vec<ItemDescriptor>> {
        let mut items = Vec::new();
        Self::walk(PathBuf::from(&target.uri), 0, &mut items)
            .await
            .map_err(|e| ScanError::ItemRead {
                item: target.uri.clone(),
                reason: e.to_string(),
            })?;
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    async fn read_item(
        &self,
        _target: &ScanTarget,
        item_id: &str,
        _limit: Option<usize>,
    ) -> Result<Vec<SourceRecord>> {
        let content = tokio::fs::read(item_id)
            .await
            .map_err(|e| ScanError::ItemRead {
                item: item_id.to_string(),
                reason: e.to_string(),
            })?;

        let file_name = PathBuf::from(item_id)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(vec![SourceRecord {
            unit_id: item_id.to_string(),
            content,
            hints: ContextHints::for_file(&file_name),
            location: DataLocation::File {
                path: item_id.to_string(),
                position: None,
            },
            updated_at: None,
        }])
    }
}
