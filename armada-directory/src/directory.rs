//! Tenant record storage.
//!
//! The directory behaves like a small key-value table keyed by
//! (account, region): `put` is an overwrite-by-key upsert, `scan` returns
//! bounded pages behind an opaque continuation cursor and callers loop until
//! the cursor runs out. [`FileDirectory`] is the JSON-file-backed
//! implementation used by the CLI and the tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{Error, Result};

/// Default number of records per scan page.
pub const DEFAULT_PAGE_SIZE: usize = 25;

/// One onboarded tenant. Unique per (account, region); onboarding the same
/// pair again overwrites the previous record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TenantRecord {
    pub account_id: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_role_name: Option<String>,
}

/// Opaque continuation cursor handed back by `scan`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCursor(String);

impl ScanCursor {
    pub fn new(token: impl Into<String>) -> Self {
        ScanCursor(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_offset(offset: usize) -> Self {
        ScanCursor(offset.to_string())
    }

    fn offset(&self) -> Result<usize> {
        self.0
            .parse()
            .map_err(|_| Error::InvalidCursor(self.0.clone()))
    }
}

/// One page of a directory scan.
#[derive(Debug, Clone)]
pub struct Page {
    pub records: Vec<TenantRecord>,
    pub next_cursor: Option<ScanCursor>,
}

#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Fetch one page of tenant records, continuing from `cursor` when
    /// present.
    async fn scan(&self, cursor: Option<ScanCursor>) -> Result<Page>;

    /// Upsert a tenant record; last write wins per (account, region).
    async fn put(&self, record: TenantRecord) -> Result<()>;
}

/// Drain every page of a directory scan into one list.
pub async fn scan_all(directory: &dyn TenantDirectory) -> Result<Vec<TenantRecord>> {
    let mut records = Vec::new();
    let mut cursor = None;
    loop {
        let page = directory.scan(cursor).await?;
        records.extend(page.records);
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    Ok(records)
}

/// JSON-file-backed tenant directory.
pub struct FileDirectory {
    path: PathBuf,
    page_size: usize,
}

impl FileDirectory {
    pub fn new(path: impl AsRef<Path>) -> Self {
        FileDirectory {
            path: path.as_ref().to_path_buf(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(path: impl AsRef<Path>, page_size: usize) -> Self {
        FileDirectory {
            path: path.as_ref().to_path_buf(),
            page_size: page_size.max(1),
        }
    }

    async fn load(&self) -> Result<Vec<TenantRecord>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, records: &[TenantRecord]) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(records)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl TenantDirectory for FileDirectory {
    #[instrument(skip(self))]
    async fn scan(&self, cursor: Option<ScanCursor>) -> Result<Page> {
        let records = self.load().await?;
        let offset = match cursor {
            Some(cursor) => cursor.offset()?,
            None => 0,
        };

        let end = (offset + self.page_size).min(records.len());
        let page: Vec<TenantRecord> = records
            .get(offset..end)
            .map(<[TenantRecord]>::to_vec)
            .unwrap_or_default();
        let next_cursor = (end < records.len()).then(|| ScanCursor::from_offset(end));

        debug!(offset, returned = page.len(), "scanned directory page");
        Ok(Page {
            records: page,
            next_cursor,
        })
    }

    #[instrument(skip(self, record), fields(account_id = %record.account_id, region = %record.region))]
    async fn put(&self, record: TenantRecord) -> Result<()> {
        let mut records = self.load().await?;
        match records
            .iter_mut()
            .find(|r| r.account_id == record.account_id && r.region == record.region)
        {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        self.store(&records).await
    }
}
