//! Append-only, URL-deduplicating JSONL document store.
//!
//! One file per record kind under a data directory (see [`StoreKind`]).
//! Each line is one JSON record. Lines are only ever appended; a record whose
//! URL is already present in its kind's file is silently skipped.
//!
//! **Consistency rules:**
//! - Each kind's scan-then-append runs under its own async mutex
//! - The URL index is rebuilt whenever the file length differs from the
//!   length recorded after the last scan or append
//! - A malformed line is reported as [`ResearchError::CorruptStore`] and
//!   never repaired

mod record;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use researcher_shared::{NormalizedDocument, RawDocument, ResearchError, Result, Summary};

pub use record::{StoreKind, StoreRecord};

/// URLs present in one kind's file.
#[derive(Debug, Default)]
struct UrlIndex {
    urls: HashSet<String>,
    /// File length after the last scan or append; `None` until first scan.
    synced_len: Option<u64>,
}

/// Handle to the store files of one data directory.
#[derive(Debug)]
pub struct DocumentStore {
    data_dir: PathBuf,
    raw: Mutex<UrlIndex>,
    normalized: Mutex<UrlIndex>,
    summary: Mutex<UrlIndex>,
}

impl DocumentStore {
    /// Create a handle. No I/O happens until the first load or add.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            raw: Mutex::default(),
            normalized: Mutex::default(),
            summary: Mutex::default(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the file backing `kind`.
    pub fn path_for(&self, kind: StoreKind) -> PathBuf {
        self.data_dir.join(kind.file_name())
    }

    fn index(&self, kind: StoreKind) -> &Mutex<UrlIndex> {
        match kind {
            StoreKind::Raw => &self.raw,
            StoreKind::Normalized => &self.normalized,
            StoreKind::Summary => &self.summary,
        }
    }

    // -----------------------------------------------------------------------
    // Generic operations
    // -----------------------------------------------------------------------

    /// Every record of kind `R`, in file order. A missing file is empty.
    pub async fn load<R: StoreRecord>(&self) -> Result<Vec<R>> {
        let _guard = self.index(R::KIND).lock().await;
        let (records, _) = read_records::<R>(&self.path_for(R::KIND)).await?;
        Ok(records)
    }

    /// Append the records whose URL is not yet stored; returns how many were
    /// written. Within `records`, the first occurrence of a URL wins.
    #[instrument(skip_all, fields(kind = ?R::KIND, records = records.len()))]
    pub async fn add<R: StoreRecord>(&self, records: &[R]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let path = self.path_for(R::KIND);
        let mut index = self.index(R::KIND).lock().await;
        sync_index::<R>(&mut index, &path).await?;

        let mut fresh: HashSet<&str> = HashSet::new();
        let mut buf = String::new();
        // A last record without its newline must not absorb the next one.
        if !ends_with_newline(&path).await? {
            buf.push('\n');
        }
        for record in records {
            let url = record.url();
            if index.urls.contains(url) || !fresh.insert(url) {
                continue;
            }
            let line = serde_json::to_string(record).map_err(|e| {
                ResearchError::Storage(format!("failed to encode record for {url}: {e}"))
            })?;
            buf.push_str(&line);
            buf.push('\n');
        }

        if fresh.is_empty() {
            debug!("nothing new to append");
            return Ok(0);
        }

        append(&path, buf.as_bytes()).await?;

        let added = fresh.len();
        index.urls.extend(fresh.into_iter().map(str::to_string));
        index.synced_len = Some(file_len(&path).await?);

        debug!(added, total = index.urls.len(), "appended records");
        Ok(added)
    }

    // -----------------------------------------------------------------------
    // Per-kind conveniences
    // -----------------------------------------------------------------------

    pub async fn load_raw(&self) -> Result<Vec<RawDocument>> {
        self.load().await
    }

    pub async fn load_normalized(&self) -> Result<Vec<NormalizedDocument>> {
        self.load().await
    }

    pub async fn load_summaries(&self) -> Result<Vec<Summary>> {
        self.load().await
    }

    pub async fn add_raw(&self, docs: &[RawDocument]) -> Result<usize> {
        self.add(docs).await
    }

    pub async fn add_normalized(&self, docs: &[NormalizedDocument]) -> Result<usize> {
        self.add(docs).await
    }

    pub async fn add_summaries(&self, summaries: &[Summary]) -> Result<usize> {
        self.add(summaries).await
    }
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

/// Parse every line of `path`; also returns the byte length that was read.
async fn read_records<R: StoreRecord>(path: &Path) -> Result<(Vec<R>, u64)> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
        Err(e) => return Err(ResearchError::io(path, e)),
    };

    let mut records = Vec::new();
    for (idx, line) in bytes.split(|b| *b == b'\n').enumerate() {
        let line = std::str::from_utf8(line)
            .map_err(|e| ResearchError::corrupt(path, idx + 1, e.to_string()))?
            .trim();
        if line.is_empty() {
            continue;
        }
        let record = serde_json::from_str(line)
            .map_err(|e| ResearchError::corrupt(path, idx + 1, e.to_string()))?;
        records.push(record);
    }

    Ok((records, bytes.len() as u64))
}

/// Rebuild the index unless the file is exactly as long as when last synced.
async fn sync_index<R: StoreRecord>(index: &mut UrlIndex, path: &Path) -> Result<()> {
    let len = file_len(path).await?;
    if index.synced_len == Some(len) {
        return Ok(());
    }

    let (records, read_len) = read_records::<R>(path).await?;
    index.urls = records.iter().map(|r| r.url().to_string()).collect();
    index.synced_len = Some(read_len);

    debug!(path = %path.display(), urls = index.urls.len(), "rebuilt URL index");
    Ok(())
}

async fn file_len(path: &Path) -> Result<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(ResearchError::io(path, e)),
    }
}

/// Whether `path` is missing, empty, or ends with `\n`.
async fn ends_with_newline(path: &Path) -> Result<bool> {
    let mut file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(ResearchError::io(path, e)),
    };

    let len = file.metadata().await.map_err(|e| ResearchError::io(path, e))?.len();
    if len == 0 {
        return Ok(true);
    }

    file.seek(std::io::SeekFrom::End(-1))
        .await
        .map_err(|e| ResearchError::io(path, e))?;
    let last = file.read_u8().await.map_err(|e| ResearchError::io(path, e))?;
    Ok(last == b'\n')
}

/// Append `bytes` in a single write, creating parent directories.
async fn append(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ResearchError::io(parent, e))?;
    }

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| ResearchError::io(path, e))?;

    file.write_all(bytes)
        .await
        .map_err(|e| ResearchError::io(path, e))?;
    file.flush().await.map_err(|e| ResearchError::io(path, e))?;
    Ok(())
}
