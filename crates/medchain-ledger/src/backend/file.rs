//! # File Ledger Backend
//!
//! Persists the chain as JSON Lines: one sealed block per line in
//! `{dir}/blocks.jsonl`, appended in index order. The file is the source of
//! truth; an in-memory copy serves reads.
//!
//! ## Multiple writers
//!
//! Several backends (in one process or many) may share a directory. Every
//! operation takes an OS advisory lock on the ledger file (shared for reads,
//! exclusive for appends) and first catches up on lines other writers added
//! since the last look. The compare-and-append check therefore runs against
//! the persisted tip, not a cached one.
//!
//! ## Write failures
//!
//! The in-memory copy is only extended after the line has been written (and,
//! with `sync_writes`, fsynced). A failed write truncates the file back to
//! its previous length. If that truncation also fails, the file holds an
//! unknown tail and the backend refuses every further append.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fs2::FileExt;
use medchain_core::Block;
use parking_lot::{Mutex, RwLock};

use super::{check_append, LedgerBackend};
use crate::error::LedgerError;
use crate::query::BlockQuery;

/// File name of the ledger inside the data directory.
pub const LEDGER_FILE: &str = "blocks.jsonl";

/// JSON Lines backend rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    path: PathBuf,
    file: Mutex<LedgerFile>,
    blocks: RwLock<Vec<Block>>,
    sync_writes: bool,
    poisoned: AtomicBool,
}

/// Open handle plus how much of the file has been loaded.
#[derive(Debug)]
struct LedgerFile {
    handle: File,
    synced_len: u64,
    lines: usize,
    ends_with_newline: bool,
}

impl FileBackend {
    /// Open (or create) the ledger in `dir`, fsyncing every append.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, LedgerError> {
        Self::open_with(dir, true).await
    }

    /// Open (or create) the ledger in `dir`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Corrupt`] if any existing line fails to decode as a
    /// block; [`LedgerError::Io`] if the directory or file is inaccessible.
    pub async fn open_with(dir: impl AsRef<Path>, sync_writes: bool) -> Result<Self, LedgerError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(LEDGER_FILE);

        let shared = blocking(move || {
            let handle = OpenOptions::new()
                .read(true)
                .append(true)
                .create(true)
                .open(&path)?;
            let shared = Shared {
                path,
                file: Mutex::new(LedgerFile {
                    handle,
                    synced_len: 0,
                    lines: 0,
                    ends_with_newline: true,
                }),
                blocks: RwLock::new(Vec::new()),
                sync_writes,
                poisoned: AtomicBool::new(false),
            };
            shared.refresh()?;
            Ok(shared)
        })
        .await?;

        tracing::debug!(
            path = %shared.path.display(),
            blocks = shared.blocks.read().len(),
            "opened ledger file"
        );
        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    /// Path of the JSON Lines file.
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Catch up with the file, then answer `read` from the in-memory copy.
    async fn read_with<T, F>(&self, read: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&[Block]) -> T + Send + 'static,
        T: Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        blocking(move || {
            shared.refresh()?;
            let blocks = shared.blocks.read();
            Ok(read(blocks.as_slice()))
        })
        .await
    }
}

/// Run blocking file work off the async executor.
async fn blocking<T, F>(work: F) -> Result<T, LedgerError>
where
    F: FnOnce() -> Result<T, LedgerError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| LedgerError::Unavailable(format!("ledger file task failed: {e}")))?
}

/// Hold the OS file lock for the duration of `f`.
fn with_file_lock<T>(
    file: &mut LedgerFile,
    exclusive: bool,
    f: impl FnOnce(&mut LedgerFile) -> Result<T, LedgerError>,
) -> Result<T, LedgerError> {
    if exclusive {
        FileExt::lock_exclusive(&file.handle)?;
    } else {
        FileExt::lock_shared(&file.handle)?;
    }
    let result = f(file);
    if let Err(e) = FileExt::unlock(&file.handle) {
        tracing::warn!(error = %e, "failed to release ledger file lock");
    }
    result
}

impl Shared {
    /// Load lines written since the last look, under a shared lock.
    fn refresh(&self) -> Result<(), LedgerError> {
        let mut file = self.file.lock();
        with_file_lock(&mut file, false, |file| self.catch_up(file))
    }

    /// Parse everything past `synced_len`. The caller holds the file lock.
    fn catch_up(&self, file: &mut LedgerFile) -> Result<(), LedgerError> {
        let len = file.handle.metadata()?.len();
        if len < file.synced_len {
            return Err(LedgerError::Corrupt {
                line: file.lines,
                reason: format!("ledger file shrank from {} to {len} bytes", file.synced_len),
            });
        }
        if len == file.synced_len {
            return Ok(());
        }

        file.handle.seek(SeekFrom::Start(file.synced_len))?;
        let mut raw = Vec::new();
        (&file.handle).take(len - file.synced_len).read_to_end(&mut raw)?;
        let text = String::from_utf8(raw).map_err(|e| LedgerError::Corrupt {
            line: file.lines + 1,
            reason: e.to_string(),
        })?;

        let mut fresh = Vec::new();
        let mut line = file.lines;
        for piece in text.split_inclusive('\n') {
            line += 1;
            let trimmed = piece.trim();
            if trimmed.is_empty() {
                continue;
            }
            let block: Block = serde_json::from_str(trimmed).map_err(|e| LedgerError::Corrupt {
                line,
                reason: e.to_string(),
            })?;
            fresh.push(block);
        }

        file.synced_len = len;
        file.lines = line;
        file.ends_with_newline = text.ends_with('\n');
        if !fresh.is_empty() {
            tracing::debug!(added = fresh.len(), "loaded ledger lines");
            let mut blocks = self.blocks.write();
            blocks.extend(fresh);
            blocks.sort_by_key(|b| b.index);
        }
        Ok(())
    }

    fn append(&self, expected_tip: Option<u64>, block: Block) -> Result<(), LedgerError> {
        if self.poisoned.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable(
                "ledger file has an unrecoverable partial write".into(),
            ));
        }
        let mut line = serde_json::to_vec(&block)?;
        line.push(b'\n');

        let mut file = self.file.lock();
        with_file_lock(&mut file, true, |file| {
            self.catch_up(file)?;
            let actual_tip = self.blocks.read().last().map(|b| b.index);
            check_append(expected_tip, actual_tip, &block)?;

            let prev_len = file.synced_len;
            if prev_len > 0 && !file.ends_with_newline {
                line.insert(0, b'\n');
            }
            if let Err(e) = write_line(&mut file.handle, &line, self.sync_writes) {
                tracing::error!(index = block.index, error = %e, "ledger write failed, rolling back");
                if let Err(rollback) = file.handle.set_len(prev_len) {
                    self.poisoned.store(true, Ordering::SeqCst);
                    tracing::error!(error = %rollback, "ledger rollback failed, refusing further appends");
                }
                return Err(e.into());
            }

            file.synced_len = prev_len + line.len() as u64;
            file.lines += line.iter().filter(|&&b| b == b'\n').count();
            file.ends_with_newline = true;
            self.blocks.write().push(block);
            Ok(())
        })
    }
}

fn write_line(handle: &mut File, line: &[u8], sync: bool) -> std::io::Result<()> {
    handle.write_all(line)?;
    handle.flush()?;
    if sync {
        handle.sync_data()?;
    }
    Ok(())
}

impl LedgerBackend for FileBackend {
    async fn tip(&self) -> Result<Option<Block>, LedgerError> {
        self.read_with(|blocks| blocks.last().cloned()).await
    }

    async fn all(&self) -> Result<Vec<Block>, LedgerError> {
        self.read_with(|blocks| blocks.to_vec()).await
    }

    async fn get(&self, index: u64) -> Result<Option<Block>, LedgerError> {
        self.read_with(move |blocks| {
            blocks
                .binary_search_by_key(&index, |b| b.index)
                .ok()
                .map(|pos| blocks[pos].clone())
        })
        .await
    }

    async fn find(&self, query: &BlockQuery) -> Result<Vec<Block>, LedgerError> {
        let query = query.clone();
        self.read_with(move |blocks| blocks.iter().filter(|b| query.matches(b)).cloned().collect())
            .await
    }

    async fn append(&self, expected_tip: Option<u64>, block: Block) -> Result<(), LedgerError> {
        let shared = Arc::clone(&self.shared);
        blocking(move || shared.append(expected_tip, block)).await
    }
}
