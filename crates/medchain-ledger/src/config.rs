//! Ledger configuration.
//!
//! Defaults describe a single local data directory. Override via environment
//! variables or explicit construction for tests.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Environment variable naming the data directory.
pub const DATA_DIR_VAR: &str = "MEDCHAIN_DATA_DIR";
/// Environment variable toggling fsync per append.
pub const SYNC_WRITES_VAR: &str = "MEDCHAIN_SYNC_WRITES";

/// Where the ledger and object store live and how durably they write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Root directory. The ledger lives in `{data_dir}/ledger`, objects in
    /// `{data_dir}/objects`.
    pub data_dir: PathBuf,
    /// Fsync the ledger file after every append.
    pub sync_writes: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            sync_writes: true,
        }
    }
}

impl LedgerConfig {
    /// Configuration rooted at `data_dir` with default durability.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `MEDCHAIN_DATA_DIR` (default: `data`)
    /// - `MEDCHAIN_SYNC_WRITES` (default: `true`; accepts `true`/`false`/`1`/`0`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let data_dir = match lookup(DATA_DIR_VAR) {
            Some(raw) if raw.trim().is_empty() => {
                return Err(ConfigError::InvalidValue {
                    key: DATA_DIR_VAR,
                    value: raw,
                    reason: "must not be empty",
                })
            }
            Some(raw) => PathBuf::from(raw),
            None => defaults.data_dir,
        };
        let sync_writes = match lookup(SYNC_WRITES_VAR) {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::InvalidValue {
                key: SYNC_WRITES_VAR,
                value: raw,
                reason: "expected true, false, 1 or 0",
            })?,
            None => defaults.sync_writes,
        };
        Ok(Self {
            data_dir,
            sync_writes,
        })
    }

    /// Override fsync behaviour.
    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    /// Directory holding the ledger file.
    pub fn ledger_dir(&self) -> PathBuf {
        self.data_dir.join("ledger")
    }

    /// Directory holding stored objects.
    pub fn objects_dir(&self) -> PathBuf {
        self.data_dir.join("objects")
    }

    /// Root data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
