//! # medchain-cli — CLI Tool for the Integrity Ledger
//!
//! Provides the `medchain` command-line interface over a local data
//! directory holding a file-backed ledger and a filesystem object store.
//!
//! ## Subcommands
//!
//! - `medchain record` — store a file and append a block vouching for it.
//! - `medchain chain` / `medchain tip` — print the persisted blocks.
//! - `medchain verify-chain` — full tamper check of the persisted chain.
//! - `medchain verify-file` / `medchain verify-name` — check one stored file.
//! - `medchain search` — filter blocks by subject, label, tag, type, time.
//!
//! ## Exit Codes
//!
//! `0` success / verified, `1` error, unrecorded file or invalid chain,
//! `2` file modified since it was recorded.
//!
//! ```bash
//! medchain --data-dir ./data record scan.png --subject patient-7 --label xray
//! medchain --data-dir ./data verify-name 1700000000000-scan.png
//! medchain --data-dir ./data verify-chain
//! ```

pub mod chain;
pub mod record;
pub mod search;
pub mod verify;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use medchain_core::{MetadataValue, Timestamp};
use medchain_ledger::{FileBackend, FsContentStore, IntegrityService, LedgerConfig, LedgerStore};

/// Exit code for success.
pub const EXIT_OK: u8 = 0;
/// Exit code for errors, unrecorded files and invalid chains.
pub const EXIT_FAILURE: u8 = 1;
/// Exit code for a file whose bytes changed since it was recorded.
pub const EXIT_MODIFIED: u8 = 2;

/// The service every subcommand runs against.
pub type LocalService = IntegrityService<FileBackend, FsContentStore>;

/// Resolve configuration: environment first, `--data-dir` overrides.
pub fn resolve_config(data_dir: Option<PathBuf>) -> Result<LedgerConfig> {
    let mut config = LedgerConfig::from_env().context("invalid ledger configuration")?;
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    Ok(config)
}

/// Open the ledger and object store under `config.data_dir`.
pub async fn open_service(config: &LedgerConfig) -> Result<LocalService> {
    let ledger = LedgerStore::open(config)
        .await
        .with_context(|| format!("failed to open ledger in {}", config.ledger_dir().display()))?;
    let content = FsContentStore::open(config.objects_dir())
        .await
        .with_context(|| {
            format!("failed to open object store in {}", config.objects_dir().display())
        })?;
    tracing::debug!(data_dir = %config.data_dir.display(), "opened local service");
    Ok(IntegrityService::new(ledger, content))
}

/// Parse a `key=value` metadata flag. Integers and `true`/`false`/`null`
/// keep their type; anything else is text.
pub fn parse_meta(raw: &str) -> Result<(String, MetadataValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty metadata key in {raw:?}"));
    }
    let value = match value {
        "null" => MetadataValue::Null,
        "true" => MetadataValue::Bool(true),
        "false" => MetadataValue::Bool(false),
        v => match v.parse::<i64>() {
            Ok(n) => MetadataValue::Integer(n),
            Err(_) => MetadataValue::Text(v.to_string()),
        },
    };
    Ok((key.to_string(), value))
}

/// Parse a time flag: milliseconds since the epoch or RFC 3339.
pub fn parse_time(raw: &str) -> Result<Timestamp, String> {
    if let Ok(millis) = raw.parse::<i64>() {
        return Ok(Timestamp::from_millis(millis));
    }
    Timestamp::parse_rfc3339(raw).map_err(|e| e.to_string())
}

/// Write `value` as pretty JSON followed by a newline.
pub fn write_json<T: serde::Serialize>(out: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_values_keep_primitive_types() {
        assert_eq!(
            parse_meta("recordType=lab").unwrap(),
            ("recordType".to_string(), MetadataValue::Text("lab".into()))
        );
        assert_eq!(parse_meta("visits=3").unwrap().1, MetadataValue::Integer(3));
        assert_eq!(parse_meta("fasting=false").unwrap().1, MetadataValue::Bool(false));
        assert_eq!(parse_meta("note=null").unwrap().1, MetadataValue::Null);
        assert_eq!(parse_meta("eq=a=b").unwrap().1, MetadataValue::Text("a=b".into()));
        assert!(parse_meta("novalue").is_err());
        assert!(parse_meta("=x").is_err());
    }

    #[test]
    fn time_accepts_millis_and_rfc3339() {
        assert_eq!(parse_time("1500").unwrap().as_millis(), 1500);
        assert_eq!(parse_time("1970-01-01T00:00:01.250Z").unwrap().as_millis(), 1250);
        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn data_dir_flag_overrides_environment() {
        let config = resolve_config(Some(PathBuf::from("/tmp/medchain-x"))).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/medchain-x"));
    }
}
