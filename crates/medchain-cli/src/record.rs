//! # Record Subcommand
//!
//! Reads a local file, stores it in the object store under an
//! upload-time-prefixed name and appends a block carrying its digest.
//! Prints the receipt as JSON.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use medchain_core::MetadataValue;
use medchain_ledger::RecordRequest;

use crate::{parse_meta, write_json, LocalService, EXIT_OK};

/// Arguments for `medchain record`.
#[derive(Args, Debug)]
pub struct RecordArgs {
    /// File to record.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Name to store the file under (defaults to the file name).
    #[arg(long)]
    pub name: Option<String>,

    /// MIME type of the file.
    #[arg(long, default_value = medchain_ledger::integrity::DEFAULT_CONTENT_TYPE)]
    pub content_type: String,

    /// Owner / patient identifier.
    #[arg(long)]
    pub subject: Option<String>,

    /// Label to attach (repeatable).
    #[arg(long = "label", value_name = "LABEL")]
    pub labels: Vec<String>,

    /// Tag to attach (repeatable).
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Metadata entry as key=value (repeatable).
    #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_meta)]
    pub metadata: Vec<(String, MetadataValue)>,
}

/// Execute `medchain record`.
pub async fn run_record(args: &RecordArgs, service: &LocalService, out: &mut dyn Write) -> Result<u8> {
    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("failed to read file: {}", args.file.display()))?;

    let name = match &args.name {
        Some(name) => name.clone(),
        None => args
            .file
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .with_context(|| format!("cannot derive a name from {}", args.file.display()))?,
    };

    let mut request = RecordRequest::new(name, bytes).with_content_type(&args.content_type);
    if let Some(subject) = &args.subject {
        request = request.with_subject(subject);
    }
    request.labels.extend(args.labels.iter().cloned());
    request.tags.extend(args.tags.iter().cloned());
    request.metadata.extend(args.metadata.iter().cloned());

    let receipt = service
        .record_object(request)
        .await
        .context("failed to record file")?;
    write_json(out, &receipt)?;
    Ok(EXIT_OK)
}
