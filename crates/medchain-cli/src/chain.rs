//! # Chain Subcommands
//!
//! Read-only views of the persisted chain: every block, the tip, and the
//! full integrity check.

use std::io::Write;

use anyhow::{Context, Result};

use crate::{write_json, LocalService, EXIT_FAILURE, EXIT_OK};

/// Print every block as a JSON array.
pub async fn run_chain(service: &LocalService, out: &mut dyn Write) -> Result<u8> {
    let blocks = service.ledger().all_blocks().await.context("failed to read chain")?;
    write_json(out, &blocks)?;
    Ok(EXIT_OK)
}

/// Print the last block, or a notice for an empty chain.
pub async fn run_tip(service: &LocalService, out: &mut dyn Write) -> Result<u8> {
    match service.ledger().last_block().await.context("failed to read chain tip")? {
        Some(block) => write_json(out, &block)?,
        None => writeln!(out, "chain is empty")?,
    }
    Ok(EXIT_OK)
}

/// Verify the persisted chain, printing each fault. Exits 1 if any.
pub async fn run_verify_chain(service: &LocalService, out: &mut dyn Write) -> Result<u8> {
    let ledger = service.ledger();
    let blocks = ledger.all_blocks().await.context("failed to read chain")?;
    let report = ledger.verify_chain(&blocks);
    tracing::debug!(blocks = blocks.len(), faults = report.errors.len(), "chain verified");
    if report.valid {
        writeln!(out, "OK: chain of {} block(s) verified", blocks.len())?;
        return Ok(EXIT_OK);
    }
    writeln!(out, "INVALID: {} problem(s) found", report.errors.len())?;
    for message in report.messages() {
        writeln!(out, "  - {message}")?;
    }
    Ok(EXIT_FAILURE)
}
