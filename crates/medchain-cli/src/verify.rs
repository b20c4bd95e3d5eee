//! # File Verification Subcommands
//!
//! Re-digest a stored file and compare it with the ledger, by object id or
//! by stored name.
//!
//! | Outcome        | Exit |
//! |----------------|------|
//! | verified       | 0    |
//! | modified       | 2    |
//! | block tampered | 1    |
//! | unrecorded     | 1    |

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use medchain_ledger::{ObjectId, ObjectVerification};

use crate::{LocalService, EXIT_FAILURE, EXIT_MODIFIED, EXIT_OK};

/// Arguments for `medchain verify-file`.
#[derive(Args, Debug)]
pub struct VerifyFileArgs {
    /// Object id printed by `medchain record`.
    #[arg(value_name = "OBJECT_ID")]
    pub object_id: String,
}

/// Arguments for `medchain verify-name`.
#[derive(Args, Debug)]
pub struct VerifyNameArgs {
    /// Stored name, including its time prefix.
    #[arg(value_name = "NAME")]
    pub name: String,
}

/// Execute `medchain verify-file`.
pub async fn run_verify_file(
    args: &VerifyFileArgs,
    service: &LocalService,
    out: &mut dyn Write,
) -> Result<u8> {
    let id = ObjectId::new(args.object_id.clone());
    let outcome = service
        .verify_object(&id)
        .await
        .with_context(|| format!("failed to verify object {id}"))?;
    report(&outcome, out)
}

/// Execute `medchain verify-name`.
pub async fn run_verify_name(
    args: &VerifyNameArgs,
    service: &LocalService,
    out: &mut dyn Write,
) -> Result<u8> {
    let outcome = service
        .verify_object_by_name(&args.name)
        .await
        .with_context(|| format!("failed to verify {}", args.name))?;
    report(&outcome, out)
}

/// Exit code for a verification outcome.
pub fn exit_code(outcome: &ObjectVerification) -> u8 {
    match outcome {
        ObjectVerification::Verified { .. } => EXIT_OK,
        ObjectVerification::Modified { .. } => EXIT_MODIFIED,
        ObjectVerification::BlockTampered { .. } | ObjectVerification::Unrecorded { .. } => {
            EXIT_FAILURE
        }
    }
}

fn report(outcome: &ObjectVerification, out: &mut dyn Write) -> Result<u8> {
    match outcome {
        ObjectVerification::Verified { block } => {
            writeln!(out, "OK: file matches block {}", block.index)?;
            writeln!(out, "  digest: {}", block.payload.content_digest)?;
        }
        ObjectVerification::Modified { block, computed } => {
            writeln!(out, "MODIFIED: file differs from block {}", block.index)?;
            writeln!(out, "  recorded: {}", block.payload.content_digest)?;
            writeln!(out, "  computed: {computed}")?;
        }
        ObjectVerification::BlockTampered { block, .. } => {
            writeln!(
                out,
                "TAMPERED: block {} fails its own digest check; run verify-chain",
                block.index
            )?;
        }
        ObjectVerification::Unrecorded { computed } => {
            writeln!(out, "UNRECORDED: no block matches digest {computed}")?;
        }
    }
    Ok(exit_code(outcome))
}
