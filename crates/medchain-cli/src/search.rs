//! # Search Subcommand

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use medchain_core::Timestamp;
use medchain_ledger::SearchFilters;

use crate::{parse_time, write_json, LocalService, EXIT_OK};

/// Arguments for `medchain search`. Filters are ANDed; repeated labels or
/// tags match any of the given values.
#[derive(Args, Debug, Default)]
pub struct SearchArgs {
    /// Exact subject identifier.
    #[arg(long)]
    pub subject: Option<String>,

    /// Accepted label (repeatable).
    #[arg(long = "label", value_name = "LABEL")]
    pub labels: Vec<String>,

    /// Accepted tag (repeatable).
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Exact `recordType` metadata value.
    #[arg(long)]
    pub record_type: Option<String>,

    /// Inclusive lower bound: epoch millis or RFC 3339.
    #[arg(long, value_parser = parse_time)]
    pub from: Option<Timestamp>,

    /// Inclusive upper bound: epoch millis or RFC 3339.
    #[arg(long, value_parser = parse_time)]
    pub to: Option<Timestamp>,
}

impl SearchArgs {
    /// The ledger filters these flags describe.
    pub fn filters(&self) -> SearchFilters {
        SearchFilters {
            subject_id: self.subject.clone(),
            labels: self.labels.clone(),
            tags: self.tags.clone(),
            record_type: self.record_type.clone(),
            date_from: self.from,
            date_to: self.to,
        }
    }
}

/// Execute `medchain search`, printing matches as a JSON array.
pub async fn run_search(args: &SearchArgs, service: &LocalService, out: &mut dyn Write) -> Result<u8> {
    let filters = args.filters();
    let blocks = service
        .ledger()
        .search(&filters)
        .await
        .context("search failed")?;
    tracing::debug!(matches = blocks.len(), "search complete");
    write_json(out, &blocks)?;
    Ok(EXIT_OK)
}
