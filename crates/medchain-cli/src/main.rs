//! # medchain CLI entry point
//!
//! Parses command-line arguments, opens the local data directory and
//! dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use medchain_cli::chain::{run_chain, run_tip, run_verify_chain};
use medchain_cli::record::{run_record, RecordArgs};
use medchain_cli::search::{run_search, SearchArgs};
use medchain_cli::verify::{run_verify_file, run_verify_name, VerifyFileArgs, VerifyNameArgs};
use medchain_cli::{open_service, resolve_config, EXIT_FAILURE};

/// Medical-record integrity ledger.
///
/// Records files into a local object store with a hash-linked ledger entry
/// each, and proves later that neither the files nor the ledger changed.
#[derive(Parser, Debug)]
#[command(name = "medchain", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Data directory (overrides MEDCHAIN_DATA_DIR).
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a file and append a block vouching for its contents.
    Record(RecordArgs),

    /// Print every block as JSON.
    Chain,

    /// Print the last block.
    Tip,

    /// Verify digests and linkage of the whole chain.
    VerifyChain,

    /// Verify a stored file by object id.
    VerifyFile(VerifyFileArgs),

    /// Verify a stored file by stored name.
    VerifyName(VerifyNameArgs),

    /// Search blocks by subject, label, tag, record type and time.
    Search(SearchArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v when set.
    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("failed to start runtime: {e}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    let config = resolve_config(cli.data_dir)?;
    let service = open_service(&config).await?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Commands::Record(args) => run_record(args, &service, &mut out).await,
        Commands::Chain => run_chain(&service, &mut out).await,
        Commands::Tip => run_tip(&service, &mut out).await,
        Commands::VerifyChain => run_verify_chain(&service, &mut out).await,
        Commands::VerifyFile(args) => run_verify_file(args, &service, &mut out).await,
        Commands::VerifyName(args) => run_verify_name(args, &service, &mut out).await,
        Commands::Search(args) => run_search(args, &service, &mut out).await,
    }
}
