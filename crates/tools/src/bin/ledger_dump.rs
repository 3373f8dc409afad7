//! Inspect a block export file.
//!
//! Replays the exported chain into an in-memory ledger, runs one query,
//! and exits. Errors print raw to standard output; nothing retries.

use chainloom_tools::{dump_asset, dump_block, dump_chain, dump_tx, read_export, replay};
use chainloom_types::Hash;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "ledger-dump", about = "Inspect a chainloom block export file")]
struct Cli {
    /// Block export file to inspect.
    #[arg(long, value_name = "FILE")]
    file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write every block's height/hash/timestamp/tx-root/tx list.
    Dump {
        /// Output file; standard output when omitted.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Print one block.
    Block {
        /// Block hash (hex).
        hash: String,
    },
    /// Print one transaction.
    Tx {
        /// Transaction hash (hex).
        txid: String,
    },
    /// Print one asset registration.
    Asset {
        /// Asset id (hex).
        assetid: String,
    },
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut input = File::open(&cli.file)?;
    let blocks = read_export(&mut input)?;
    tracing::info!(
        blocks = blocks.len(),
        file = %cli.file.display(),
        "replaying export"
    );
    let store = replay(&blocks)?;

    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Command::Dump { out } => match out {
            Some(path) => {
                let mut file = File::create(&path)?;
                dump_chain(&store, &mut file)?;
                file.flush()?;
            }
            None => dump_chain(&store, &mut stdout)?,
        },
        Command::Block { hash } => dump_block(&store, Hash::from_hex(&hash)?, &mut stdout)?,
        Command::Tx { txid } => dump_tx(&store, Hash::from_hex(&txid)?, &mut stdout)?,
        Command::Asset { assetid } => dump_asset(&store, Hash::from_hex(&assetid)?, &mut stdout)?,
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("{e}");
            ExitCode::FAILURE
        }
    }
}
