//! bptdb command-line driver.
//!
//! Runs a command script against an index file and writes the results.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: in.txt -> out.txt, index.txt, wines.csv
//! bptdb
//!
//! # Single-frame cache, verbose logging
//! bptdb --policy direct -v -i script.txt -o results.txt
//!
//! # Fine-grained logging
//! RUST_LOG=bptdb=trace bptdb
//! ```

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bptdb::common::config::DEFAULT_POOL_SIZE;
use bptdb::workload::{run_script, CommandScript, CsvRecordStore};
use bptdb::{BPlusTree, CachePolicy, IndexConfig};

/// bptdb command-line driver
#[derive(Parser, Debug)]
#[command(
    name = "bptdb",
    version,
    about = "Run an insert/search command script against an on-disk B+Tree"
)]
struct Args {
    /// Command script (first line `FLH/<fanout>`)
    #[arg(short, long, value_name = "FILE", default_value = "in.txt")]
    input: PathBuf,

    /// Where to write the results
    #[arg(short, long, value_name = "FILE", default_value = "out.txt")]
    output: PathBuf,

    /// Backing index file, created if missing
    #[arg(long, value_name = "FILE", default_value = "index.txt")]
    index: PathBuf,

    /// CSV record store
    #[arg(short, long, value_name = "FILE", default_value = "wines.csv")]
    data: PathBuf,

    /// Buffer pool capacity for the LRU policy
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE)]
    pool_size: usize,

    /// Buffer pool policy
    #[arg(long, value_enum, default_value = "lru")]
    policy: PolicyArg,

    /// Check the tree invariants after the run
    #[arg(long)]
    verify: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Bounded pool with least-recently-used eviction
    Lru,
    /// A single frame; every page switch reloads
    Direct,
}

impl PolicyArg {
    fn into_policy(self, capacity: usize) -> CachePolicy {
        match self {
            PolicyArg::Lru => CachePolicy::Lru { capacity },
            PolicyArg::Direct => CachePolicy::Direct,
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let script = CommandScript::from_path(&args.input)
        .with_context(|| format!("reading command script {}", args.input.display()))?;
    let records = CsvRecordStore::open(&args.data)
        .with_context(|| format!("opening record store {}", args.data.display()))?;

    let config = IndexConfig::new(&args.index, script.order())
        .with_cache_policy(args.policy.into_policy(args.pool_size));
    let mut tree = BPlusTree::open(&config)
        .with_context(|| format!("opening index {}", args.index.display()))?;

    let file = File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    let mut out = BufWriter::new(file);
    let summary = run_script(&script, &mut tree, &records, &mut out)?;

    if args.verify {
        let shape = tree.verify().context("index failed verification")?;
        info!(?shape, "index verified");
    }
    tree.flush()?;
    info!(
        failed = summary.failed,
        stats = %tree.buffer_pool().stats().snapshot(),
        "done"
    );
    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("bptdb=debug")
        } else {
            EnvFilter::new("bptdb=warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
