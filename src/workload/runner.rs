//! Runs a command script against a tree and a record store.

use std::io::Write;

use tracing::{info, warn};

use super::command::{Command, CommandScript};
use super::record_store::CsvRecordStore;
use crate::common::Result;
use crate::index::{BPlusTree, Rid};

/// Totals of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub inserted: usize,
    pub searches: usize,
    /// Commands that hit an error and were skipped.
    pub failed: usize,
    pub height: u32,
}

/// Execute `script` and write one output line per command.
///
/// The output starts with the script header, then `INC:k/<inserted>` or
/// `BUS=:k/<matches>` per command, and ends with `H/<height>`. A command
/// that fails is logged and reported with a count of zero; the batch
/// continues. Only output and final-height errors abort the run.
pub fn run_script<W: Write>(
    script: &CommandScript,
    tree: &mut BPlusTree,
    records: &CsvRecordStore,
    out: &mut W,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    writeln!(out, "{}", script.header)?;

    for &command in &script.commands {
        match command {
            Command::Insert(key) => {
                let count = match insert_matching(tree, records, key) {
                    Ok(count) => count,
                    Err(e) => {
                        warn!(%command, error = %e, "insert failed, skipping");
                        summary.failed += 1;
                        0
                    }
                };
                summary.inserted += count;
                writeln!(out, "{command}/{count}")?;
            }
            Command::Search(key) => {
                summary.searches += 1;
                let count = match tree.search(key) {
                    Ok(rids) => rids.len(),
                    Err(e) => {
                        warn!(%command, error = %e, "search failed, skipping");
                        summary.failed += 1;
                        0
                    }
                };
                writeln!(out, "{command}/{count}")?;
            }
        }
    }

    summary.height = tree.height()?;
    writeln!(out, "H/{}", summary.height)?;
    out.flush()?;

    info!(
        commands = script.commands.len(),
        inserted = summary.inserted,
        failed = summary.failed,
        height = summary.height,
        "finished command script"
    );
    Ok(summary)
}

/// Index every record with harvest year `key`. Stops at the first failed
/// insert and returns the error; earlier inserts stay in the tree.
fn insert_matching(tree: &mut BPlusTree, records: &CsvRecordStore, key: i32) -> Result<usize> {
    let ids = records.ids_with_harvest_year(key)?;
    for &id in &ids {
        tree.insert(key, Rid::new(id))?;
    }
    Ok(ids.len())
}
