//! Batch workloads on top of the index.
//!
//! A command script names the tree fanout and a list of insert/search
//! commands; inserts pull their entries from a CSV record store.

pub mod command;
pub mod record_store;
mod runner;

pub use command::{parse_script, Command, CommandScript};
pub use record_store::{CsvRecordStore, Record};
pub use runner::{run_script, RunSummary};
