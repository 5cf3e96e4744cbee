//! CSV-backed record store.
//!
//! Rows look like `wine_id,label,harvest_year,type` under a header row.
//! A record's id is its 0-based position among the data rows, which is what
//! the index stores as the [`Rid`](crate::Rid) page number.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::common::{Error, Result};

/// Header written when the store creates its file.
pub const CSV_HEADER: &str = "wine_id,label,harvest_year,type";

const COLUMNS: usize = 4;

/// One data row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub wine_id: i64,
    pub label: String,
    pub harvest_year: i32,
    pub kind: String,
}

impl Record {
    fn parse(row: usize, line: &str) -> Result<Self> {
        let ctx = || format!("record {row}");
        let cols: Vec<&str> = line.split(',').map(str::trim).collect();
        if cols.len() != COLUMNS {
            return Err(Error::format(
                ctx(),
                format!("expected {COLUMNS} columns, found {}", cols.len()),
            ));
        }

        let wine_id = cols[0]
            .parse()
            .map_err(|e| Error::format(ctx(), format!("wine_id {:?}: {e}", cols[0])))?;
        let harvest_year = cols[2]
            .parse()
            .map_err(|e| Error::format(ctx(), format!("harvest_year {:?}: {e}", cols[2])))?;
        Ok(Self {
            wine_id,
            label: cols[1].to_string(),
            harvest_year,
            kind: cols[3].to_string(),
        })
    }

    fn to_line(&self) -> String {
        format!(
            "{},{},{},{}",
            self.wine_id, self.label, self.harvest_year, self.kind
        )
    }
}

/// The data file the index points into.
///
/// The file is re-read on every call; the store keeps no cached rows.
#[derive(Debug, Clone)]
pub struct CsvRecordStore {
    path: PathBuf,
}

impl CsvRecordStore {
    /// Use an existing CSV file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::metadata(&path)?;
        Ok(Self { path })
    }

    /// Open `path`, creating it with just the header row if missing.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            fs::write(&path, format!("{CSV_HEADER}\n"))?;
            debug!(path = %path.display(), "created record store");
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every data row with its id. Blank lines are skipped and do not
    /// consume an id.
    pub fn scan(&self) -> Result<Vec<(u32, Record)>> {
        let text = fs::read_to_string(&self.path)?;
        text.lines()
            .skip(1)
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(row, line)| {
                let id = u32::try_from(row)
                    .map_err(|_| Error::format("record store", "too many rows"))?;
                Record::parse(row, line).map(|record| (id, record))
            })
            .collect()
    }

    /// Ids of the rows whose harvest year is `year`, in file order.
    ///
    /// Rows that fail to parse are reported as errors rather than skipped.
    pub fn ids_with_harvest_year(&self, year: i32) -> Result<Vec<u32>> {
        Ok(self
            .scan()?
            .into_iter()
            .filter(|(_, record)| record.harvest_year == year)
            .map(|(id, _)| id)
            .collect())
    }

    /// Row `id`.
    pub fn read_record(&self, id: u32) -> Result<Record> {
        self.scan()?
            .into_iter()
            .find(|(row, _)| *row == id)
            .map(|(_, record)| record)
            .ok_or(Error::RecordNotFound(id))
    }

    /// Append a row and return its id.
    pub fn append_record(&self, record: &Record) -> Result<u32> {
        let id = u32::try_from(self.scan()?.len())
            .map_err(|_| Error::format("record store", "too many rows"))?;

        let text = fs::read_to_string(&self.path)?;
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        if !text.is_empty() && !text.ends_with('\n') {
            file.write_all(b"\n")?;
        }
        writeln!(file, "{}", record.to_line())?;
        debug!(id, year = record.harvest_year, "appended record");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample(dir: &Path) -> CsvRecordStore {
        let path = dir.join("wines.csv");
        fs::write(
            &path,
            "wine_id,label,harvest_year,type\n\
             1,Malbec Reserva,2019,tinto\n\
             2,Torrontes,2021,blanco\n\
             \n\
             3,Carmenere,2019,tinto",
        )
        .unwrap();
        CsvRecordStore::open(&path).unwrap()
    }

    #[test]
    fn test_scan_and_read() {
        let dir = tempdir().unwrap();
        let store = sample(dir.path());

        let rows = store.scan().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].0, 2);
        assert_eq!(rows[2].1.label, "Carmenere");

        assert_eq!(store.read_record(1).unwrap().harvest_year, 2021);
        assert!(matches!(store.read_record(3), Err(Error::RecordNotFound(3))));
        assert_eq!(store.ids_with_harvest_year(2019).unwrap(), vec![0, 2]);
    }

    #[test]
    fn test_append_after_unterminated_line() {
        let dir = tempdir().unwrap();
        let store = sample(dir.path());
        let record = Record {
            wine_id: 4,
            label: "Bonarda".to_string(),
            harvest_year: 2020,
            kind: "tinto".to_string(),
        };

        assert_eq!(store.append_record(&record).unwrap(), 3);
        assert_eq!(store.read_record(3).unwrap(), record);
        assert_eq!(store.read_record(2).unwrap().label, "Carmenere");
    }

    #[test]
    fn test_create_and_malformed_row() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("new.csv");
        let store = CsvRecordStore::open_or_create(&path).unwrap();
        assert!(store.scan().unwrap().is_empty());

        fs::write(&path, "wine_id,label,harvest_year,type\n1,x,nope,tinto\n").unwrap();
        assert!(matches!(store.scan(), Err(Error::Format { .. })));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            CsvRecordStore::open(dir.path().join("missing.csv")),
            Err(Error::Io(_))
        ));
    }
}
