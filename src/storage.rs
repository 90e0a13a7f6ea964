//! Per-opportunity JSON store.
//!
//! One pretty-printed file per record, named `<YYYYMMDD>_<tender_id>.json`
//! after the record's creation day. Files are created, never rewritten.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate};
use tracing::warn;

use crate::error::{LoadError, PersistenceError};
use crate::types::OpportunityRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Written(PathBuf),
    /// A record with the same key was saved earlier and left untouched.
    AlreadyPresent(PathBuf),
}

pub struct OpportunityStore {
    data_dir: PathBuf,
}

impl OpportunityStore {
    /// Open the store, creating the data directory if needed.
    pub fn open(data_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path_for(&self, record: &OpportunityRecord) -> PathBuf {
        self.data_dir.join(file_name(record))
    }

    pub fn save(&self, record: &OpportunityRecord) -> Result<SaveOutcome, PersistenceError> {
        let path = self.path_for(record);
        let json = serde_json::to_string_pretty(record).map_err(|source| PersistenceError::Serialize {
            tender_id: record.tender_id.clone(),
            source,
        })?;

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Ok(SaveOutcome::AlreadyPresent(path));
            }
            Err(source) => return Err(PersistenceError::Io { path, source }),
        };

        file.write_all(json.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|source| PersistenceError::Io { path: path.clone(), source })?;

        Ok(SaveOutcome::Written(path))
    }

    /// Every readable record keyed to a day in `start..=end`.
    ///
    /// Records that cannot be read or parsed are logged and skipped.
    pub fn load_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<OpportunityRecord> {
        let mut paths = self.paths_in_range(start, end);
        paths.sort();

        let mut records = Vec::new();
        for path in paths {
            match load_record(&path) {
                Ok(record) => records.push(record),
                Err(e) => warn!(error = %e, "Skipping unreadable stored opportunity"),
            }
        }
        records
    }

    /// Records from the last `days_back` days up to and including `today`.
    pub fn load_recent(&self, days_back: u32, today: NaiveDate) -> Vec<OpportunityRecord> {
        let start = today
            .checked_sub_signed(Duration::days(i64::from(days_back)))
            .unwrap_or(NaiveDate::MIN);
        self.load_range(start, today)
    }

    fn paths_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.data_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, dir = ?self.data_dir, "Failed to list opportunity store");
                return Vec::new();
            }
        };

        entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .and_then(key_date)
                    .is_some_and(|date| date >= start && date <= end)
            })
            .collect()
    }
}

pub fn file_name(record: &OpportunityRecord) -> String {
    format!(
        "{}_{}.json",
        record.creation_date().format("%Y%m%d"),
        sanitize_id(&record.tender_id)
    )
}

fn sanitize_id(tender_id: &str) -> String {
    tender_id.replace(['/', '\\'], "_")
}

/// Key date of a stored file name, `None` for anything that is not a record file.
fn key_date(file_name: &str) -> Option<NaiveDate> {
    if !file_name.ends_with(".json") {
        return None;
    }
    let (date_part, _) = file_name.split_once('_')?;
    if date_part.len() != 8 {
        return None;
    }
    NaiveDate::parse_from_str(date_part, "%Y%m%d").ok()
}

pub fn load_record(path: &Path) -> Result<OpportunityRecord, LoadError> {
    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
