//! Append-only CSV record log, which doubles as the dedup ledger.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::{DedupIndex, ListingRecord, NormalizedKey};

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record log I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("record log CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Canonical dedup identity for a listing href.
pub fn normalize(url: &str) -> NormalizedKey {
    NormalizedKey::from_url(url)
}

#[derive(Debug, Clone)]
pub struct ListingStore {
    path: PathBuf,
}

impl ListingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every recorded url into a fresh [`DedupIndex`].
    ///
    /// A log that does not exist yet is an empty ledger, not an error.
    pub fn load_known_keys(&self) -> Result<DedupIndex> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "record log not found, starting empty");
                return Ok(DedupIndex::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);
        let mut index = DedupIndex::new();
        for (row, result) in reader.deserialize::<ListingRecord>().enumerate() {
            match result {
                Ok(record) => {
                    index.insert(record.key());
                }
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        row = row + 1,
                        error = %e,
                        "skipping unreadable record"
                    );
                }
            }
        }

        debug!(path = %self.path.display(), known = index.len(), "loaded known listings");
        Ok(index)
    }

    /// Appends `records` to the log, writing the `title,url` header first when the log is new.
    ///
    /// Does not touch the filesystem when `records` is empty.
    pub fn append(&self, records: &[ListingRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;

        let len = file.metadata()?.len();
        let needs_header = len == 0;
        if !needs_header && !ends_with_newline(&mut file, len)? {
            // An unterminated last row would otherwise absorb the first new one.
            file.write_all(b"\n")?;
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;

        info!(
            path = %self.path.display(),
            added = records.len(),
            "appended listings to record log"
        );
        Ok(records.len())
    }
}

fn ends_with_newline(file: &mut File, len: u64) -> io::Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
