//! Metadata ledger for augmented files.
//!
//! One record per written file, persisted as `log-augment.txt` with a
//! pipe-delimited header line.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};

/// Ledger file name inside the augmentation output directory
pub const LEDGER_FILE: &str = "log-augment.txt";

const HEADER: &str = "filename|label|number of samples";

/// One augmented output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub filename: String,
    pub label: String,
    pub sample_count: usize,
}

impl LedgerEntry {
    pub fn new(filename: impl Into<String>, label: impl Into<String>, sample_count: usize) -> Self {
        Self {
            filename: filename.into(),
            label: label.into(),
            sample_count,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: LedgerEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_samples(&self) -> usize {
        self.entries.iter().map(|entry| entry.sample_count).sum()
    }

    /// Total audio duration in hours at `sample_rate`
    pub fn hours(&self, sample_rate: u32) -> f64 {
        if sample_rate == 0 {
            return 0.0;
        }
        self.total_samples() as f64 / (sample_rate as f64 * 3600.0)
    }

    /// Write the ledger into `out_dir` and return the file path
    pub fn write(&self, out_dir: &Path) -> PipelineResult<PathBuf> {
        let path = out_dir.join(LEDGER_FILE);
        let mut contents = String::with_capacity(64 * (self.entries.len() + 1));
        contents.push_str(HEADER);
        contents.push('\n');
        for entry in &self.entries {
            contents.push_str(&format!(
                "{}|{}|{}\n",
                entry.filename, entry.label, entry.sample_count
            ));
        }
        fs::write(&path, contents).map_err(|err| PipelineError::io(&path, err))?;
        Ok(path)
    }

    /// Parse a ledger file written by [`write`](Self::write)
    pub fn read(path: &Path) -> PipelineResult<Self> {
        let contents = fs::read_to_string(path).map_err(|err| PipelineError::io(path, err))?;
        let mut lines = contents.lines();
        match lines.next() {
            Some(HEADER) => {}
            other => {
                return Err(PipelineError::dataset(format!(
                    "{}: unexpected ledger header {:?}",
                    path.display(),
                    other
                )))
            }
        }

        let mut ledger = Self::new();
        for (number, line) in lines.enumerate().filter(|(_, line)| !line.is_empty()) {
            let fields: Vec<&str> = line.rsplitn(3, '|').collect();
            let [count, label, filename] = fields[..] else {
                return Err(PipelineError::dataset(format!(
                    "{}:{}: expected 3 fields",
                    path.display(),
                    number + 2
                )));
            };
            let sample_count = count.parse().map_err(|err| {
                PipelineError::dataset(format!("{}:{}: {}", path.display(), number + 2, err))
            })?;
            ledger.push(LedgerEntry::new(filename, label, sample_count));
        }
        Ok(ledger)
    }
}

impl FromIterator<LedgerEntry> for Ledger {
    fn from_iter<I: IntoIterator<Item = LedgerEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
