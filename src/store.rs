//! Per-source record store and its on-disk CSV form.
//!
//! A store is an insertion-ordered map from normalization key to [`Record`].
//! The key is never written to disk; the original native name is kept as a
//! field so its formatting survives round trips. Columns other than the two
//! name columns are carried through untouched, apart from pandas-style `.N`
//! duplicates, which are dropped.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::english::{is_missing, is_valid_english};
use crate::normalize::normalize;
use crate::record::{sanitize_english, Record};

/// Byte-order mark written at the start of every file for spreadsheet tools.
pub const UTF8_BOM: &str = "\u{feff}";

const NATIVE_COLUMN: &str = "native_name";
const ENGLISH_COLUMN: &str = "english_name";

/// Header aliases accepted for the native-name column, in priority order.
const NATIVE_ALIASES: &[&str] = &[NATIVE_COLUMN, "chinese_name"];

/// Header aliases accepted for the English-name column, in priority order.
const ENGLISH_ALIASES: &[&str] = &[ENGLISH_COLUMN, "original_name"];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{} has no native-name column (found {columns:?})", .path.display())]
    MissingNativeColumn { path: PathBuf, columns: Vec<String> },
}

/// What `open` had to fix while loading a store file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Header differs from the one `flush` writes
    pub legacy_header: bool,
    /// Rows dropped because their native name normalized to nothing
    pub blank_rows_dropped: usize,
    /// Rows dropped because an earlier row had the same key
    pub duplicates_dropped: usize,
    /// English names changed by sanitization or sentinel clearing
    pub english_cleaned: usize,
}

impl LoadReport {
    /// Whether the file on disk differs from what `flush` would write.
    pub fn needs_rewrite(&self) -> bool {
        self.legacy_header
            || self.blank_rows_dropped > 0
            || self.duplicates_dropped > 0
            || self.english_cleaned > 0
    }
}

#[derive(Debug, Clone)]
pub struct RecordStore {
    source: String,
    path: Option<PathBuf>,
    records: Vec<Record>,
    index: HashMap<String, usize>,
    /// Header cells of the carried-through columns
    extra_columns: Vec<String>,
    /// Values of the carried-through columns, parallel to `records`
    extras: Vec<Vec<String>>,
}

impl RecordStore {
    /// Create an empty in-memory store for a source.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            path: None,
            records: Vec::new(),
            index: HashMap::new(),
            extra_columns: Vec::new(),
            extras: Vec::new(),
        }
    }

    /// Build an in-memory store, keeping the first record per key and
    /// dropping records with an empty native name.
    pub fn with_records(
        source: impl Into<String>,
        records: impl IntoIterator<Item = Record>,
    ) -> Self {
        let mut store = Self::new(source);
        for record in records {
            let key = record.key();
            if !key.is_empty() && !store.index.contains_key(&key) {
                store.push(key, record);
            }
        }
        store
    }

    /// Open the store persisted at `path`; a missing file yields an empty
    /// store bound to that path.
    pub fn open(source: impl Into<String>, path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::open_with_report(source, path).map(|(store, _)| store)
    }

    /// Like [`RecordStore::open`], also reporting what was cleaned up.
    pub fn open_with_report(
        source: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Result<(Self, LoadReport), StoreError> {
        let path = path.into();
        let mut store = Self::new(source);
        let mut report = LoadReport::default();

        if path.exists() {
            let text = fs::read_to_string(&path).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            let text = text.strip_prefix(UTF8_BOM).unwrap_or(&text);
            store.load_csv(&path, text, &mut report)?;
            debug!(
                "Loaded {} records from {} ({:?})",
                store.len(),
                path.display(),
                report
            );
        }

        store.path = Some(path);
        Ok((store, report))
    }

    fn load_csv(
        &mut self,
        path: &Path,
        text: &str,
        report: &mut LoadReport,
    ) -> Result<(), StoreError> {
        let csv_error = |source| StoreError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());

        let columns: Vec<String> = reader
            .headers()
            .map_err(csv_error)?
            .iter()
            .map(canonical_header)
            .collect();

        let native_idx = find_column(&columns, NATIVE_ALIASES).ok_or_else(|| {
            StoreError::MissingNativeColumn {
                path: path.to_path_buf(),
                columns: columns.clone(),
            }
        })?;
        let english_idx = find_column(&columns, ENGLISH_ALIASES);

        let raw_header: Vec<String> = reader
            .headers()
            .map_err(csv_error)?
            .iter()
            .map(|cell| cell.trim_start_matches(UTF8_BOM).trim().to_string())
            .collect();
        let extra_idx: Vec<usize> = (0..columns.len())
            .filter(|&idx| Some(idx) != english_idx && idx != native_idx)
            .filter(|&idx| !is_pandas_duplicate(&columns[idx]))
            .collect();
        self.extra_columns = extra_idx.iter().map(|&idx| raw_header[idx].clone()).collect();

        let written_header: Vec<&str> = [NATIVE_COLUMN, ENGLISH_COLUMN]
            .into_iter()
            .chain(self.extra_columns.iter().map(String::as_str))
            .collect();
        report.legacy_header = raw_header != written_header;

        for row in reader.records() {
            let row = row.map_err(csv_error)?;
            let native_name = row.get(native_idx).unwrap_or("").trim();
            let key = normalize(native_name);
            if key.is_empty() {
                report.blank_rows_dropped += 1;
                continue;
            }

            let raw_english = english_idx.and_then(|idx| row.get(idx)).unwrap_or("");
            let english_name = if is_missing(raw_english) {
                String::new()
            } else {
                sanitize_english(raw_english)
            };
            if english_name != raw_english {
                report.english_cleaned += 1;
            }

            if self.index.contains_key(&key) {
                report.duplicates_dropped += 1;
                continue;
            }
            self.push(key, Record::new(native_name, english_name));
            if let Some(values) = self.extras.last_mut() {
                *values = extra_idx
                    .iter()
                    .map(|&idx| row.get(idx).unwrap_or("").to_string())
                    .collect();
            }
        }
        Ok(())
    }

    /// Source identifier (the territory directory name).
    pub fn source(&self) -> &str {
        &self.source
    }

    /// File this store is persisted to, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// File name component of the persisted path.
    pub fn file_name(&self) -> Option<&str> {
        self.path
            .as_deref()
            .and_then(Path::file_name)
            .and_then(|name| name.to_str())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Header cells of the columns kept alongside the two name columns.
    pub fn extra_columns(&self) -> &[String] {
        &self.extra_columns
    }

    /// Records in insertion order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Look up a record by native name (normalized before lookup).
    pub fn get(&self, native_name: &str) -> Option<&Record> {
        self.position(&normalize(native_name))
            .map(|pos| &self.records[pos])
    }

    /// Number of records whose English name would be sent for translation.
    pub fn invalid_english_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| !is_valid_english(&record.english_name))
            .count()
    }

    pub(crate) fn position(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub(crate) fn record_mut(&mut self, position: usize) -> &mut Record {
        &mut self.records[position]
    }

    pub(crate) fn push(&mut self, key: String, record: Record) {
        self.index.insert(key, self.records.len());
        self.records.push(record);
        self.extras.push(Vec::new());
    }

    /// Write the store to its bound path. In-memory stores are a no-op.
    pub fn flush(&self) -> Result<(), StoreError> {
        match &self.path {
            Some(path) => self.save_to(path),
            None => Ok(()),
        }
    }

    /// Write the store as a BOM-prefixed CSV file.
    ///
    /// The file is written next to the target and renamed over it, so an
    /// interrupted write never leaves a truncated store behind.
    pub fn save_to(&self, path: &Path) -> Result<(), StoreError> {
        let csv_error = |source| StoreError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut buffer = UTF8_BOM.as_bytes().to_vec();
        {
            let mut writer = csv::Writer::from_writer(&mut buffer);
            let header = [NATIVE_COLUMN, ENGLISH_COLUMN]
                .into_iter()
                .chain(self.extra_columns.iter().map(String::as_str));
            writer.write_record(header).map_err(csv_error)?;

            for (record, extras) in self.records.iter().zip(&self.extras) {
                // Records added after loading have no extra values yet
                let padding = self.extra_columns.len().saturating_sub(extras.len());
                let row = [record.native_name.as_str(), record.english_name.as_str()]
                    .into_iter()
                    .chain(extras.iter().map(String::as_str))
                    .chain(std::iter::repeat("").take(padding));
                writer.write_record(row).map_err(csv_error)?;
            }
            writer.flush().map_err(|source| StoreError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }

        write_atomically(path, &buffer)
    }
}

/// Write `contents` to a sibling temp file and rename it over `path`.
pub(crate) fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let io_error = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    fs::write(&tmp_path, contents).map_err(io_error)?;
    fs::rename(&tmp_path, path).map_err(io_error)
}

/// Normalize a header cell: trim, drop a stray BOM, lower-case, spaces to
/// underscores (`"Chinese Name"` becomes `"chinese_name"`).
fn canonical_header(cell: &str) -> String {
    cell.trim_start_matches(UTF8_BOM)
        .trim()
        .to_lowercase()
        .replace(' ', "_")
}

/// Pandas renames repeated headers to `name.1`, `name.2`, ...
fn is_pandas_duplicate(column: &str) -> bool {
    column.rsplit_once('.').is_some_and(|(stem, suffix)| {
        !stem.is_empty() && !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit())
    })
}

fn find_column(columns: &[String], aliases: &[&str]) -> Option<usize> {
    aliases
        .iter()
        .find_map(|alias| columns.iter().position(|column| column == alias))
}
