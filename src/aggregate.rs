//! Global catalog built from every per-source store.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::record::sanitize_english;
use crate::store::{write_atomically, RecordStore, StoreError, UTF8_BOM};
use crate::territory::TerritoryRegistry;

/// One row of the global catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub id: usize,
    pub native_name: String,
    pub english_name: String,
    pub territory_native: String,
    pub territory_code: String,
    /// Source the row came from; not part of the written catalog
    #[serde(skip)]
    pub source: String,
}

#[derive(Debug, Clone, Default)]
pub struct GlobalCatalog {
    entries: Vec<CatalogEntry>,
    skipped: usize,
}

impl GlobalCatalog {
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records left out because they had no native name.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Row count per territory code, in catalog order.
    pub fn territory_counts(&self) -> Vec<(&str, usize)> {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for entry in &self.entries {
            match counts.last_mut() {
                Some((code, count)) if *code == entry.territory_code => *count += 1,
                _ => counts.push((entry.territory_code.as_str(), 1)),
            }
        }
        counts
    }

    /// Write the catalog as a BOM-prefixed CSV file.
    pub fn write_csv(&self, path: &Path) -> Result<(), StoreError> {
        let csv_error = |source| StoreError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut buffer = UTF8_BOM.as_bytes().to_vec();
        {
            let mut writer = csv::Writer::from_writer(&mut buffer);
            if self.entries.is_empty() {
                writer
                    .write_record([
                        "id",
                        "native_name",
                        "english_name",
                        "territory_native",
                        "territory_code",
                    ])
                    .map_err(csv_error)?;
            }
            for entry in &self.entries {
                writer.serialize(entry).map_err(csv_error)?;
            }
            writer.flush().map_err(|source| StoreError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }

        write_atomically(path, &buffer)?;
        info!("Wrote {} catalog rows to {}", self.entries.len(), path.display());
        Ok(())
    }
}

/// Union the stores into one catalog.
///
/// Rows keep source-then-insertion order until the stable sort by territory
/// code; ids are then assigned 1..N. No deduplication happens across
/// sources.
pub fn aggregate<'a>(stores: impl IntoIterator<Item = &'a RecordStore>) -> GlobalCatalog {
    let registry = TerritoryRegistry::get();
    let mut catalog = GlobalCatalog::default();

    for store in stores {
        let territory = registry.territory_for_file(store.source(), store.file_name());
        debug!(
            "Aggregating {} records from {} as {}",
            store.len(),
            store.file_name().unwrap_or(store.source()),
            territory.code
        );

        for record in store.iter() {
            let native_name = record.native_name.trim();
            if native_name.is_empty() {
                catalog.skipped += 1;
                continue;
            }
            catalog.entries.push(CatalogEntry {
                id: 0,
                native_name: native_name.to_string(),
                english_name: sanitize_english(&record.english_name),
                territory_native: territory.native.clone(),
                territory_code: territory.code.clone(),
                source: store.source().to_string(),
            });
        }
    }

    catalog
        .entries
        .sort_by(|a, b| a.territory_code.cmp(&b.territory_code));
    for (position, entry) in catalog.entries.iter_mut().enumerate() {
        entry.id = position + 1;
    }

    catalog
}
