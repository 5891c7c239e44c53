//! Pipeline steps run by the binary over a data root.
//!
//! Each step works source by source. A store that cannot be read or written
//! is logged and skipped; only an unreadable data root or an unwritable
//! catalog fails a step.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::aggregate::{aggregate, GlobalCatalog};
use crate::config::Config;
use crate::enrich::{EnrichOptions, EnrichReport, Enricher};
use crate::gemini::GeminiOracle;
use crate::layout::{discover, store_path_for_raw, SourceDir};
use crate::merge::{merge_listing, MergeOutcome};
use crate::oracle::{TranslationContext, TranslationOracle};
use crate::raw::read_listing;
use crate::retry::RetryPolicy;
use crate::store::RecordStore;
use crate::territory::TerritoryRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// tidy, merge, enrich, aggregate in order
    All,
    Tidy,
    Merge,
    Enrich,
    Aggregate,
    Count,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Command::All),
            "tidy" => Ok(Command::Tidy),
            "merge" => Ok(Command::Merge),
            "enrich" => Ok(Command::Enrich),
            "aggregate" => Ok(Command::Aggregate),
            "count" => Ok(Command::Count),
            other => bail!(
                "Unknown command '{}' (expected all, tidy, merge, enrich, aggregate or count)",
                other
            ),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::All => "all",
            Command::Tidy => "tidy",
            Command::Merge => "merge",
            Command::Enrich => "enrich",
            Command::Aggregate => "aggregate",
            Command::Count => "count",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TidySummary {
    pub files: usize,
    pub rewritten: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub dumps: usize,
    pub failed: usize,
    /// Raw items without a usable native name
    pub discarded: usize,
    pub outcome: MergeOutcome,
}

/// Record counts for one source, as reported by `count`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCount {
    pub source: String,
    pub files: usize,
    pub records: usize,
    pub invalid_english: usize,
}

/// Run `command` against the configured data root.
pub async fn run(command: Command, config: &Config) -> Result<()> {
    info!("Running '{}' on {}", command, config.data_root.display());

    if matches!(command, Command::All | Command::Tidy) {
        tidy(config)?;
    }
    if matches!(command, Command::All | Command::Merge) {
        import_raw(config)?;
    }
    if matches!(command, Command::All | Command::Enrich) {
        match GeminiOracle::from_config(config)? {
            Some(oracle) => {
                enrich_all(config, &oracle).await?;
            }
            None => warn!("GEMINI_API_KEY not set, skipping enrichment"),
        }
    }
    if matches!(command, Command::All | Command::Aggregate) {
        build_catalog(config)?;
    }
    if command == Command::Count {
        count(config)?;
    }

    Ok(())
}

fn sources(config: &Config) -> Result<Vec<SourceDir>> {
    discover(&config.data_root, &config.catalog_output)
        .with_context(|| format!("Failed to scan data root {}", config.data_root.display()))
}

/// Rewrite store files that were loaded with a legacy header, blank rows,
/// duplicate keys or unclean English names.
pub fn tidy(config: &Config) -> Result<TidySummary> {
    let mut summary = TidySummary::default();

    for source in sources(config)? {
        for path in &source.stores {
            summary.files += 1;
            let (store, report) = match RecordStore::open_with_report(source.name.as_str(), path) {
                Ok(loaded) => loaded,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    summary.failed += 1;
                    continue;
                }
            };
            if !report.needs_rewrite() {
                continue;
            }
            match store.flush() {
                Ok(()) => {
                    info!(
                        "Tidied {}: {} records, {} extra columns, dropped {} blank/{} duplicate",
                        path.display(),
                        store.len(),
                        store.extra_columns().len(),
                        report.blank_rows_dropped,
                        report.duplicates_dropped
                    );
                    summary.rewritten += 1;
                }
                Err(e) => {
                    warn!("Failed to rewrite {}: {}", path.display(), e);
                    summary.failed += 1;
                }
            }
        }
    }

    info!(
        "Tidy complete: {} files checked, {} rewritten, {} failed",
        summary.files, summary.rewritten, summary.failed
    );
    Ok(summary)
}

/// Merge every raw fetch dump into the store it belongs to.
pub fn import_raw(config: &Config) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for source in sources(config)? {
        for raw_path in &source.raw_dumps {
            summary.dumps += 1;
            let listing = match read_listing(raw_path) {
                Ok(listing) => listing,
                Err(e) => {
                    warn!("Skipping raw dump {}: {:#}", raw_path.display(), e);
                    summary.failed += 1;
                    continue;
                }
            };

            let store_path = store_path_for_raw(raw_path);
            let mut store = match RecordStore::open(source.name.as_str(), &store_path) {
                Ok(store) => store,
                Err(e) => {
                    warn!("Skipping raw dump {}: {}", raw_path.display(), e);
                    summary.failed += 1;
                    continue;
                }
            };

            let outcome = merge_listing(&mut store, listing.records);
            if let Err(e) = store.flush() {
                warn!("Failed to save {}: {}", store_path.display(), e);
                summary.failed += 1;
                continue;
            }

            info!(
                "Merged {} into {}: {} added, {} updated, {} unchanged, {} skipped, {} discarded",
                raw_path.display(),
                store_path.display(),
                outcome.added,
                outcome.updated,
                outcome.unchanged,
                outcome.skipped,
                listing.discarded
            );
            summary.discarded += listing.discarded;
            summary.outcome.added += outcome.added;
            summary.outcome.updated += outcome.updated;
            summary.outcome.unchanged += outcome.unchanged;
            summary.outcome.skipped += outcome.skipped;
        }
    }

    Ok(summary)
}

/// Options for one enrichment pass. The per-call timeout covers every retry
/// the oracle makes internally.
pub fn enrich_options(config: &Config) -> EnrichOptions {
    let retry = RetryPolicy::oracle_call();
    let attempts = retry.max_attempts.max(1);
    EnrichOptions {
        batch_size: config.enrich_batch_size,
        max_batches: config.enrich_max_batches,
        call_timeout: config.oracle_timeout() * attempts + retry.max_delay * attempts,
    }
}

/// Enrich every store of every source not excluded by
/// `ENRICH_SKIP_SOURCES`, one store at a time.
pub async fn enrich_all<O: TranslationOracle>(config: &Config, oracle: &O) -> Result<EnrichReport> {
    enrich_with_options(config, oracle, enrich_options(config)).await
}

/// [`enrich_all`] with explicit options.
pub async fn enrich_with_options<O: TranslationOracle>(
    config: &Config,
    oracle: &O,
    options: EnrichOptions,
) -> Result<EnrichReport> {
    let registry = TerritoryRegistry::get();
    let enricher = Enricher::new(oracle, options);
    let mut total = EnrichReport::default();

    for source in sources(config)? {
        if config.skips_enrichment(&source.name) {
            info!("Skipping enrichment for {}", source.name);
            continue;
        }

        for path in &source.stores {
            let mut store = match RecordStore::open(source.name.as_str(), path) {
                Ok(store) => store,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };

            let territory = registry.territory_for_file(&source.name, store.file_name());
            let language = registry.source_language(&source.name);
            let context = TranslationContext::new(territory.code, language);
            let report = enricher.enrich(&mut store, &context).await;
            absorb(&mut total, &report);
        }
    }

    info!(
        "Enrichment complete: {} candidates, {} updated, {} batches ({} failed), {} discarded",
        total.candidates, total.updated, total.batches, total.failed_batches, total.discarded
    );
    Ok(total)
}

fn absorb(total: &mut EnrichReport, report: &EnrichReport) {
    total.candidates += report.candidates;
    total.batches += report.batches;
    total.failed_batches += report.failed_batches;
    total.updated += report.updated;
    total.discarded += report.discarded;
    total.checkpoint_failures += report.checkpoint_failures;
    total.stopped_early |= report.stopped_early;
}

/// Load every readable store, in discovery order.
pub fn load_stores(config: &Config) -> Result<Vec<RecordStore>> {
    let mut stores = Vec::new();
    for source in sources(config)? {
        for path in &source.stores {
            match RecordStore::open(source.name.as_str(), path) {
                Ok(store) => stores.push(store),
                Err(e) => warn!("Leaving {} out of the catalog: {}", path.display(), e),
            }
        }
    }
    Ok(stores)
}

/// Aggregate all stores and write the global catalog.
pub fn build_catalog(config: &Config) -> Result<GlobalCatalog> {
    let stores = load_stores(config)?;
    let catalog = aggregate(&stores);
    if catalog.skipped() > 0 {
        warn!("{} records without a native name left out of the catalog", catalog.skipped());
    }

    catalog
        .write_csv(&config.catalog_output)
        .context("Failed to write global catalog")?;

    for (territory, rows) in catalog.territory_counts() {
        info!("  {:<24} {:>6}", territory, rows);
    }
    Ok(catalog)
}

/// Per-source record counts, logged as a table.
pub fn count(config: &Config) -> Result<Vec<SourceCount>> {
    let mut counts: Vec<SourceCount> = Vec::new();
    for store in load_stores(config)? {
        match counts.last_mut() {
            Some(last) if last.source == store.source() => {
                last.files += 1;
                last.records += store.len();
                last.invalid_english += store.invalid_english_count();
            }
            _ => counts.push(SourceCount {
                source: store.source().to_string(),
                files: 1,
                records: store.len(),
                invalid_english: store.invalid_english_count(),
            }),
        }
    }

    info!("{:<24} {:>6} {:>8} {:>8}", "source", "files", "records", "invalid");
    for row in &counts {
        info!(
            "{:<24} {:>6} {:>8} {:>8}",
            row.source, row.files, row.records, row.invalid_english
        );
    }
    let total: usize = counts.iter().map(|row| row.records).sum();
    info!("Total: {} records across {} sources", total, counts.len());

    Ok(counts)
}
