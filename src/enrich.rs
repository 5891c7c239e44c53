//! Translation enrichment of a record store.
//!
//! Records whose English name fails the validity check are sent to the oracle
//! in fixed-size batches, one batch at a time. The store is flushed after
//! every batch, whatever the batch's outcome, so an interrupted run resumes by
//! resubmitting only records that are still invalid.

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::english::is_valid_english;
use crate::normalize::normalize;
use crate::oracle::{
    OracleError, TranslationContext, TranslationOracle, TranslationResult, TranslationTask,
};
use crate::record::sanitize_english;
use crate::store::RecordStore;

/// Tunables for one enrichment pass.
#[derive(Debug, Clone)]
pub struct EnrichOptions {
    /// Tasks per oracle call (values below 1 are treated as 1)
    pub batch_size: usize,
    /// Stop cleanly after this many batches
    pub max_batches: Option<usize>,
    /// Upper bound on a single oracle call
    pub call_timeout: Duration,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            batch_size: 20,
            max_batches: None,
            call_timeout: Duration::from_secs(120),
        }
    }
}

/// What an enrichment pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichReport {
    /// Records that failed the validity check at the start of the pass
    pub candidates: usize,
    /// Batches submitted to the oracle
    pub batches: usize,
    /// Batches whose oracle call failed or timed out
    pub failed_batches: usize,
    /// Records whose English name was replaced
    pub updated: usize,
    /// Oracle results ignored: unknown key, duplicate, or still not valid English
    pub discarded: usize,
    /// Checkpoint writes that failed
    pub checkpoint_failures: usize,
    /// The pass stopped at `max_batches` with candidates left
    pub stopped_early: bool,
}

pub struct Enricher<'a, O> {
    oracle: &'a O,
    options: EnrichOptions,
}

impl<'a, O: TranslationOracle> Enricher<'a, O> {
    pub fn new(oracle: &'a O, options: EnrichOptions) -> Self {
        Self { oracle, options }
    }

    /// Scan `store`, translate invalid English names batch by batch, and
    /// checkpoint after each batch. Never fails: oracle and checkpoint errors
    /// are logged and counted in the report.
    pub async fn enrich(
        &self,
        store: &mut RecordStore,
        context: &TranslationContext,
    ) -> EnrichReport {
        let tasks = collect_tasks(store);
        let mut report = EnrichReport {
            candidates: tasks.len(),
            ..EnrichReport::default()
        };

        if tasks.is_empty() {
            debug!("{}: every English name is valid, nothing to enrich", store.source());
            return report;
        }

        let batch_size = self.options.batch_size.max(1);
        let total_batches = tasks.len().div_ceil(batch_size);
        info!(
            "{}: translating {} names in {} batches",
            context.territory,
            tasks.len(),
            total_batches
        );

        for (index, batch) in tasks.chunks(batch_size).enumerate() {
            if self.options.max_batches.is_some_and(|max| index >= max) {
                info!(
                    "{}: stopping after {} of {} batches",
                    context.territory, index, total_batches
                );
                report.stopped_early = true;
                break;
            }

            debug!(
                "{}: processing batch {}/{}",
                context.territory,
                index + 1,
                total_batches
            );
            report.batches += 1;

            match self.call_oracle(batch, context).await {
                Ok(results) => {
                    let (updated, discarded) = apply_results(store, batch, results);
                    if discarded > 0 {
                        warn!(
                            "{}: batch {}/{} had {} unusable results",
                            context.territory,
                            index + 1,
                            total_batches,
                            discarded
                        );
                    }
                    report.updated += updated;
                    report.discarded += discarded;
                }
                Err(e) => {
                    warn!(
                        "{}: batch {}/{} failed, continuing: {}",
                        context.territory,
                        index + 1,
                        total_batches,
                        e
                    );
                    report.failed_batches += 1;
                }
            }

            if let Err(e) = store.flush() {
                warn!("{}: checkpoint failed: {}", context.territory, e);
                report.checkpoint_failures += 1;
            }
        }

        info!(
            "{}: updated {} of {} names ({} batches failed, {} results discarded)",
            context.territory,
            report.updated,
            report.candidates,
            report.failed_batches,
            report.discarded
        );
        report
    }

    async fn call_oracle(
        &self,
        batch: &[TranslationTask],
        context: &TranslationContext,
    ) -> Result<Vec<TranslationResult>, OracleError> {
        timeout(self.options.call_timeout, self.oracle.translate(batch, context))
            .await
            .map_err(|_| OracleError::Timeout(self.options.call_timeout))?
    }
}

/// One task per record whose English name is not valid, in store order.
/// The current English name, valid or not, is the hint.
fn collect_tasks(store: &RecordStore) -> Vec<TranslationTask> {
    store
        .iter()
        .filter(|record| !is_valid_english(&record.english_name))
        .map(|record| TranslationTask {
            native_name: record.native_name.clone(),
            hint_name: record.english_name.clone(),
        })
        .collect()
}

/// Apply oracle results to the store. Returns `(updated, discarded)`.
///
/// A result is applied only when it names a native name from this batch, is
/// the first answer for it, and is itself valid English. A record that is
/// already valid is never touched.
fn apply_results(
    store: &mut RecordStore,
    batch: &[TranslationTask],
    results: Vec<TranslationResult>,
) -> (usize, usize) {
    let mut pending: HashSet<String> = batch
        .iter()
        .map(|task| normalize(&task.native_name))
        .collect();

    let mut updated = 0;
    let mut discarded = 0;

    for result in results {
        let key = normalize(&result.native_name);
        if !pending.remove(&key) {
            debug!("Ignoring result for unsubmitted name {}", result.native_name);
            discarded += 1;
            continue;
        }

        let english_name = sanitize_english(&result.english_name);
        if !is_valid_english(&english_name) {
            debug!(
                "Ignoring invalid translation for {}: {}",
                result.native_name, english_name
            );
            discarded += 1;
            continue;
        }

        let Some(position) = store.position(&key) else {
            discarded += 1;
            continue;
        };
        let record = store.record_mut(position);
        if is_valid_english(&record.english_name) {
            discarded += 1;
            continue;
        }
        record.english_name = english_name;
        updated += 1;
    }

    (updated, discarded)
}
