//! Reconciliation and enrichment pipeline for a world university catalog.
//!
//! Each source (a country or territory) keeps its own [`store::RecordStore`]
//! of `{native_name, english_name}` records. Raw listings are merged into the
//! stores by normalized native name, missing or untranslated English names are
//! filled through a [`oracle::TranslationOracle`], and finally every store is
//! unioned into one [`aggregate::GlobalCatalog`].

pub mod aggregate;
pub mod config;
pub mod english;
pub mod enrich;
pub mod gemini;
pub mod layout;
pub mod merge;
pub mod normalize;
pub mod oracle;
pub mod pipeline;
pub mod raw;
pub mod record;
pub mod retry;
pub mod store;
pub mod territory;
