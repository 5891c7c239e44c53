use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

/// File name of the global catalog, written under the data root by default.
pub const DEFAULT_CATALOG_FILE: &str = "world_universities.csv";

const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Clone)]
pub struct Config {
    // Layout
    pub data_root: PathBuf,
    pub catalog_output: PathBuf,

    // Gemini (translation oracle)
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_api_url: String,

    // Enrichment
    pub enrich_batch_size: usize,
    pub enrich_max_batches: Option<usize>,
    pub oracle_timeout_secs: u64,
    pub enrich_skip_sources: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from any variable source (the process environment in
    /// production, a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_root =
            PathBuf::from(lookup("CATALOG_DATA_ROOT").unwrap_or_else(|| ".".to_string()));
        if data_root.as_os_str().is_empty() {
            bail!("CATALOG_DATA_ROOT is set but empty");
        }

        let catalog_output = lookup("CATALOG_OUTPUT")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| data_root.join(DEFAULT_CATALOG_FILE));

        Ok(Self {
            catalog_output,

            // Gemini - an absent or blank key disables enrichment only
            gemini_api_key: lookup("GEMINI_API_KEY").filter(|v| !v.trim().is_empty()),
            gemini_model: lookup("GEMINI_MODEL").unwrap_or_else(|| "gemini-2.0-flash".to_string()),
            gemini_api_url: lookup("GEMINI_API_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_API_URL.to_string()),

            // Enrichment
            enrich_batch_size: lookup("ENRICH_BATCH_SIZE")
                .and_then(|v| v.parse().ok())
                .filter(|size: &usize| *size > 0)
                .unwrap_or(20),
            enrich_max_batches: lookup("ENRICH_MAX_BATCHES").and_then(|v| v.parse().ok()),
            oracle_timeout_secs: lookup("ORACLE_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .unwrap_or(120),
            enrich_skip_sources: lookup("ENRICH_SKIP_SOURCES")
                .unwrap_or_else(|| "China".to_string())
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),

            data_root,
        })
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle_timeout_secs)
    }

    pub fn enrichment_enabled(&self) -> bool {
        self.gemini_api_key.is_some()
    }

    pub fn skips_enrichment(&self, source: &str) -> bool {
        self.enrich_skip_sources
            .iter()
            .any(|skipped| skipped.eq_ignore_ascii_case(source))
    }
}
