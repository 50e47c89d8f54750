//! Pipeline configuration.
//!
//! Every heuristic threshold in the pipeline (fragment minimums, the
//! short-content cutoff, recency windows, pool sizes) is a field here rather
//! than a constant buried in control flow, so tuning them is a YAML edit.
//! A config file is optional; defaults reproduce the shipped behavior.

use crate::util::BoxError;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

/// Tunable knobs for the search/extraction pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// User-Agent sent on all outbound requests. Several sources reject
    /// non-browser clients outright.
    pub user_agent: String,
    /// Accept-Language header value.
    pub accept_language: String,
    /// Connect timeout in seconds (short budget).
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds (longer budget).
    pub read_timeout_secs: u64,
    /// Retry attempts on 5xx/connection errors, on top of the first try.
    pub http_retries: usize,
    /// Base backoff delay between HTTP retries, in milliseconds.
    pub retry_base_delay_ms: u64,
    /// Worker pool size for per-article fetch fan-out.
    pub fetch_workers: usize,
    /// Candidates requested from providers = max(limit * factor, floor).
    pub over_fetch_factor: usize,
    pub over_fetch_floor: usize,
    /// A recency window is accepted once it yields min(limit, this) matches.
    pub min_desired_results: usize,
    /// Expanding recency cutoffs, in days, tried in order.
    pub recency_windows_days: Vec<i64>,
    /// Minimum trimmed length for a text fragment to count as content.
    pub min_fragment_chars: usize,
    /// Extracted text below this length triggers the canonical-source hop.
    pub short_content_chars: usize,
    /// Consent phrase matches only count on bodies smaller than this.
    pub consent_body_max_bytes: usize,
    /// Search language / country passed to providers.
    pub search_lang: String,
    pub search_country: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            accept_language: "ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
            connect_timeout_secs: 5,
            read_timeout_secs: 10,
            http_retries: 2,
            retry_base_delay_ms: 300,
            fetch_workers: 12,
            over_fetch_factor: 4,
            over_fetch_floor: 20,
            min_desired_results: 6,
            recency_windows_days: vec![3, 7, 14],
            min_fragment_chars: 10,
            short_content_chars: 800,
            consent_body_max_bytes: 50_000,
            search_lang: "ru".to_string(),
            search_country: "RU".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

/// Load configuration from a YAML file, falling back on defaults for any
/// field the file omits.
pub fn load_config(path: &str) -> Result<PipelineConfig, BoxError> {
    let raw = std::fs::read_to_string(path)?;
    let config: PipelineConfig = serde_yaml::from_str(&raw)?;
    info!(path, "Loaded pipeline configuration");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.recency_windows_days, vec![3, 7, 14]);
        assert_eq!(cfg.fetch_workers, 12);
        assert_eq!(cfg.short_content_chars, 800);
        assert_eq!(cfg.min_fragment_chars, 10);
    }

    #[test]
    fn test_partial_yaml_overrides() {
        let yaml = "fetch_workers: 4\nrecency_windows_days: [7, 14, 30]\n";
        let cfg: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.fetch_workers, 4);
        assert_eq!(cfg.recency_windows_days, vec![7, 14, 30]);
        // Untouched fields keep their defaults.
        assert_eq!(cfg.short_content_chars, 800);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = "fetch_wrokers: 4\n";
        assert!(serde_yaml::from_str::<PipelineConfig>(yaml).is_err());
    }
}
