//! Session configuration
//!
//! Every field has a default, so a config file only lists what it changes:
//!
//! ```json
//! { "default_window": { "min_n": 2, "max_n": 6 }, "worker_threads": 4 }
//! ```

use crate::indexer::{WindowRange, DEFAULT_POLL_INTERVAL};
use crate::interface::{ComparisonQuery, NgramError, NgramResult, SortOrder};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Window used when a surface does not pick one
    pub default_window: WindowRange,
    /// Smallest `min_n` the session accepts. The indexer itself allows 1.
    pub min_window_floor: usize,
    /// Documents required before a comparison runs
    pub min_documents: usize,
    pub default_sort_order: SortOrder,
    /// Windows scanned between two cancellation polls
    pub cancel_poll_interval: usize,
    /// Rayon workers; 0 = all cores minus two
    pub worker_threads: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_window: WindowRange::new(2, 4).expect("2..=4 is a valid window"),
            min_window_floor: 2,
            min_documents: 2,
            default_sort_order: SortOrder::Ascending,
            cancel_poll_interval: DEFAULT_POLL_INTERVAL,
            worker_threads: 0,
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_str(json: &str) -> NgramResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| NgramError::configuration(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> NgramResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            NgramError::configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> NgramResult<()> {
        if self.min_window_floor < 1 {
            return Err(NgramError::configuration("min_window_floor must be at least 1"));
        }
        if self.min_documents < 1 {
            return Err(NgramError::configuration("min_documents must be at least 1"));
        }
        if self.cancel_poll_interval < 1 {
            return Err(NgramError::configuration("cancel_poll_interval must be at least 1"));
        }
        self.check_window(self.default_window)
    }

    /// Apply the session's window floor on top of the core's own rules.
    pub fn check_window(&self, window: WindowRange) -> NgramResult<()> {
        if window.min_n() < self.min_window_floor {
            return Err(NgramError::configuration(format!(
                "min_n must be at least {}, got {}",
                self.min_window_floor,
                window.min_n()
            )));
        }
        Ok(())
    }

    /// Starting query for a surface: the default window and sort order.
    pub fn query(&self) -> ComparisonQuery {
        ComparisonQuery::new(self.default_window).with_sort_order(self.default_sort_order)
    }

    /// Validate raw bounds from a surface in one step.
    pub fn window(&self, min_n: usize, max_n: usize) -> NgramResult<WindowRange> {
        let window = WindowRange::new(min_n, max_n)?;
        self.check_window(window)?;
        Ok(window)
    }
}
