//! N-gram frequency indexer
//!
//! Counts every contiguous character window of each length in a
//! [`WindowRange`] over a document's qualifying text, overlapping occurrences
//! included ("aaa" with n=2 yields "aa": 2). This is the dominant cost of an
//! analysis and the main cancellation point.

use crate::interface::{NgramError, NgramResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::RangeInclusive;
use tokio_util::sync::CancellationToken;

/// Windows scanned between two cancellation polls.
pub const DEFAULT_POLL_INTERVAL: usize = 4096;

/// Validated n-gram length range, `1 <= min_n <= max_n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawWindowRange")]
pub struct WindowRange {
    min_n: usize,
    max_n: usize,
}

#[derive(Deserialize)]
struct RawWindowRange {
    min_n: usize,
    max_n: usize,
}

impl TryFrom<RawWindowRange> for WindowRange {
    type Error = NgramError;

    fn try_from(raw: RawWindowRange) -> Result<Self, Self::Error> {
        WindowRange::new(raw.min_n, raw.max_n)
    }
}

impl WindowRange {
    pub fn new(min_n: usize, max_n: usize) -> NgramResult<Self> {
        if min_n < 1 {
            return Err(NgramError::configuration(format!(
                "min_n must be at least 1, got {}",
                min_n
            )));
        }
        if max_n < min_n {
            return Err(NgramError::configuration(format!(
                "max_n ({}) must not be smaller than min_n ({})",
                max_n, min_n
            )));
        }
        Ok(Self { min_n, max_n })
    }

    pub fn min_n(&self) -> usize {
        self.min_n
    }

    pub fn max_n(&self) -> usize {
        self.max_n
    }

    pub fn lengths(&self) -> RangeInclusive<usize> {
        self.min_n..=self.max_n
    }

    pub fn contains(&self, n: usize) -> bool {
        self.lengths().contains(&n)
    }
}

/// Occurrence counts of one document's n-grams
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NgramTable {
    counts: HashMap<String, u64>,
}

impl NgramTable {
    /// Count of `ngram`, 0 when absent
    pub fn get(&self, ngram: &str) -> u64 {
        self.counts.get(ngram).copied().unwrap_or(0)
    }

    /// Number of distinct n-grams
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn ngrams(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    /// Sum of counts over n-grams of exactly `n` characters.
    pub fn total_for_length(&self, n: usize) -> u64 {
        self.counts
            .iter()
            .filter(|(k, _)| k.chars().count() == n)
            .map(|(_, &v)| v)
            .sum()
    }
}

impl FromIterator<(String, u64)> for NgramTable {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self {
            counts: iter.into_iter().collect(),
        }
    }
}

/// Index `text` with the default poll interval.
pub fn index_ngrams(
    text: &[char],
    window: WindowRange,
    token: &CancellationToken,
) -> NgramResult<NgramTable> {
    index_ngrams_with_interval(text, window, token, DEFAULT_POLL_INTERVAL)
}

/// Index `text`, polling `token` before each window length and every
/// `poll_interval` windows inside a length. Once cancellation is requested
/// at most `poll_interval` more windows are copied before `Cancelled` is
/// returned; the partial table is dropped.
pub fn index_ngrams_with_interval(
    text: &[char],
    window: WindowRange,
    token: &CancellationToken,
    poll_interval: usize,
) -> NgramResult<NgramTable> {
    let poll_interval = poll_interval.max(1);
    let mut counts: HashMap<String, u64> = HashMap::new();
    let mut buf = String::with_capacity(window.max_n() * 4);

    for n in window.lengths() {
        if token.is_cancelled() {
            return Err(NgramError::Cancelled);
        }
        // Lengths only grow from here
        if n > text.len() {
            break;
        }
        for (i, chunk) in text.windows(n).enumerate() {
            if i % poll_interval == 0 && token.is_cancelled() {
                return Err(NgramError::Cancelled);
            }
            buf.clear();
            buf.extend(chunk);
            match counts.get_mut(buf.as_str()) {
                Some(count) => *count += 1,
                None => {
                    counts.insert(buf.clone(), 1);
                }
            }
        }
    }

    Ok(NgramTable { counts })
}
