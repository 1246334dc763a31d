//! Sinogram Public Interface
//!
//! Records, error type and the service trait shared by every surface that
//! drives the comparison engine (desktop shell, HTTP backend, scripts).
//! Adapters translate these types; they never re-implement the engine.

use crate::indexer::WindowRange;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ENUMS
// ═══════════════════════════════════════════════════════════════════════════════

/// How a comparison decides whether an n-gram belongs in the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMode {
    /// Every n-gram of the vocabulary.
    #[default]
    All,
    /// N-grams whose appearance set equals the selection.
    Exact,
    /// N-grams present in every selected document, wherever else they appear.
    Superset,
}

/// Direction of the aggregate-frequency sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDS (Structs)
// ═══════════════════════════════════════════════════════════════════════════════

/// Raw input for one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Text(String),
    /// Bytes that must decode as UTF-8
    Bytes(Vec<u8>),
}

impl From<String> for DocumentSource {
    fn from(text: String) -> Self {
        DocumentSource::Text(text)
    }
}

impl From<&str> for DocumentSource {
    fn from(text: &str) -> Self {
        DocumentSource::Text(text.to_string())
    }
}

impl From<Vec<u8>> for DocumentSource {
    fn from(bytes: Vec<u8>) -> Self {
        DocumentSource::Bytes(bytes)
    }
}

/// Outcome of a batch load. Failed items are listed, never fatal to the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Names that made it into the collection, in insertion order
    pub loaded: Vec<String>,
    pub failures: Vec<NgramError>,
}

/// One request against the analysed corpus.
///
/// The sort order is a closed enum fixed at construction; nothing re-parses it
/// later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonQuery {
    pub window: WindowRange,
    pub mode: ComparisonMode,
    pub selected: BTreeSet<String>,
    pub sort_order: SortOrder,
}

impl ComparisonQuery {
    pub fn new(window: WindowRange) -> Self {
        Self {
            window,
            mode: ComparisonMode::All,
            selected: BTreeSet::new(),
            sort_order: SortOrder::Ascending,
        }
    }

    pub fn with_mode(mut self, mode: ComparisonMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_selection<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sort_order(mut self, sort_order: SortOrder) -> Self {
        self.sort_order = sort_order;
        self
    }
}

/// Count of one n-gram in one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentCount {
    pub document: String,
    pub count: u64,
}

/// A comparison result row.
///
/// `counts` always covers the whole collection in insertion order, whatever
/// the selection was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub ngram: String,
    pub counts: Vec<DocumentCount>,
}

impl ComparisonRow {
    /// Sum over every document; the weight a wordcloud renderer uses.
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|c| c.count).sum()
    }

    pub fn count_for(&self, document: &str) -> Option<u64> {
        self.counts
            .iter()
            .find(|c| c.document == document)
            .map(|c| c.count)
    }
}

impl fmt::Display for ComparisonRow {
    /// `<ngram>: <doc1>: <count1>, <doc2>: <count2>, ...`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.ngram)?;
        for (i, c) in self.counts.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", c.document, c.count)?;
        }
        Ok(())
    }
}

/// Recover the n-gram set from displayed result lines.
///
/// Everything before the first `:` of a non-blank line is the n-gram.
pub fn ngrams_from_lines<'a, I>(lines: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let ngram = line.split(':').next().unwrap_or_default().trim();
            (!ngram.is_empty()).then(|| ngram.to_string())
        })
        .collect()
}

/// A closed-open range of original-text offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HighlightSpan {
    pub start: usize,
    pub end: usize,
}

impl HighlightSpan {
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Highlight of one document. Transient, recomputed per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightResult {
    /// Offsets into the original text (code points)
    pub highlighted_offsets: BTreeSet<usize>,
    pub total_qualifying: usize,
    pub highlighted_count: usize,
    /// Percentage in [0, 100]
    pub ratio: f64,
}

impl HighlightResult {
    pub fn empty(total_qualifying: usize) -> Self {
        Self {
            highlighted_offsets: BTreeSet::new(),
            total_qualifying,
            highlighted_count: 0,
            ratio: 0.0,
        }
    }

    /// Contiguous spans instead of a character set.
    pub fn spans(&self) -> Vec<HighlightSpan> {
        crate::highlight::offsets_to_spans(&self.highlighted_offsets)
    }

    /// Ratio with two decimals, e.g. "66.67".
    pub fn ratio_percent(&self) -> String {
        format!("{:.2}", self.ratio)
    }
}

/// Run of consecutive original characters sharing one highlight state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedSegment {
    pub text: String,
    pub highlighted: bool,
}

/// Full original text annotated for rendering collaborators
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedText {
    pub segments: Vec<AnnotatedSegment>,
}

impl AnnotatedText {
    /// Per-character view: `(char, highlighted)` in original order.
    pub fn chars(&self) -> impl Iterator<Item = (char, bool)> + '_ {
        self.segments
            .iter()
            .flat_map(|s| s.text.chars().map(move |c| (c, s.highlighted)))
    }

    pub fn plain_text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Highlight statistics plus the annotated text, as returned to surfaces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightReport {
    pub document: String,
    pub result: HighlightResult,
    pub annotated: AnnotatedText,
}

/// Error type for Sinogram operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NgramError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Cannot decode document '{document}': {reason}")]
    Decode { document: String, reason: String },
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Operation cancelled")]
    Cancelled,
}

impl NgramError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        NgramError::Configuration(msg.into())
    }

    pub fn not_found(name: impl Into<String>) -> Self {
        NgramError::NotFound(name.into())
    }

    /// Cancellation is an outcome, not a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, NgramError::Cancelled)
    }
}

pub type NgramResult<T> = Result<T, NgramError>;

// ═══════════════════════════════════════════════════════════════════════════════
// SERVICE INTERFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// The interface every surface adapter talks to.
/// Implemented by [`crate::ComparisonSession`].
#[async_trait::async_trait]
pub trait ComparisonApi: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────────
    // Load Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Replace the whole collection. Undecodable items are reported and skipped.
    fn load_documents(&self, inputs: Vec<(String, DocumentSource)>) -> LoadReport;

    /// Drop every document and derived table.
    fn reset(&self);

    /// Names in insertion order
    fn document_names(&self) -> Vec<String>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Query Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Index (if the window changed) and filter. Dropping the future cancels the work.
    async fn run_comparison(&self, query: ComparisonQuery) -> NgramResult<Vec<ComparisonRow>>;

    /// Project an n-gram set back onto one document's original text.
    async fn run_highlight(
        &self,
        document: String,
        ngrams: BTreeSet<String>,
    ) -> NgramResult<HighlightReport>;
}
