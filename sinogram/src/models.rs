//! Core data models for Sinogram
//!
//! A `Document` is built once from raw text and never mutated. A
//! `DocumentCollection` keeps documents in insertion order, which is also the
//! column order of every comparison row.

use crate::filter::filter_chars;
use crate::interface::{DocumentSource, LoadReport, NgramError, NgramResult};
use std::collections::HashMap;
use std::sync::Arc;

/// One loaded document with its qualifying subsequence and back-mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    name: String,
    original: Vec<char>,
    qualifying: Vec<char>,
    positions: Vec<usize>,
}

impl Document {
    pub fn from_text(name: impl Into<String>, text: &str) -> Self {
        let original: Vec<char> = text.chars().collect();
        let filtered = filter_chars(&original);
        Self {
            name: name.into(),
            original,
            qualifying: filtered.qualifying,
            positions: filtered.positions,
        }
    }

    /// Decode UTF-8 bytes. A byte order mark is kept as an ordinary
    /// (non-qualifying) character so offsets match what the caller read.
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> NgramResult<Self> {
        let name = name.into();
        match std::str::from_utf8(bytes) {
            Ok(text) => Ok(Self::from_text(name, text)),
            Err(e) => Err(NgramError::Decode {
                document: name,
                reason: e.to_string(),
            }),
        }
    }

    pub fn from_source(name: impl Into<String>, source: &DocumentSource) -> NgramResult<Self> {
        match source {
            DocumentSource::Text(text) => Ok(Self::from_text(name, text)),
            DocumentSource::Bytes(bytes) => Self::from_bytes(name, bytes),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn original_text(&self) -> &[char] {
        &self.original
    }

    pub fn qualifying_text(&self) -> &[char] {
        &self.qualifying
    }

    pub fn position_index(&self) -> &[usize] {
        &self.positions
    }

    /// Number of qualifying characters
    pub fn total_qualifying(&self) -> usize {
        self.positions.len()
    }
}

/// Documents in insertion order with unique names
#[derive(Debug, Clone, Default)]
pub struct DocumentCollection {
    documents: Vec<Arc<Document>>,
    by_name: HashMap<String, usize>,
}

impl DocumentCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a batch. Failing items are skipped and reported; the first
    /// document wins when names repeat.
    pub fn load<I>(inputs: I) -> (Self, LoadReport)
    where
        I: IntoIterator<Item = (String, DocumentSource)>,
    {
        let mut collection = Self::new();
        let mut report = LoadReport::default();

        for (name, source) in inputs {
            let result = Document::from_source(name, &source)
                .and_then(|doc| collection.push(doc));
            match result {
                Ok(name) => report.loaded.push(name),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping document");
                    report.failures.push(e);
                }
            }
        }

        (collection, report)
    }

    /// Append a document, returning its name.
    pub fn push(&mut self, document: Document) -> NgramResult<String> {
        if self.by_name.contains_key(document.name()) {
            return Err(NgramError::configuration(format!(
                "duplicate document name '{}'",
                document.name()
            )));
        }
        let name = document.name().to_string();
        self.by_name.insert(name.clone(), self.documents.len());
        self.documents.push(Arc::new(document));
        Ok(name)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Document>> {
        self.by_name.get(name).map(|&i| &self.documents[i])
    }

    /// Position of `name` in insertion order
    pub fn position(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn require(&self, name: &str) -> NgramResult<&Arc<Document>> {
        self.get(name).ok_or_else(|| NgramError::not_found(name))
    }

    pub fn documents(&self) -> &[Arc<Document>] {
        &self.documents
    }

    pub fn names(&self) -> Vec<String> {
        self.documents.iter().map(|d| d.name().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::is_qualifying;

    #[test]
    fn test_document_invariants() {
        let doc = Document::from_text("d", "《論語》：學而時習之，不亦說乎？");
        assert_eq!(doc.qualifying_text().len(), doc.position_index().len());
        assert!(doc.position_index().windows(2).all(|w| w[0] < w[1]));
        for (i, &p) in doc.position_index().iter().enumerate() {
            assert_eq!(doc.original_text()[p], doc.qualifying_text()[i]);
            assert!(is_qualifying(doc.original_text()[p]));
        }
        assert_eq!(doc.total_qualifying(), 11);
    }

    #[test]
    fn test_from_bytes_rejects_invalid_utf8() {
        let err = Document::from_bytes("bad", &[0xE4, 0xB8]).unwrap_err();
        match err {
            NgramError::Decode { document, .. } => assert_eq!(document, "bad"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_from_bytes_keeps_bom_offset() {
        let bytes = "\u{FEFF}一二".as_bytes().to_vec();
        let doc = Document::from_bytes("bom", &bytes).unwrap();
        assert_eq!(doc.position_index(), &[1, 2]);
    }

    #[test]
    fn test_load_skips_failures_and_keeps_order() {
        let inputs = vec![
            ("b".to_string(), DocumentSource::from("二三")),
            ("bad".to_string(), DocumentSource::Bytes(vec![0xFF, 0xFE, 0xFD])),
            ("a".to_string(), DocumentSource::from("一二")),
            ("b".to_string(), DocumentSource::from("duplicate")),
        ];
        let (collection, report) = DocumentCollection::load(inputs);
        assert_eq!(collection.names(), vec!["b", "a"]);
        assert_eq!(report.loaded, vec!["b", "a"]);
        assert_eq!(report.failures.len(), 2);
        assert!(matches!(report.failures[0], NgramError::Decode { .. }));
        assert!(matches!(report.failures[1], NgramError::Configuration(_)));
        assert_eq!(collection.get("b").unwrap().qualifying_text(), &['二', '三']);
        assert_eq!(collection.position("a"), Some(1));
    }

    #[test]
    fn test_require_unknown_name() {
        let collection = DocumentCollection::new();
        assert_eq!(
            collection.require("ghost").unwrap_err(),
            NgramError::NotFound("ghost".to_string())
        );
    }
}
