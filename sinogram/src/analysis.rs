//! Indexed corpus snapshot
//!
//! An `Analysis` is everything derived from one document collection for one
//! window range: a table per document (same order as the collection) and the
//! vocabulary. It is immutable once built; a new window or a new collection
//! means a new `Analysis`.

use crate::comparison::filter_rows;
use crate::indexer::{index_ngrams_with_interval, NgramTable, WindowRange, DEFAULT_POLL_INTERVAL};
use crate::interface::{ComparisonQuery, ComparisonRow, NgramError, NgramResult};
use crate::models::DocumentCollection;
use crate::ranking::Vocabulary;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct Analysis {
    collection: Arc<DocumentCollection>,
    window: WindowRange,
    tables: Vec<NgramTable>,
    vocabulary: Vocabulary,
}

impl Analysis {
    pub fn build(
        collection: Arc<DocumentCollection>,
        window: WindowRange,
        token: &CancellationToken,
    ) -> NgramResult<Self> {
        Self::build_with_interval(collection, window, token, DEFAULT_POLL_INTERVAL)
    }

    /// Index every document on the rayon pool. The token is polled once per
    /// document before its scan starts and inside the scan (see
    /// [`index_ngrams_with_interval`]); any cancellation discards all tables.
    pub fn build_with_interval(
        collection: Arc<DocumentCollection>,
        window: WindowRange,
        token: &CancellationToken,
        poll_interval: usize,
    ) -> NgramResult<Self> {
        let started = Instant::now();

        // Indexed par_iter keeps collection order in the collected Vec
        let tables = collection
            .documents()
            .par_iter()
            .map(|doc| {
                if token.is_cancelled() {
                    return Err(NgramError::Cancelled);
                }
                let table =
                    index_ngrams_with_interval(doc.qualifying_text(), window, token, poll_interval)?;
                tracing::debug!(
                    document = doc.name(),
                    qualifying = doc.total_qualifying(),
                    distinct = table.len(),
                    "indexed document"
                );
                Ok(table)
            })
            .collect::<NgramResult<Vec<_>>>()?;

        if token.is_cancelled() {
            return Err(NgramError::Cancelled);
        }

        let vocabulary = Vocabulary::build(&tables);
        tracing::info!(
            documents = collection.len(),
            min_n = window.min_n(),
            max_n = window.max_n(),
            vocabulary = vocabulary.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "analysis complete"
        );

        Ok(Self {
            collection,
            window,
            tables,
            vocabulary,
        })
    }

    pub fn collection(&self) -> &Arc<DocumentCollection> {
        &self.collection
    }

    pub fn window(&self) -> WindowRange {
        self.window
    }

    /// Tables in collection order
    pub fn tables(&self) -> &[NgramTable] {
        &self.tables
    }

    pub fn table(&self, document: &str) -> NgramResult<&NgramTable> {
        self.collection
            .position(document)
            .map(|i| &self.tables[i])
            .ok_or_else(|| NgramError::not_found(document))
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Whether this snapshot was built from exactly `collection`
    pub fn is_for(&self, collection: &Arc<DocumentCollection>) -> bool {
        Arc::ptr_eq(&self.collection, collection)
    }

    /// Run a query. The query window must be the one this snapshot indexed.
    pub fn compare(&self, query: &ComparisonQuery) -> NgramResult<Vec<ComparisonRow>> {
        if query.window != self.window {
            return Err(NgramError::configuration(format!(
                "query window {}..={} does not match indexed window {}..={}",
                query.window.min_n(),
                query.window.max_n(),
                self.window.min_n(),
                self.window.max_n()
            )));
        }
        filter_rows(
            &self.vocabulary,
            &self.collection,
            &self.tables,
            &query.selected,
            query.mode,
            query.sort_order,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::DocumentSource;

    fn collection(docs: &[(&str, &str)]) -> Arc<DocumentCollection> {
        let inputs = docs
            .iter()
            .map(|&(n, t)| (n.to_string(), DocumentSource::from(t)));
        Arc::new(DocumentCollection::load(inputs).0)
    }

    #[test]
    fn test_tables_follow_collection_order() {
        let c = collection(&[("doc1", "一二三"), ("doc2", "二三四"), ("doc3", "二三四五")]);
        let window = WindowRange::new(2, 2).unwrap();
        let analysis = Analysis::build(c.clone(), window, &CancellationToken::new()).unwrap();

        assert!(analysis.is_for(&c));
        assert_eq!(analysis.tables().len(), 3);
        assert_eq!(analysis.table("doc3").unwrap().get("四五"), 1);
        assert_eq!(analysis.table("doc1").unwrap().get("四五"), 0);
        assert_eq!(analysis.vocabulary().len(), 4);
        assert!(matches!(analysis.table("nope"), Err(NgramError::NotFound(_))));
    }

    #[test]
    fn test_window_mismatch_is_configuration_error() {
        let c = collection(&[("a", "一二三"), ("b", "二三四")]);
        let analysis =
            Analysis::build(c, WindowRange::new(2, 2).unwrap(), &CancellationToken::new()).unwrap();
        let query = ComparisonQuery::new(WindowRange::new(2, 3).unwrap());
        assert!(matches!(analysis.compare(&query), Err(NgramError::Configuration(_))));
    }

    #[test]
    fn test_cancelled_build() {
        let c = collection(&[("a", "一二三"), ("b", "二三四")]);
        let token = CancellationToken::new();
        token.cancel();
        let result = Analysis::build(c, WindowRange::new(1, 2).unwrap(), &token);
        assert!(matches!(result, Err(NgramError::Cancelled)));
    }

    #[test]
    fn test_documents_without_qualifying_text() {
        let c = collection(&[("latin", "hello world"), ("han", "一二")]);
        let analysis =
            Analysis::build(c, WindowRange::new(1, 2).unwrap(), &CancellationToken::new()).unwrap();
        assert!(analysis.table("latin").unwrap().is_empty());
        assert_eq!(analysis.vocabulary().len(), 3);
    }
}
