//! ComparisonSession - the engine every surface adapter drives
//!
//! Concurrency model:
//! - All session state lives in one immutable `SessionState` snapshot behind
//!   a `parking_lot::RwLock<Arc<_>>`. Loads and finished analyses build a new
//!   snapshot and swap the pointer in a single write, so a reader sees the
//!   old state or the new one, never a mix.
//! - Long work (indexing, highlighting) runs as a job on a blocking thread
//!   with a `CancellationToken`; see [`crate::jobs`].
//! - Validation (window bounds, document count, names) happens synchronously
//!   before a job is submitted, so a doomed request never pays for a scan.
//! - The calling layer serializes requests; the session does not queue.

use crate::analysis::Analysis;
use crate::config::AnalysisConfig;
use crate::highlight::{annotate, highlight_document};
use crate::indexer::WindowRange;
use crate::interface::{
    ComparisonApi, ComparisonQuery, ComparisonRow, DocumentSource, HighlightReport, LoadReport,
    NgramError, NgramResult,
};
use crate::jobs::{self, init_rayon, DropGuard, JobHandle};
use crate::models::{Document, DocumentCollection};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One consistent view of the session
#[derive(Debug, Default)]
struct SessionState {
    collection: Arc<DocumentCollection>,
    /// Always built from `collection` when present
    analysis: Option<Arc<Analysis>>,
}

pub struct ComparisonSession {
    state: Arc<RwLock<Arc<SessionState>>>,
    config: AnalysisConfig,
}

impl Default for ComparisonSession {
    fn default() -> Self {
        Self::with_valid_config(AnalysisConfig::default())
    }
}

impl ComparisonSession {
    pub fn new(config: AnalysisConfig) -> NgramResult<Self> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: AnalysisConfig) -> Self {
        init_rayon(config.worker_threads);
        Self {
            state: Arc::new(RwLock::new(Arc::new(SessionState::default()))),
            config,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Query over the configured default window and sort order
    pub fn default_query(&self) -> ComparisonQuery {
        self.config.query()
    }

    fn snapshot(&self) -> Arc<SessionState> {
        Arc::clone(&self.state.read())
    }

    fn replace(&self, next: SessionState) {
        *self.state.write() = Arc::new(next);
    }

    /// The loaded documents
    pub fn collection(&self) -> Arc<DocumentCollection> {
        Arc::clone(&self.snapshot().collection)
    }

    /// The installed analysis, if one finished for the current collection
    pub fn current_analysis(&self) -> Option<Arc<Analysis>> {
        self.snapshot().analysis.clone()
    }

    pub fn document(&self, name: &str) -> NgramResult<Arc<Document>> {
        self.snapshot().collection.require(name).cloned()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Load
    // ─────────────────────────────────────────────────────────────────────────────

    /// Replace the whole collection and drop derived tables.
    pub fn load<I>(&self, inputs: I) -> LoadReport
    where
        I: IntoIterator<Item = (String, DocumentSource)>,
    {
        let (collection, report) = DocumentCollection::load(inputs);
        tracing::info!(
            loaded = report.loaded.len(),
            failed = report.failures.len(),
            "documents loaded"
        );
        self.replace(SessionState {
            collection: Arc::new(collection),
            analysis: None,
        });
        report
    }

    pub fn clear(&self) {
        self.replace(SessionState::default());
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Validation
    // ─────────────────────────────────────────────────────────────────────────────

    fn check_document_count(&self, collection: &DocumentCollection) -> NgramResult<()> {
        if collection.len() < self.config.min_documents {
            return Err(NgramError::configuration(format!(
                "at least {} documents are required for a comparison, {} loaded",
                self.config.min_documents,
                collection.len()
            )));
        }
        Ok(())
    }

    fn check_query(&self, state: &SessionState, query: &ComparisonQuery) -> NgramResult<()> {
        self.config.check_window(query.window)?;
        self.check_document_count(&state.collection)?;
        for name in &query.selected {
            state.collection.require(name)?;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Jobs
    // ─────────────────────────────────────────────────────────────────────────────

    /// Index the current collection for `window` and install the result.
    /// Reuses the installed analysis when it already covers `window`.
    pub fn submit_analysis(&self, window: WindowRange) -> NgramResult<JobHandle<Arc<Analysis>>> {
        self.config.check_window(window)?;
        let snapshot = self.snapshot();
        self.check_document_count(&snapshot.collection)?;

        let state = Arc::clone(&self.state);
        let poll_interval = self.config.cancel_poll_interval;
        Ok(jobs::submit(move |token| {
            analysis_for(&state, &snapshot, window, poll_interval, token)
        }))
    }

    /// Index if needed, then filter and order.
    pub fn submit_comparison(
        &self,
        query: ComparisonQuery,
    ) -> NgramResult<JobHandle<Vec<ComparisonRow>>> {
        let snapshot = self.snapshot();
        self.check_query(&snapshot, &query)?;

        let state = Arc::clone(&self.state);
        let poll_interval = self.config.cancel_poll_interval;
        Ok(jobs::submit(move |token| {
            let analysis = analysis_for(&state, &snapshot, query.window, poll_interval, token)?;
            if token.is_cancelled() {
                return Err(NgramError::Cancelled);
            }
            analysis.compare(&query)
        }))
    }

    /// Highlight `ngrams` in one document.
    pub fn submit_highlight(
        &self,
        document: &str,
        ngrams: BTreeSet<String>,
    ) -> NgramResult<JobHandle<HighlightReport>> {
        let doc = self.document(document)?;
        Ok(jobs::submit(move |token| highlight_report(&doc, &ngrams, token)))
    }

    /// Highlight the same n-gram set in several documents, in the given order.
    pub fn submit_highlight_batch(
        &self,
        documents: Vec<String>,
        ngrams: BTreeSet<String>,
    ) -> NgramResult<JobHandle<Vec<HighlightReport>>> {
        if documents.is_empty() {
            return Err(NgramError::configuration(
                "select at least one document to highlight",
            ));
        }
        let snapshot = self.snapshot();
        let docs = documents
            .iter()
            .map(|name| snapshot.collection.require(name).cloned())
            .collect::<NgramResult<Vec<_>>>()?;

        Ok(jobs::submit(move |token| {
            docs.iter()
                .map(|doc| highlight_report(doc, &ngrams, token))
                .collect()
        }))
    }
}

fn highlight_report(
    doc: &Document,
    ngrams: &BTreeSet<String>,
    token: &CancellationToken,
) -> NgramResult<HighlightReport> {
    let result = highlight_document(doc, ngrams, token)?;
    tracing::debug!(
        document = doc.name(),
        highlighted = result.highlighted_count,
        total = result.total_qualifying,
        "highlight mapped"
    );
    let annotated = annotate(doc, &result);
    Ok(HighlightReport {
        document: doc.name().to_string(),
        result,
        annotated,
    })
}

/// Cached analysis for `window`, or a fresh one installed into `state`.
fn analysis_for(
    state: &RwLock<Arc<SessionState>>,
    snapshot: &SessionState,
    window: WindowRange,
    poll_interval: usize,
    token: &CancellationToken,
) -> NgramResult<Arc<Analysis>> {
    if let Some(existing) = &snapshot.analysis {
        if existing.window() == window {
            return Ok(Arc::clone(existing));
        }
    }

    tracing::info!(
        documents = snapshot.collection.len(),
        min_n = window.min_n(),
        max_n = window.max_n(),
        "analysis started"
    );
    let analysis = Arc::new(Analysis::build_with_interval(
        Arc::clone(&snapshot.collection),
        window,
        token,
        poll_interval,
    )?);
    install(state, &analysis);
    Ok(analysis)
}

/// Swap in a snapshot carrying `analysis`, unless the collection it was built
/// from has been replaced meanwhile.
fn install(state: &RwLock<Arc<SessionState>>, analysis: &Arc<Analysis>) {
    let mut guard = state.write();
    if !analysis.is_for(&guard.collection) {
        tracing::debug!("collection replaced during analysis; result not installed");
        return;
    }
    let collection = Arc::clone(&guard.collection);
    *guard = Arc::new(SessionState {
        collection,
        analysis: Some(Arc::clone(analysis)),
    });
    tracing::debug!(vocabulary = analysis.vocabulary().len(), "analysis installed");
}

#[async_trait::async_trait]
impl ComparisonApi for ComparisonSession {
    fn load_documents(&self, inputs: Vec<(String, DocumentSource)>) -> LoadReport {
        self.load(inputs)
    }

    fn reset(&self) {
        self.clear();
    }

    fn document_names(&self) -> Vec<String> {
        self.snapshot().collection.names()
    }

    /// When the caller drops this future, the DropGuard cancels the job.
    async fn run_comparison(&self, query: ComparisonQuery) -> NgramResult<Vec<ComparisonRow>> {
        let handle = self.submit_comparison(query)?;
        let _guard = DropGuard::new(handle.token());
        handle.join().await
    }

    async fn run_highlight(
        &self,
        document: String,
        ngrams: BTreeSet<String>,
    ) -> NgramResult<HighlightReport> {
        let handle = self.submit_highlight(&document, ngrams)?;
        let _guard = DropGuard::new(handle.token());
        handle.join().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::{ComparisonMode, SortOrder};

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    fn inputs(docs: &[(&str, &str)]) -> Vec<(String, DocumentSource)> {
        docs.iter()
            .map(|&(n, t)| (n.to_string(), DocumentSource::from(t)))
            .collect()
    }

    fn example_session() -> ComparisonSession {
        let session = ComparisonSession::default();
        session.load(inputs(&[("doc1", "一二三"), ("doc2", "二三四"), ("doc3", "二三四五")]));
        session
    }

    fn bigrams() -> WindowRange {
        WindowRange::new(2, 2).unwrap()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_load_replaces_collection_wholesale() {
        let session = example_session();
        session.submit_analysis(bigrams()).unwrap().wait().unwrap();
        assert!(session.current_analysis().is_some());

        let before = session.collection();
        let report = session.load(inputs(&[("x", "天地"), ("y", "地玄")]));
        assert_eq!(report.loaded, vec!["x", "y"]);
        assert_eq!(session.document_names(), vec!["x", "y"]);
        assert!(session.current_analysis().is_none());
        // Old snapshot is untouched
        assert_eq!(before.names(), vec!["doc1", "doc2", "doc3"]);
    }

    #[test]
    fn test_load_reports_decode_failures() {
        let session = ComparisonSession::default();
        let report = session.load(vec![
            ("good".to_string(), DocumentSource::from("一二")),
            ("bad".to_string(), DocumentSource::Bytes(vec![0xC3, 0x28])),
        ]);
        assert_eq!(report.loaded, vec!["good"]);
        assert!(matches!(&report.failures[0], NgramError::Decode { document, .. } if document == "bad"));
        assert_eq!(session.document_names(), vec!["good"]);
    }

    #[test]
    fn test_comparison_end_to_end() {
        let rt = runtime();
        let session = example_session();
        let query = ComparisonQuery::new(bigrams())
            .with_mode(ComparisonMode::Superset)
            .with_selection(["doc1", "doc2"]);
        let rows = rt.block_on(session.run_comparison(query)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].to_string(), "二三: doc1: 1, doc2: 1, doc3: 1");

        let exact = ComparisonQuery::new(bigrams())
            .with_mode(ComparisonMode::Exact)
            .with_selection(["doc1", "doc2"]);
        assert!(rt.block_on(session.run_comparison(exact)).unwrap().is_empty());
    }

    #[test]
    fn test_comparison_is_idempotent() {
        let rt = runtime();
        let session = example_session();
        let query = ComparisonQuery::new(bigrams()).with_sort_order(SortOrder::Descending);
        let first = rt.block_on(session.run_comparison(query.clone())).unwrap();
        let second = rt.block_on(session.run_comparison(query)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_default_query_follows_config() {
        let config = AnalysisConfig {
            default_window: bigrams(),
            default_sort_order: SortOrder::Descending,
            ..AnalysisConfig::default()
        };
        let session = ComparisonSession::new(config).unwrap();
        session.load(inputs(&[("doc1", "一二三"), ("doc2", "二三四"), ("doc3", "二三四五")]));

        let query = session.default_query();
        assert_eq!(query.window, bigrams());
        let rows = session.submit_comparison(query).unwrap().wait().unwrap();
        let totals: Vec<u64> = rows.iter().map(|r| r.total()).collect();
        assert_eq!(totals, vec![3, 2, 1, 1]);
        assert_eq!(rows[0].ngram, "二三");
        assert_eq!(session.current_analysis().unwrap().window(), bigrams());
    }

    #[test]
    fn test_too_few_documents() {
        let session = ComparisonSession::default();
        session.load(inputs(&[("only", "一二三")]));
        let err = session.submit_comparison(ComparisonQuery::new(bigrams())).unwrap_err();
        assert!(matches!(err, NgramError::Configuration(_)));
        assert!(matches!(session.submit_analysis(bigrams()), Err(NgramError::Configuration(_))));
    }

    #[test]
    fn test_window_floor_rejected_before_work() {
        let session = example_session();
        let unigrams = WindowRange::new(1, 2).unwrap();
        let err = session.submit_comparison(ComparisonQuery::new(unigrams)).unwrap_err();
        assert!(matches!(err, NgramError::Configuration(_)));
        assert!(session.current_analysis().is_none());
    }

    #[test]
    fn test_core_allows_unigrams_when_floor_lowered() {
        let config = AnalysisConfig { min_window_floor: 1, ..AnalysisConfig::default() };
        let session = ComparisonSession::new(config).unwrap();
        session.load(inputs(&[("a", "一二"), ("b", "二三")]));
        let window = WindowRange::new(1, 1).unwrap();
        let rows = session
            .submit_comparison(ComparisonQuery::new(window).with_mode(ComparisonMode::Superset).with_selection(["a", "b"]))
            .unwrap()
            .wait()
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ngram, "二");
    }

    #[test]
    fn test_unknown_selection_fails_synchronously() {
        let session = example_session();
        let query = ComparisonQuery::new(bigrams())
            .with_mode(ComparisonMode::Exact)
            .with_selection(["doc1", "ghost"]);
        assert_eq!(
            session.submit_comparison(query).unwrap_err(),
            NgramError::NotFound("ghost".to_string())
        );
    }

    #[test]
    fn test_analysis_is_reused_for_same_window() {
        let session = example_session();
        let first = session.submit_analysis(bigrams()).unwrap().wait().unwrap();
        let second = session.submit_analysis(bigrams()).unwrap().wait().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let wider = session.submit_analysis(WindowRange::new(2, 3).unwrap()).unwrap().wait().unwrap();
        assert!(!Arc::ptr_eq(&first, &wider));
        assert_eq!(session.current_analysis().unwrap().window(), WindowRange::new(2, 3).unwrap());
    }

    #[test]
    fn test_stale_analysis_is_not_installed() {
        let session = example_session();
        let stale = Arc::new(
            Analysis::build(session.collection(), bigrams(), &CancellationToken::new()).unwrap(),
        );
        session.load(inputs(&[("x", "天地"), ("y", "地玄")]));
        install(&session.state, &stale);
        assert!(session.current_analysis().is_none());
    }

    #[test]
    fn test_cancelled_analysis_leaves_state_untouched() {
        let session = example_session();
        let handle = session.submit_analysis(bigrams()).unwrap();
        handle.cancel();
        // Either the job saw the cancel or it had already finished
        match handle.wait() {
            Err(NgramError::Cancelled) => assert!(session.current_analysis().is_none()),
            Ok(analysis) => assert!(Arc::ptr_eq(&analysis, &session.current_analysis().unwrap())),
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_highlight_report() {
        let rt = runtime();
        let session = example_session();
        let report = rt
            .block_on(session.run_highlight("doc2".to_string(), set(&["二三"])))
            .unwrap();
        assert_eq!(report.document, "doc2");
        assert_eq!(report.result.highlighted_offsets, [0, 1].into_iter().collect());
        assert_eq!(report.result.total_qualifying, 3);
        assert_eq!(report.result.ratio_percent(), "66.67");
        assert_eq!(report.annotated.plain_text(), "二三四");
    }

    #[test]
    fn test_highlight_unknown_document() {
        let session = example_session();
        assert_eq!(
            session.submit_highlight("ghost", set(&["二三"])).unwrap_err(),
            NgramError::NotFound("ghost".to_string())
        );
    }

    #[test]
    fn test_highlight_batch() {
        let session = example_session();
        let reports = session
            .submit_highlight_batch(vec!["doc3".into(), "doc1".into()], set(&["二三"]))
            .unwrap()
            .wait()
            .unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].document, "doc3");
        assert_eq!(reports[0].result.highlighted_count, 2);
        assert_eq!(reports[1].result.highlighted_offsets, [1, 2].into_iter().collect());

        assert!(matches!(
            session.submit_highlight_batch(Vec::new(), set(&["二三"])),
            Err(NgramError::Configuration(_))
        ));
    }

    #[test]
    fn test_reset() {
        let session = example_session();
        session.reset();
        assert!(session.document_names().is_empty());
        assert!(session.collection().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AnalysisConfig { min_documents: 0, ..AnalysisConfig::default() };
        assert!(matches!(ComparisonSession::new(config), Err(NgramError::Configuration(_))));
    }
}
