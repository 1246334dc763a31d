//! Cross-document comparison filter
//!
//! Decides, per vocabulary n-gram, whether it belongs in a result for a
//! selection of documents:
//!
//! - `All`: everything.
//! - `Exact`: the documents containing the n-gram are exactly the selection.
//! - `Superset`: every selected document contains it; other documents may too.
//!
//! `Exact(S)` is always a subset of `Superset(S)`. Rows report counts for the
//! whole collection regardless of the selection.

use crate::indexer::NgramTable;
use crate::interface::{
    ComparisonMode, ComparisonRow, DocumentCount, NgramError, NgramResult, SortOrder,
};
use crate::models::DocumentCollection;
use crate::ranking::{aggregate_count, compare_keyed, Vocabulary};
use rayon::prelude::*;
use std::collections::BTreeSet;

/// Inclusion test for one n-gram. `selected` is a per-document mask in
/// collection order and must not be all-false for `Exact`/`Superset`.
pub fn matches_mode(
    mode: ComparisonMode,
    ngram: &str,
    tables: &[NgramTable],
    selected: &[bool],
) -> bool {
    match mode {
        ComparisonMode::All => true,
        ComparisonMode::Exact => tables
            .iter()
            .zip(selected)
            .all(|(t, &sel)| (t.get(ngram) > 0) == sel),
        ComparisonMode::Superset => tables
            .iter()
            .zip(selected)
            .all(|(t, &sel)| !sel || t.get(ngram) > 0),
    }
}

/// Filter and order the vocabulary.
///
/// `tables` must be in `collection` order; a length mismatch is a
/// configuration error. The sort base is the whole collection for `All` and
/// the selection otherwise. Unknown selected names fail with `NotFound`; an
/// empty selection yields no rows for `Exact`/`Superset`.
pub fn filter_rows(
    vocabulary: &Vocabulary,
    collection: &DocumentCollection,
    tables: &[NgramTable],
    selected: &BTreeSet<String>,
    mode: ComparisonMode,
    order: SortOrder,
) -> NgramResult<Vec<ComparisonRow>> {
    if collection.len() != tables.len() {
        return Err(NgramError::configuration(format!(
            "{} tables for {} documents",
            tables.len(),
            collection.len()
        )));
    }

    let mut mask = vec![false; tables.len()];
    for name in selected {
        let i = collection
            .position(name)
            .ok_or_else(|| NgramError::not_found(name.as_str()))?;
        mask[i] = true;
    }

    if mode != ComparisonMode::All && selected.is_empty() {
        return Ok(Vec::new());
    }

    let sort_base: Vec<&NgramTable> = match mode {
        ComparisonMode::All => tables.iter().collect(),
        ComparisonMode::Exact | ComparisonMode::Superset => tables
            .iter()
            .zip(&mask)
            .filter_map(|(t, &sel)| sel.then_some(t))
            .collect(),
    };

    let mut keyed: Vec<(u64, &str)> = vocabulary
        .as_slice()
        .par_iter()
        .filter(|g| matches_mode(mode, g, tables, &mask))
        .map(|g| (aggregate_count(g, &sort_base), g.as_str()))
        .collect();
    keyed.par_sort_unstable_by(|a, b| compare_keyed(*a, *b, order));

    let names = collection.names();
    Ok(keyed
        .into_iter()
        .map(|(_, ngram)| ComparisonRow {
            ngram: ngram.to_string(),
            counts: names
                .iter()
                .zip(tables)
                .map(|(name, t)| DocumentCount {
                    document: name.clone(),
                    count: t.get(ngram),
                })
                .collect(),
        })
        .collect())
}
