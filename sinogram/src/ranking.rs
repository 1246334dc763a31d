//! Vocabulary aggregation and frequency ordering
//!
//! The aggregate key of an n-gram under a document subset is the sum of its
//! counts in those documents. Ordering is by that key only, in the requested
//! direction. Equal keys fall back to the n-gram text, ascending, in both
//! directions, so the same input always yields the same order.

use crate::indexer::NgramTable;
use crate::interface::SortOrder;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Every distinct n-gram of a corpus, kept in lexicographic order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    ngrams: Vec<String>,
}

impl Vocabulary {
    /// Union of the tables' n-grams.
    pub fn build<'a, I>(tables: I) -> Self
    where
        I: IntoIterator<Item = &'a NgramTable>,
    {
        let set: BTreeSet<&str> = tables.into_iter().flat_map(NgramTable::ngrams).collect();
        Self {
            ngrams: set.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.ngrams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ngrams.is_empty()
    }

    pub fn contains(&self, ngram: &str) -> bool {
        self.ngrams
            .binary_search_by(|probe| probe.as_str().cmp(ngram))
            .is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ngrams.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.ngrams
    }
}

/// Sum of `ngram`'s counts over `subset`; 0 for an empty subset.
pub fn aggregate_count(ngram: &str, subset: &[&NgramTable]) -> u64 {
    subset.iter().map(|t| t.get(ngram)).sum()
}

/// Total order on `(aggregate key, n-gram)` pairs for `order`.
pub(crate) fn compare_keyed(a: (u64, &str), b: (u64, &str), order: SortOrder) -> Ordering {
    let by_count = match order {
        SortOrder::Ascending => a.0.cmp(&b.0),
        SortOrder::Descending => b.0.cmp(&a.0),
    };
    by_count.then_with(|| a.1.cmp(b.1))
}

/// Order `ngrams` by aggregate frequency over `subset`.
pub fn sort_ngrams<S>(ngrams: Vec<S>, subset: &[&NgramTable], order: SortOrder) -> Vec<S>
where
    S: AsRef<str> + Send,
{
    let mut keyed: Vec<(u64, S)> = ngrams
        .into_par_iter()
        .map(|g| (aggregate_count(g.as_ref(), subset), g))
        .collect();

    keyed.par_sort_unstable_by(|a, b| compare_keyed((a.0, a.1.as_ref()), (b.0, b.1.as_ref()), order));
    keyed.into_iter().map(|(_, g)| g).collect()
}
