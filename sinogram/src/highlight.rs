//! Highlight mapping
//!
//! Projects a set of n-grams back onto a document's original text. Matching
//! runs on the qualifying text; each matched qualifying position is mapped
//! through the position index, so only qualifying characters are ever
//! highlighted, never the punctuation or whitespace between them.

use crate::interface::{
    AnnotatedSegment, AnnotatedText, HighlightResult, HighlightSpan, NgramError, NgramResult,
};
use crate::models::Document;
use std::collections::BTreeSet;
use tokio_util::sync::CancellationToken;

/// First occurrence of `needle` in `hay` at or after `start`
fn find_from(hay: &[char], needle: &[char], start: usize) -> Option<usize> {
    if start >= hay.len() || needle.len() > hay.len() - start {
        return None;
    }
    hay[start..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + start)
}

/// Highlight every occurrence, overlapping ones included, of every n-gram.
///
/// The token is polled once per n-gram and once per occurrence found, so a
/// cancellation is observed after at most one substring search step.
/// Empty strings in `ngrams` are ignored; an empty set gives an empty
/// highlight with ratio 0.
pub fn highlight_document<I, S>(
    document: &Document,
    ngrams: I,
    token: &CancellationToken,
) -> NgramResult<HighlightResult>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let hay = document.qualifying_text();
    let positions = document.position_index();
    let mut covered = vec![false; hay.len()];

    for ngram in ngrams {
        if token.is_cancelled() {
            return Err(NgramError::Cancelled);
        }
        let needle: Vec<char> = ngram.as_ref().chars().collect();
        if needle.is_empty() {
            continue;
        }
        let mut start = 0;
        while let Some(p) = find_from(hay, &needle, start) {
            if token.is_cancelled() {
                return Err(NgramError::Cancelled);
            }
            covered[p..p + needle.len()].fill(true);
            start = p + 1;
        }
    }

    let highlighted_offsets: BTreeSet<usize> = covered
        .iter()
        .zip(positions)
        .filter_map(|(&hit, &offset)| hit.then_some(offset))
        .collect();

    Ok(stats(highlighted_offsets, document.total_qualifying()))
}

fn stats(highlighted_offsets: BTreeSet<usize>, total_qualifying: usize) -> HighlightResult {
    if highlighted_offsets.is_empty() {
        return HighlightResult::empty(total_qualifying);
    }
    let highlighted_count = highlighted_offsets.len();
    let ratio = if total_qualifying == 0 {
        0.0
    } else {
        (highlighted_count as f64 * 100.0 / total_qualifying as f64).min(100.0)
    };
    HighlightResult {
        highlighted_offsets,
        total_qualifying,
        highlighted_count,
        ratio,
    }
}

/// Merge closed-open ranges that overlap or touch into disjoint, sorted spans.
/// Empty ranges are dropped.
pub fn merge_intervals(ranges: &[HighlightSpan]) -> Vec<HighlightSpan> {
    let mut sorted: Vec<HighlightSpan> = ranges.iter().copied().filter(|r| !r.is_empty()).collect();
    sorted.sort_unstable();

    let mut merged: Vec<HighlightSpan> = Vec::with_capacity(sorted.len());
    for r in sorted {
        match merged.last_mut() {
            Some(last) if r.start <= last.end => last.end = last.end.max(r.end),
            _ => merged.push(r),
        }
    }
    merged
}

/// Collapse single offsets into contiguous spans.
pub fn offsets_to_spans(offsets: &BTreeSet<usize>) -> Vec<HighlightSpan> {
    let mut iter = offsets.iter();
    let Some(&first) = iter.next() else {
        return Vec::new();
    };

    iter.fold(vec![HighlightSpan { start: first, end: first + 1 }], |mut acc, &idx| {
        match acc.last_mut() {
            Some(last) if idx == last.end => last.end = idx + 1,
            _ => acc.push(HighlightSpan { start: idx, end: idx + 1 }),
        }
        acc
    })
}

/// The full original text split into runs of highlighted and plain characters.
pub fn annotate(document: &Document, result: &HighlightResult) -> AnnotatedText {
    let original = document.original_text();
    let mut mask = vec![false; original.len()];
    for &offset in &result.highlighted_offsets {
        if let Some(slot) = mask.get_mut(offset) {
            *slot = true;
        }
    }

    let mut segments: Vec<AnnotatedSegment> = Vec::new();
    for (&c, &highlighted) in original.iter().zip(&mask) {
        match segments.last_mut() {
            Some(seg) if seg.highlighted == highlighted => seg.text.push(c),
            _ => segments.push(AnnotatedSegment {
                text: c.to_string(),
                highlighted,
            }),
        }
    }
    AnnotatedText { segments }
}
