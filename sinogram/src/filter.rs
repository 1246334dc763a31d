//! Qualifying-character filter
//!
//! Keeps only CJK ideographs and records where each one came from, so that
//! anything found in the filtered text can be mapped back onto the original.

/// Code point ranges that qualify, inclusive.
const QUALIFYING_RANGES: &[(u32, u32)] = &[
    (0x4E00, 0x9FFF),   // CJK Unified Ideographs
    (0x3400, 0x4DBF),   // Extension A
    (0xF900, 0xFAFF),   // Compatibility Ideographs
    (0x20000, 0x2A6DF), // Extension B
];

/// Whether `c` is a qualifying ideograph
#[inline]
pub fn is_qualifying(c: char) -> bool {
    let cp = c as u32;
    QUALIFYING_RANGES.iter().any(|&(lo, hi)| cp >= lo && cp <= hi)
}

/// Qualifying subsequence of a text plus its back-mapping.
///
/// `positions[i]` is the code-point offset in the original text of
/// `qualifying[i]`; the vector is strictly increasing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredText {
    pub qualifying: Vec<char>,
    pub positions: Vec<usize>,
}

/// Single left-to-right scan over the original characters.
pub fn filter_chars(original: &[char]) -> FilteredText {
    let mut out = FilteredText::default();
    for (offset, &c) in original.iter().enumerate() {
        if is_qualifying(c) {
            out.qualifying.push(c);
            out.positions.push(offset);
        }
    }
    out
}

pub fn filter_text(original: &str) -> FilteredText {
    let chars: Vec<char> = original.chars().collect();
    filter_chars(&chars)
}
