//! Sinogram - cross-document n-gram comparison for CJK text
//!
//! Loads a collection of documents, keeps only their CJK ideographs, counts
//! every contiguous n-gram of the ideograph stream for a range of lengths, and
//! answers which n-grams are shared by (or exclusive to) a selection of
//! documents. Matches can be projected back onto the original text as
//! highlights with a coverage ratio.
//!
//! Surfaces (desktop UI, CLI, service) talk to [`ComparisonSession`] through
//! the [`ComparisonApi`] trait.

pub mod analysis;
pub mod comparison;
pub mod config;
pub mod filter;
pub mod highlight;
pub mod indexer;
pub mod interface;
pub mod jobs;
pub mod models;
pub mod ranking;
mod session;

pub use analysis::Analysis;
pub use config::AnalysisConfig;
pub use indexer::{NgramTable, WindowRange};
pub use interface::*;
pub use jobs::JobHandle;
pub use models::{Document, DocumentCollection};
pub use session::ComparisonSession;
