//! Natural-language understanding for the booking assistant.
//!
//! Leaves first: [`normalize`] canonicalizes text, [`timeparse`] reads dates
//! and times, [`entities`] resolves catalog names, [`classifier`] assigns an
//! intent and [`enrich`] turns raw slot strings into catalog values.

pub mod classifier;
pub mod enrich;
pub mod entities;
pub mod heuristics;
pub mod normalize;
pub mod similarity;
pub mod timeparse;

pub use classifier::{ClassifyError, HybridClassifier, IntentClassifier, KeywordClassifier, LlmClassifier};
pub use enrich::{enrich, Slots};
pub use entities::{AliasIndex, EntityResolver};
