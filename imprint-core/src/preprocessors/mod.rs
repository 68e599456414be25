//! Line Preprocessors
//!
//! This module provides the pre-processing layer that narrows an imprint's
//! lines to the ones worth extracting from.
//!
//! ## Architecture
//!
//! ```text
//! Imprint text
//!     ↓
//! Document (numbered lines)
//!     ↓
//! [RelevanceFilter]  (pre-processing stage of the pipeline)
//!     ↓
//! Document (relevant lines only)
//!     ↓
//! [Extraction tasks]
//! ```
//!
//! ## Available Filters
//!
//! - `DictionaryRelevanceFilter` - social network, cookie and avoid-term rules
//! - `ClassifierRelevanceFilter` - learned line classifier collaborator

pub mod relevance;

// Re-export main types
pub use relevance::{ClassifierRelevanceFilter, DictionaryRelevanceFilter, RelevanceFilter};
