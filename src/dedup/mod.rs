//! Duplicate-content detection
//!
//! - [`similarity`] - fingerprints and Jaccard scores (pure)
//! - [`gate`] - screening against the content repository

pub mod gate;
pub mod similarity;

pub use gate::{DuplicateCheck, DuplicateGate, SimilarContent};
pub use similarity::{combined_similarity, fingerprint, normalize, similarity};
