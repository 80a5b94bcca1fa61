//! Invoice metadata extraction and normalization.

pub mod metadata;
pub mod rules;

pub use metadata::{default_metadata, normalize_metadata, MetadataExtractor, UNKNOWN_PROVIDER};
