//! Core library for utility invoice ingestion and CO₂ accounting.
//!
//! This crate provides:
//! - Upload acceptance and text extraction (PDF text layer, image OCR)
//! - Language-model metadata and consumption extraction
//! - Deterministic emissions calculation with a simulated fallback
//! - The ingestion pipeline and record persistence

pub mod emissions;
pub mod error;
pub mod extract;
pub mod invoice;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod store;
pub mod upload;

#[cfg(test)]
mod testing;

pub use emissions::{generate_mock, EmissionFactors, EmissionsCalculator};
pub use error::{EcotrackError, ErrorResponse, PipelineError, Result};
pub use extract::{DocumentTextExtractor, TextExtractor};
pub use invoice::MetadataExtractor;
pub use llm::{CompletionClient, CompletionRequest, OpenAiClient};
pub use models::config::EcotrackConfig;
pub use models::emission::{EmissionBreakdown, EmissionResult};
pub use models::invoice::{InvoiceMetadata, InvoiceOverrides, InvoiceRecord, UtilityType};
pub use pipeline::{IngestOutcome, IngestionPipeline};
pub use store::{JsonFileStore, MemoryStore, RecordStore, StoredRecord};
pub use upload::UploadedFile;
