//! Invoice ingestion: text extraction, metadata, emissions and persistence.
//!
//! Each upload runs as one linear sequence of awaited stages. The uploaded
//! file is deleted whenever a stage fails terminally.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::emissions::{generate_mock, CalculatorSettings, EmissionFactors, EmissionsCalculator};
use crate::error::{EcotrackError, PipelineError};
use crate::extract::{DocumentTextExtractor, TextExtractor};
use crate::invoice::rules::{parse_iso_date, resolve_normalized_type};
use crate::invoice::MetadataExtractor;
use crate::llm::{CompletionClient, OpenAiClient};
use crate::models::config::EcotrackConfig;
use crate::models::emission::EmissionResult;
use crate::models::invoice::{InvoiceMetadata, InvoiceOverrides, InvoiceRecord};
use crate::store::{JsonFileStore, RecordStore};
use crate::upload::UploadedFile;

/// A persisted invoice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestOutcome {
    pub id: String,
    pub record: InvoiceRecord,

    /// Emissions are simulated because the calculator failed.
    pub fallback_used: bool,
}

/// Runs uploads through every ingestion stage.
pub struct IngestionPipeline {
    extractor: Arc<dyn TextExtractor>,
    metadata: MetadataExtractor,
    calculator: EmissionsCalculator,
    factors: EmissionFactors,
    store: Arc<dyn RecordStore>,
}

impl IngestionPipeline {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        metadata: MetadataExtractor,
        calculator: EmissionsCalculator,
        factors: EmissionFactors,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            extractor,
            metadata,
            calculator,
            factors,
            store,
        }
    }

    /// Wire the default collaborators: PDF/OCR extraction, an
    /// OpenAI-compatible client and JSON file records.
    pub fn from_config(config: &EcotrackConfig) -> Result<Self, EcotrackError> {
        let client: Arc<dyn CompletionClient> = Arc::new(OpenAiClient::from_config(&config.llm)?);
        let extractor = DocumentTextExtractor::from_config(config)?;
        let settings = CalculatorSettings {
            api_key: config.llm.api_key.clone(),
            extraction_model: config.llm.extraction_model.clone(),
            report_model: config.llm.report_model.clone(),
        };

        Ok(Self::new(
            Arc::new(extractor),
            MetadataExtractor::new(client.clone(), config.llm.extraction_model.clone()),
            EmissionsCalculator::new(client, settings, config.emission_factors.clone()),
            config.emission_factors.clone(),
            Arc::new(JsonFileStore::new(config.storage.record_dir.clone())),
        ))
    }

    /// Ingest an accepted upload on behalf of `uploader`.
    pub async fn ingest(
        &self,
        upload: UploadedFile,
        uploader: Option<&str>,
        overrides: &InvoiceOverrides,
    ) -> Result<IngestOutcome, PipelineError> {
        let Some(user_id) = uploader.map(str::trim).filter(|u| !u.is_empty()) else {
            upload.remove();
            return Err(PipelineError::MissingIdentity);
        };

        info!("Ingesting {} for {}", upload.original_name, user_id);

        let text = match self.extract_text(&upload).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Text extraction failed for {}: {}", upload.original_name, e);
                upload.remove();
                return Err(e);
            }
        };

        let metadata = self.metadata.extract(&text).await;
        let normalized_type = resolve_normalized_type(&metadata.identified_types);
        debug!("Normalized type: {}", normalized_type);

        let (emissions, fallback_used) =
            match self.calculator.calculate(&text, &normalized_type).await {
                Ok(result) => (result, false),
                Err(e) => {
                    warn!("Emissions calculation failed, using simulated data: {}", e);
                    let mut mock = generate_mock(&normalized_type, &self.factors);
                    mock.analysis = format!(
                        "WARNING: emissions could not be calculated from this invoice, the figures below are simulated ({})\n\n{}",
                        e, mock.analysis
                    );
                    (mock, true)
                }
            };

        let record = assemble_record(
            user_id,
            &upload,
            metadata,
            overrides,
            normalized_type,
            emissions,
            text,
        );

        match self.store.save(&record).await {
            Ok(id) => {
                info!(
                    "Saved invoice {} ({} kg CO2{})",
                    id,
                    record.emissions,
                    if fallback_used { ", simulated" } else { "" }
                );
                Ok(IngestOutcome {
                    id,
                    record,
                    fallback_used,
                })
            }
            Err(e) => {
                error!("Failed to save invoice record: {}", e);
                upload.remove();
                Err(PipelineError::Persistence(e))
            }
        }
    }

    /// Extraction is blocking work (PDF parsing, OCR inference).
    async fn extract_text(&self, upload: &UploadedFile) -> Result<String, PipelineError> {
        let extractor = self.extractor.clone();
        let file = upload.clone();
        tokio::task::spawn_blocking(move || extractor.extract(&file))
            .await
            .map_err(|e| PipelineError::Unexpected(format!("extraction task failed: {}", e)))?
            .map_err(PipelineError::from)
    }
}

/// Non-empty overrides win over extracted metadata. An override date is
/// used only when it is a valid `YYYY-MM-DD` date.
fn assemble_record(
    user_id: &str,
    upload: &UploadedFile,
    metadata: InvoiceMetadata,
    overrides: &InvoiceOverrides,
    normalized_type: String,
    emissions: EmissionResult,
    extracted_text: String,
) -> InvoiceRecord {
    let invoice_date = match non_empty(&overrides.invoice_date) {
        Some(raw) => parse_iso_date(raw).unwrap_or_else(|| {
            warn!("Ignoring invalid invoice date override: {}", raw);
            metadata.invoice_date
        }),
        None => metadata.invoice_date,
    };

    let emission_types = if emissions.emission_types.is_empty() {
        metadata.identified_types.clone()
    } else {
        emissions.emission_types
    };

    InvoiceRecord {
        user_id: user_id.to_string(),
        file_name: upload.original_name.clone(),
        file_path: upload.path.display().to_string(),
        mime_type: upload.mime_type.clone(),
        file_size: upload.size,
        invoice_date,
        invoice_number: non_empty(&overrides.invoice_number)
            .map(str::to_string)
            .unwrap_or(metadata.invoice_number),
        provider: non_empty(&overrides.provider)
            .map(str::to_string)
            .unwrap_or(metadata.provider),
        primary_type: metadata.primary_type,
        identified_types: metadata.identified_types,
        invoice_type: normalized_type,
        emissions: emissions.emissions,
        emission_breakdown: emissions.emission_breakdown.to_json_object(),
        emission_types,
        consumption: emissions.consumption,
        consumption_unit: emissions.consumption_unit,
        emission_factor: emissions.emission_factor,
        analysis: emissions.analysis,
        extracted_text,
        created_at: Utc::now(),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExtractionError, LlmError, OcrError, StoreError};
    use crate::models::invoice::UtilityType;
    use crate::store::MemoryStore;
    use crate::testing::ScriptedClient;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    const KEY: &str = "sk-test0123456789abcdefABCDEF";

    struct FixedText(Option<&'static str>);

    impl TextExtractor for FixedText {
        fn extract(&self, _file: &UploadedFile) -> Result<String, ExtractionError> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| ExtractionError::Ocr(OcrError::Recognition("blurry".to_string())))
        }
    }

    struct FailingStore;

    #[async_trait]
    impl RecordStore for FailingStore {
        async fn save(&self, _record: &InvoiceRecord) -> Result<String, StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk full")))
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        upload: UploadedFile,
        client: Arc<ScriptedClient>,
        store: Arc<MemoryStore>,
    }

    fn harness(responses: Vec<Result<String, LlmError>>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bill.png");
        std::fs::write(&path, b"image bytes").unwrap();
        Harness {
            upload: UploadedFile {
                path,
                original_name: "bill.png".to_string(),
                mime_type: "image/png".to_string(),
                size: 11,
            },
            _dir: dir,
            client: Arc::new(ScriptedClient::new(responses)),
            store: Arc::new(MemoryStore::new()),
        }
    }

    fn pipeline(
        h: &Harness,
        text: Option<&'static str>,
        api_key: &str,
        store: Arc<dyn RecordStore>,
    ) -> IngestionPipeline {
        let client: Arc<dyn CompletionClient> = h.client.clone();
        let settings = CalculatorSettings {
            api_key: Some(api_key.to_string()),
            extraction_model: "extract-model".to_string(),
            report_model: "report-model".to_string(),
        };
        IngestionPipeline::new(
            Arc::new(FixedText(text)),
            MetadataExtractor::new(client.clone(), "extract-model"),
            EmissionsCalculator::new(client, settings, EmissionFactors::default()),
            EmissionFactors::default(),
            store,
        )
    }

    fn ok(value: serde_json::Value) -> Result<String, LlmError> {
        Ok(value.to_string())
    }

    #[tokio::test]
    async fn test_single_energy_invoice() {
        let h = harness(vec![
            ok(serde_json::json!({
                "invoiceDate": "2024-02-29",
                "invoiceNumber": "E-100",
                "provider": "City Power",
                "identifiedTypes": ["electricity"],
                "primaryType": "energy"
            })),
            ok(serde_json::json!({
                "detectedTypes": ["energy"],
                "consumption": {"energy": {"value": 450, "unit": "kWh"}}
            })),
            ok(serde_json::json!({"analysis": "Energy: 104.85 kg CO2"})),
        ]);
        let p = pipeline(&h, Some("City Power\nUsage 450 kWh"), KEY, h.store.clone());

        let outcome = p
            .ingest(h.upload.clone(), Some("user-1"), &InvoiceOverrides::default())
            .await
            .unwrap();

        let record = &outcome.record;
        assert!(!outcome.fallback_used);
        assert_eq!(record.emissions, 104.85);
        assert_eq!(record.emission_breakdown["energy"], serde_json::json!(104.85));
        assert_eq!(record.invoice_type, "energy");
        assert_eq!(record.provider, "City Power");
        assert_eq!(record.invoice_date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(record.consumption, Some(450.0));
        assert_eq!(record.emission_factor.as_deref(), Some("0.233 kg CO2/kWh"));
        assert_eq!(record.extracted_text, "City Power\nUsage 450 kWh");
        assert_eq!(record.user_id, "user-1");
        assert_eq!(h.store.get(&outcome.id).await.as_ref(), Some(record));
        assert!(h.upload.exists());
    }

    #[tokio::test]
    async fn test_energy_and_gas_invoice() {
        let h = harness(vec![
            ok(serde_json::json!({
                "provider": "Utility Co",
                "identifiedTypes": ["electricity", "natural gas"],
                "primaryType": "energy"
            })),
            ok(serde_json::json!({
                "detectedTypes": ["energy", "gas"],
                "consumption": {
                    "energy": {"value": 450, "unit": "kWh"},
                    "gas": {"value": 120, "unit": "m3"}
                }
            })),
            ok(serde_json::json!({"analysis": "Combined report"})),
        ]);
        let p = pipeline(&h, Some("electricity 450 kWh, natural gas 120 m3"), KEY, h.store.clone());

        let outcome = p
            .ingest(h.upload.clone(), Some("user-1"), &InvoiceOverrides::default())
            .await
            .unwrap();

        assert_eq!(
            outcome.record.identified_types,
            vec![UtilityType::Energy, UtilityType::Gas]
        );
        assert_eq!(outcome.record.invoice_type, "energygas");
        assert_eq!(outcome.record.emissions, 344.85);
        assert_eq!(
            outcome.record.emission_types,
            vec![UtilityType::Energy, UtilityType::Gas]
        );
    }

    #[tokio::test]
    async fn test_placeholder_key_falls_back_to_mock() {
        let h = harness(vec![ok(serde_json::json!({
            "provider": "City Power",
            "identifiedTypes": ["energy"],
            "primaryType": "energy"
        }))]);
        let p = pipeline(&h, Some("450 kWh"), "your-api-key-here", h.store.clone());

        let outcome = p
            .ingest(h.upload.clone(), Some("user-1"), &InvoiceOverrides::default())
            .await
            .unwrap();

        assert!(outcome.fallback_used);
        assert!(outcome.record.analysis.starts_with("WARNING"));
        assert!(outcome.record.analysis.contains("SIMULATED DATA"));
        assert_eq!(outcome.record.emissions, 104.85);
        assert_eq!(outcome.record.invoice_type, "energy");
        // Only the metadata call reached the model
        assert_eq!(h.client.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_ocr_failure_removes_upload() {
        let h = harness(vec![]);
        let p = pipeline(&h, None, KEY, h.store.clone());

        let err = p
            .ingest(h.upload.clone(), Some("user-1"), &InvoiceOverrides::default())
            .await
            .unwrap_err();

        assert_eq!(err.status(), 422);
        assert!(err.to_response().message.contains("clearer image"));
        assert!(!h.upload.exists());
        assert!(h.store.is_empty().await);
        assert!(h.client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_metadata_uses_defaults() {
        let h = harness(vec![
            Ok("I could not find any metadata, sorry.".to_string()),
            ok(serde_json::json!({"detectedTypes": [], "consumption": {}})),
            ok(serde_json::json!({"analysis": "Other: 50 kg CO2"})),
        ]);
        let p = pipeline(&h, Some("Invoice"), KEY, h.store.clone());

        let outcome = p
            .ingest(h.upload.clone(), Some("user-1"), &InvoiceOverrides::default())
            .await
            .unwrap();

        let record = &outcome.record;
        assert_eq!(record.provider, "Unknown Provider");
        assert!(record.invoice_number.starts_with("AUTO-"));
        assert_eq!(record.identified_types, vec![UtilityType::Other]);
        assert_eq!(record.invoice_type, "other");
        assert_eq!(record.emissions, 50.0);
        assert!(!outcome.fallback_used);
    }

    #[tokio::test]
    async fn test_missing_identity_is_rejected() {
        let h = harness(vec![]);
        let p = pipeline(&h, Some("450 kWh"), KEY, h.store.clone());

        for uploader in [None, Some("  ")] {
            let err = p
                .ingest(h.upload.clone(), uploader, &InvoiceOverrides::default())
                .await
                .unwrap_err();
            assert_eq!(err.status(), 401);
        }
        assert!(!h.upload.exists());
        assert!(h.client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_removes_upload() {
        let h = harness(vec![
            ok(serde_json::json!({"identifiedTypes": ["gas"], "primaryType": "gas"})),
            ok(serde_json::json!({
                "detectedTypes": ["gas"],
                "consumption": {"gas": {"value": 120, "unit": "m3"}}
            })),
            ok(serde_json::json!({"analysis": "Gas"})),
        ]);
        let p = pipeline(&h, Some("Gas 120 m3"), KEY, Arc::new(FailingStore));

        let err = p
            .ingest(h.upload.clone(), Some("user-1"), &InvoiceOverrides::default())
            .await
            .unwrap_err();

        assert_eq!(err.status(), 500);
        assert_eq!(
            err.to_response().message,
            "Failed to process invoice. Please try again later."
        );
        assert!(!h.upload.exists());
    }

    #[tokio::test]
    async fn test_overrides_win_over_extracted_metadata() {
        let h = harness(vec![
            ok(serde_json::json!({
                "invoiceDate": "2024-01-15",
                "invoiceNumber": "X-1",
                "provider": "Extracted Ltd",
                "identifiedTypes": ["water"],
                "primaryType": "water"
            })),
            Err(LlmError::RateLimited("slow down".to_string())),
        ]);
        let p = pipeline(&h, Some("Water 15 m3"), KEY, h.store.clone());
        let overrides = InvoiceOverrides {
            invoice_date: Some("2024-05-31".to_string()),
            invoice_number: Some("  ".to_string()),
            provider: Some("Override Water".to_string()),
        };

        let outcome = p
            .ingest(h.upload.clone(), Some("user-1"), &overrides)
            .await
            .unwrap();

        let record = &outcome.record;
        assert_eq!(record.invoice_date, NaiveDate::from_ymd_opt(2024, 5, 31).unwrap());
        assert_eq!(record.invoice_number, "X-1");
        assert_eq!(record.provider, "Override Water");
        assert!(outcome.fallback_used);
        assert!(record.analysis.contains("rate limit exceeded"));
        assert_eq!(record.emissions, 5.16);
    }

    #[tokio::test]
    async fn test_invalid_override_date_is_ignored() {
        let h = harness(vec![ok(serde_json::json!({
            "invoiceDate": "2024-01-15",
            "identifiedTypes": ["energy"],
            "primaryType": "energy"
        }))]);
        let p = pipeline(&h, Some("450 kWh"), "", h.store.clone());
        let overrides = InvoiceOverrides {
            invoice_date: Some("31/05/2024".to_string()),
            ..InvoiceOverrides::default()
        };

        let outcome = p
            .ingest(h.upload.clone(), Some("user-1"), &overrides)
            .await
            .unwrap();
        assert_eq!(
            outcome.record.invoice_date,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
    }
}
