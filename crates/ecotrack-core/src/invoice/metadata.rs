//! Language-model metadata extraction with deterministic normalization.

use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::rules::{coerce_primary_type, normalize_identified_types, normalize_invoice_date};
use crate::llm::{parse_json_object, CompletionClient, CompletionRequest};
use crate::models::invoice::{InvoiceMetadata, UtilityType};

/// Provider name used when none could be extracted.
pub const UNKNOWN_PROVIDER: &str = "Unknown Provider";

const SYSTEM_PROMPT: &str = "You extract utility invoice metadata. \
You read raw invoice text and reply with a single JSON object and nothing else.";

/// Extracts invoice date, number, provider and utility types.
///
/// Never fails: model errors and unusable responses degrade to a default
/// record.
pub struct MetadataExtractor {
    client: Arc<dyn CompletionClient>,
    model: String,
}

impl MetadataExtractor {
    pub fn new(client: Arc<dyn CompletionClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Extract and normalize metadata from invoice text.
    pub async fn extract(&self, text: &str) -> InvoiceMetadata {
        let request = CompletionRequest::json(&self.model, SYSTEM_PROMPT, user_prompt(text));
        let today = Local::now().date_naive();
        let stamp = Utc::now().timestamp_millis();

        match self.client.complete(&request).await {
            Ok(content) => {
                debug!("Metadata response: {} chars", content.len());
                normalize_metadata(&content, today, stamp)
            }
            Err(e) => {
                warn!("Metadata extraction failed, using defaults: {}", e);
                default_metadata(today, stamp)
            }
        }
    }
}

fn user_prompt(text: &str) -> String {
    format!(
        r#"Extract the metadata of this utility invoice.

Invoice text:
"""
{text}
"""

Reply with JSON in exactly this shape:
{{
  "invoiceDate": "YYYY-MM-DD",
  "invoiceNumber": "string",
  "provider": "string",
  "identifiedTypes": ["energy" | "water" | "gas" | "other"],
  "primaryType": "energy" | "water" | "gas" | "other"
}}

Rules:
- Electricity, power or kWh consumption is "energy".
- Anything mentioning H2O or water supply is "water".
- Natural gas is "gas".
- List every utility billed on the invoice in identifiedTypes; primaryType is the main one.
- Use an empty string for values you cannot find."#
    )
}

/// Generated invoice number for invoices where none was found.
pub fn auto_invoice_number(stamp: i64) -> String {
    format!("AUTO-{}", stamp)
}

/// The record used when the model is unavailable or its output is unusable.
pub fn default_metadata(today: NaiveDate, stamp: i64) -> InvoiceMetadata {
    InvoiceMetadata {
        invoice_date: today,
        invoice_number: auto_invoice_number(stamp),
        provider: UNKNOWN_PROVIDER.to_string(),
        identified_types: vec![UtilityType::Other],
        primary_type: UtilityType::Other,
    }
}

/// Normalize raw model output into metadata that satisfies every invariant.
pub fn normalize_metadata(content: &str, today: NaiveDate, stamp: i64) -> InvoiceMetadata {
    let Some(fields) = parse_json_object(content) else {
        warn!("Metadata response is not a JSON object, using defaults");
        return default_metadata(today, stamp);
    };

    let primary_type = coerce_primary_type(string_field(&fields, "primaryType").as_deref());

    let raw_types: Vec<String> = match fields.get("identifiedTypes") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(single)) => vec![single.clone()],
        _ => Vec::new(),
    };
    let identified_types = normalize_identified_types(&raw_types, primary_type);

    let invoice_date = normalize_invoice_date(string_field(&fields, "invoiceDate").as_deref(), today);

    let invoice_number = string_field(&fields, "invoiceNumber")
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| auto_invoice_number(stamp));

    let provider = string_field(&fields, "provider")
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNKNOWN_PROVIDER.to_string());

    let metadata = InvoiceMetadata {
        invoice_date,
        invoice_number,
        provider,
        identified_types,
        primary_type,
    };

    info!(
        "Metadata: provider={}, number={}, types={:?}",
        metadata.provider, metadata.invoice_number, metadata.identified_types
    );
    metadata
}

/// Trimmed string value; numbers are accepted and rendered as text.
fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
