//! Invoice data models: utility types, extracted metadata and the persisted record.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The kind of utility an invoice bills for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UtilityType {
    /// Electricity.
    Energy,
    /// Water supply.
    Water,
    /// Natural gas.
    Gas,
    /// Anything else.
    Other,
}

impl UtilityType {
    /// All utility types, in display order.
    pub const ALL: [UtilityType; 4] = [
        UtilityType::Energy,
        UtilityType::Water,
        UtilityType::Gas,
        UtilityType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UtilityType::Energy => "energy",
            UtilityType::Water => "water",
            UtilityType::Gas => "gas",
            UtilityType::Other => "other",
        }
    }
}

impl fmt::Display for UtilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parse: only the four canonical names, case-insensitive.
impl FromStr for UtilityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "energy" => Ok(UtilityType::Energy),
            "water" => Ok(UtilityType::Water),
            "gas" => Ok(UtilityType::Gas),
            "other" => Ok(UtilityType::Other),
            other => Err(format!("unknown utility type: {}", other)),
        }
    }
}

/// Normalized invoice metadata.
///
/// `invoice_number` and `provider` are never empty, `identified_types` is
/// never empty and holds no duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceMetadata {
    pub invoice_date: NaiveDate,
    pub invoice_number: String,
    pub provider: String,
    pub identified_types: Vec<UtilityType>,
    pub primary_type: UtilityType,
}

/// Caller-supplied values that take precedence over extracted metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvoiceOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

/// The persisted invoice record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// Identity of the uploading user.
    pub user_id: String,

    /// Original file name of the upload.
    pub file_name: String,

    /// Where the uploaded file is stored.
    pub file_path: String,

    /// Declared MIME type.
    pub mime_type: String,

    /// File size in bytes.
    pub file_size: u64,

    pub invoice_date: NaiveDate,
    pub invoice_number: String,
    pub provider: String,
    pub primary_type: UtilityType,
    pub identified_types: Vec<UtilityType>,

    /// Normalized (possibly merged) type, e.g. `energygas`.
    #[serde(rename = "type")]
    pub invoice_type: String,

    /// Total CO₂ in kilograms.
    pub emissions: f64,

    /// Per-type CO₂ contribution as a plain JSON object.
    pub emission_breakdown: serde_json::Map<String, serde_json::Value>,

    pub emission_types: Vec<UtilityType>,

    /// Consumption of the primary detected type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumption: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumption_unit: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub emission_factor: Option<String>,

    /// Human-readable analysis report.
    pub analysis: String,

    /// Raw extracted text, kept for audit.
    pub extracted_text: String,

    pub created_at: DateTime<Utc>,
}
