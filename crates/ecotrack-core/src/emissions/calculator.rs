//! Consumption extraction and deterministic CO₂ calculation.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::factors::{default_unit, EmissionFactors};
use crate::error::CalculatorError;
use crate::invoice::rules::patterns::{API_KEY, PLACEHOLDER_KEY};
use crate::invoice::rules::{expand_normalized_type, map_type_synonym, parse_quantity};
use crate::llm::{parse_json_object, CompletionClient, CompletionRequest};
use crate::models::emission::{round3, Consumption, ConsumptionData, EmissionBreakdown, EmissionResult};
use crate::models::invoice::UtilityType;

/// Quantity assumed when a type was detected but no usable value was read.
pub const PLACEHOLDER_QUANTITY: f64 = 100.0;

const EXTRACTION_SYSTEM_PROMPT: &str = "You read utility invoices and extract consumption figures. \
You never calculate emissions. Reply with a single JSON object and nothing else.";

const REPORT_SYSTEM_PROMPT: &str = "You format emissions reports for utility invoices. \
All numbers are already calculated; copy them exactly and never recompute them. \
Reply with a single JSON object and nothing else.";

/// Model and credential settings for the calculator.
#[derive(Debug, Clone)]
pub struct CalculatorSettings {
    pub api_key: Option<String>,
    pub extraction_model: String,
    pub report_model: String,
}

/// Extracts consumption with a language model and computes emissions locally.
pub struct EmissionsCalculator {
    client: Arc<dyn CompletionClient>,
    settings: CalculatorSettings,
    factors: EmissionFactors,
}

impl EmissionsCalculator {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        settings: CalculatorSettings,
        factors: EmissionFactors,
    ) -> Self {
        Self {
            client,
            settings,
            factors,
        }
    }

    /// Run credential check, extraction, calculation, report and projection.
    ///
    /// Does not fall back on failure; callers decide what to do with errors.
    pub async fn calculate(
        &self,
        text: &str,
        normalized_type: &str,
    ) -> Result<EmissionResult, CalculatorError> {
        validate_api_key(self.settings.api_key.as_deref())?;

        let request = CompletionRequest::json(
            &self.settings.extraction_model,
            EXTRACTION_SYSTEM_PROMPT,
            extraction_prompt(text),
        );
        let content = self.client.complete(&request).await?;
        let mut consumption = parse_consumption(&content, normalized_type);
        debug!(
            "Detected types {:?} with {} consumption values",
            consumption.detected_types,
            consumption.iter().count()
        );

        let (breakdown, total) = compute_emissions(&mut consumption, &self.factors);
        info!("Calculated {} kg CO2 for {:?}", total, breakdown.types());

        let report_request = CompletionRequest::json(
            &self.settings.report_model,
            REPORT_SYSTEM_PROMPT,
            report_prompt(&consumption, &self.factors, &breakdown, total),
        )
        .with_temperature(0.2);
        let report = self.client.complete(&report_request).await?;
        let analysis = parse_analysis(&report);

        Ok(project(consumption, breakdown, total, analysis, &self.factors))
    }
}

/// Reject missing, placeholder or malformed API keys.
pub fn validate_api_key(key: Option<&str>) -> Result<(), CalculatorError> {
    let key = key.map(str::trim).unwrap_or_default();
    if key.is_empty() {
        return Err(CalculatorError::Configuration("no API key configured".to_string()));
    }
    if PLACEHOLDER_KEY.is_match(key) {
        return Err(CalculatorError::Configuration(
            "API key is still a placeholder value".to_string(),
        ));
    }
    if !API_KEY.is_match(key) {
        return Err(CalculatorError::Configuration(
            "API key does not have the expected format".to_string(),
        ));
    }
    Ok(())
}

fn extraction_prompt(text: &str) -> String {
    format!(
        r#"Extract utility consumption from this invoice.

Invoice text:
"""
{text}
"""

Reply with JSON in exactly this shape:
{{
  "detectedTypes": ["energy" | "gas" | "water"],
  "consumption": {{
    "energy": {{ "value": number, "unit": "kWh" }},
    "gas": {{ "value": number, "unit": "m3" }},
    "water": {{ "value": number, "unit": "m3" }}
  }},
  "provider": "string",
  "invoiceDate": "YYYY-MM-DD"
}}

Rules:
- Only include types that are billed on the invoice, in the order they appear.
- Electricity is "energy"; natural gas is "gas".
- Values are the consumed quantity only, not prices. Do not calculate emissions."#
    )
}

/// Parse the extraction response.
///
/// An unusable response, or one that detects nothing, falls back to the
/// types named by `normalized_type` with no consumption values.
pub fn parse_consumption(content: &str, normalized_type: &str) -> ConsumptionData {
    let Some(fields) = parse_json_object(content) else {
        warn!("Consumption response is not a JSON object, assuming {}", normalized_type);
        return ConsumptionData::new(expand_normalized_type(normalized_type));
    };

    let mut detected = Vec::new();
    if let Some(Value::Array(items)) = fields.get("detectedTypes") {
        for label in items.iter().filter_map(Value::as_str) {
            let utility = map_type_synonym(label).unwrap_or(UtilityType::Other);
            if !detected.contains(&utility) {
                detected.push(utility);
            }
        }
    }
    if detected.is_empty() {
        debug!("No types detected, assuming {}", normalized_type);
        detected = expand_normalized_type(normalized_type);
    }

    let section = match fields.get("consumption") {
        Some(Value::Object(map)) => map,
        _ => &fields,
    };

    let mut data = ConsumptionData::new(detected.clone());
    for utility in detected {
        if let Some(consumption) = consumption_entry(section, utility) {
            data.insert(utility, consumption);
        }
    }
    data
}

fn consumption_entry(section: &Map<String, Value>, utility: UtilityType) -> Option<Consumption> {
    let entry = section.get(utility.as_str())?;
    let (value, unit) = match entry {
        Value::Object(obj) => (
            obj.get("value").and_then(parse_quantity)?,
            obj.get("unit").and_then(Value::as_str).map(str::to_string),
        ),
        other => (parse_quantity(other)?, None),
    };
    Some(Consumption {
        value,
        unit: unit
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| default_unit(utility).to_string()),
    })
}

/// Apply emission factors to every detected type with a value.
///
/// A zero total with detected types is replaced by the placeholder quantity
/// for the first type, so a detection never reports 0 kg. The placeholder is
/// also written into `consumption` so the reported quantity matches.
pub fn compute_emissions(
    consumption: &mut ConsumptionData,
    factors: &EmissionFactors,
) -> (EmissionBreakdown, f64) {
    let mut breakdown = EmissionBreakdown::new();
    let mut total = 0.0;

    for utility in &consumption.detected_types {
        if let Some(entry) = consumption.get(*utility) {
            let kg = factors.emissions_for(*utility, entry.value);
            breakdown.add(*utility, kg);
            total += kg;
        }
    }
    total = round3(total);

    if total == 0.0 {
        if let Some(first) = consumption.detected_types.first().copied() {
            let kg = factors.emissions_for(first, PLACEHOLDER_QUANTITY);
            warn!(
                "No emissions from detected types, assuming {} {} of {}",
                PLACEHOLDER_QUANTITY,
                default_unit(first),
                first
            );
            consumption.insert(
                first,
                Consumption {
                    value: PLACEHOLDER_QUANTITY,
                    unit: default_unit(first).to_string(),
                },
            );
            breakdown = EmissionBreakdown::new();
            breakdown.add(first, kg);
            total = kg;
        }
    }

    (breakdown, total)
}

fn report_prompt(
    consumption: &ConsumptionData,
    factors: &EmissionFactors,
    breakdown: &EmissionBreakdown,
    total: f64,
) -> String {
    let input = json!({
        "consumptionData": consumption.to_json(),
        "detectedTypes": consumption.detected_types,
        "emissionFactors": factors.to_json(),
        "emissionBreakdown": breakdown,
        "totalEmissions": total,
    });
    let input = serde_json::to_string_pretty(&input).unwrap_or_else(|_| input.to_string());

    format!(
        r#"Format an emissions analysis report from these already calculated results:

{input}

For each utility type in detectedTypes write a section with these headings:
Consumption, Emission Factor, Calculation, Total Emissions.
Finish with the overall total in kg CO2.

Reply with JSON: {{ "analysis": "the report as markdown text" }}"#
    )
}

/// Read `analysis` from the report response, or keep the raw text.
fn parse_analysis(content: &str) -> String {
    parse_json_object(content)
        .and_then(|fields| {
            fields
                .get("analysis")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| content.trim().to_string())
}

/// Assemble the result, including the primary-type scalar fields.
fn project(
    consumption: ConsumptionData,
    breakdown: EmissionBreakdown,
    total: f64,
    analysis: String,
    factors: &EmissionFactors,
) -> EmissionResult {
    let primary = consumption.detected_types.first().copied();
    let primary_entry = primary.and_then(|t| consumption.get(t));

    EmissionResult {
        emissions: total,
        emission_types: breakdown.types(),
        emission_breakdown: breakdown,
        analysis,
        consumption: primary_entry.map(|c| c.value),
        consumption_unit: primary_entry.map(|c| c.unit.clone()),
        emission_factor: primary.map(|t| factors.describe(t)),
    }
}
