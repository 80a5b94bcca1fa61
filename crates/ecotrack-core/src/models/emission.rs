//! Consumption and emission result models.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use super::invoice::UtilityType;

/// A consumption quantity read from an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consumption {
    pub value: f64,
    pub unit: String,
}

/// Consumption per utility type, plus the order types were detected in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsumptionData {
    /// Detected types; the first one is treated as primary.
    pub detected_types: Vec<UtilityType>,
    entries: Vec<(UtilityType, Consumption)>,
}

impl ConsumptionData {
    pub fn new(detected_types: Vec<UtilityType>) -> Self {
        Self {
            detected_types,
            entries: Vec::new(),
        }
    }

    /// Record a consumption value, replacing any earlier one for the same type.
    pub fn insert(&mut self, utility: UtilityType, consumption: Consumption) {
        match self.entries.iter_mut().find(|(t, _)| *t == utility) {
            Some(entry) => entry.1 = consumption,
            None => self.entries.push((utility, consumption)),
        }
    }

    pub fn get(&self, utility: UtilityType) -> Option<&Consumption> {
        self.entries
            .iter()
            .find(|(t, _)| *t == utility)
            .map(|(_, c)| c)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(UtilityType, Consumption)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `{ "<type>": { "value": .., "unit": .. } }`
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .entries
            .iter()
            .map(|(t, c)| {
                (
                    t.as_str().to_string(),
                    serde_json::json!({ "value": c.value, "unit": c.unit }),
                )
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

/// Per-type CO₂ contributions, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmissionBreakdown(Vec<(UtilityType, f64)>);

impl EmissionBreakdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `kg` to the contribution of `utility`, keeping 3 decimals.
    pub fn add(&mut self, utility: UtilityType, kg: f64) {
        match self.0.iter_mut().find(|(t, _)| *t == utility) {
            Some(entry) => entry.1 = round3(entry.1 + kg),
            None => self.0.push((utility, round3(kg))),
        }
    }

    pub fn get(&self, utility: UtilityType) -> Option<f64> {
        self.0.iter().find(|(t, _)| *t == utility).map(|(_, v)| *v)
    }

    /// Types in insertion order.
    pub fn types(&self) -> Vec<UtilityType> {
        self.0.iter().map(|(t, _)| *t).collect()
    }

    pub fn total(&self) -> f64 {
        round3(self.0.iter().map(|(_, v)| v).sum())
    }

    pub fn iter(&self) -> impl Iterator<Item = &(UtilityType, f64)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Plain key to number object, for persistence.
    pub fn to_json_object(&self) -> serde_json::Map<String, serde_json::Value> {
        self.0
            .iter()
            .map(|(t, v)| (t.as_str().to_string(), serde_json::Value::from(*v)))
            .collect()
    }
}

impl Serialize for EmissionBreakdown {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (utility, kg) in &self.0 {
            map.serialize_entry(utility.as_str(), kg)?;
        }
        map.end()
    }
}

/// Computed emissions for one invoice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmissionResult {
    /// Total CO₂ in kilograms, rounded to 3 decimals.
    pub emissions: f64,

    pub emission_breakdown: EmissionBreakdown,

    /// Types that contributed to the total, in order.
    pub emission_types: Vec<UtilityType>,

    /// Human-readable report.
    pub analysis: String,

    /// Consumption of the first detected type.
    pub consumption: Option<f64>,

    pub consumption_unit: Option<String>,

    /// e.g. `0.233 kg CO2/kWh`
    pub emission_factor: Option<String>,
}

/// Round to 3 decimal places.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
