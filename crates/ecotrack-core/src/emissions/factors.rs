//! Fixed emission factors.

use serde::{Deserialize, Serialize};

use crate::models::emission::round3;
use crate::models::invoice::UtilityType;

/// Emission factors in kg CO₂ per unit of consumption.
///
/// One instance is shared by the calculator and the mock generator so that
/// real and simulated results stay comparable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmissionFactors {
    /// kg CO₂ per kWh.
    pub energy: f64,
    /// kg CO₂ per m³.
    pub gas: f64,
    /// kg CO₂ per m³.
    pub water: f64,
    /// Applied to any other type.
    pub unknown: f64,
}

impl Default for EmissionFactors {
    fn default() -> Self {
        Self {
            energy: 0.233,
            gas: 2.0,
            water: 0.344,
            unknown: 0.5,
        }
    }
}

impl EmissionFactors {
    pub fn factor(&self, utility: UtilityType) -> f64 {
        match utility {
            UtilityType::Energy => self.energy,
            UtilityType::Gas => self.gas,
            UtilityType::Water => self.water,
            UtilityType::Other => self.unknown,
        }
    }

    /// `value × factor`, rounded to 3 decimals.
    pub fn emissions_for(&self, utility: UtilityType, value: f64) -> f64 {
        round3(value * self.factor(utility))
    }

    /// Human-readable factor, e.g. `0.233 kg CO2/kWh`.
    pub fn describe(&self, utility: UtilityType) -> String {
        format!("{} kg CO2/{}", self.factor(utility), default_unit(utility))
    }

    /// Factor table as JSON, for prompts.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "energy": { "factor": self.energy, "unit": "kg CO2/kWh" },
            "gas": { "factor": self.gas, "unit": "kg CO2/m3" },
            "water": { "factor": self.water, "unit": "kg CO2/m3" },
            "other": { "factor": self.unknown, "unit": "kg CO2/unit" },
        })
    }
}

/// The unit a factor is expressed against.
pub fn default_unit(utility: UtilityType) -> &'static str {
    match utility {
        UtilityType::Energy => "kWh",
        UtilityType::Gas | UtilityType::Water => "m3",
        UtilityType::Other => "units",
    }
}
