//! Utility type normalization.

use crate::models::invoice::UtilityType;

/// Map a free-text type label onto a utility type.
///
/// Electricity, power and kWh mean energy; anything mentioning h2o is water;
/// "natural" means gas. Unrecognized labels map to `None`.
pub fn map_type_synonym(raw: &str) -> Option<UtilityType> {
    let label = raw.trim().to_lowercase();
    if label.is_empty() {
        return None;
    }

    if label.contains("electric")
        || label.contains("power")
        || label.contains("kwh")
        || label.contains("energy")
    {
        Some(UtilityType::Energy)
    } else if label.contains("h2o") || label.contains("water") {
        Some(UtilityType::Water)
    } else if label.contains("natural") || label.contains("gas") {
        Some(UtilityType::Gas)
    } else if label == "other" {
        Some(UtilityType::Other)
    } else {
        None
    }
}

/// Strict primary type: anything outside the canonical names becomes `other`.
pub fn coerce_primary_type(raw: Option<&str>) -> UtilityType {
    raw.and_then(|r| r.parse().ok()).unwrap_or(UtilityType::Other)
}

/// Map through synonyms, drop unknown labels and duplicates.
///
/// Never returns an empty list: falls back to `[primary]`.
pub fn normalize_identified_types<S: AsRef<str>>(raw: &[S], primary: UtilityType) -> Vec<UtilityType> {
    let mut types = Vec::with_capacity(raw.len());
    for label in raw {
        if let Some(utility) = map_type_synonym(label.as_ref()) {
            if !types.contains(&utility) {
                types.push(utility);
            }
        }
    }

    if types.is_empty() {
        types.push(primary);
    }
    types
}

/// Merge identified types into the presentation-level type string.
///
/// Energy together with gas gives `energygas`, energy with water gives
/// `energywater`, otherwise the first type, otherwise `other`.
pub fn resolve_normalized_type(types: &[UtilityType]) -> String {
    let has = |t: UtilityType| types.contains(&t);

    if has(UtilityType::Energy) && has(UtilityType::Gas) {
        "energygas".to_string()
    } else if has(UtilityType::Energy) && has(UtilityType::Water) {
        "energywater".to_string()
    } else {
        types
            .first()
            .map(|t| t.as_str().to_string())
            .unwrap_or_else(|| UtilityType::Other.as_str().to_string())
    }
}

/// Split a normalized type back into utility types, `energygas` into energy and gas.
pub fn expand_normalized_type(normalized: &str) -> Vec<UtilityType> {
    let label = normalized.to_lowercase();
    let mut types = Vec::new();
    for utility in [UtilityType::Energy, UtilityType::Gas, UtilityType::Water] {
        if label.contains(utility.as_str()) {
            types.push(utility);
        }
    }
    if types.is_empty() {
        types.push(UtilityType::Other);
    }
    types
}
