//! CO₂ emissions: factors, the model-backed calculator and the mock fallback.

pub mod calculator;
pub mod factors;
pub mod mock;

pub use calculator::{validate_api_key, CalculatorSettings, EmissionsCalculator};
pub use factors::EmissionFactors;
pub use mock::generate_mock;
