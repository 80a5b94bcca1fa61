//! Rule-based normalizers for language-model output.

pub mod dates;
pub mod patterns;
pub mod quantities;
pub mod types;

pub use dates::{normalize_invoice_date, parse_iso_date};
pub use quantities::parse_quantity;
pub use types::{
    coerce_primary_type, expand_normalized_type, map_type_synonym, normalize_identified_types,
    resolve_normalized_type,
};
