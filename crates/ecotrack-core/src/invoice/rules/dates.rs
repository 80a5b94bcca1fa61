//! Invoice date normalization.

use chrono::NaiveDate;

use super::patterns::ISO_DATE;

/// Parse a strict `YYYY-MM-DD` date that exists on the calendar.
pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if !ISO_DATE.is_match(raw) {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Keep a valid ISO date, otherwise fall back to `today`.
pub fn normalize_invoice_date(raw: Option<&str>, today: NaiveDate) -> NaiveDate {
    raw.and_then(parse_iso_date).unwrap_or(today)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_valid_iso_date_kept() {
        assert_eq!(
            normalize_invoice_date(Some("2024-01-15"), today()),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
    }

    #[test]
    fn test_other_formats_replaced() {
        assert_eq!(normalize_invoice_date(Some("15.01.2024"), today()), today());
        assert_eq!(normalize_invoice_date(Some("2024-1-5"), today()), today());
        assert_eq!(normalize_invoice_date(Some("January 2024"), today()), today());
        assert_eq!(normalize_invoice_date(None, today()), today());
    }

    #[test]
    fn test_impossible_date_replaced() {
        assert_eq!(normalize_invoice_date(Some("2024-02-30"), today()), today());
    }
}
