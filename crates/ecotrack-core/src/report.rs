//! Plain-text rendering of stored invoice records.

use std::fmt::Write;

use crate::models::invoice::InvoiceRecord;

/// Multi-line summary of a record, without the analysis text.
pub fn render_summary(id: &str, record: &InvoiceRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Invoice {}", id);
    let _ = writeln!(out, "  File:        {} ({})", record.file_name, record.mime_type);
    let _ = writeln!(out, "  Provider:    {}", record.provider);
    let _ = writeln!(out, "  Number:      {}", record.invoice_number);
    let _ = writeln!(out, "  Date:        {}", record.invoice_date);
    let _ = writeln!(out, "  Type:        {}", record.invoice_type);

    if let (Some(value), Some(unit)) = (record.consumption, &record.consumption_unit) {
        let _ = writeln!(out, "  Consumption: {} {}", value, unit);
    }
    if let Some(factor) = &record.emission_factor {
        let _ = writeln!(out, "  Factor:      {}", factor);
    }

    let _ = writeln!(out, "  Emissions:   {} kg CO2", record.emissions);
    for (utility, kg) in &record.emission_breakdown {
        let _ = writeln!(out, "    {:<10} {} kg CO2", utility, kg);
    }
    out
}

/// One table row: id, date, provider, type, emissions.
pub fn render_row(id: &str, record: &InvoiceRecord) -> String {
    format!(
        "{:<36}  {}  {:<24}  {:<12}  {:>10.3}",
        id,
        record.invoice_date,
        truncate(&record.provider, 24),
        record.invoice_type,
        record.emissions
    )
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        value.to_string()
    } else {
        let mut cut: String = value.chars().take(max.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}
