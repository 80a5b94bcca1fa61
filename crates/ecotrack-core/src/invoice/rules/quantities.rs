//! Numeric quantity parsing for consumption values.

use super::patterns::QUANTITY;

/// Read a consumption quantity from a JSON value.
///
/// Accepts numbers and strings such as `"1,234.5 kWh"`, `"1.234,5 kWh"` or
/// `"12,5 m3"`. Non-finite values, text without digits and separators that
/// cannot be read either way yield `None`.
pub fn parse_quantity(value: &serde_json::Value) -> Option<f64> {
    let number = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => {
            let found = QUANTITY.find(s)?;
            normalize_number(found.as_str())?.parse::<f64>().ok()?
        }
        _ => return None,
    };

    number.is_finite().then_some(number)
}

/// Rewrite a matched number with grouping and decimal separators into plain
/// `1234.5` form.
///
/// With both `.` and `,` present the last one is the decimal separator. A
/// lone comma followed by one or two digits is a decimal comma. Otherwise
/// separators must split the digits into groups of three.
fn normalize_number(raw: &str) -> Option<String> {
    let token = raw.trim_end_matches(|c: char| c.is_whitespace() || c == '.' || c == ',');
    let (sign, token) = match token.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", token),
    };

    // Space-grouped thousands ("1 200") stay together, anything else ends the number
    let mut parts = token.split_whitespace();
    let mut joined = parts.next()?.to_string();
    for part in parts {
        let leading = part.chars().take_while(char::is_ascii_digit).count();
        if leading != 3 {
            break;
        }
        joined.push_str(part);
    }

    let plain = match (joined.rfind('.'), joined.rfind(',')) {
        (Some(dot), Some(comma)) => {
            let (decimal, grouping) = if comma > dot { (',', '.') } else { ('.', ',') };
            let split = comma.max(dot);
            let integer: Vec<&str> = joined[..split].split(grouping).collect();
            if joined.matches(decimal).count() != 1 || !thousands_groups(&integer) {
                return None;
            }
            joined.replace(grouping, "").replace(decimal, ".")
        }
        (None, Some(_)) => {
            let groups: Vec<&str> = joined.split(',').collect();
            if groups.len() == 2 && (1..=2).contains(&groups[1].len()) {
                joined.replace(',', ".")
            } else if thousands_groups(&groups) {
                joined.replace(',', "")
            } else {
                return None;
            }
        }
        (Some(_), None) if joined.matches('.').count() > 1 => {
            let groups: Vec<&str> = joined.split('.').collect();
            if !thousands_groups(&groups) {
                return None;
            }
            joined.replace('.', "")
        }
        _ => joined,
    };

    Some(format!("{sign}{plain}"))
}

fn thousands_groups(groups: &[&str]) -> bool {
    groups.iter().skip(1).all(|g| g.len() == 3)
}
