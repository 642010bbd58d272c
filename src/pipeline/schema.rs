//! Schema validation and defaulting for parsed model output.
//!
//! A JSON object from the model is only loosely shaped like an
//! [`InvoiceRecord`]: keys go missing, numbers arrive as `"121,00 EUR"`,
//! unknowns arrive as `""`. This module coerces what is usable and turns
//! everything else into `null`, so the record always carries all fifteen keys.
//! Values already in the target shape pass through untouched.

use crate::output::{InvoiceRecord, LineItem};
use serde_json::{Map, Value};
use tracing::warn;

/// Coerce a parsed JSON object into an [`InvoiceRecord`].
pub fn record_from_value(obj: &Map<String, Value>) -> InvoiceRecord {
    InvoiceRecord {
        invoice_id: text_field(obj, "invoice_id"),
        invoice_date: text_field(obj, "invoice_date"),
        total_amount: number_field(obj, "total_amount"),
        net_amount: number_field(obj, "net_amount"),
        tax_percentage: number_field(obj, "tax_percentage"),
        total_tax_amount: number_field(obj, "total_tax_amount"),
        supplier_name: text_field(obj, "supplier_name"),
        supplier_address: text_field(obj, "supplier_address"),
        supplier_tax_id: text_field(obj, "supplier_tax_id"),
        supplier_registration: text_field(obj, "supplier_registration"),
        receiver_name: text_field(obj, "receiver_name"),
        receiver_address: text_field(obj, "receiver_address"),
        receiver_tax_id: text_field(obj, "receiver_tax_id"),
        receiver_registration: text_field(obj, "receiver_registration"),
        line_items: line_items(obj.get("line_items")),
    }
}

fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(as_text)
}

fn number_field(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    let value = obj.get(key)?;
    let n = as_number(value);
    if n.is_none() && !value.is_null() {
        warn!("Dropping non-numeric {}: {}", key, value);
    }
    n
}

/// Strings are trimmed; empty means unknown. Numbers and booleans are
/// stringified (models often emit `"invoice_id": 12345`).
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_loose_number(s),
        _ => None,
    }
}

/// Parse amounts such as `"121.00"`, `"121,00 EUR"`, `"€ 1.234,56"`,
/// `"1,234.56"` or `"21%"`.
pub fn parse_loose_number(s: &str) -> Option<f64> {
    let kept: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    if !kept.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let normalised = match (kept.rfind('.'), kept.rfind(',')) {
        // Both separators: whichever comes last is the decimal point.
        (Some(dot), Some(comma)) if comma > dot => kept.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => kept.replace(',', ""),
        // Only commas: a single comma not followed by exactly three digits is decimal.
        (None, Some(comma)) => {
            let decimals = kept.len() - comma - 1;
            if kept.matches(',').count() == 1 && decimals != 3 {
                kept.replace(',', ".")
            } else {
                kept.replace(',', "")
            }
        }
        _ => kept,
    };

    normalised.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn line_items(value: Option<&Value>) -> Vec<LineItem> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            let amount = obj.get("amount").and_then(as_number);
            let description = obj.get("description").and_then(as_text);
            match (amount, description) {
                (Some(amount), Some(description)) => Some(LineItem {
                    amount,
                    description,
                }),
                _ => {
                    warn!("Dropping incomplete line item: {}", item);
                    None
                }
            }
        })
        .collect()
}
