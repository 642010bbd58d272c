//! Structural fallback: recover fields from a prose answer.
//!
//! When the model ignores the JSON instruction it usually writes labelled
//! lines instead ("Invoice ID: 12345", "Total Amount: 121.00 EUR", a
//! "supplier's details" paragraph). This stage matches those labels.
//!
//! Known limits:
//! - amounts are only recognised with the literal `EUR` currency code;
//! - the receiver block is never extracted;
//! - at most one line item is recovered;
//! - numbers and dates must use ASCII digits, other scripts stay unknown.

use crate::error::NormalizeError;
use crate::output::{InvoiceRecord, LineItem};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_INVOICE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"Invoice ID:\s*([0-9]+)").unwrap());
static RE_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Date:\s*([0-9]{4}-[0-9]{2}-[0-9]{2})").unwrap());
static RE_TOTAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Total Amount:\s*([0-9]+\.?[0-9]*)\s*EUR").unwrap());
static RE_NET: Lazy<Regex> = Lazy::new(|| Regex::new(r"Net Amount:\s*([0-9]+\.?[0-9]*)\s*EUR").unwrap());
static RE_TAX_PERCENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Tax Percentage:\s*([0-9]+)%").unwrap());
static RE_TAX_AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Tax Amount:\s*([0-9]+\.?[0-9]*)\s*EUR").unwrap());

// Section start: everything up to the first colon after the heading.
static RE_SUPPLIER_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)supplier's details.*?:").unwrap());
// Section end: a line that opens a new paragraph with "The".
static RE_SECTION_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*The\b").unwrap());

static RE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"Name:\s*([^\n]+)").unwrap());
static RE_ADDRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"Address:\s*([^\n]+)").unwrap());
static RE_TAX_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"Tax ID:\s*([^\n]+)").unwrap());
static RE_REGISTRATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Registration Number:\s*([^\n]+)").unwrap());

static RE_LINE_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)line item.*?:.*?Amount:\s*([0-9]+\.?[0-9]*)\s*EUR.*?Description:\s*([^\n]+)")
        .unwrap()
});

/// Extract whatever labelled fields `text` contains.
///
/// No match is not an error: a text without labels yields
/// [`InvoiceRecord::default()`]. `Err` is reserved for a captured value that
/// cannot be interpreted at all.
pub fn extract(text: &str) -> Result<InvoiceRecord, NormalizeError> {
    let mut record = InvoiceRecord {
        invoice_id: capture_text(&RE_INVOICE_ID, text),
        invoice_date: capture_text(&RE_DATE, text),
        total_amount: capture_number(&RE_TOTAL, text)?,
        net_amount: capture_number(&RE_NET, text)?,
        tax_percentage: capture_number(&RE_TAX_PERCENT, text)?,
        total_tax_amount: capture_number(&RE_TAX_AMOUNT, text)?,
        ..Default::default()
    };

    if let Some(section) = supplier_section(text) {
        record.supplier_name = capture_text(&RE_NAME, section);
        record.supplier_address = capture_text(&RE_ADDRESS, section);
        record.supplier_tax_id = capture_text(&RE_TAX_ID, section);
        record.supplier_registration = capture_text(&RE_REGISTRATION, section);
    }

    if let Some(caps) = RE_LINE_ITEM.captures(text) {
        let description = caps[2].trim();
        if !description.is_empty() {
            record.line_items.push(LineItem {
                amount: parse_number(&caps[1])?,
                description: description.to_string(),
            });
        }
    }

    Ok(record)
}

/// The supplier paragraph, without its heading.
fn supplier_section(text: &str) -> Option<&str> {
    let start = RE_SUPPLIER_START.find(text)?.end();
    let rest = &text[start..];
    let end = RE_SECTION_END
        .find(rest)
        .map(|m| m.start())
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

fn capture_text(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|s| !s.is_empty())
}

fn capture_number(re: &Regex, text: &str) -> Result<Option<f64>, NormalizeError> {
    re.captures(text)
        .map(|caps| parse_number(&caps[1]))
        .transpose()
}

fn parse_number(s: &str) -> Result<f64, NormalizeError> {
    let value: f64 = s.parse().map_err(|e| NormalizeError::Exhausted {
        reason: format!("fallback captured unparseable number '{s}': {e}"),
    })?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(NormalizeError::Exhausted {
            reason: format!("fallback captured out-of-range number '{s}'"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labelled_header_fields() {
        let text = "Invoice ID: 12345\nDate: 2024-01-31\nTotal Amount: 121.00 EUR\nNet Amount: 100.00 EUR\nTax Percentage: 21%\nTax Amount: 21.00 EUR";
        let r = extract(text).unwrap();
        assert_eq!(r.invoice_id.as_deref(), Some("12345"));
        assert_eq!(r.invoice_date.as_deref(), Some("2024-01-31"));
        assert_eq!(r.total_amount, Some(121.0));
        assert_eq!(r.net_amount, Some(100.0));
        assert_eq!(r.tax_percentage, Some(21.0));
        assert_eq!(r.total_tax_amount, Some(21.0));
    }

    #[test]
    fn no_labels_yields_empty_record() {
        let r = extract("I could not read this invoice, sorry.").unwrap();
        assert!(r.is_empty());
        assert!(r.line_items.is_empty());
    }

    #[test]
    fn supplier_section_stops_at_the_paragraph() {
        let text = "the supplier's details are as follows:\nName: Acme Ltd\nAddress: 1 Main St\nTax ID: LT123\nRegistration Number: REG9\nThe invoice was issued to:\nName: Buyer Inc";
        let r = extract(text).unwrap();
        assert_eq!(r.supplier_name.as_deref(), Some("Acme Ltd"));
        assert_eq!(r.supplier_address.as_deref(), Some("1 Main St"));
        assert_eq!(r.supplier_tax_id.as_deref(), Some("LT123"));
        assert_eq!(r.supplier_registration.as_deref(), Some("REG9"));
        // The receiver paragraph is never read.
        assert_eq!(r.receiver_name, None);
    }

    #[test]
    fn supplier_labels_after_the_section_are_ignored() {
        let text = "Supplier's Details:\nName: Acme Ltd\nThe rest:\nAddress: Elsewhere 5";
        let r = extract(text).unwrap();
        assert_eq!(r.supplier_name.as_deref(), Some("Acme Ltd"));
        assert_eq!(r.supplier_address, None);
    }

    #[test]
    fn supplier_section_runs_to_end_of_text() {
        let text = "SUPPLIER'S DETAILS:\nName: Theatre Supplies\nTax ID: LT777";
        let r = extract(text).unwrap();
        assert_eq!(r.supplier_name.as_deref(), Some("Theatre Supplies"));
        assert_eq!(r.supplier_tax_id.as_deref(), Some("LT777"));
    }

    #[test]
    fn supplier_labels_without_section_are_ignored() {
        let r = extract("Name: Acme Ltd\nAddress: 1 Main St").unwrap();
        assert_eq!(r.supplier_name, None);
        assert_eq!(r.supplier_address, None);
    }

    #[test]
    fn other_currency_leaves_amount_unknown() {
        let r = extract("Total Amount: 121.00 USD\nNet Amount: 100 EUR").unwrap();
        assert_eq!(r.total_amount, None);
        assert_eq!(r.net_amount, Some(100.0));
    }

    #[test]
    fn non_iso_date_is_left_unknown() {
        let r = extract("Date: 31/01/2024").unwrap();
        assert_eq!(r.invoice_date, None);
    }

    #[test]
    fn only_the_first_line_item_is_recovered() {
        let text = "Line items:\n1. Amount: 50.00 EUR, Description: Consulting\n2. Amount: 25.00 EUR, Description: Travel";
        let r = extract(text).unwrap();
        assert_eq!(r.line_items.len(), 1);
        assert_eq!(r.line_items[0].amount, 50.0);
        assert_eq!(r.line_items[0].description, "Consulting");
    }

    #[test]
    fn line_item_requires_description() {
        let r = extract("Line item: Amount: 50.00 EUR").unwrap();
        assert!(r.line_items.is_empty());
    }

    #[test]
    fn non_ascii_digits_leave_the_field_unknown() {
        let text = "Invoice ID: 12345\nTotal Amount: \u{0661}\u{0662}\u{0661} EUR\n\
                    Net Amount: 100.00 EUR\nDate: \u{FF12}\u{FF10}\u{FF12}\u{FF14}-01-31";
        let r = extract(text).unwrap();
        assert_eq!(r.invoice_id.as_deref(), Some("12345"));
        assert_eq!(r.total_amount, None);
        assert_eq!(r.net_amount, Some(100.0));
        assert_eq!(r.invoice_date, None);
    }

    #[test]
    fn huge_number_is_a_fault() {
        let digits = "9".repeat(400);
        let err = extract(&format!("Total Amount: {digits} EUR")).unwrap_err();
        assert!(err.to_string().contains("out-of-range"));
    }
}
