//! Output types: the invoice record and the batch entries persisted to disk.
//!
//! The JSON shape is a contract with downstream consumers. Every record key
//! is always present (absent values are `null`), so nothing here uses
//! `skip_serializing_if` except the optional `raw_response` of an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status written into every successful envelope.
pub const STATUS_DONE: &str = "Done";

/// MIME type written into every successful envelope.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// The fifteen extracted invoice fields.
///
/// Serialised flat, in declaration order, with `null` for every unknown value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub invoice_id: Option<String>,
    /// Issue date, `YYYY-MM-DD` when it came from the fallback extractor.
    pub invoice_date: Option<String>,
    /// Total including tax.
    pub total_amount: Option<f64>,
    /// Amount before tax.
    pub net_amount: Option<f64>,
    pub tax_percentage: Option<f64>,
    pub total_tax_amount: Option<f64>,
    pub supplier_name: Option<String>,
    pub supplier_address: Option<String>,
    pub supplier_tax_id: Option<String>,
    pub supplier_registration: Option<String>,
    pub receiver_name: Option<String>,
    pub receiver_address: Option<String>,
    pub receiver_tax_id: Option<String>,
    pub receiver_registration: Option<String>,
    pub line_items: Vec<LineItem>,
}

/// One invoice line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub amount: f64,
    pub description: String,
}

/// Borrowed view of one party (supplier or receiver) of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Party<'a> {
    pub name: Option<&'a str>,
    pub address: Option<&'a str>,
    pub tax_id: Option<&'a str>,
    pub registration: Option<&'a str>,
}

impl InvoiceRecord {
    /// The party issuing the invoice.
    pub fn supplier(&self) -> Party<'_> {
        Party {
            name: self.supplier_name.as_deref(),
            address: self.supplier_address.as_deref(),
            tax_id: self.supplier_tax_id.as_deref(),
            registration: self.supplier_registration.as_deref(),
        }
    }

    /// The party receiving the invoice.
    pub fn receiver(&self) -> Party<'_> {
        Party {
            name: self.receiver_name.as_deref(),
            address: self.receiver_address.as_deref(),
            tax_id: self.receiver_tax_id.as_deref(),
            registration: self.receiver_registration.as_deref(),
        }
    }

    /// True when no field at all was recovered.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A successfully extracted record plus provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEnvelope {
    #[serde(flatten)]
    pub record: InvoiceRecord,
    pub status: String,
    pub file_name: String,
    pub file_path: String,
    /// Byte count as a decimal string.
    pub file_size: String,
    pub mime_type: String,
    /// Assigned downstream; always `null` here.
    pub document_id: Option<String>,
    /// UTC processing timestamp, RFC 3339.
    pub upload_date: String,
}

/// A document that could not be turned into an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub error: String,
    /// Offending model text or response body, kept for offline inspection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<Value>,
}

impl ErrorRecord {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            raw_response: None,
        }
    }

    pub fn with_raw_response(mut self, raw: impl Into<Value>) -> Self {
        self.raw_response = Some(raw.into());
        self
    }
}

/// One element of the persisted batch result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchEntry {
    Document { document: DocumentEnvelope },
    Error(ErrorRecord),
}

impl BatchEntry {
    pub fn is_error(&self) -> bool {
        matches!(self, BatchEntry::Error(_))
    }

    pub fn document(&self) -> Option<&DocumentEnvelope> {
        match self {
            BatchEntry::Document { document } => Some(document),
            BatchEntry::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorRecord> {
        match self {
            BatchEntry::Document { .. } => None,
            BatchEntry::Error(e) => Some(e),
        }
    }
}

impl From<ErrorRecord> for BatchEntry {
    fn from(e: ErrorRecord) -> Self {
        BatchEntry::Error(e)
    }
}

impl From<DocumentEnvelope> for BatchEntry {
    fn from(document: DocumentEnvelope) -> Self {
        BatchEntry::Document { document }
    }
}
