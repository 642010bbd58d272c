//! Response normalization: raw model text → [`InvoiceRecord`].
//!
//! ## Stages
//!
//! ```text
//! raw text ─▶ strict parse ─▶ repair + parse ─▶ labelled-line fallback
//!               (object?)      (outer { … })      (never "no match")
//! ```
//!
//! Each stage runs only if the previous one did not yield a JSON object.
//! Whatever object comes out is passed through [`schema::record_from_value`]
//! so every path produces the same fifteen-key shape.

use super::{fallback, repair, schema};
use crate::error::NormalizeError;
use crate::output::InvoiceRecord;
use serde_json::{Map, Value};
use tracing::debug;

/// Which stage produced the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// The text was already a JSON object.
    Strict,
    /// The outer `{ … }` span parsed after textual repair.
    Repaired,
    /// Fields were recovered from labelled prose.
    Fallback,
}

/// Normalize the model's raw answer into a record.
///
/// `Err` means every stage was exhausted; the caller should keep `raw` for
/// offline inspection.
pub fn normalize(raw: &str) -> Result<InvoiceRecord, NormalizeError> {
    normalize_with_stage(raw).map(|(record, _)| record)
}

/// Like [`normalize`], also reporting the stage that succeeded.
pub fn normalize_with_stage(raw: &str) -> Result<(InvoiceRecord, Stage), NormalizeError> {
    if let Some(obj) = parse_object(raw) {
        debug!("Response parsed as JSON without repair");
        return Ok((schema::record_from_value(&obj), Stage::Strict));
    }

    if let Some(obj) = repair::outer_object_span(raw).and_then(parse_repaired) {
        debug!("Response parsed as JSON after repair");
        return Ok((schema::record_from_value(&obj), Stage::Repaired));
    }

    debug!("Falling back to labelled-line extraction");
    fallback::extract(raw).map(|record| (record, Stage::Fallback))
}

fn parse_repaired(span: &str) -> Option<Map<String, Value>> {
    let repaired = repair::repair_json(span);
    let obj = parse_object(&repaired);
    if obj.is_none() {
        debug!("Repaired JSON still invalid:\n{}", repaired);
    }
    obj
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(obj)) => Some(obj),
        _ => None,
    }
}
