//! Textual repairs for almost-JSON model output.
//!
//! Local vision models get the JSON *shape* right far more often than the
//! punctuation. Each rule below fixes one observed failure mode. They are
//! data, not scattered edits, so their order is explicit and each one can be
//! tested alone.
//!
//! ## Rule Order
//!
//! Empty strings become `null` before the comma rules run, so that the
//! adjacent-quotes rule never mistakes `""` for two string boundaries.
//! Commas are inserted before trailing commas are stripped, so a comma the
//! earlier rules add in front of `}` or `]` is removed again.

use once_cell::sync::Lazy;
use regex::Regex;

/// One `(pattern, replacement)` repair.
pub struct RepairRule {
    pub name: &'static str,
    pub pattern: Regex,
    pub replacement: &'static str,
}

impl RepairRule {
    fn new(name: &'static str, pattern: &str, replacement: &'static str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("repair rule pattern is valid"),
            replacement,
        }
    }

    /// Apply this rule to every non-overlapping match.
    pub fn apply(&self, input: &str) -> String {
        self.pattern
            .replace_all(input, self.replacement)
            .into_owned()
    }
}

/// The repair rules, in the order they must run.
///
/// 1. `: ""` → `: null`
/// 2. `"  "` (closing quote, whitespace, opening quote) → comma inserted
/// 3. `}  {` (adjacent array objects) → comma inserted
/// 4. `,  }` → `}`
/// 5. `,  ]` → `]`
pub static RULES: Lazy<Vec<RepairRule>> = Lazy::new(|| {
    vec![
        RepairRule::new("empty_string_to_null", r#":\s*"""#, ": null"),
        RepairRule::new("comma_between_strings", r#""\s+""#, "\",\n    \""),
        RepairRule::new("comma_between_objects", r"\}\s+\{", "},\n        {"),
        RepairRule::new("trailing_comma_object", r",\s*\}", "}"),
        RepairRule::new("trailing_comma_array", r",\s*\]", "]"),
    ]
});

/// The outermost `{ … }` span: first `{` through last `}`.
pub fn outer_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Run every rule over `input` in declared order.
pub fn repair_json(input: &str) -> String {
    RULES
        .iter()
        .fold(input.to_string(), |acc, rule| rule.apply(&acc))
}
