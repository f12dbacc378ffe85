use serde_json::Value;

use crate::{value_number, Record};

/// Field-name substrings that imply the column must hold a number.
/// Name-based on purpose: uploads may carry columns the engine has never
/// seen, and these generalize across entity kinds.
const NUMERIC_NAME_HINTS: [&str; 4] = ["duration", "level", "priority", "max"];

/// Whether a row is clean enough to keep. A row fails on any null or
/// empty-string field, or on a numeric-named field that does not parse as
/// a finite number. Invalid rows are flagged by callers, never dropped.
pub fn validate_record(record: &Record) -> bool {
    for (key, value) in &record.fields {
        if value.is_null() {
            return false;
        }
        if matches!(value, Value::String(s) if s.is_empty()) {
            return false;
        }
        let key_lower = key.to_lowercase();
        if NUMERIC_NAME_HINTS.iter().any(|hint| key_lower.contains(hint))
            && value_number(value).is_none()
        {
            return false;
        }
    }
    true
}

/// Indices of the rows that fail validation, for error-row highlighting.
pub fn invalid_indices(records: &[Record]) -> Vec<usize> {
    records
        .iter()
        .enumerate()
        .filter(|(_, record)| !validate_record(record))
        .map(|(idx, _)| idx)
        .collect()
}
