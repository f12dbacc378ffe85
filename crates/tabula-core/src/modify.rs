use std::borrow::Cow;
use std::collections::BTreeSet;

use log::warn;
use serde_json::{Map, Value};

use crate::filter::match_value;
use crate::{value_text, Modification, Operator, Record};

/// Result of one apply pass. `records` is a fresh set; the input is never
/// touched. `applied` holds the indices of modifications that matched at
/// least one record, so the caller can extend its session history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyOutcome {
    pub records: Vec<Record>,
    pub applied: Vec<usize>,
}

/// Apply every modification whose filter matches, per record, in listed
/// order. Filters are evaluated against the record as it was before the
/// pass; writes accumulate on the copy, so the last matching modification
/// targeting a field wins.
pub fn apply_modifications(records: &[Record], mods: &[Modification]) -> ApplyOutcome {
    let mut applied: BTreeSet<usize> = BTreeSet::new();
    let mut out = Vec::with_capacity(records.len());

    for record in records {
        let keys = record.key_map();
        let mut updated = record.clone();

        for (idx, m) in mods.iter().enumerate() {
            // Unresolvable filter or update field: skip, not an error.
            let Some(&filter_key) = keys.get(m.filter.field.to_lowercase().as_str()) else {
                continue;
            };
            let Some(&update_key) = keys.get(m.update.field.to_lowercase().as_str()) else {
                continue;
            };
            let Some(target) = record.get(filter_key) else {
                continue;
            };

            let target = parse_embedded_json(filter_key, target);
            let matched = match (target.as_ref(), m.filter.operator) {
                (Value::Object(map), Operator::Includes) => {
                    object_includes(map, &m.filter.value)
                }
                (value, operator) => match_value(operator, value, &m.filter.value),
            };

            if matched {
                updated.set(update_key, Value::String(m.update.value.clone()));
                applied.insert(idx);
            }
        }

        out.push(updated);
    }

    ApplyOutcome {
        records: out,
        applied: applied.into_iter().collect(),
    }
}

/// Cells like AttributesJSON hold JSON text. If the value is a string that
/// looks like an object, match against the parsed form; a parse failure
/// falls back to the raw string.
fn parse_embedded_json<'a>(field: &str, value: &'a Value) -> Cow<'a, Value> {
    if let Value::String(text) = value {
        if text.trim().starts_with('{') {
            match serde_json::from_str::<Value>(text) {
                Ok(parsed) => return Cow::Owned(parsed),
                Err(err) => warn!("failed to parse JSON field {field}: {err}"),
            }
        }
    }
    Cow::Borrowed(value)
}

/// `includes` against a parsed object. A `key:val` rule value matches when
/// the key (looked up as given) stringifies to `val`; a bare rule value
/// matches any value in the object.
fn object_includes(map: &Map<String, Value>, rule_value: &str) -> bool {
    match rule_value.split_once(':') {
        Some((key, val)) => map
            .get(key.trim())
            .is_some_and(|actual| value_text(actual).to_lowercase() == val.trim().to_lowercase()),
        None => {
            let wanted = rule_value.to_lowercase();
            map.values().any(|v| value_text(v).to_lowercase() == wanted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldUpdate, Rule};
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        serde_json::from_value(value).expect("record literal")
    }

    fn modification(
        field: &str,
        operator: Operator,
        value: &str,
        update_field: &str,
        update_value: &str,
    ) -> Modification {
        Modification {
            filter: Rule {
                field: field.into(),
                operator,
                value: value.into(),
                weight: None,
            },
            update: FieldUpdate {
                field: update_field.into(),
                value: update_value.into(),
            },
        }
    }

    #[test]
    fn matching_filter_rewrites_the_update_field() {
        let records = vec![record(json!({"TaskID": "T1", "Category": "ML", "Duration": "3"}))];
        let mods = vec![modification("Category", Operator::Equals, "ML", "Duration", "6")];

        let outcome = apply_modifications(&records, &mods);
        assert_eq!(
            outcome.records[0],
            record(json!({"TaskID": "T1", "Category": "ML", "Duration": "6"}))
        );
        assert_eq!(outcome.applied, vec![0]);
        // Input untouched.
        assert_eq!(records[0].get("Duration"), Some(&json!("3")));
    }

    #[test]
    fn written_value_is_always_a_literal_string() {
        let records = vec![record(json!({"TaskID": "T1", "Duration": 3}))];
        let mods = vec![modification("Duration", Operator::LessThan, "5", "Duration", "6")];

        let outcome = apply_modifications(&records, &mods);
        assert_eq!(outcome.records[0].get("Duration"), Some(&json!("6")));
    }

    #[test]
    fn field_names_resolve_case_insensitively() {
        let records = vec![record(json!({"TaskID": "T1", "Category": "ML", "Duration": "3"}))];
        let mods = vec![modification("category", Operator::Equals, "ml", "duration", "8")];

        let outcome = apply_modifications(&records, &mods);
        assert_eq!(outcome.records[0].get("Duration"), Some(&json!("8")));
        // The record's own spelling of the column is kept.
        assert!(outcome.records[0].get("duration").is_none());
    }

    #[test]
    fn unresolvable_fields_skip_without_error() {
        let records = vec![record(json!({"TaskID": "T1", "Category": "ML"}))];
        let mods = vec![
            modification("Category", Operator::Equals, "ML", "Ghost", "1"),
            modification("Ghost", Operator::Equals, "ML", "Category", "changed"),
        ];

        let outcome = apply_modifications(&records, &mods);
        assert_eq!(outcome.records[0], records[0]);
        assert!(outcome.applied.is_empty());
    }

    #[test]
    fn filters_see_pre_pass_values_and_last_write_wins() {
        let records = vec![record(json!({"TaskID": "T1", "Category": "ML", "Duration": "3"}))];
        let mods = vec![
            modification("Category", Operator::Equals, "ML", "Duration", "6"),
            // Still matches: filters read the original Duration.
            modification("Duration", Operator::Equals, "3", "Duration", "9"),
        ];

        let outcome = apply_modifications(&records, &mods);
        assert_eq!(outcome.records[0].get("Duration"), Some(&json!("9")));
        assert_eq!(outcome.applied, vec![0, 1]);
    }

    #[test]
    fn nested_json_includes_matches_key_value_pairs() {
        let records = vec![record(json!({
            "ClientID": "C1",
            "GroupTag": "alpha",
            "AttributesJSON": "{\"priority\":\"high\",\"region\":\"EU\"}",
        }))];
        let mods = vec![modification(
            "AttributesJSON",
            Operator::Includes,
            "priority:high",
            "GroupTag",
            "vip",
        )];

        let outcome = apply_modifications(&records, &mods);
        assert_eq!(outcome.records[0].get("GroupTag"), Some(&json!("vip")));
    }

    #[test]
    fn nested_json_includes_matches_bare_values() {
        let records = vec![record(json!({
            "ClientID": "C1",
            "GroupTag": "alpha",
            "AttributesJSON": "{\"priority\":\"High\"}",
        }))];
        let mods = vec![modification(
            "AttributesJSON",
            Operator::Includes,
            "high",
            "GroupTag",
            "vip",
        )];

        let outcome = apply_modifications(&records, &mods);
        assert_eq!(outcome.records[0].get("GroupTag"), Some(&json!("vip")));
    }

    #[test]
    fn nested_json_key_lookup_is_case_sensitive() {
        let records = vec![record(json!({
            "ClientID": "C1",
            "GroupTag": "alpha",
            "AttributesJSON": "{\"Priority\":\"high\"}",
        }))];
        let mods = vec![modification(
            "AttributesJSON",
            Operator::Includes,
            "priority:high",
            "GroupTag",
            "vip",
        )];

        let outcome = apply_modifications(&records, &mods);
        assert_eq!(outcome.records[0].get("GroupTag"), Some(&json!("alpha")));
    }

    #[test]
    fn broken_json_falls_back_to_raw_string_comparison() {
        let records = vec![record(json!({
            "ClientID": "C1",
            "GroupTag": "alpha",
            "AttributesJSON": "{not json",
        }))];
        let mods = vec![modification(
            "AttributesJSON",
            Operator::Contains,
            "not json",
            "GroupTag",
            "flagged",
        )];

        let outcome = apply_modifications(&records, &mods);
        assert_eq!(outcome.records[0].get("GroupTag"), Some(&json!("flagged")));
    }

    #[test]
    fn applied_indices_cover_all_matching_modifications() {
        let records = vec![
            record(json!({"TaskID": "T1", "Category": "ML", "Duration": "3"})),
            record(json!({"TaskID": "T2", "Category": "Web", "Duration": "7"})),
        ];
        let mods = vec![
            modification("Category", Operator::Equals, "ML", "Duration", "6"),
            modification("Category", Operator::Equals, "Ops", "Duration", "1"),
            modification("Duration", Operator::GreaterThan, "5", "Category", "Slow"),
        ];

        let outcome = apply_modifications(&records, &mods);
        assert_eq!(outcome.applied, vec![0, 2]);
        assert_eq!(outcome.records[1].get("Category"), Some(&json!("Slow")));
    }
}
