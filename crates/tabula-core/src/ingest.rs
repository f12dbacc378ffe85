use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::IngestError;
use crate::{Modification, Rule};

/// Parse suggestion text into rules. The text is untrusted model output:
/// anything that is not a JSON array fails closed with zero rules.
pub fn parse_rules(raw: &str) -> Result<Vec<Rule>, IngestError> {
    parse_array(raw)
}

/// Parse suggestion text into modifications. Same contract as
/// [`parse_rules`].
pub fn parse_modifications(raw: &str) -> Result<Vec<Modification>, IngestError> {
    parse_array(raw)
}

/// Extract the JSON array substring from raw model output. Models wrap
/// arrays in prose and markdown fences; the first `[` to the last `]` is
/// the recoverable payload.
pub fn extract_json_array(raw: &str) -> Option<&str> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end <= start {
        return None;
    }
    Some(&raw[start..=end])
}

fn parse_array<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>, IngestError> {
    let json_str = extract_json_array(raw).ok_or(IngestError::MalformedSuggestion)?;

    let items: Vec<Value> = serde_json::from_str(json_str).map_err(|err| {
        debug!("suggestion array rejected: {err}");
        IngestError::MalformedSuggestion
    })?;

    // Entries that are not objects, miss required keys, or carry an
    // unknown operator are dropped here, never surfaced at evaluation.
    let total = items.len();
    let parsed: Vec<T> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if parsed.len() < total {
        debug!("dropped {} malformed suggestion entries", total - parsed.len());
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Operator;

    #[test]
    fn parses_a_clean_rule_array() {
        let raw = r#"[
            {"field": "Duration", "operator": ">", "value": "5", "weight": 2},
            {"field": "Category", "operator": "contains", "value": "ML"}
        ]"#;
        let rules = parse_rules(raw).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].operator, Operator::GreaterThan);
        assert_eq!(rules[0].weight, Some(2.0));
        assert_eq!(rules[1].weight, None);
    }

    #[test]
    fn recovers_an_array_wrapped_in_prose() {
        let raw = "Sure! Here are the rules:\n```json\n[{\"field\": \"Skills\", \
                   \"operator\": \"includes\", \"value\": \"python\"}]\n```\nLet me know.";
        let rules = parse_rules(raw).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].field, "Skills");
    }

    #[test]
    fn prose_with_no_array_is_a_malformed_suggestion() {
        let err = parse_rules("I cannot create rules for that instruction.").unwrap_err();
        assert_eq!(err, IngestError::MalformedSuggestion);
    }

    #[test]
    fn broken_array_json_is_a_malformed_suggestion() {
        let err = parse_rules("[{\"field\": \"Duration\", ").unwrap_err();
        assert_eq!(err, IngestError::MalformedSuggestion);
        let err = parse_rules("[{\"field\": }]").unwrap_err();
        assert_eq!(err, IngestError::MalformedSuggestion);
    }

    #[test]
    fn entries_missing_required_keys_are_dropped_silently() {
        let raw = r#"[
            {"field": "Duration", "operator": ">", "value": "5"},
            {"field": "Duration", "value": "5"},
            {"note": "not a rule"},
            "just a string"
        ]"#;
        let rules = parse_rules(raw).unwrap();
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn unknown_operators_are_rejected_at_the_boundary() {
        let raw = r#"[{"field": "Duration", "operator": ">=", "value": "5"}]"#;
        let rules = parse_rules(raw).unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn parses_modifications_and_drops_half_shaped_ones() {
        let raw = r#"[
            {
                "filter": {"field": "Qualification Level", "operator": ">", "value": "3"},
                "update": {"field": "MaxLoadPerPhase", "value": "5"}
            },
            {
                "filter": {"field": "Skills", "operator": "includes", "value": "python"}
            }
        ]"#;
        let mods = parse_modifications(raw).unwrap();
        assert_eq!(mods.len(), 1);
        assert_eq!(mods[0].update.field, "MaxLoadPerPhase");
    }

    #[test]
    fn numeric_values_are_coerced_to_strings() {
        let raw = r#"[{
            "filter": {"field": "PriorityLevel", "operator": "<", "value": 3},
            "update": {"field": "GroupTag", "value": 7}
        }]"#;
        let mods = parse_modifications(raw).unwrap();
        assert_eq!(mods[0].filter.value, "3");
        assert_eq!(mods[0].update.value, "7");
    }

    #[test]
    fn empty_array_is_valid_and_yields_nothing() {
        assert!(parse_rules("[]").unwrap().is_empty());
    }
}
