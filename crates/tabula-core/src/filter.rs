use std::collections::HashMap;

use serde_json::Value;

use crate::{parse_number, value_number, value_text, Operator, Record, Rule};

/// How a rule set combines when several rules are active at once. Both
/// modes exist in the product: the quick filter bar ANDs everything, the
/// grid filter ORs rules that target the same column. Callers pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStrategy {
    /// Every rule must match, no matter which fields the rules target.
    IndependentAnd,
    /// Rules are grouped by (case-insensitive) field name. A record passes
    /// when every group is satisfied, and a group is satisfied when any of
    /// its rules matches. A group whose field the record lacks fails hard.
    GroupedOrThenAnd,
}

impl Rule {
    /// Evaluate this rule against a single field value.
    pub fn matches(&self, target: &Value) -> bool {
        match_value(self.operator, target, &self.value)
    }
}

pub(crate) fn match_value(operator: Operator, target: &Value, rule_value: &str) -> bool {
    match operator {
        Operator::Equals => {
            value_text(target).trim().to_lowercase() == rule_value.trim().to_lowercase()
        }
        Operator::GreaterThan => match (value_number(target), parse_number(rule_value)) {
            (Some(lhs), Some(rhs)) => lhs > rhs,
            _ => false,
        },
        Operator::LessThan => match (value_number(target), parse_number(rule_value)) {
            (Some(lhs), Some(rhs)) => lhs < rhs,
            _ => false,
        },
        Operator::Includes => {
            let needle = rule_value.trim().to_lowercase();
            value_text(target)
                .to_lowercase()
                .split(',')
                .map(str::trim)
                .any(|part| part == needle)
        }
        Operator::Contains => value_text(target)
            .to_lowercase()
            .contains(&rule_value.to_lowercase()),
    }
}

/// Whether one record passes the rule set under the given strategy.
/// Rule fields resolve case-insensitively; a field the record lacks never
/// matches (fail, not skip).
pub fn record_passes(record: &Record, rules: &[Rule], strategy: FilterStrategy) -> bool {
    if rules.is_empty() {
        return true;
    }
    match strategy {
        FilterStrategy::IndependentAnd => passes_independent(record, rules),
        FilterStrategy::GroupedOrThenAnd => passes_grouped(record, &group_by_field(rules)),
    }
}

/// The subset of records passing every field-group of the rule set.
/// An empty rule set passes everything; filtering is idempotent.
pub fn filter_records(records: &[Record], rules: &[Rule], strategy: FilterStrategy) -> Vec<Record> {
    if rules.is_empty() {
        return records.to_vec();
    }
    match strategy {
        FilterStrategy::IndependentAnd => records
            .iter()
            .filter(|record| passes_independent(record, rules))
            .cloned()
            .collect(),
        FilterStrategy::GroupedOrThenAnd => {
            let groups = group_by_field(rules);
            records
                .iter()
                .filter(|record| passes_grouped(record, &groups))
                .cloned()
                .collect()
        }
    }
}

fn passes_independent(record: &Record, rules: &[Rule]) -> bool {
    let keys = record.key_map();
    rules
        .iter()
        .all(|rule| lookup(record, &keys, &rule.field).is_some_and(|value| rule.matches(value)))
}

fn passes_grouped(record: &Record, groups: &HashMap<String, Vec<&Rule>>) -> bool {
    let keys = record.key_map();
    groups
        .iter()
        .all(|(field_lower, group)| match lookup(record, &keys, field_lower) {
            Some(value) => group.iter().any(|rule| rule.matches(value)),
            None => false,
        })
}

fn lookup<'a>(record: &'a Record, keys: &HashMap<String, &str>, field: &str) -> Option<&'a Value> {
    keys.get(field.to_lowercase().as_str())
        .and_then(|key| record.get(key))
}

fn group_by_field(rules: &[Rule]) -> HashMap<String, Vec<&Rule>> {
    let mut groups: HashMap<String, Vec<&Rule>> = HashMap::new();
    for rule in rules {
        groups.entry(rule.field.to_lowercase()).or_default().push(rule);
    }
    groups
}
