pub mod error;
pub mod filter;
pub mod ingest;
pub mod modify;
pub mod validate;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

pub use error::{IngestError, SettingsError};
pub use filter::{filter_records, record_passes, FilterStrategy};
pub use modify::{apply_modifications, ApplyOutcome};
pub use validate::{invalid_indices, validate_record};

// --- Types ---

/// The three record tables a session can hold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Clients,
    Workers,
    Tasks,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Clients => "clients",
            EntityKind::Workers => "workers",
            EntityKind::Tasks => "tasks",
        }
    }

    /// The identity column of this table. Nothing in the engine treats it
    /// specially; it exists for callers that need to label rows.
    pub fn id_field(&self) -> &'static str {
        match self {
            EntityKind::Clients => "ClientID",
            EntityKind::Workers => "WorkerID",
            EntityKind::Tasks => "TaskID",
        }
    }

    /// Canonical columns of this table. Informational only; records stay
    /// open and rule resolution never consults this list.
    pub fn known_columns(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Clients => &[
                "ClientID",
                "ClientName",
                "PriorityLevel",
                "RequestedTaskIDs",
                "GroupTag",
                "AttributesJSON",
            ],
            EntityKind::Workers => &[
                "WorkerID",
                "WorkerName",
                "Skills",
                "AvailableSlots",
                "MaxLoadPerPhase",
                "WorkerGroup",
                "QualificationLevel",
            ],
            EntityKind::Tasks => &[
                "TaskID",
                "TaskName",
                "Category",
                "Duration",
                "RequiredSkills",
                "PreferredPhases",
                "MaxConcurrent",
            ],
        }
    }
}

/// Comparison operators a rule can carry. The set is closed: anything else
/// fails deserialization, so an unknown operator can never reach evaluation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Operator {
    #[serde(rename = "=")]
    Equals,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "includes")]
    Includes,
    #[serde(rename = "contains")]
    Contains,
}

/// A single filter predicate over one record field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rule {
    pub field: String,
    pub operator: Operator,
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
    /// Informational ranking weight. Carried through unchanged; has no
    /// effect on filtering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

/// The field/value pair a modification writes when its filter matches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldUpdate {
    pub field: String,
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
}

impl FieldUpdate {
    pub fn empty() -> Self {
        FieldUpdate {
            field: String::new(),
            value: String::new(),
        }
    }
}

/// A conditional field rewrite: when `filter` matches a record, `update`
/// is written into it. The filter rule is consumed by reference and never
/// altered by application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Modification {
    pub filter: Rule,
    pub update: FieldUpdate,
}

/// One row of a table. The field set is open: whatever columns the upload
/// carried are preserved in order and addressable by rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Record {
    #[serde(flatten)]
    pub fields: IndexMap<String, Value>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    /// Lowercased field name → actual field name, built fresh per
    /// operation. When two columns collide case-insensitively the later
    /// one wins.
    pub fn key_map(&self) -> HashMap<String, &str> {
        let mut map = HashMap::with_capacity(self.fields.len());
        for key in self.fields.keys() {
            map.insert(key.to_lowercase(), key.as_str());
        }
        map
    }

    /// Case-insensitive field lookup returning the record's actual key.
    pub fn resolve_field(&self, name: &str) -> Option<&str> {
        let wanted = name.to_lowercase();
        self.fields
            .keys()
            .rev()
            .find(|key| key.to_lowercase() == wanted)
            .map(|key| key.as_str())
    }
}

// Suggestion output is sloppy about quoting numbers; accept either form
// and keep the engine's string-typed comparison values.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

// --- Value coercion ---

/// Stringify a field value the way the grid shows it: strings verbatim,
/// everything else as its JSON text.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Numeric view of a field value. Strings are trimmed and parsed; NaN and
/// infinities count as non-numeric.
pub fn value_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Parse a comparison value as a finite number.
pub fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

// --- Session history ---

/// Caller-owned state for one editing session: the active rule set and the
/// modifications that have actually been applied, in application order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub applied: Vec<Modification>,
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }

    pub fn set_rules(&mut self, rules: Vec<Rule>) {
        self.rules = rules;
    }

    /// Record the modifications from `mods` that an apply pass reported as
    /// matched (`applied` holds indices into `mods`).
    pub fn record_applied(&mut self, mods: &[Modification], applied: &[usize]) {
        for &idx in applied {
            if let Some(m) = mods.get(idx) {
                self.applied.push(m.clone());
            }
        }
    }

    /// Flat ordered history for export: active rules first, normalized to
    /// the modification shape with an empty update, then every applied
    /// modification.
    pub fn export_history(&self) -> Vec<Modification> {
        self.rules
            .iter()
            .map(|rule| Modification {
                filter: rule.clone(),
                update: FieldUpdate::empty(),
            })
            .chain(self.applied.iter().cloned())
            .collect()
    }
}

/// Serializable export envelope consumed by the download side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleBundle {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub rules: Vec<Modification>,
}

impl RuleBundle {
    pub fn from_session(kind: EntityKind, session: &Session) -> Self {
        RuleBundle {
            kind,
            rules: session.export_history(),
        }
    }
}

// --- AI Settings ---

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AiSettings {
    pub provider: String,
    pub api_key: String,
    pub model: String,
}

/// Resolve the global config directory (~/.tabula/).
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tabula")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

pub fn read_settings() -> AiSettings {
    let path = settings_path();
    if !path.exists() {
        return AiSettings::default();
    }
    fs::read_to_string(&path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

pub fn write_settings(settings: &AiSettings) -> Result<(), SettingsError> {
    let dir = config_dir();
    fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(settings_path(), json)?;
    Ok(())
}

pub fn ai_configured(settings: &AiSettings) -> bool {
    !settings.provider.is_empty()
        && !settings.model.is_empty()
        && (settings.provider == "ollama" || !settings.api_key.is_empty())
}
