pub mod engine;
mod prompt;

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tabula_core::{ingest, AiSettings, EntityKind, IngestError, Modification, Record, Rule};

/// One natural-language request against one table. A new request
/// supersedes any previous one; nothing here is shared between calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestRequest {
    pub instruction: String,
    #[serde(rename = "entityKind")]
    pub entity: EntityKind,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "sampleRecord")]
    pub sample: Option<Record>,
}

#[derive(Debug, Error)]
pub enum SuggestError {
    /// The provider call itself failed (bad settings, network, empty reply).
    #[error("suggestion backend: {0}")]
    Backend(String),
    /// The provider answered, but not with a usable rule array.
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

/// Translate a natural-language filter instruction into rules.
/// Failure yields zero rules and a single error; nothing is ever
/// partially ingested.
pub async fn translate_rules(
    req: &SuggestRequest,
    settings: &AiSettings,
) -> Result<Vec<Rule>, SuggestError> {
    let raw = engine::generate(
        settings,
        &prompt::rule_system_prompt(),
        &prompt::rule_user_message(req),
    )
    .await
    .map_err(SuggestError::Backend)?;
    debug!("raw rule suggestion output:\n{raw}");

    let rules = ingest::parse_rules(&raw)?;
    debug!("parsed {} suggested rules", rules.len());
    Ok(rules)
}

/// Translate a natural-language edit instruction into modifications.
pub async fn translate_modifications(
    req: &SuggestRequest,
    settings: &AiSettings,
) -> Result<Vec<Modification>, SuggestError> {
    let raw = engine::generate(
        settings,
        &prompt::modification_system_prompt(),
        &prompt::modification_user_message(req),
    )
    .await
    .map_err(SuggestError::Backend)?;
    debug!("raw modification suggestion output:\n{raw}");

    let mods = ingest::parse_modifications(&raw)?;
    debug!("parsed {} suggested modifications", mods.len());
    Ok(mods)
}

/// Ask for rule recommendations from sample rows of a table.
pub async fn recommend_rules(
    kind: EntityKind,
    sample: &[Record],
    settings: &AiSettings,
) -> Result<Vec<Rule>, SuggestError> {
    let raw = engine::generate(
        settings,
        &prompt::recommend_system_prompt(),
        &prompt::recommend_user_message(kind, sample),
    )
    .await
    .map_err(SuggestError::Backend)?;
    debug!("raw recommendation output:\n{raw}");

    let rules = ingest::parse_rules(&raw)?;
    debug!("parsed {} recommended rules", rules.len());
    Ok(rules)
}
