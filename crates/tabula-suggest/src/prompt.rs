use tabula_core::{EntityKind, Record};

use crate::SuggestRequest;

/// Column declarations for all three tables. Every prompt carries the full
/// set so the model can resolve cross-table references in an instruction.
fn schema_block() -> String {
    let mut out = String::with_capacity(512);
    out.push_str("For reference, the three tables and their columns are:\n");
    for kind in [EntityKind::Clients, EntityKind::Workers, EntityKind::Tasks] {
        out.push_str(kind.as_str());
        out.push_str(": ");
        out.push_str(&kind.known_columns().join(", "));
        out.push('\n');
    }
    out
}

pub fn rule_system_prompt() -> String {
    "You are a JSON rule parser for tabular data filters. \
     Only return valid JSON arrays. Do not include explanations or markdown formatting."
        .to_string()
}

pub fn rule_user_message(req: &SuggestRequest) -> String {
    format!(
        "Convert the following instruction into filter rules for the \"{kind}\" table.\n\n\
         Instruction: \"{instruction}\"\n\n\
         Respond ONLY with a JSON array. Each rule has:\n\
         - field: string\n\
         - operator: one of \"=\", \">\", \"<\", \"includes\", \"contains\"\n\
         - value: string\n\
         - optional weight: number\n\n\
         Example:\n\
         [\n\
           {{ \"field\": \"Duration\", \"operator\": \">\", \"value\": \"5\", \"weight\": 2 }},\n\
           {{ \"field\": \"Category\", \"operator\": \"contains\", \"value\": \"ML\", \"weight\": 1 }}\n\
         ]\n\n\
         {schema}",
        kind = req.entity.as_str(),
        instruction = req.instruction,
        schema = schema_block(),
    )
}

pub fn modification_system_prompt() -> String {
    "You are a JSON-only assistant. Only return valid JSON arrays. \
     Do not include explanations or markdown formatting."
        .to_string()
}

pub fn modification_user_message(req: &SuggestRequest) -> String {
    format!(
        "You are a data modifier for a table named \"{kind}\". Convert the instruction \
         below into a JSON modification structure.\n\n\
         Always interpret:\n\
         - \"greater than\" as \">\"\n\
         - \"less than\" as \"<\"\n\
         - \"equal to\" or \"equals\" as \"=\"\n\
         Field names may be partial or fuzzy; match them to the closest actual column name.\n\
         If the field holds a comma-separated list (like \"Skills\", \"RequestedTaskIDs\" or \
         \"RequiredSkills\"), use the \"includes\" operator instead of \"=\".\n\n\
         Instruction: \"{instruction}\"\n\n\
         Respond in JSON format like:\n\
         [\n\
           {{\n\
             \"filter\": {{ \"field\": \"QualificationLevel\", \"operator\": \">\", \"value\": \"3\" }},\n\
             \"update\": {{ \"field\": \"MaxLoadPerPhase\", \"value\": \"5\" }}\n\
           }}\n\
         ]\n\n\
         {schema}",
        kind = req.entity.as_str(),
        instruction = req.instruction,
        schema = schema_block(),
    )
}

pub fn recommend_system_prompt() -> String {
    "You return only pure JSON rule arrays that help filter or clean datasets.".to_string()
}

pub fn recommend_user_message(kind: EntityKind, sample: &[Record]) -> String {
    let sample_json =
        serde_json::to_string_pretty(sample).unwrap_or_else(|_| "[]".to_string());
    format!(
        "Suggest useful filtering or cleaning rules for the \"{kind}\" table based on the \
         sample rows below.\n\n\
         Respond ONLY with a pure JSON array, no comments or explanations:\n\
         [\n\
           {{ \"field\": \"PriorityLevel\", \"operator\": \"<\", \"value\": \"3\" }}\n\
         ]\n\n\
         Sample rows: {sample_json}\n\n\
         {schema}",
        kind = kind.as_str(),
        sample_json = sample_json,
        schema = schema_block(),
    )
}
