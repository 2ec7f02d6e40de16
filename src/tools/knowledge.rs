//! Parameter structs for the knowledge-store tools.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SaveParams {
    #[schemars(description = "The knowledge to save")]
    pub content: String,

    #[schemars(
        description = "Knowledge type: 'decision' (include WHY in context), 'solution', 'lesson', 'fact', 'convention'"
    )]
    pub r#type: String,

    #[schemars(description = "Project this knowledge belongs to. Defaults to the configured project.")]
    pub project: Option<String>,

    #[schemars(description = "Tags for categorical browsing")]
    pub tags: Option<Vec<String>>,

    #[schemars(description = "Additional context; the WHY for decisions")]
    pub context: Option<String>,

    #[schemars(description = "Git branch this knowledge was captured on")]
    pub branch: Option<String>,

    #[schemars(description = "Initial confidence 0.0-1.0. Defaults to 0.8.")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RecallParams {
    #[schemars(description = "What to search for")]
    pub query: String,

    #[schemars(description = "Filter by project")]
    pub project: Option<String>,

    #[schemars(description = "Filter by git branch")]
    pub branch: Option<String>,

    #[schemars(
        description = "Detail level: 'compact' (id/type/prefix), 'summary' (150-char content), 'full'. Defaults to 'full'."
    )]
    pub detail: Option<String>,

    #[schemars(description = "Maximum results. Defaults to the configured limit.")]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateParams {
    #[schemars(description = "Search query locating the knowledge to update")]
    pub query: String,

    #[schemars(description = "New content replacing the matched record")]
    pub new_content: String,

    #[schemars(description = "Restrict the match to this project")]
    pub project: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchByTagParams {
    #[schemars(description = "Tag to search for")]
    pub tag: String,

    #[schemars(description = "Substring match when true (default), exact match when false")]
    pub partial: Option<bool>,

    #[schemars(description = "Filter by project")]
    pub project: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ObserveParams {
    #[schemars(description = "Tool whose invocation is being recorded")]
    pub tool_name: String,

    #[schemars(description = "One-line summary of what changed")]
    pub summary: String,

    #[schemars(description = "Paths touched, in order")]
    pub files_affected: Option<Vec<String>>,

    #[schemars(
        description = "Observation type: 'bugfix', 'feature', 'refactor', 'change', 'discovery', 'decision'"
    )]
    pub observation_type: String,

    #[schemars(description = "Session the observation belongs to. Defaults to the current session.")]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DeleteParams {
    #[schemars(description = "Knowledge record id to delete (soft delete)")]
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RelateParams {
    #[schemars(description = "Source knowledge record id")]
    pub from_id: String,

    #[schemars(description = "Target knowledge record id")]
    pub to_id: String,

    #[schemars(
        description = "Relation type: 'causal', 'solution', 'context', 'related', 'contradicts'"
    )]
    pub relation_type: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct HistoryParams {
    #[schemars(description = "Knowledge record id anywhere in the version chain")]
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ConsolidateParams {
    #[schemars(description = "Consolidate only this project")]
    pub project: Option<String>,

    #[schemars(description = "Preview merges without applying them. Defaults to true.")]
    pub dry_run: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ForgetParams {
    #[schemars(description = "Preview the sweep without applying it. Defaults to false.")]
    pub dry_run: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ExportParams {
    #[schemars(description = "Export only this project")]
    pub project: Option<String>,

    #[schemars(description = "Write the snapshot under exports/. Defaults to true.")]
    pub save_to_file: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StatsParams {}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SessionExtractParams {
    #[schemars(description = "'list' pending transcripts, 'get' one transcript, 'complete' to mark processed")]
    pub action: String,

    #[schemars(description = "Session id, required for 'get' and 'complete'")]
    pub session_id: Option<String>,

    #[schemars(description = "Chunk number for large transcripts (0-based)")]
    pub chunk: Option<usize>,
}
