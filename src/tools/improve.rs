//! Parameter structs for the self-improvement tools.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ErrorLogParams {
    #[schemars(description = "What went wrong")]
    pub description: String,

    #[schemars(
        description = "Category: 'code_error', 'logic_error', 'config_error', 'api_error', 'timeout', 'loop_detected', 'wrong_assumption', 'missing_context'"
    )]
    pub category: String,

    #[schemars(description = "Severity: 'low', 'medium', 'high', 'critical'")]
    pub severity: String,

    #[schemars(description = "How it was fixed, if known")]
    pub fix: Option<String>,

    #[schemars(description = "Project the error occurred in")]
    pub project: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct InsightParams {
    #[schemars(description = "Action: 'add', 'upvote', 'downvote', 'promote'")]
    pub action: String,

    #[schemars(description = "Insight id, required for votes and promotion")]
    pub id: Option<String>,

    #[schemars(description = "Insight content, required for 'add'")]
    pub content: Option<String>,

    #[schemars(description = "Error category the insight generalizes")]
    pub category: Option<String>,

    #[schemars(description = "Error ids the insight was distilled from")]
    pub source_error_ids: Option<Vec<String>>,

    #[schemars(description = "Project scope for the rule created by 'promote' (empty = global)")]
    pub project: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RulesParams {
    #[schemars(description = "Action: 'add', 'fire', 'rate', 'suspend', 'activate', 'retire'")]
    pub action: String,

    #[schemars(description = "Rule id, required for everything except 'add'")]
    pub id: Option<String>,

    #[schemars(description = "Rule content, required for 'add'")]
    pub content: Option<String>,

    #[schemars(description = "Project scope for 'add' (empty = global)")]
    pub project: Option<String>,

    #[schemars(description = "Whether the application succeeded, required for 'rate'")]
    pub success: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RulesContextParams {
    #[schemars(description = "Project to load active rules for")]
    pub project: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct PatternsParams {
    #[schemars(description = "View: 'errors', 'candidates', 'effectiveness', 'trend'")]
    pub view: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ReflectParams {
    #[schemars(description = "What to do differently next time")]
    pub reflection: String,

    #[schemars(description = "One-line summary of the task")]
    pub task_summary: Option<String>,

    #[schemars(description = "Task outcome: e.g. 'success', 'partial', 'failure'")]
    pub outcome: Option<String>,

    #[schemars(description = "Project the task belonged to")]
    pub project: Option<String>,
}
