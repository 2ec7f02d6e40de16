//! MCP tool surface.
//!
//! [`EngramTools`] holds the shared state (single-writer connection,
//! optional embedding provider, config, session context) and exposes every
//! operation via the `#[tool_router]` macro. Handlers validate inputs before
//! any mutation, append one raw-log line per call, and run database work on
//! the blocking pool around the connection mutex.

pub mod improve;
pub mod knowledge;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::config::EngramConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::Result as EngramResult;
use crate::knowledge::search::{DetailLevel, RecallOptions, SearchTuning};
use crate::knowledge::store::NewKnowledge;
use crate::knowledge::types::{KnowledgeType, ObservationType, RelationType};
use crate::improve::types::{ErrorCategory, RuleStatus, Severity};
use crate::session::SessionContext;

use improve::{
    ErrorLogParams, InsightParams, PatternsParams, ReflectParams, RulesContextParams, RulesParams,
};
use knowledge::{
    ConsolidateParams, DeleteParams, ExportParams, ForgetParams, HistoryParams, ObserveParams,
    RecallParams, RelateParams, SaveParams, SearchByTagParams, SessionExtractParams, StatsParams,
    UpdateParams,
};

/// The Engram MCP tool handler.
#[derive(Clone)]
pub struct EngramTools {
    tool_router: ToolRouter<Self>,
    db: Arc<Mutex<Connection>>,
    embedding: Option<Arc<dyn EmbeddingProvider>>,
    config: Arc<EngramConfig>,
    session: Arc<SessionContext>,
}

impl EngramTools {
    pub fn new(
        db: Arc<Mutex<Connection>>,
        embedding: Option<Arc<dyn EmbeddingProvider>>,
        config: Arc<EngramConfig>,
        session: Arc<SessionContext>,
    ) -> Self {
        Self {
            tool_router: Self::tool_router(),
            db,
            embedding,
            config,
            session,
        }
    }

    /// Append the raw-log audit line for a tool call.
    fn audit(&self, tool: &'static str, args: serde_json::Value) {
        self.session.raw_append(serde_json::json!({
            "type": "tool_call",
            "tool": tool,
            "args": args,
        }));
    }

    /// Run `f` against the connection on the blocking pool, bumping the
    /// session's tool-call counter first.
    async fn with_db<T, F>(&self, f: F) -> Result<T, String>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> EngramResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let session = Arc::clone(&self.session);
        tokio::task::spawn_blocking(move || -> Result<T, String> {
            let mut conn = db.lock().map_err(|e| format!("db lock poisoned: {e}"))?;
            session
                .record_tool_call(&conn)
                .map_err(|e| e.to_string())?;
            f(&mut conn).map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| format!("db task failed: {e}"))?
    }

    /// Embed text, degrading to `None` (with a warning) when the provider
    /// is missing or failing. Embedding runs on the blocking pool.
    async fn embed_or_degrade(&self, text: String) -> Option<Vec<f32>> {
        let provider = self.embedding.clone()?;
        match tokio::task::spawn_blocking(move || provider.embed(&text)).await {
            Ok(Ok(vector)) => Some(vector),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "embedding failed — continuing without vector");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "embedding task failed");
                None
            }
        }
    }

    fn tuning(&self) -> SearchTuning {
        SearchTuning::from_config(&self.config.retrieval)
    }

    fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
        serde_json::to_string(value).map_err(|e| format!("serialization failed: {e}"))
    }
}

#[tool_router]
impl EngramTools {
    /// Save knowledge with automatic deduplication.
    #[tool(description = "Save knowledge explicitly. Types: decision (MUST include WHY in context), solution, lesson, fact, convention. Near-duplicates refresh the existing record instead of creating a new one.")]
    async fn memory_save(
        &self,
        Parameters(params): Parameters<SaveParams>,
    ) -> Result<String, String> {
        self.audit("memory_save", serde_json::json!({"type": &params.r#type, "project": &params.project}));

        let knowledge_type: KnowledgeType =
            params.r#type.parse().map_err(|e: crate::error::EngramError| e.to_string())?;
        let project = params
            .project
            .unwrap_or_else(|| self.config.storage.default_project.clone());
        let tags = params.tags.unwrap_or_default();
        let context = params.context.unwrap_or_default();

        tracing::info!(
            content_len = params.content.len(),
            %knowledge_type,
            project = %project,
            "memory_save called"
        );

        let embedding = self
            .embed_or_degrade(format!("{} {}", params.content, context))
            .await;

        let session_id = self.session.id.clone();
        let result = self
            .with_db(move |conn| {
                crate::knowledge::store::save_knowledge(
                    conn,
                    &NewKnowledge {
                        content: &params.content,
                        knowledge_type,
                        project: &project,
                        tags: &tags,
                        context: &context,
                        branch: params.branch.as_deref(),
                        confidence: params.confidence,
                        session_id: Some(&session_id),
                    },
                    embedding.as_deref(),
                )
            })
            .await?;

        tracing::info!(id = %result.id, duplicate = result.duplicate, "knowledge saved");
        Self::to_json(&result)
    }

    /// Search all stored knowledge with the four-tier fusion engine.
    #[tool(description = "Search ALL memory: decisions, solutions, facts, lessons from ALL past sessions. Four-tier search (keyword, semantic, fuzzy, graph) with decay scoring. Use BEFORE starting any task.")]
    async fn memory_recall(
        &self,
        Parameters(params): Parameters<RecallParams>,
    ) -> Result<String, String> {
        self.audit("memory_recall", serde_json::json!({"query": &params.query, "project": &params.project}));

        let detail: DetailLevel = params
            .detail
            .as_deref()
            .unwrap_or("full")
            .parse()
            .map_err(|e: crate::error::EngramError| e.to_string())?;
        let opts = RecallOptions {
            project: params.project,
            branch: params.branch,
            detail,
            limit: params.limit.unwrap_or(self.config.retrieval.default_limit),
        };
        let tuning = self.tuning();
        let provider = self.embedding.clone();

        let response = self
            .with_db(move |conn| {
                crate::knowledge::search::recall(
                    conn,
                    provider.as_deref(),
                    &params.query,
                    &opts,
                    &tuning,
                )
            })
            .await?;

        Self::to_json(&response)
    }

    /// Supersede the best-matching record with new content.
    #[tool(description = "Update existing knowledge. Finds the old record by search query, supersedes it, and creates a new version.")]
    async fn memory_update(
        &self,
        Parameters(params): Parameters<UpdateParams>,
    ) -> Result<String, String> {
        self.audit("memory_update", serde_json::json!({"query": &params.query, "project": &params.project}));

        let embedding = self.embed_or_degrade(params.new_content.clone()).await;
        let tuning = self.tuning();
        let provider = self.embedding.clone();
        let session_id = self.session.id.clone();

        let result = self
            .with_db(move |conn| {
                crate::knowledge::store::update_knowledge(
                    conn,
                    provider.as_deref(),
                    &params.query,
                    &params.new_content,
                    params.project.as_deref(),
                    Some(&session_id),
                    embedding.as_deref(),
                    &tuning,
                )
            })
            .await?;

        Self::to_json(&result)
    }

    /// Filter active knowledge by tag.
    #[tool(description = "Search knowledge by tag (partial match by default). Pure filter ordered by recency — no scoring, no decay.")]
    async fn memory_search_by_tag(
        &self,
        Parameters(params): Parameters<SearchByTagParams>,
    ) -> Result<String, String> {
        self.audit("memory_search_by_tag", serde_json::json!({"tag": &params.tag}));

        let results = self
            .with_db(move |conn| {
                crate::knowledge::search::search_by_tag(
                    conn,
                    &params.tag,
                    params.partial.unwrap_or(true),
                    params.project.as_deref(),
                )
            })
            .await?;

        Self::to_json(&serde_json::json!({"total": results.len(), "records": results}))
    }

    /// Record a file-change observation.
    #[tool(description = "Record a lightweight observation of a tool invocation: what changed, which files. No dedup; observations expire after 30 days.")]
    async fn memory_observe(
        &self,
        Parameters(params): Parameters<ObserveParams>,
    ) -> Result<String, String> {
        self.audit("memory_observe", serde_json::json!({"tool_name": &params.tool_name}));

        let observation_type: ObservationType = params
            .observation_type
            .parse()
            .map_err(|e: crate::error::EngramError| e.to_string())?;
        let session_id = params
            .session_id
            .unwrap_or_else(|| self.session.id.clone());
        let files = params.files_affected.unwrap_or_default();

        let result = self
            .with_db(move |conn| {
                crate::knowledge::observations::observe(
                    conn,
                    &session_id,
                    &params.tool_name,
                    &params.summary,
                    &files,
                    observation_type,
                )
            })
            .await?;

        Self::to_json(&result)
    }

    /// Soft-delete a knowledge record.
    #[tool(description = "Delete a knowledge record (soft delete: purged, removed from search indexes). Use when knowledge is wrong or no longer relevant.")]
    async fn memory_delete(
        &self,
        Parameters(params): Parameters<DeleteParams>,
    ) -> Result<String, String> {
        self.audit("memory_delete", serde_json::json!({"id": &params.id}));

        let result = self
            .with_db(move |conn| crate::knowledge::store::delete_knowledge(conn, &params.id))
            .await?;

        Self::to_json(&result)
    }

    /// Create a typed relation between two records.
    #[tool(description = "Create a typed relation between two knowledge records. Types: causal, solution, context, related, contradicts. Enriches graph expansion in recall.")]
    async fn memory_relate(
        &self,
        Parameters(params): Parameters<RelateParams>,
    ) -> Result<String, String> {
        self.audit("memory_relate", serde_json::json!({"from": &params.from_id, "to": &params.to_id}));

        let relation_type: RelationType = params
            .relation_type
            .parse()
            .map_err(|e: crate::error::EngramError| e.to_string())?;

        let result = self
            .with_db(move |conn| {
                crate::knowledge::relations::relate(
                    conn,
                    &params.from_id,
                    &params.to_id,
                    relation_type,
                )
            })
            .await?;

        Self::to_json(&result)
    }

    /// Walk a record's version chain.
    #[tool(description = "View version history for a knowledge record: the chain of superseded versions, newest first.")]
    async fn memory_history(
        &self,
        Parameters(params): Parameters<HistoryParams>,
    ) -> Result<String, String> {
        self.audit("memory_history", serde_json::json!({"id": &params.id}));

        let record_id = params.id.clone();
        let chain = self
            .with_db(move |conn| crate::knowledge::store::history(conn, &params.id))
            .await?;

        Self::to_json(&serde_json::json!({
            "record_id": record_id,
            "total_versions": chain.len(),
            "versions": chain,
        }))
    }

    /// Merge near-duplicate active records.
    #[tool(description = "Find and merge near-duplicate knowledge records within each project. Keeps the most-recently-confirmed record, archives the rest with a trace relation. dry_run previews.")]
    async fn memory_consolidate(
        &self,
        Parameters(params): Parameters<ConsolidateParams>,
    ) -> Result<String, String> {
        self.audit("memory_consolidate", serde_json::json!({"project": &params.project, "dry_run": params.dry_run}));

        let report = self
            .with_db(move |conn| {
                crate::knowledge::retention::consolidate(
                    conn,
                    params.project.as_deref(),
                    params.dry_run.unwrap_or(true),
                )
            })
            .await?;

        Self::to_json(&report)
    }

    /// Run the retention sweeps.
    #[tool(description = "Apply retention policy: archive stale never-recalled low-confidence records, purge very old archived records, delete observations past 30 days.")]
    async fn memory_forget(
        &self,
        Parameters(params): Parameters<ForgetParams>,
    ) -> Result<String, String> {
        self.audit("memory_forget", serde_json::json!({"dry_run": params.dry_run}));

        let retention = self.config.retention.clone();
        let result = self
            .with_db(move |conn| {
                crate::knowledge::retention::forget(
                    conn,
                    &retention,
                    params.dry_run.unwrap_or(false),
                )
            })
            .await?;

        Self::to_json(&result)
    }

    /// Export a JSON snapshot.
    #[tool(description = "Export all non-purged knowledge, sessions, and relations as JSON for backup or migration.")]
    async fn memory_export(
        &self,
        Parameters(params): Parameters<ExportParams>,
    ) -> Result<String, String> {
        self.audit("memory_export", serde_json::json!({"project": &params.project}));

        let exports_dir = self.config.exports_dir();
        let save = params.save_to_file.unwrap_or(true);
        let project = params.project.clone();

        let (data, path) = self
            .with_db(move |conn| {
                let data = crate::knowledge::export::export_snapshot(conn, project.as_deref())?;
                let path = if save {
                    Some(crate::knowledge::export::write_snapshot(
                        &data,
                        &exports_dir,
                        project.as_deref(),
                    )?)
                } else {
                    None
                };
                Ok((data, path))
            })
            .await?;

        match path {
            Some(path) => Self::to_json(&serde_json::json!({
                "exported": true,
                "file": path,
                "knowledge_count": data.knowledge.len(),
                "sessions_count": data.sessions.len(),
            })),
            None => Self::to_json(&data),
        }
    }

    /// Store statistics and health metrics.
    #[tool(description = "Memory statistics with health metrics: counts by type/project, retention zones, stale records, storage size, effective config.")]
    async fn memory_stats(
        &self,
        Parameters(_params): Parameters<StatsParams>,
    ) -> Result<String, String> {
        self.audit("memory_stats", serde_json::json!({}));

        let config = Arc::clone(&self.config);
        let embedding_enabled = self.embedding.is_some();
        let response = self
            .with_db(move |conn| {
                let db_path = config.db_path();
                let raw_dir = config.raw_log_dir();
                let exports_dir = config.exports_dir();
                crate::knowledge::stats::stats(
                    conn,
                    &crate::knowledge::stats::StoragePaths {
                        db: Some(&db_path),
                        raw_logs: Some(&raw_dir),
                        exports: Some(&exports_dir),
                    },
                    &config,
                    embedding_enabled,
                )
            })
            .await?;

        Self::to_json(&response)
    }

    /// Log an error and check for a recurring pattern.
    #[tool(description = "Log an error for the self-improvement loop. Returns pattern_detected=true when the category recurred 3+ times in 30 days.")]
    async fn self_error_log(
        &self,
        Parameters(params): Parameters<ErrorLogParams>,
    ) -> Result<String, String> {
        self.audit("self_error_log", serde_json::json!({"category": &params.category, "severity": &params.severity}));

        let category: ErrorCategory = params
            .category
            .parse()
            .map_err(|e: crate::error::EngramError| e.to_string())?;
        let severity: Severity = params
            .severity
            .parse()
            .map_err(|e: crate::error::EngramError| e.to_string())?;
        let project = params
            .project
            .unwrap_or_else(|| self.config.storage.default_project.clone());

        let result = self
            .with_db(move |conn| {
                crate::improve::errors::log_error(
                    conn,
                    &params.description,
                    category,
                    severity,
                    params.fix.as_deref(),
                    &project,
                )
            })
            .await?;

        Self::to_json(&result)
    }

    /// Create, vote on, or promote an insight.
    #[tool(description = "Manage insights distilled from error patterns. Actions: add (content + source_error_ids), upvote, downvote, promote (importance>=5 and confidence>=0.8 required).")]
    async fn self_insight(
        &self,
        Parameters(params): Parameters<InsightParams>,
    ) -> Result<String, String> {
        self.audit("self_insight", serde_json::json!({"action": &params.action, "id": &params.id}));

        let action = params.action.clone();
        match action.as_str() {
            "add" => {
                let content = params.content.ok_or("content is required for 'add'")?;
                let category = params.category.unwrap_or_else(|| "general".to_string());
                let sources = params.source_error_ids.unwrap_or_default();
                let insight = self
                    .with_db(move |conn| {
                        crate::improve::insights::add_insight(conn, &content, &category, &sources)
                    })
                    .await?;
                Self::to_json(&insight)
            }
            "upvote" | "downvote" => {
                let id = params.id.ok_or("id is required for votes")?;
                let up = action == "upvote";
                let insight = self
                    .with_db(move |conn| {
                        if up {
                            crate::improve::insights::upvote(conn, &id)
                        } else {
                            crate::improve::insights::downvote(conn, &id)
                        }
                    })
                    .await?;
                Self::to_json(&insight)
            }
            "promote" => {
                let id = params.id.ok_or("id is required for 'promote'")?;
                let project = params.project;
                let (insight, rule) = self
                    .with_db(move |conn| {
                        crate::improve::insights::promote(conn, &id, project.as_deref())
                    })
                    .await?;
                Self::to_json(&serde_json::json!({"insight": insight, "rule": rule}))
            }
            other => Err(format!("invalid action: {other}")),
        }
    }

    /// Create, fire, rate, or transition a rule.
    #[tool(description = "Manage behavioral rules. Actions: add, fire (rule applied), rate (success=true/false; 10+ fires with <20% success auto-suspends), suspend, activate, retire.")]
    async fn self_rules(
        &self,
        Parameters(params): Parameters<RulesParams>,
    ) -> Result<String, String> {
        self.audit("self_rules", serde_json::json!({"action": &params.action, "id": &params.id}));

        let action = params.action.clone();
        let rule = match action.as_str() {
            "add" => {
                let content = params.content.ok_or("content is required for 'add'")?;
                let project = params.project.unwrap_or_default();
                self.with_db(move |conn| {
                    crate::improve::rules::create_rule(conn, &content, &project, None)
                })
                .await?
            }
            "fire" => {
                let id = params.id.ok_or("id is required for 'fire'")?;
                self.with_db(move |conn| crate::improve::rules::fire_rule(conn, &id))
                    .await?
            }
            "rate" => {
                let id = params.id.ok_or("id is required for 'rate'")?;
                let success = params.success.ok_or("success is required for 'rate'")?;
                self.with_db(move |conn| crate::improve::rules::rate_rule(conn, &id, success))
                    .await?
            }
            "suspend" | "activate" | "retire" => {
                let id = params.id.ok_or("id is required for transitions")?;
                let target = match action.as_str() {
                    "suspend" => RuleStatus::Suspended,
                    "activate" => RuleStatus::Active,
                    _ => RuleStatus::Retired,
                };
                self.with_db(move |conn| crate::improve::rules::set_rule_status(conn, &id, target))
                    .await?
            }
            other => return Err(format!("invalid action: {other}")),
        };

        Self::to_json(&rule)
    }

    /// Active rules for a project, loaded once per session.
    #[tool(description = "Load all active rules for a project (global rules included). Intended to be called once at session start.")]
    async fn self_rules_context(
        &self,
        Parameters(params): Parameters<RulesContextParams>,
    ) -> Result<String, String> {
        self.audit("self_rules_context", serde_json::json!({"project": &params.project}));

        let rules = self
            .with_db(move |conn| crate::improve::rules::rules_context(conn, &params.project))
            .await?;

        Self::to_json(&serde_json::json!({"total": rules.len(), "rules": rules}))
    }

    /// Read-only self-improvement aggregations.
    #[tool(description = "Self-improvement aggregations. Views: errors (counts per category), candidates (promotable insights), effectiveness (rule success rates), trend (weekly error comparison).")]
    async fn self_patterns(
        &self,
        Parameters(params): Parameters<PatternsParams>,
    ) -> Result<String, String> {
        self.audit("self_patterns", serde_json::json!({"view": &params.view}));

        let view: crate::improve::patterns::PatternView = params
            .view
            .parse()
            .map_err(|e: crate::error::EngramError| e.to_string())?;

        let report = self
            .with_db(move |conn| crate::improve::patterns::patterns(conn, view))
            .await?;

        Self::to_json(&report)
    }

    /// Store a task retrospective.
    #[tool(description = "Store a free-form reflection on a completed task: what happened, the outcome, what to do differently.")]
    async fn self_reflect(
        &self,
        Parameters(params): Parameters<ReflectParams>,
    ) -> Result<String, String> {
        self.audit("self_reflect", serde_json::json!({"outcome": &params.outcome}));

        let project = params
            .project
            .unwrap_or_else(|| self.config.storage.default_project.clone());
        let session_id = self.session.id.clone();

        let result = self
            .with_db(move |conn| {
                crate::improve::reflect(
                    conn,
                    &params.reflection,
                    params.task_summary.as_deref().unwrap_or(""),
                    params.outcome.as_deref().unwrap_or(""),
                    &project,
                    Some(&session_id),
                )
            })
            .await?;

        Self::to_json(&result)
    }

    /// Work the transcript extraction queue.
    #[tool(description = "Process pending session transcripts: 'list' pending, 'get' a transcript (chunked for large files), 'complete' to mark processed.")]
    async fn session_extract(
        &self,
        Parameters(params): Parameters<SessionExtractParams>,
    ) -> Result<String, String> {
        self.audit("session_extract", serde_json::json!({"action": &params.action, "session_id": &params.session_id}));

        let queue_dir = self.config.extract_queue_dir();
        match params.action.as_str() {
            "list" => {
                let result = self
                    .with_db(move |_conn| crate::extract::extract_list(&queue_dir))
                    .await?;
                Self::to_json(&result)
            }
            "get" => {
                let session_id = params.session_id.ok_or("session_id is required for 'get'")?;
                let chunk = params.chunk.unwrap_or(0);
                let data = self
                    .with_db(move |_conn| crate::extract::extract_get(&queue_dir, &session_id, chunk))
                    .await?;
                Self::to_json(&data)
            }
            "complete" => {
                let session_id = params
                    .session_id
                    .ok_or("session_id is required for 'complete'")?;
                let result = self
                    .with_db(move |_conn| crate::extract::extract_complete(&queue_dir, &session_id))
                    .await?;
                Self::to_json(&result)
            }
            other => Err(format!("invalid action: {other}")),
        }
    }
}

#[tool_handler]
impl ServerHandler for EngramTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Engram is a persistent knowledge store. Call memory_recall before starting a \
                 task, memory_save when you learn something worth keeping, and \
                 self_rules_context once per session to load behavioral rules."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
