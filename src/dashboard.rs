//! Read-only web dashboard.
//!
//! A second process sharing the same storage as the MCP server. The SQLite
//! file is opened with `SQLITE_OPEN_READ_ONLY`, so the dashboard never takes
//! a write lock and tolerates a concurrent writer through WAL snapshots.

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::Connection;
use serde::Deserialize;
use std::sync::{Arc, Mutex};

use crate::config::EngramConfig;
use crate::db;
use crate::knowledge::search::truncate_preview;
use crate::knowledge::stats::{stats, StoragePaths};

struct DashboardState {
    conn: Mutex<Connection>,
    config: EngramConfig,
}

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Engram</title>
<style>
body { font-family: ui-monospace, monospace; margin: 2rem; background: #111; color: #ddd; }
h1 { color: #8fbc8f; }
a { color: #87ceeb; }
</style></head>
<body>
<h1>engram</h1>
<p>Read-only view of the knowledge store.</p>
<ul>
<li><a href="/api/stats">/api/stats</a> — counts, health score, storage size</li>
<li><a href="/api/knowledge">/api/knowledge</a> — active records (filters: q, type, project, limit)</li>
<li><a href="/api/sessions">/api/sessions</a> — recent sessions</li>
<li><a href="/api/rules">/api/rules</a> — behavioral rules with success rates</li>
</ul>
</body>
</html>
"#;

#[derive(Deserialize)]
struct KnowledgeQuery {
    q: Option<String>,
    r#type: Option<String>,
    project: Option<String>,
    limit: Option<usize>,
}

/// Serve the dashboard until ctrl-c.
pub async fn serve_dashboard(config: EngramConfig) -> Result<()> {
    let bind_addr = format!(
        "{}:{}",
        config.server.dashboard_host, config.server.dashboard_port
    );

    let db_path = config.db_path();
    anyhow::ensure!(
        db_path.exists(),
        "no database at {} — start the server first",
        db_path.display()
    );
    let conn = db::open_database_readonly(&db_path)?;

    let state = Arc::new(DashboardState {
        conn: Mutex::new(conn),
        config,
    });

    let router = Router::new()
        .route("/", get(index))
        .route("/api/stats", get(api_stats))
        .route("/api/knowledge", get(api_knowledge))
        .route("/api/sessions", get(api_sessions))
        .route("/api/rules", get(api_rules))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "dashboard listening at http://{bind_addr}/");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to listen for ctrl-c");
            tracing::info!("shutting down dashboard");
        })
        .await?;

    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn api_stats(
    State(state): State<Arc<DashboardState>>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let conn = state.conn.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let db_path = state.config.db_path();
    let raw_dir = state.config.raw_log_dir();
    let exports_dir = state.config.exports_dir();
    let response = stats(
        &conn,
        &StoragePaths {
            db: Some(&db_path),
            raw_logs: Some(&raw_dir),
            exports: Some(&exports_dir),
        },
        &state.config,
        state.config.embedding.provider != "none",
    )
    .map_err(|e| {
        tracing::error!(error = %e, "stats query failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    serde_json::to_value(&response)
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn api_knowledge(
    State(state): State<Arc<DashboardState>>,
    Query(query): Query<KnowledgeQuery>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let conn = state.conn.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let mut sql = String::from(
        "SELECT id, type, content, project, tags, status, confidence, recall_count, created_at, \
         last_confirmed FROM knowledge WHERE status = 'active'",
    );
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    if let Some(q) = &query.q {
        params.push(Box::new(format!("%{q}%")));
        sql.push_str(&format!(" AND content LIKE ?{}", params.len()));
    }
    if let Some(t) = &query.r#type {
        params.push(Box::new(t.clone()));
        sql.push_str(&format!(" AND type = ?{}", params.len()));
    }
    if let Some(p) = &query.project {
        params.push(Box::new(p.clone()));
        sql.push_str(&format!(" AND project = ?{}", params.len()));
    }
    params.push(Box::new(query.limit.unwrap_or(50) as i64));
    sql.push_str(&format!(" ORDER BY created_at DESC LIMIT ?{}", params.len()));

    let records = (|| -> rusqlite::Result<Vec<serde_json::Value>> {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())),
                |row| {
                    let content: String = row.get(2)?;
                    let tags: String = row.get(4)?;
                    Ok(serde_json::json!({
                        "id": row.get::<_, String>(0)?,
                        "type": row.get::<_, String>(1)?,
                        "content": truncate_preview(&content, 200),
                        "project": row.get::<_, String>(3)?,
                        "tags": serde_json::from_str::<serde_json::Value>(&tags)
                            .unwrap_or(serde_json::Value::Array(vec![])),
                        "status": row.get::<_, String>(5)?,
                        "confidence": row.get::<_, f64>(6)?,
                        "recall_count": row.get::<_, u32>(7)?,
                        "created_at": row.get::<_, String>(8)?,
                        "last_confirmed": row.get::<_, String>(9)?,
                    }))
                },
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    })()
    .map_err(|e| {
        tracing::error!(error = %e, "knowledge query failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(serde_json::json!({
        "total": records.len(),
        "records": records,
    })))
}

async fn api_sessions(
    State(state): State<Arc<DashboardState>>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let conn = state.conn.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let sessions = (|| -> rusqlite::Result<Vec<serde_json::Value>> {
        let mut stmt = conn.prepare(
            "SELECT id, started_at, project, branch, tool_call_count FROM sessions \
             ORDER BY started_at DESC LIMIT 50",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(serde_json::json!({
                    "id": row.get::<_, String>(0)?,
                    "started_at": row.get::<_, String>(1)?,
                    "project": row.get::<_, String>(2)?,
                    "branch": row.get::<_, Option<String>>(3)?,
                    "tool_call_count": row.get::<_, u32>(4)?,
                }))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    })()
    .map_err(|e| {
        tracing::error!(error = %e, "sessions query failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(serde_json::json!({"sessions": sessions})))
}

async fn api_rules(
    State(state): State<Arc<DashboardState>>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let conn = state.conn.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let rules = (|| -> rusqlite::Result<Vec<serde_json::Value>> {
        let mut stmt = conn.prepare(
            "SELECT id, content, project, status, fire_count, success_count FROM rules \
             ORDER BY created_at DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let fire_count: u32 = row.get(4)?;
                let success_count: u32 = row.get(5)?;
                let rate = if fire_count == 0 {
                    0.0
                } else {
                    f64::from(success_count) / f64::from(fire_count)
                };
                Ok(serde_json::json!({
                    "id": row.get::<_, String>(0)?,
                    "content": row.get::<_, String>(1)?,
                    "project": row.get::<_, String>(2)?,
                    "status": row.get::<_, String>(3)?,
                    "fire_count": fire_count,
                    "success_count": success_count,
                    "success_rate": rate,
                }))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    })()
    .map_err(|e| {
        tracing::error!(error = %e, "rules query failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(serde_json::json!({"rules": rules})))
}
