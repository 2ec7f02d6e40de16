//! MCP server initialization for the stdio transport.
//!
//! Wires the database, embedding provider, session context, and tool router
//! into a running server. Exactly one serving process holds write access to
//! the store at a time; the dashboard opens the same file read-only.

use anyhow::Result;
use rmcp::ServiceExt;
use std::sync::{Arc, Mutex};

use crate::config::EngramConfig;
use crate::db;
use crate::embedding;
use crate::session::SessionContext;
use crate::tools::EngramTools;

/// Shared setup: layout, database, embedding provider, session row.
fn setup_shared_state(
    config: EngramConfig,
) -> Result<(
    Arc<Mutex<rusqlite::Connection>>,
    Option<Arc<dyn embedding::EmbeddingProvider>>,
    Arc<EngramConfig>,
    Arc<SessionContext>,
)> {
    config.ensure_layout()?;

    let db_path = config.db_path();
    let conn = db::open_database(&db_path)?;
    tracing::info!(db = %db_path.display(), "database ready");

    // Flag an embedding model mismatch — stored vectors would be stale
    if let Ok(Some(stored_model)) = db::migrations::get_embedding_model(&conn) {
        if stored_model != config.embedding.model {
            tracing::warn!(
                stored = %stored_model,
                configured = %config.embedding.model,
                "embedding model changed — existing vectors were produced by the old model"
            );
        }
    }

    let session = SessionContext::start(
        &conn,
        &config.storage.default_project,
        None,
        &config.raw_log_dir(),
    )?;
    tracing::info!(session = %session.id, "session started");

    let db = Arc::new(Mutex::new(conn));

    let provider = embedding::create_provider(&config.embedding)?;
    let provider: Option<Arc<dyn embedding::EmbeddingProvider>> = provider.map(Arc::from);
    match &provider {
        Some(_) => tracing::info!(model = %config.embedding.model, "embedding provider ready"),
        None => tracing::info!("embedding disabled — recall runs keyword + fuzzy + graph tiers"),
    }

    Ok((db, provider, Arc::new(config), Arc::new(session)))
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: EngramConfig) -> Result<()> {
    tracing::info!("starting Engram MCP server on stdio");

    let (db, provider, config, session) = setup_shared_state(config)?;

    let tools = EngramTools::new(db, provider, config, session);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running — waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}
