use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngramConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub retention: RetentionConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
    pub dashboard_host: String,
    pub dashboard_port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub root_dir: String,
    pub default_project: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `"remote"` (HTTP endpoint) or `"none"` (keyword + fuzzy + graph only).
    pub provider: String,
    pub model: String,
    pub endpoint: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_limit: usize,
    /// Exponential decay half-life applied to fused scores, in days.
    pub half_life_days: f64,
    /// Minimum decayed score for `update` to accept a match.
    pub relevance_floor: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetentionConfig {
    pub archive_after_days: i64,
    pub purge_after_days: i64,
    pub observation_ttl_days: i64,
}

impl Default for EngramConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            retention: RetentionConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            dashboard_host: "127.0.0.1".into(),
            dashboard_port: 37737,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let root_dir = default_engram_dir().to_string_lossy().into_owned();
        Self {
            root_dir,
            default_project: "general".into(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "none".into(),
            model: "all-MiniLM-L6-v2".into(),
            endpoint: "http://127.0.0.1:11434/api/embeddings".into(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            half_life_days: 90.0,
            relevance_floor: 0.1,
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            archive_after_days: 180,
            purge_after_days: 365,
            observation_ttl_days: 30,
        }
    }
}

/// Returns `~/.engram/`
pub fn default_engram_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".engram")
}

/// Returns the default config file path: `~/.engram/config.toml`
pub fn default_config_path() -> PathBuf {
    default_engram_dir().join("config.toml")
}

impl EngramConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            EngramConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("ENGRAM_DIR") {
            self.storage.root_dir = val;
        }
        if let Ok(val) = std::env::var("ENGRAM_EMBEDDING_MODEL") {
            self.embedding.model = val;
        }
        if let Ok(val) = std::env::var("ENGRAM_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("ENGRAM_HALF_LIFE_DAYS") {
            if let Ok(days) = val.parse() {
                self.retrieval.half_life_days = days;
            }
        }
        if let Ok(val) = std::env::var("ENGRAM_ARCHIVE_AFTER_DAYS") {
            if let Ok(days) = val.parse() {
                self.retention.archive_after_days = days;
            }
        }
        if let Ok(val) = std::env::var("ENGRAM_PURGE_AFTER_DAYS") {
            if let Ok(days) = val.parse() {
                self.retention.purge_after_days = days;
            }
        }
        if let Ok(val) = std::env::var("ENGRAM_DASHBOARD_PORT") {
            if let Ok(port) = val.parse() {
                self.server.dashboard_port = port;
            }
        }
    }

    /// Resolve the storage root, expanding `~` if needed.
    pub fn resolved_root(&self) -> PathBuf {
        expand_tilde(&self.storage.root_dir)
    }

    /// Path of the single durable store file (records + both indexes).
    pub fn db_path(&self) -> PathBuf {
        self.resolved_root().join("engram.db")
    }

    /// Directory for append-only raw call logs, one JSONL file per session.
    pub fn raw_log_dir(&self) -> PathBuf {
        self.resolved_root().join("raw")
    }

    /// Directory for JSON export snapshots.
    pub fn exports_dir(&self) -> PathBuf {
        self.resolved_root().join("exports")
    }

    /// Directory for pending/completed transcript extraction artifacts.
    pub fn extract_queue_dir(&self) -> PathBuf {
        self.resolved_root().join("extract-queue")
    }

    /// Create the storage layout. Idempotent.
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [
            self.resolved_root(),
            self.raw_log_dir(),
            self.exports_dir(),
            self.extract_queue_dir(),
        ] {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }
        Ok(())
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
