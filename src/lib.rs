//! Persistent knowledge for AI coding assistants — decisions, solutions, and
//! lessons that survive across independent work sessions, served over MCP.
//!
//! Engram stores five kinds of knowledge (decisions, solutions, lessons,
//! facts, conventions) in a single SQLite file and retrieves them through a
//! four-tier search fusion engine:
//!
//! | Tier | Strategy | Source |
//! |------|----------|--------|
//! | 1 | BM25 keyword | FTS5 inverted index |
//! | 2 | Cosine similarity | [sqlite-vec](https://github.com/asg017/sqlite-vec) vectors |
//! | 3 | Fuzzy ratio | typo / partial-match recovery |
//! | 4 | Graph expansion | one hop over typed relations |
//!
//! Scores from all tiers are summed per record, decayed by age with a
//! recall-frequency boost, and trimmed to a token budget.
//!
//! # Architecture
//!
//! - **Storage**: SQLite (WAL) with FTS5 for keyword search and sqlite-vec
//!   for vector search, both kept in sync with the primary rows
//!   transactionally
//! - **Dedup**: Jaccard + fuzzy-ratio gate at save time; pairwise
//!   consolidation on demand
//! - **Retention**: explicit sweeps through active → archived → purged zones
//! - **Self-improvement**: errors → voted insights → behavioral rules with
//!   measured success rates and auto-suspension
//! - **Transport**: MCP over stdio; a separate read-only HTTP dashboard
//!
//! # Modules
//!
//! - [`config`] — TOML configuration with environment overrides
//! - [`db`] — SQLite initialization, schema, and migrations
//! - [`embedding`] — the external embedding seam (remote endpoint or disabled)
//! - [`knowledge`] — store, search fusion, relations, retention, stats, export
//! - [`improve`] — the self-improvement pipeline
//! - [`session`] — per-process session context and raw call logging
//! - [`similarity`] — Jaccard, fuzzy ratio, cosine

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod improve;
pub mod knowledge;
pub mod session;
pub mod similarity;
