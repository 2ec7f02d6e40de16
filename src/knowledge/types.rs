//! Core knowledge type definitions.
//!
//! Defines [`KnowledgeType`] (the five knowledge categories), [`RecordStatus`]
//! (retention zones plus the supersession marker), [`RelationType`] (typed
//! graph edges), [`ObservationType`], and the record structs mapping the
//! corresponding tables. All enumerations are closed: unknown strings are
//! rejected at construction time as [`EngramError::InvalidArgument`].

#![allow(dead_code)]

use serde::{Deserialize, Serialize};

use crate::error::EngramError;

/// The five knowledge categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeType {
    /// A choice that was made, with the WHY captured in `context`.
    Decision,
    /// A problem → fix pair.
    Solution,
    /// A gotcha or hard-won insight.
    Lesson,
    /// A stable piece of knowledge: configs, architecture, constants.
    Fact,
    /// A project convention or style rule.
    Convention,
}

impl KnowledgeType {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decision => "decision",
            Self::Solution => "solution",
            Self::Lesson => "lesson",
            Self::Fact => "fact",
            Self::Convention => "convention",
        }
    }
}

impl std::fmt::Display for KnowledgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for KnowledgeType {
    type Err = EngramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "decision" => Ok(Self::Decision),
            "solution" => Ok(Self::Solution),
            "lesson" => Ok(Self::Lesson),
            "fact" => Ok(Self::Fact),
            "convention" => Ok(Self::Convention),
            _ => Err(EngramError::invalid("type", s)),
        }
    }
}

/// Lifecycle zone of a knowledge record.
///
/// `Superseded` is set by `update` (a newer version exists) and is distinct
/// from `Archived` (retention sweep) so version-history traversal can tell
/// the two causes apart. Retention only ever moves
/// `Active → Archived → Purged`; superseded records stay superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Visible to search; the newest version of its chain.
    Active,
    /// Replaced by a newer version via `update`.
    Superseded,
    /// Aged out by the retention sweep. Row retained, removed from search.
    Archived,
    /// Excluded from all reads except export. Row retained.
    Purged,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Superseded => "superseded",
            Self::Archived => "archived",
            Self::Purged => "purged",
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordStatus {
    type Err = EngramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "superseded" => Ok(Self::Superseded),
            "archived" => Ok(Self::Archived),
            "purged" => Ok(Self::Purged),
            _ => Err(EngramError::invalid("status", s)),
        }
    }
}

/// Typed edge between two knowledge records. Enriches tier-4 graph expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Causal,
    Solution,
    Context,
    Related,
    Contradicts,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Causal => "causal",
            Self::Solution => "solution",
            Self::Context => "context",
            Self::Related => "related",
            Self::Contradicts => "contradicts",
        }
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RelationType {
    type Err = EngramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "causal" => Ok(Self::Causal),
            "solution" => Ok(Self::Solution),
            "context" => Ok(Self::Context),
            "related" => Ok(Self::Related),
            "contradicts" => Ok(Self::Contradicts),
            _ => Err(EngramError::invalid("relation_type", s)),
        }
    }
}

/// Category of a file-change observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationType {
    Bugfix,
    Feature,
    Refactor,
    Change,
    Discovery,
    Decision,
}

impl ObservationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bugfix => "bugfix",
            Self::Feature => "feature",
            Self::Refactor => "refactor",
            Self::Change => "change",
            Self::Discovery => "discovery",
            Self::Decision => "decision",
        }
    }
}

impl std::fmt::Display for ObservationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ObservationType {
    type Err = EngramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bugfix" => Ok(Self::Bugfix),
            "feature" => Ok(Self::Feature),
            "refactor" => Ok(Self::Refactor),
            "change" => Ok(Self::Change),
            "discovery" => Ok(Self::Discovery),
            "decision" => Ok(Self::Decision),
            _ => Err(EngramError::invalid("observation_type", s)),
        }
    }
}

/// A knowledge record, matching the `knowledge` table schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Knowledge {
    /// UUID v7 (time-sortable) primary key.
    pub id: String,
    #[serde(rename = "type")]
    pub knowledge_type: KnowledgeType,
    /// Sanitized text content (sanitization happens upstream of the store).
    pub content: String,
    /// Free-text rationale; for decisions, the WHY.
    pub context: String,
    /// Project tag the record belongs to.
    pub project: String,
    pub tags: Vec<String>,
    /// Git branch the record was captured on, if any.
    pub branch: Option<String>,
    pub status: RecordStatus,
    /// Back-reference to the version this record replaced.
    pub supersedes: Option<String>,
    /// Version number within a supersession chain, starting at 1.
    pub version: u32,
    pub confidence: f64,
    /// Times this record has been returned by recall.
    pub recall_count: u32,
    /// Session that created the record.
    pub session_id: Option<String>,
    pub created_at: String,
    /// Refreshed on every recall and dedup hit — "a recall confirms knowledge".
    pub last_confirmed: String,
}

/// A typed, directed relation between two knowledge records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub id: String,
    pub from_id: String,
    pub to_id: String,
    pub relation_type: RelationType,
    pub created_at: String,
}

/// One writer-process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub started_at: String,
    pub project: String,
    pub branch: Option<String>,
    pub tool_call_count: u32,
}

/// A lightweight record of a tool invocation touching files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub id: String,
    pub session_id: String,
    pub tool_name: String,
    pub summary: String,
    pub files_affected: Vec<String>,
    pub observation_type: ObservationType,
    pub created_at: String,
}
