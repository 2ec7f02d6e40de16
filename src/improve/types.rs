//! Self-improvement type definitions: errors, insights, rules, reflections.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};

use crate::error::EngramError;

/// Category of a logged error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    CodeError,
    LogicError,
    ConfigError,
    ApiError,
    Timeout,
    LoopDetected,
    WrongAssumption,
    MissingContext,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeError => "code_error",
            Self::LogicError => "logic_error",
            Self::ConfigError => "config_error",
            Self::ApiError => "api_error",
            Self::Timeout => "timeout",
            Self::LoopDetected => "loop_detected",
            Self::WrongAssumption => "wrong_assumption",
            Self::MissingContext => "missing_context",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErrorCategory {
    type Err = EngramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code_error" => Ok(Self::CodeError),
            "logic_error" => Ok(Self::LogicError),
            "config_error" => Ok(Self::ConfigError),
            "api_error" => Ok(Self::ApiError),
            "timeout" => Ok(Self::Timeout),
            "loop_detected" => Ok(Self::LoopDetected),
            "wrong_assumption" => Ok(Self::WrongAssumption),
            "missing_context" => Ok(Self::MissingContext),
            _ => Err(EngramError::invalid("category", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = EngramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(EngramError::invalid("severity", s)),
        }
    }
}

/// Lifecycle of an insight.
///
/// `Archived` is terminal under voting (importance reached 0); `Promoted` is
/// terminal under promotion. Only `Candidate` insights accept votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightStatus {
    Candidate,
    Archived,
    Promoted,
}

impl InsightStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Candidate => "candidate",
            Self::Archived => "archived",
            Self::Promoted => "promoted",
        }
    }
}

impl std::fmt::Display for InsightStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InsightStatus {
    type Err = EngramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "candidate" => Ok(Self::Candidate),
            "archived" => Ok(Self::Archived),
            "promoted" => Ok(Self::Promoted),
            _ => Err(EngramError::invalid("insight status", s)),
        }
    }
}

/// Lifecycle of a rule. `Retired` is terminal — no transition leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    Active,
    Suspended,
    Retired,
}

impl RuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Retired => "retired",
        }
    }
}

impl std::fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RuleStatus {
    type Err = EngramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            "retired" => Ok(Self::Retired),
            _ => Err(EngramError::invalid("rule status", s)),
        }
    }
}

/// A logged error, matching the `error_log` table schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: String,
    pub description: String,
    pub category: ErrorCategory,
    pub severity: Severity,
    pub fix: Option<String>,
    pub project: String,
    pub created_at: String,
}

/// A voted insight distilled from recurring errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    pub id: String,
    pub content: String,
    pub category: String,
    pub importance: u32,
    pub confidence: f64,
    pub source_error_ids: Vec<String>,
    pub status: InsightStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// A promoted behavioral rule with a measured success rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub content: String,
    /// Project scope; empty means global.
    pub project: String,
    pub status: RuleStatus,
    pub fire_count: u32,
    pub success_count: u32,
    /// Ratings received, independent of success.
    pub rated_count: u32,
    pub created_from_insight_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Rule {
    /// success_count / fire_count, or 0 when never fired.
    pub fn effectiveness(&self) -> f64 {
        if self.fire_count == 0 {
            0.0
        } else {
            f64::from(self.success_count) / f64::from(self.fire_count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_roundtrip() {
        for s in [
            "code_error",
            "logic_error",
            "config_error",
            "api_error",
            "timeout",
            "loop_detected",
            "wrong_assumption",
            "missing_context",
        ] {
            let c: ErrorCategory = s.parse().unwrap();
            assert_eq!(c.as_str(), s);
        }
    }

    #[test]
    fn unknown_category_rejected() {
        assert!("fatal".parse::<ErrorCategory>().is_err());
        assert!("".parse::<Severity>().is_err());
    }

    #[test]
    fn effectiveness_handles_zero_fires() {
        let rule = Rule {
            id: "r".into(),
            content: "always read the logs first".into(),
            project: String::new(),
            status: RuleStatus::Active,
            fire_count: 0,
            success_count: 0,
            rated_count: 0,
            created_from_insight_id: None,
            created_at: String::new(),
            updated_at: String::new(),
        };
        assert_eq!(rule.effectiveness(), 0.0);
    }
}
