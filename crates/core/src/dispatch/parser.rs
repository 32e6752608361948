//! # Decision Parser
//!
//! Best-effort extraction of a structured decision from free-form model output.
//!
//! The span from the first `{` to the last `}` is parsed as one JSON object.
//! When the model appends a second JSON block or prose containing a brace
//! after its answer, that span over-captures and the parse fails; this is
//! accepted rather than replaced with nearest-brace matching.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// What the commander decided to do
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DecisionAction {
    Deploy,
    Hold,
    /// Anything else the model produced, lowercased. Handled by the caller.
    Other(String),
}

impl DecisionAction {
    /// Case-insensitive parse of the wire value
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase();
        match normalized.as_str() {
            "deploy" => Self::Deploy,
            "hold" => Self::Hold,
            _ => Self::Other(normalized),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Deploy => "deploy",
            Self::Hold => "hold",
            Self::Other(value) => value,
        }
    }
}

impl fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DecisionAction {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DecisionAction {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Structured output of one reasoning invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub action: DecisionAction,
    /// Explanation for audit and display
    #[serde(default)]
    pub reasoning: String,
    /// Present and non-empty whenever `action` is deploy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub squad_name: Option<String>,
    /// Present and non-empty whenever `action` is deploy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Why a buffer did not yield a decision
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseFailure {
    #[error("no JSON object found in response")]
    NoStructureFound,

    #[error("malformed JSON in response: {reason}")]
    MalformedStructure { raw: String, reason: String },

    #[error("response has no 'action' field")]
    MissingAction,

    #[error("deploy decision is missing {missing}")]
    IncompleteDeployment { missing: &'static str },
}

/// Parse `text` into a decision, or `None` if it holds no usable one.
///
/// Never panics and never returns an error; see [`try_parse_decision`] for
/// the failure reason.
pub fn parse_decision(text: &str) -> Option<Decision> {
    match try_parse_decision(text) {
        Ok(decision) => Some(decision),
        Err(failure) => {
            tracing::debug!(%failure, "Decision parse failed");
            None
        }
    }
}

/// Parse `text` into a decision, reporting why it failed
pub fn try_parse_decision(text: &str) -> Result<Decision, ParseFailure> {
    let start = text.find('{').ok_or(ParseFailure::NoStructureFound)?;
    let end = text.rfind('}').ok_or(ParseFailure::NoStructureFound)?;
    if end < start {
        return Err(ParseFailure::NoStructureFound);
    }

    let raw = &text[start..=end];
    let object: Map<String, Value> =
        serde_json::from_str(raw).map_err(|e| ParseFailure::MalformedStructure {
            raw: raw.to_string(),
            reason: e.to_string(),
        })?;

    let action = object
        .get("action")
        .and_then(Value::as_str)
        .map(DecisionAction::parse)
        .ok_or(ParseFailure::MissingAction)?;

    let decision = Decision {
        action,
        reasoning: string_field(&object, "reasoning").unwrap_or_default(),
        squad_name: string_field(&object, "squad_name"),
        location: string_field(&object, "location"),
    };

    if decision.action == DecisionAction::Deploy {
        if decision.squad_name.is_none() {
            return Err(ParseFailure::IncompleteDeployment {
                missing: "squad_name",
            });
        }
        if decision.location.is_none() {
            return Err(ParseFailure::IncompleteDeployment {
                missing: "location",
            });
        }
    }

    Ok(decision)
}

/// Non-empty string field, trimmed
fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// At most `max_chars` characters of `text`, for warning messages
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    let mut out: String = trimmed.chars().take(max_chars).collect();
    if trimmed.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}
