//! # Dispatch Events
//!
//! Progress events streamed to the caller during one dispatch cycle.

use serde::{Deserialize, Serialize};

/// Kind of dispatch event, without payload
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DispatchEventKind {
    Thinking,
    Answer,
    Reasoning,
    Status,
    Warning,
    Error,
}

impl DispatchEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thinking => "thinking",
            Self::Answer => "answer",
            Self::Reasoning => "reasoning",
            Self::Status => "status",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// An event in a dispatch cycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEvent {
    /// Chain-of-thought fragment, forwarded as received
    Thinking { content: String },
    /// Fragment of the structured answer, forwarded as received
    Answer { content: String },
    /// The parsed decision that was acted on
    Reasoning {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        squad: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<String>,
        action: String,
    },
    /// Cycle finished and the decision was applied
    Status { content: String },
    /// Cycle finished without touching the registry
    Warning { content: String },
    /// Reasoning service failed; cycle aborted
    Error { content: String },
}

impl DispatchEvent {
    pub fn thinking(content: impl Into<String>) -> Self {
        Self::Thinking {
            content: content.into(),
        }
    }

    pub fn answer(content: impl Into<String>) -> Self {
        Self::Answer {
            content: content.into(),
        }
    }

    pub fn status(content: impl Into<String>) -> Self {
        Self::Status {
            content: content.into(),
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self::Warning {
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::Error {
            content: content.into(),
        }
    }

    pub fn kind(&self) -> DispatchEventKind {
        match self {
            Self::Thinking { .. } => DispatchEventKind::Thinking,
            Self::Answer { .. } => DispatchEventKind::Answer,
            Self::Reasoning { .. } => DispatchEventKind::Reasoning,
            Self::Status { .. } => DispatchEventKind::Status,
            Self::Warning { .. } => DispatchEventKind::Warning,
            Self::Error { .. } => DispatchEventKind::Error,
        }
    }

    /// Status, warning and error end a cycle
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Status { .. } | Self::Warning { .. } | Self::Error { .. }
        )
    }

    /// Streamed model output rather than a cycle outcome
    pub fn is_fragment(&self) -> bool {
        matches!(self, Self::Thinking { .. } | Self::Answer { .. })
    }

    pub fn content(&self) -> &str {
        match self {
            Self::Thinking { content }
            | Self::Answer { content }
            | Self::Reasoning { content, .. }
            | Self::Status { content }
            | Self::Warning { content }
            | Self::Error { content } => content,
        }
    }
}
