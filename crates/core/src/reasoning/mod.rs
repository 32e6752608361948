//! # Reasoning Client
//!
//! Streams a dispatch decision out of a hosted reasoning model.
//!
//! ## Channels
//!
//! ```text
//! reasoning service ──▶ Thinking("The flood covers...")   forwarded live, never parsed
//!                   ──▶ Answer("{\"action\": ")            forwarded live and buffered
//!                   ──▶ Answer("\"deploy\", ...}")
//! ```
//!
//! A stream ends either on exhaustion or after its first `Err` item.

pub mod client;
pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod scripted;
pub mod think_tags;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

pub use client::ChatCompletionsClient;
pub use error::ReasoningError;
#[cfg(any(test, feature = "testing"))]
pub use scripted::ScriptedClient;
pub use think_tags::ThinkTagSplitter;

/// One incremental piece of streamed model output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "channel", content = "text", rename_all = "snake_case")]
pub enum Fragment {
    /// Intermediate chain-of-thought tokens
    Thinking(String),
    /// Tokens of the final structured response
    Answer(String),
}

impl Fragment {
    pub fn text(&self) -> &str {
        match self {
            Fragment::Thinking(text) | Fragment::Answer(text) => text,
        }
    }
}

/// System instructions plus the user turn for one dispatch cycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReasoningRequest {
    pub system: String,
    pub user: String,
}

/// Lazy, finite, non-restartable fragment sequence
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Fragment, ReasoningError>> + Send>>;

/// A hosted text-generation service that can stream a decision
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    /// Open the stream. Failing to connect is reported here; failures after
    /// the first fragment arrive as an `Err` item that ends the stream.
    async fn stream(&self, request: &ReasoningRequest) -> Result<FragmentStream, ReasoningError>;
}
