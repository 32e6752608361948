//! OpenAI-compatible streaming chat-completions client.
//!
//! Works against vLLM/DeepSeek style servers that stream
//! `choices[0].delta.reasoning_content` next to `choices[0].delta.content`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use super::{
    Fragment, FragmentStream, ReasoningClient, ReasoningError, ReasoningRequest, ThinkTagSplitter,
};
use crate::models::ReasoningConfig;

type FragmentSender = mpsc::Sender<Result<Fragment, ReasoningError>>;

/// Streaming client for an OpenAI-compatible `/chat/completions` endpoint
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    config: Arc<ReasoningConfig>,
    http_client: reqwest::Client,
}

impl ChatCompletionsClient {
    pub fn new(config: ReasoningConfig) -> Result<Self, ReasoningError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ReasoningError::connection(e.to_string()))?;

        Ok(Self {
            config: Arc::new(config),
            http_client,
        })
    }

    pub fn config(&self) -> &ReasoningConfig {
        &self.config
    }

    fn request_body(&self, request: &ReasoningRequest) -> serde_json::Value {
        json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
            "temperature": self.config.temperature,
            "stream": true,
        })
    }
}

#[async_trait]
impl ReasoningClient for ChatCompletionsClient {
    async fn stream(&self, request: &ReasoningRequest) -> Result<FragmentStream, ReasoningError> {
        let url = self.config.completions_url();
        info!(url = %url, model = %self.config.model, "Opening reasoning stream");

        let mut builder = self.http_client.post(&url).json(&self.request_body(request));
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let bound = self.config.connect_timeout;
        let response = tokio::time::timeout(bound, builder.send())
            .await
            .map_err(|_| ReasoningError::timeout(bound))?
            .map_err(|e| ReasoningError::from_transport(&e, bound))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReasoningError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let events = Box::pin(response.bytes_stream().eventsource());
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(pump_events(events, tx, self.config.idle_timeout));

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

#[derive(Debug, Deserialize)]
struct ChunkBody {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    /// Some servers name the reasoning channel `reasoning`
    #[serde(default)]
    reasoning: Option<String>,
}

/// Forward SSE chunks as fragments until `[DONE]`, end of body, or the first failure
async fn pump_events<S, E>(mut events: S, tx: FragmentSender, idle_timeout: Duration)
where
    S: Stream<Item = Result<eventsource_stream::Event, EventStreamError<E>>> + Unpin,
    E: std::fmt::Display,
{
    let mut splitter = ThinkTagSplitter::new();

    loop {
        let event = match tokio::time::timeout(idle_timeout, events.next()).await {
            Err(_) => {
                warn!(idle = ?idle_timeout, "Reasoning stream went silent");
                fail(&tx, &mut splitter, ReasoningError::timeout(idle_timeout)).await;
                return;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                fail(&tx, &mut splitter, ReasoningError::stream(e.to_string())).await;
                return;
            }
            Ok(Some(Ok(event))) => event,
        };

        let data = event.data.trim();
        if data.is_empty() {
            continue;
        }
        if data == "[DONE]" {
            break;
        }

        let chunk: ChunkBody = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                debug!(error = %e, "Skipping unparseable stream chunk");
                continue;
            }
        };

        if let Some(error) = chunk.error {
            fail(&tx, &mut splitter, ReasoningError::stream(error.to_string())).await;
            return;
        }

        for fragment in chunk_fragments(chunk.choices, &mut splitter) {
            if tx.send(Ok(fragment)).await.is_err() {
                // Consumer dropped the stream
                return;
            }
        }
    }

    for fragment in splitter.finish() {
        if tx.send(Ok(fragment)).await.is_err() {
            return;
        }
    }
}

/// Flush what the splitter still holds, then report `err`
async fn fail(tx: &FragmentSender, splitter: &mut ThinkTagSplitter, err: ReasoningError) {
    for fragment in splitter.finish() {
        if tx.send(Ok(fragment)).await.is_err() {
            return;
        }
    }
    let _ = tx.send(Err(err)).await;
}

fn chunk_fragments(choices: Vec<ChunkChoice>, splitter: &mut ThinkTagSplitter) -> Vec<Fragment> {
    let mut out = Vec::new();
    for choice in choices {
        let delta = choice.delta;
        if let Some(thinking) = delta.reasoning_content.or(delta.reasoning) {
            if !thinking.is_empty() {
                out.extend(splitter.reasoning_channel_seen());
                out.push(Fragment::Thinking(thinking));
            }
        }
        if let Some(content) = delta.content {
            out.extend(splitter.push(&content));
        }
    }
    out
}
