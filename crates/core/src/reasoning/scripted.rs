//! Deterministic reasoning client for tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use super::{Fragment, FragmentStream, ReasoningClient, ReasoningError, ReasoningRequest};

/// Replays a fixed script instead of calling a service
#[derive(Debug)]
pub struct ScriptedClient {
    script: Result<Vec<Result<Fragment, ReasoningError>>, ReasoningError>,
    requests: Mutex<Vec<ReasoningRequest>>,
    pace: Option<Duration>,
}

impl ScriptedClient {
    /// Stream the given items in order
    pub fn with_items(items: Vec<Result<Fragment, ReasoningError>>) -> Self {
        Self {
            script: Ok(items),
            requests: Mutex::new(Vec::new()),
            pace: None,
        }
    }

    /// Stream the given fragments in order, without failures
    pub fn with_fragments(fragments: Vec<Fragment>) -> Self {
        Self::with_items(fragments.into_iter().map(Ok).collect())
    }

    /// Think once, then answer with `text` in a single fragment
    pub fn answering(text: &str) -> Self {
        Self::with_fragments(vec![
            Fragment::Thinking("Assessing hazard against squad roster.".to_string()),
            Fragment::Answer(text.to_string()),
        ])
    }

    /// Fail to connect before producing anything
    pub fn unreachable(reason: &str) -> Self {
        Self {
            script: Err(ReasoningError::connection(reason)),
            requests: Mutex::new(Vec::new()),
            pace: None,
        }
    }

    /// Wait `delay` before yielding each item
    pub fn paced(mut self, delay: Duration) -> Self {
        self.pace = Some(delay);
        self
    }

    /// Requests seen so far
    pub fn requests(&self) -> Vec<ReasoningRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ReasoningClient for ScriptedClient {
    async fn stream(&self, request: &ReasoningRequest) -> Result<FragmentStream, ReasoningError> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }
        let items = self.script.clone()?;
        let stream = futures::stream::iter(items);
        match self.pace {
            Some(delay) => Ok(Box::pin(stream.then(move |item| async move {
                tokio::time::sleep(delay).await;
                item
            }))),
            None => Ok(Box::pin(stream)),
        }
    }
}
