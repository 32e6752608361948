//! # AeroGuard Models
//!
//! Centralized configuration for the two hosted services the commander talks to:
//! the reasoning model (OpenAI-compatible chat completions) and the vision server.
//!
//! ## Example
//! ```rust,ignore
//! use aeroguard_core::models::ReasoningConfig;
//!
//! // Local DeepSeek deployment
//! let config = ReasoningConfig::default();
//!
//! // Hosted endpoint
//! let config = ReasoningConfig::default()
//!     .with_base_url("https://api.deepseek.com/v1")
//!     .with_api_key("sk-...");
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default endpoint of the locally served reasoning model
pub const DEFAULT_REASONING_URL: &str = "http://localhost:8000/v1";

/// Default served model name
pub const DEFAULT_REASONING_MODEL: &str = "deepseek-reasoner";

/// Default endpoint of the vision server
pub const DEFAULT_VISION_URL: &str = "http://localhost:9000";

/// Configuration for the reasoning service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReasoningConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`)
    pub base_url: String,
    /// Model name as served (e.g., "deepseek-reasoner")
    pub model: String,
    /// Bearer token, if the endpoint requires one
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum time to establish the connection and receive response headers
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,
    /// Maximum silence between two streamed fragments
    #[serde(with = "duration_secs")]
    pub idle_timeout: Duration,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_REASONING_URL.to_string(),
            model: DEFAULT_REASONING_MODEL.to_string(),
            api_key: None,
            temperature: 0.1,
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(30),
        }
    }
}

impl ReasoningConfig {
    /// Defaults overlaid with `AEROGUARD_REASONING_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(url) = non_empty_env("AEROGUARD_REASONING_URL") {
            config.base_url = url;
        }
        if let Some(model) = non_empty_env("AEROGUARD_REASONING_MODEL") {
            config.model = model;
        }
        config.api_key = non_empty_env("AEROGUARD_REASONING_API_KEY");
        config
    }

    /// Set base URL (for hosted OpenAI-compatible endpoints)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the served model name
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the bearer token
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the per-fragment idle timeout
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Full URL of the streaming completions endpoint
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Configuration for the vision server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisionConfig {
    /// Base URL of the vision server
    pub server_url: String,
    /// Whole-request timeout for one frame
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_VISION_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl VisionConfig {
    /// Defaults overlaid with `AEROGUARD_VISION_URL`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(url) = non_empty_env("AEROGUARD_VISION_URL") {
            config.server_url = url;
        }
        config
    }

    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.server_url.trim_end_matches('/'), path)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}
