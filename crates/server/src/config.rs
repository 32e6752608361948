//! Persisted service overrides in `.aeroguard/config.json`.

use aeroguard_core::models::{ReasoningConfig, VisionConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use utoipa::ToSchema;

const CONFIG_PATH: &str = ".aeroguard/config.json";

/// Persisted configuration (subset of the service configs exposed to the API)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, ToSchema)]
pub struct PersistedConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vision_url: Option<String>,
}

impl PersistedConfig {
    pub async fn load() -> Self {
        Self::load_from(CONFIG_PATH).await
    }

    pub async fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if path.exists() {
            match tokio::fs::read_to_string(path).await {
                Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
                Err(_) => Self::default(),
            }
        } else {
            Self::default()
        }
    }

    pub async fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(CONFIG_PATH).await
    }

    pub async fn save_to(&self, path: impl AsRef<Path>) -> Result<(), std::io::Error> {
        let path = PathBuf::from(path.as_ref());
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        tokio::fs::write(&path, content).await
    }

    pub fn merge(&mut self, other: PersistedConfig) {
        if other.reasoning_url.is_some() {
            self.reasoning_url = other.reasoning_url;
        }
        if other.reasoning_model.is_some() {
            self.reasoning_model = other.reasoning_model;
        }
        if other.temperature.is_some() {
            self.temperature = other.temperature;
        }
        if other.idle_timeout_secs.is_some() {
            self.idle_timeout_secs = other.idle_timeout_secs;
        }
        if other.vision_url.is_some() {
            self.vision_url = other.vision_url;
        }
    }

    /// Reject overrides no client could run with
    pub fn validate(&self) -> Result<(), String> {
        if self.idle_timeout_secs == Some(0) {
            return Err("idle_timeout_secs must be at least 1".to_string());
        }
        Ok(())
    }

    /// Environment defaults with persisted overrides applied
    pub fn reasoning_config(&self) -> ReasoningConfig {
        let mut config = ReasoningConfig::from_env();
        if let Some(url) = &self.reasoning_url {
            config = config.with_base_url(url);
        }
        if let Some(model) = &self.reasoning_model {
            config = config.with_model(model);
        }
        if let Some(temperature) = self.temperature {
            config.temperature = temperature;
        }
        if let Some(secs) = self.idle_timeout_secs {
            config = config.with_idle_timeout(std::time::Duration::from_secs(secs));
        }
        config
    }

    pub fn vision_config(&self) -> VisionConfig {
        let config = VisionConfig::from_env();
        match &self.vision_url {
            Some(url) => config.with_server_url(url),
            None => config,
        }
    }
}

/// Built-in values shown next to the overrides
#[derive(Debug, Serialize, ToSchema)]
pub struct ConfigDefaults {
    pub reasoning_url: String,
    pub reasoning_model: String,
    pub vision_url: String,
}

impl Default for ConfigDefaults {
    fn default() -> Self {
        Self {
            reasoning_url: aeroguard_core::models::DEFAULT_REASONING_URL.to_string(),
            reasoning_model: aeroguard_core::models::DEFAULT_REASONING_MODEL.to_string(),
            vision_url: aeroguard_core::models::DEFAULT_VISION_URL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_only_overrides_present_fields() {
        let mut config = PersistedConfig {
            reasoning_url: Some("http://gpu:8000/v1".to_string()),
            vision_url: Some("http://jetson:9000".to_string()),
            ..Default::default()
        };
        config.merge(PersistedConfig {
            reasoning_model: Some("qwq".to_string()),
            vision_url: Some("http://edge:9000".to_string()),
            ..Default::default()
        });

        assert_eq!(config.reasoning_url.as_deref(), Some("http://gpu:8000/v1"));
        assert_eq!(config.reasoning_model.as_deref(), Some("qwq"));
        assert_eq!(config.vision_url.as_deref(), Some("http://edge:9000"));
    }

    #[test]
    fn test_zero_idle_timeout_is_rejected() {
        let zero = PersistedConfig {
            idle_timeout_secs: Some(0),
            ..Default::default()
        };
        assert!(zero.validate().unwrap_err().contains("idle_timeout_secs"));

        let one = PersistedConfig {
            idle_timeout_secs: Some(1),
            ..Default::default()
        };
        assert!(one.validate().is_ok());
        assert!(PersistedConfig::default().validate().is_ok());
    }

    #[test]
    fn test_overrides_reach_service_configs() {
        let config = PersistedConfig {
            reasoning_model: Some("qwq".to_string()),
            idle_timeout_secs: Some(5),
            vision_url: Some("http://edge:9000".to_string()),
            ..Default::default()
        };
        let reasoning = config.reasoning_config();
        assert_eq!(reasoning.model, "qwq");
        assert_eq!(reasoning.idle_timeout, std::time::Duration::from_secs(5));
        assert_eq!(config.vision_config().server_url, "http://edge:9000");
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".aeroguard/config.json");
        let config = PersistedConfig {
            temperature: Some(0.3),
            ..Default::default()
        };

        config.save_to(&path).await.unwrap();
        assert_eq!(PersistedConfig::load_from(&path).await, config);
        assert_eq!(
            PersistedConfig::load_from(dir.path().join("missing.json")).await,
            PersistedConfig::default()
        );
    }
}
