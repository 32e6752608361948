//! # Vision Client
//!
//! HTTP client for the hazard-segmentation server. Uploads one frame,
//! gets back an annotated image and a [`HazardStats`] record.
//!
//! The model itself runs elsewhere; this is plumbing only.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dispatch::observation::HazardStats;
use crate::models::VisionConfig;

/// Failures talking to the vision server
#[derive(Debug, Clone, Error, PartialEq)]
pub enum VisionError {
    #[error("cannot reach vision server at {url}: {reason}")]
    Connection { url: String, reason: String },

    #[error("vision server took longer than {timeout:?} to respond")]
    Timeout { timeout: Duration },

    #[error("vision server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("invalid vision response: {reason}")]
    InvalidResponse { reason: String },

    #[error("cannot decode annotated image: {reason}")]
    Decode { reason: String },
}

impl VisionError {
    fn from_transport(err: &reqwest::Error, url: &str, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout { timeout }
        } else {
            Self::Connection {
                url: url.to_string(),
                reason: err.to_string(),
            }
        }
    }

    fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }
}

/// Result of analyzing one frame
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FrameAnalysis {
    /// Annotated image as returned by the server (JPEG/PNG bytes)
    #[serde(skip)]
    pub annotated_image: Vec<u8>,
    pub stats: HazardStats,
}

/// Client for `/analyze_frame_fast` and `/health`
#[derive(Debug, Clone)]
pub struct VisionClient {
    config: VisionConfig,
    http_client: reqwest::Client,
}

impl VisionClient {
    pub fn new(config: VisionConfig) -> Result<Self, VisionError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VisionError::Connection {
                url: config.server_url.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    /// Upload a raw frame and return the annotated image plus stats
    pub async fn analyze_frame(&self, frame: Vec<u8>) -> Result<FrameAnalysis, VisionError> {
        let url = self.config.endpoint("/analyze_frame_fast");
        info!(url = %url, bytes = frame.len(), "Sending frame to vision server");

        let form = Form::new().part("file", Part::bytes(frame).file_name("frame.jpg"));
        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| VisionError::from_transport(&e, &url, self.config.timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| VisionError::from_transport(&e, &url, self.config.timeout))?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(body);
            warn!(status = status.as_u16(), %message, "Vision server rejected frame");
            return Err(VisionError::Server {
                status: status.as_u16(),
                message,
            });
        }

        parse_analysis(&body)
    }

    /// True when the server answers `/health` with a success status
    pub async fn health(&self) -> bool {
        let url = self.config.endpoint("/health");
        match self.http_client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Vision health check failed");
                false
            }
        }
    }
}

fn parse_analysis(body: &str) -> Result<FrameAnalysis, VisionError> {
    let data: Value =
        serde_json::from_str(body).map_err(|e| VisionError::invalid(format!("not JSON: {e}")))?;

    let keys = || {
        data.as_object()
            .map(|o| o.keys().cloned().collect::<Vec<_>>().join(", "))
            .unwrap_or_default()
    };

    let encoded = data
        .get("image_base64")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            VisionError::invalid(format!("missing 'image_base64' (keys: {})", keys()))
        })?;
    let stats = data
        .get("stats")
        .ok_or_else(|| VisionError::invalid(format!("missing 'stats' (keys: {})", keys())))?;

    let annotated_image = STANDARD.decode(encoded).map_err(|e| VisionError::Decode {
        reason: e.to_string(),
    })?;
    let stats: HazardStats = serde_json::from_value(stats.clone())
        .map_err(|e| VisionError::invalid(format!("bad stats record: {e}")))?;

    Ok(FrameAnalysis {
        annotated_image,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> VisionClient {
        VisionClient::new(VisionConfig::default().with_server_url(server.uri())).unwrap()
    }

    #[tokio::test]
    async fn test_analyze_frame_decodes_image_and_stats() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze_frame_fast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "image_base64": STANDARD.encode(b"annotated"),
                "stats": {
                    "hazard_type": "flood",
                    "coverage_pct": 47.2,
                    "mask_count": 6,
                    "hazard_confidence": 0.88
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let analysis = client_for(&server)
            .await
            .analyze_frame(b"raw-frame".to_vec())
            .await
            .unwrap();

        assert_eq!(analysis.annotated_image, b"annotated");
        assert_eq!(analysis.stats.hazard_type, "flood");
        assert_eq!(analysis.stats.mask_count, 6);
        assert_eq!(analysis.stats.hazard_confidence, Some(0.88));
    }

    #[tokio::test]
    async fn test_server_error_uses_error_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({ "error": "model not loaded" })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .analyze_frame(vec![0u8; 4])
            .await
            .unwrap_err();

        assert_eq!(
            err,
            VisionError::Server {
                status: 500,
                message: "model not loaded".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_stats_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "image_base64": STANDARD.encode(b"x") })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .analyze_frame(vec![1, 2, 3])
            .await
            .unwrap_err();

        match err {
            VisionError::InvalidResponse { reason } => {
                assert!(reason.contains("stats"));
                assert!(reason.contains("image_base64"));
            }
            other => panic!("expected invalid response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sub_second_timeout_is_reported_precisely() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;
        let config = VisionConfig {
            timeout: Duration::from_millis(200),
            ..VisionConfig::default().with_server_url(server.uri())
        };

        let err = VisionClient::new(config)
            .unwrap()
            .analyze_frame(vec![1, 2, 3])
            .await
            .unwrap_err();

        assert_eq!(
            err,
            VisionError::Timeout {
                timeout: Duration::from_millis(200)
            }
        );
        assert_eq!(
            err.to_string(),
            "vision server took longer than 200ms to respond"
        );
    }

    #[test]
    fn test_bad_base64_is_decode_error() {
        let body = json!({
            "image_base64": "***not base64***",
            "stats": { "hazard_type": "fire", "coverage_pct": 10, "mask_count": 1 }
        })
        .to_string();

        assert!(matches!(
            parse_analysis(&body),
            Err(VisionError::Decode { .. })
        ));
    }

    #[tokio::test]
    async fn test_health() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
            .mount(&server)
            .await;

        assert!(client_for(&server).await.health().await);

        let offline =
            VisionClient::new(VisionConfig::default().with_server_url("http://127.0.0.1:9"))
                .unwrap();
        assert!(!offline.health().await);
    }
}
