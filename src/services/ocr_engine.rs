use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::{
    config::OcrEngineConfig,
    errors::{AppError, Result, UpstreamError},
    services::settings::SettingsStore,
};

/// One recognised region as reported by the engine. Geometry is fractional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineBox {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub right: f64,
    #[serde(default)]
    pub bottom: f64,
    #[serde(default)]
    pub rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineResult {
    #[serde(default)]
    pub imgpath: String,
    #[serde(default)]
    pub errcode: i64,
    #[serde(default)]
    pub width: i64,
    #[serde(default)]
    pub height: i64,
    #[serde(default)]
    pub ocr_response: Vec<EngineBox>,
}

#[derive(Serialize)]
struct EngineRequest<'a> {
    image: &'a str,
    compress: bool,
}

#[derive(Deserialize)]
struct EngineResponse {
    result: EngineResult,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Sends one base64 image to the engine. A non-zero `errcode` in the
    /// returned result is not treated as an error here.
    async fn recognize(&self, image_base64: &str) -> std::result::Result<EngineResult, UpstreamError>;
}

/// Engine reached over HTTP, with the endpoint looked up on every call so
/// admin changes apply immediately.
pub struct HttpOcrEngine {
    client: Client,
    settings: SettingsStore,
    defaults: OcrEngineConfig,
}

impl HttpOcrEngine {
    pub fn new(settings: SettingsStore, defaults: OcrEngineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(defaults.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            settings,
            defaults,
        })
    }
}

#[async_trait]
impl OcrEngine for HttpOcrEngine {
    async fn recognize(&self, image_base64: &str) -> std::result::Result<EngineResult, UpstreamError> {
        let endpoint = self.settings.engine_endpoint(&self.defaults).await;

        let mut request = self.client.post(&endpoint.url).json(&EngineRequest {
            image: image_base64,
            compress: true,
        });
        if let Some(token) = &endpoint.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        if status != StatusCode::OK {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let parsed: EngineResponse =
            serde_json::from_slice(&body).map_err(|e| UpstreamError::Protocol(e.to_string()))?;

        Ok(parsed.result)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::{database::Database, services::settings::ENGINE_TOKEN_KEY};

    async fn engine_for(server: &MockServer, token: Option<&str>) -> (HttpOcrEngine, SettingsStore) {
        let settings = SettingsStore::new(Database::in_memory().await.unwrap());
        let defaults = OcrEngineConfig {
            url: Some(format!("{}/ocr", server.uri())),
            token: token.map(str::to_string),
            timeout_secs: 5,
        };
        (HttpOcrEngine::new(settings.clone(), defaults).unwrap(), settings)
    }

    #[tokio::test]
    async fn test_parses_engine_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ocr"))
            .and(body_partial_json(json!({"image": "aGVsbG8=", "compress": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {
                    "imgpath": "/tmp/x.jpg",
                    "errcode": 0,
                    "width": 710,
                    "height": 72,
                    "ocr_response": [
                        {"text": "hello", "left": 5.5, "top": 13.2, "right": 696.7, "bottom": 45.5, "rate": 0.98}
                    ]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (engine, _) = engine_for(&server, None).await;
        let result = engine.recognize("aGVsbG8=").await.unwrap();

        assert_eq!(result.errcode, 0);
        assert_eq!(result.width, 710);
        assert_eq!(result.ocr_response.len(), 1);
        assert_eq!(result.ocr_response[0].text, "hello");
    }

    #[tokio::test]
    async fn test_sends_bearer_token_from_settings() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer stored-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {"errcode": 0}})))
            .expect(1)
            .mount(&server)
            .await;

        let (engine, settings) = engine_for(&server, Some("env-token")).await;
        settings.set(ENGINE_TOKEN_KEY, "stored-token").await.unwrap();

        assert!(engine.recognize("eA==").await.is_ok());
    }

    #[tokio::test]
    async fn test_non_200_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let (engine, _) = engine_for(&server, None).await;
        let err = engine.recognize("eA==").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Status(503)));
    }

    #[tokio::test]
    async fn test_unparsable_body_is_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let (engine, _) = engine_for(&server, None).await;
        let err = engine.recognize("eA==").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_unreachable_engine_is_transport_error() {
        let settings = SettingsStore::new(Database::in_memory().await.unwrap());
        let defaults = OcrEngineConfig {
            url: Some("http://127.0.0.1:1/ocr".to_string()),
            token: None,
            timeout_secs: 2,
        };
        let engine = HttpOcrEngine::new(settings, defaults).unwrap();

        let err = engine.recognize("eA==").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Transport(_)));
    }

    #[tokio::test]
    async fn test_slow_engine_times_out_as_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"result": {"errcode": 0}}))
                    .set_delay(std::time::Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let settings = SettingsStore::new(Database::in_memory().await.unwrap());
        let defaults = OcrEngineConfig {
            url: Some(format!("{}/ocr", server.uri())),
            token: None,
            timeout_secs: 1,
        };
        let engine = HttpOcrEngine::new(settings, defaults).unwrap();

        let started = std::time::Instant::now();
        let err = engine.recognize("eA==").await.unwrap_err();

        assert!(matches!(err, UpstreamError::Transport(_)));
        assert!(started.elapsed() < std::time::Duration::from_secs(3));
    }
}
