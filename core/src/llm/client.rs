//! Ollama-compatible HTTP client
//!
//! - `POST /api/generate` for single prompts
//! - `GET /api/tags` as the reachability check

use super::SecondaryModel;
use crate::config::SecondaryConfig;
use crate::error::{AniError, Result};
use crate::{debug_log, error_log, trace_log};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct OllamaClient {
    base_url: String,
    model: String,
    system_prompt: Option<String>,
    timeout: Duration,
    connect_timeout: Duration,
    http_client: HttpClient,
}

impl OllamaClient {
    pub fn new(config: &SecondaryConfig) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(concat!("ani/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AniError::SecondaryModel {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            base_url: config.base_url(),
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone().filter(|p| !p.trim().is_empty()),
            timeout: config.timeout(),
            connect_timeout: config.connect_timeout(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub async fn generate_with_system(&self, prompt: &str, system: Option<&str>) -> Result<String> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            system,
        };
        debug_log!(
            "OllamaClient::generate: model={} prompt_len={}",
            self.model,
            prompt.len()
        );
        let response: GenerateResponse = self.post_json("/api/generate", &body).await?;
        Ok(response.response)
    }

    /// Names of the models the server has pulled
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .http_client
            .get(self.url("/api/tags"))
            .timeout(self.connect_timeout)
            .send()
            .await
            .map_err(|e| self.send_error(e, self.connect_timeout))?;
        let tags: TagsResponse = self.read_json(response).await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .http_client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| self.send_error(e, self.timeout))?;
        self.read_json(response).await
    }

    async fn read_json<R: DeserializeOwned>(&self, response: reqwest::Response) -> Result<R> {
        let status = response.status();
        let text = response.text().await.map_err(|e| self.send_error(e, self.timeout))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.error)
                .unwrap_or_else(|_| text.trim().to_string());
            error_log!("Secondary model returned {}: {}", status, message);
            return Err(AniError::SecondaryModelStatus {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            error_log!("Failed to parse secondary model response: {}. Raw body: {}", e, text);
            AniError::SecondaryModel {
                message: format!("Failed to parse response: {}", e),
            }
        })
    }

    fn send_error(&self, err: reqwest::Error, budget: Duration) -> AniError {
        if err.is_timeout() {
            return AniError::SecondaryModelTimeout { duration: budget };
        }
        error_log!("Secondary model request to {} failed: {}", self.base_url, err);
        AniError::from(err)
    }
}

#[async_trait]
impl SecondaryModel for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system(prompt, self.system_prompt.as_deref())
            .await
    }

    async fn test_connection(&self) -> bool {
        match self.list_models().await {
            Ok(models) => {
                trace_log!("Secondary model reachable, {} models", models.len());
                true
            }
            Err(e) => {
                debug_log!("Secondary model connection test failed: {}", e);
                false
            }
        }
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve one canned HTTP response and hand back the raw request.
    async fn serve_once(status: &'static str, body: &'static str) -> (SecondaryConfig, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).to_string()
        });

        let config = SecondaryConfig {
            host: "127.0.0.1".to_string(),
            port,
            model: "gemma3n:e4b".to_string(),
            timeout_secs: 5,
            connect_timeout_secs: 2,
            system_prompt: None,
        };
        (config, handle)
    }

    #[test]
    fn generate_request_omits_absent_system_prompt() {
        let body = GenerateRequest {
            model: "m",
            prompt: "hi",
            stream: false,
            system: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"model": "m", "prompt": "hi", "stream": false}));
    }

    #[tokio::test]
    async fn generate_returns_response_text() {
        let (mut config, server) =
            serve_once("200 OK", r#"{"model":"gemma3n:e4b","response":"Hello there","done":true}"#).await;
        config.system_prompt = Some("Be brief.".to_string());
        let client = OllamaClient::new(&config).unwrap();

        let reply = client.generate("Say hello").await.unwrap();
        assert_eq!(reply, "Hello there");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/generate"));
        assert!(request.contains(r#""prompt":"Say hello""#));
        assert!(request.contains(r#""stream":false"#));
        assert!(request.contains(r#""system":"Be brief.""#));
    }

    #[tokio::test]
    async fn non_success_status_is_surfaced() {
        let (config, _server) =
            serve_once("404 Not Found", r#"{"error":"model 'nope' not found"}"#).await;
        let client = OllamaClient::new(&config).unwrap();

        match client.generate("hello").await {
            Err(AniError::SecondaryModelStatus { status, message }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "model 'nope' not found");
            }
            other => panic!("expected SecondaryModelStatus, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn connection_test_lists_tags() {
        let (config, server) = serve_once(
            "200 OK",
            r#"{"models":[{"name":"gemma3n:e4b"},{"name":"llama3:8b"}]}"#,
        )
        .await;
        let client = OllamaClient::new(&config).unwrap();

        assert!(client.test_connection().await);
        assert!(server.await.unwrap().starts_with("GET /api/tags"));
    }

    #[tokio::test]
    async fn unreachable_server_is_an_error_not_a_panic() {
        // Bind then drop so nothing is listening on the port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = SecondaryConfig {
            host: "127.0.0.1".to_string(),
            port,
            timeout_secs: 2,
            connect_timeout_secs: 1,
            ..SecondaryConfig::default()
        };
        let client = OllamaClient::new(&config).unwrap();

        assert!(!client.test_connection().await);
        let err = client.generate("hello").await.unwrap_err();
        assert!(err.is_secondary_model(), "{:?}", err);
    }
}
