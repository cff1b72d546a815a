//! OpenAI-compatible chat-completions client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Backend, ChatMessage, Generator, GeneratorConfig, GeneratorError};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_MODEL: &str = "gpt-4o";

/// Generator backed by a `/chat/completions` endpoint
pub struct ChatCompletionsGenerator {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl ChatCompletionsGenerator {
    pub fn new(api_key: Option<String>, model: String) -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            model,
        }
    }

    /// Build from a generator config, reading the API key from the configured
    /// environment variable (default `OPENAI_API_KEY`).
    pub fn from_config(config: GeneratorConfig) -> Self {
        let key_env = config
            .api_key_env
            .clone()
            .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string());
        let api_key = std::env::var(&key_env).ok().filter(|k| !k.is_empty());

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to build configured HTTP client, using defaults");
            Client::new()
        });

        Self {
            client,
            base_url: config
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            model: config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn parse_response(body: &str) -> Result<String, GeneratorError> {
        let parsed: ChatCompletionResponse = serde_json::from_str(body).map_err(|e| {
            GeneratorError::InvalidResponse(format!("Failed to parse response: {}", e))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GeneratorError::InvalidResponse("No choices in response".to_string()))?
            .message
            .content
            .ok_or_else(|| GeneratorError::InvalidResponse("Response has no content".to_string()))
    }
}

#[async_trait]
impl Generator for ChatCompletionsGenerator {
    fn name(&self) -> &str {
        "OpenAI"
    }

    fn backend(&self) -> Backend {
        Backend::ChatCompletions
    }

    fn model(&self) -> Option<&str> {
        Some(&self.model)
    }

    async fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn get_response(&self, messages: &[ChatMessage]) -> Result<String, GeneratorError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| GeneratorError::ConfigError("No API key configured".to_string()))?;

        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
        };

        debug!(
            model = %self.model,
            messages = messages.len(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeneratorError::Network(format!("Request timeout: {}", e))
                } else if e.is_connect() {
                    GeneratorError::Network(format!("Connection failed: {}", e))
                } else {
                    GeneratorError::Network(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(GeneratorError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Self::parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one connection with a fixed raw HTTP response, after reading the
    /// whole request. Returns the base URL to point the generator at.
    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request_complete(&request) {
                    break;
                }
            }
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        });

        format!("http://{}/v1", addr)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        request.len() >= header_end + 4 + content_length
    }

    #[test]
    fn test_request_body_shape() {
        let messages = vec![ChatMessage::system("s"), ChatMessage::user("u")];
        let request = ChatCompletionRequest {
            model: "o3-mini",
            messages: &messages,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "o3-mini",
                "messages": [
                    {"role": "system", "content": "s"},
                    {"role": "user", "content": "u"}
                ]
            })
        );
    }

    #[test]
    fn test_parse_response_takes_first_choice() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"hello"}},{"index":1,"message":{"role":"assistant","content":"other"}}]}"#;
        assert_eq!(ChatCompletionsGenerator::parse_response(body).unwrap(), "hello");
    }

    #[test]
    fn test_parse_response_errors() {
        assert!(matches!(
            ChatCompletionsGenerator::parse_response(r#"{"choices":[]}"#),
            Err(GeneratorError::InvalidResponse(_))
        ));
        assert!(matches!(
            ChatCompletionsGenerator::parse_response(
                r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#
            ),
            Err(GeneratorError::InvalidResponse(_))
        ));
        assert!(matches!(
            ChatCompletionsGenerator::parse_response("not json"),
            Err(GeneratorError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let generator = ChatCompletionsGenerator::new(None, "gpt-4o".to_string())
            .with_base_url("http://localhost:8080/v1/".to_string());
        assert_eq!(generator.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let generator = ChatCompletionsGenerator::new(None, "gpt-4o".to_string());
        assert!(!generator.is_available().await);

        let err = generator
            .get_response(&[ChatMessage::user("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, GeneratorError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_non_success_status_is_api_error() {
        let base_url = serve_once(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Type: text/plain\r\nContent-Length: 10\r\nConnection: close\r\n\r\noverloaded",
        )
        .await;
        let generator =
            ChatCompletionsGenerator::new(Some("test-key".to_string()), "gpt-4o".to_string())
                .with_base_url(base_url);

        let err = generator
            .get_response(&[ChatMessage::user("hi")])
            .await
            .unwrap_err();
        match err {
            GeneratorError::Api { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "overloaded");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_success_returns_content() {
        let base_url = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 45\r\nConnection: close\r\n\r\n{\"choices\":[{\"message\":{\"content\":\"n + 1\"}}]}",
        )
        .await;
        let generator =
            ChatCompletionsGenerator::new(Some("test-key".to_string()), "gpt-4o".to_string())
                .with_base_url(base_url);

        let response = generator
            .get_response(&[ChatMessage::user("hi")])
            .await
            .unwrap();
        assert_eq!(response, "n + 1");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        // Bind then drop so nothing listens on the port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let generator =
            ChatCompletionsGenerator::new(Some("test-key".to_string()), "gpt-4o".to_string())
                .with_base_url(format!("http://{}/v1", addr));

        let err = generator
            .get_response(&[ChatMessage::user("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, GeneratorError::Network(_)), "got {err:?}");
    }
}
