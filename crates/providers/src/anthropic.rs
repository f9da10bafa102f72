//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly.
//!
//! Features:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header, `anthropic-beta` opt-ins
//! - System prompt as a top-level block list (cache annotations preserved)
//! - Content blocks sent and received verbatim, including thinking signatures
//! - Extended thinking budget

use async_trait::async_trait;
use deskpilot_core::error::ProviderError;
use deskpilot_core::message::{ContentBlock, Message, TextBlock};
use deskpilot_core::provider::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider. `timeout` bounds each HTTP request.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_body(request: &ProviderRequest) -> AnthropicRequest<'_> {
        AnthropicRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            messages: &request.messages,
            system: &request.system,
            tools: Self::to_api_tools(&request.tools),
            thinking: request.thinking_budget.map(|budget_tokens| ThinkingConfig {
                kind: "enabled",
                budget_tokens,
            }),
        }
    }

    /// Convert tool definitions to Anthropic format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<AnthropicTool<'_>> {
        tools
            .iter()
            .map(|t| AnthropicTool {
                name: &t.name,
                description: &t.description,
                input_schema: &t.parameters,
            })
            .collect()
    }

    /// Map a non-success status to the error taxonomy.
    fn error_for_status(status: u16, retry_after: Option<u64>, body: &str) -> ProviderError {
        let message = serde_json::from_str::<AnthropicErrorBody>(body)
            .map(|b| b.error.message)
            .unwrap_or_else(|_| body.to_string());

        match status {
            429 => ProviderError::RateLimited {
                retry_after_secs: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
            },
            401 | 403 => ProviderError::AuthenticationFailed(message),
            400 | 413 | 422 => ProviderError::InvalidRequest(message),
            _ => ProviderError::ApiError {
                status_code: status,
                message,
            },
        }
    }

    /// Parse a success body. Unknown content block types are rejected.
    fn parse_response(body: &str) -> std::result::Result<ProviderResponse, ProviderError> {
        let resp: AnthropicResponse = serde_json::from_str(body)
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse Anthropic response: {e}")))?;

        // The API rejects empty text blocks when they are echoed back.
        let content = resp
            .content
            .into_iter()
            .filter(|block| !matches!(block, ContentBlock::Text(TextBlock { text, .. }) if text.is_empty()))
            .collect();

        Ok(ProviderResponse {
            id: resp.id,
            content,
            model: resp.model,
            stop_reason: resp.stop_reason,
            usage: Some(resp.usage),
        })
    }
}

#[async_trait]
impl deskpilot_core::Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = Self::build_body(&request);

        debug!(
            provider = "anthropic",
            model = %request.model,
            messages = request.messages.len(),
            betas = %request.betas.join(","),
            "Sending completion request"
        );

        let mut builder = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json");
        if !request.betas.is_empty() {
            builder = builder.header("anthropic-beta", request.betas.join(","));
        }

        let response = builder.json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !(200..300).contains(&status) {
            warn!(status, body = %text, "Anthropic API error");
            return Err(Self::error_for_status(status, retry_after, &text));
        }

        Self::parse_response(&text)
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "is_empty_slice")]
    system: &'a [TextBlock],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<ThinkingConfig>,
}

fn is_empty_slice<T>(slice: &&[T]) -> bool {
    slice.is_empty()
}

#[derive(Debug, Serialize)]
struct AnthropicTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ThinkingConfig {
    #[serde(rename = "type")]
    kind: &'static str,
    budget_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    id: String,
    model: String,
    content: Vec<ContentBlock>,
    usage: Usage,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskpilot_core::Provider;
    use deskpilot_core::message::CacheControl;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn provider() -> AnthropicProvider {
        AnthropicProvider::new("sk-ant-test", Duration::from_secs(5)).unwrap()
    }

    fn request() -> ProviderRequest {
        ProviderRequest {
            model: "claude-3-7-sonnet-20250219".into(),
            messages: vec![Message::user("Open the browser")],
            system: vec![TextBlock {
                text: "You are a desktop agent.".into(),
                cache_control: Some(CacheControl::Ephemeral),
            }],
            tools: vec![ToolDefinition {
                name: "computer".into(),
                description: "Control the screen".into(),
                parameters: json!({"type": "object", "properties": {"action": {"type": "string"}}}),
            }],
            max_tokens: 4096,
            thinking_budget: Some(1024),
            betas: vec!["computer-use-2025-01-24".into(), "prompt-caching-2024-07-31".into()],
        }
    }

    /// Serves one canned HTTP response and hands back the raw request.
    async fn serve_once(status_line: &str, extra_headers: &str, body: &str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\n{extra_headers}content-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(split) = text.find("\r\n\r\n") {
                    let length = text[..split]
                        .lines()
                        .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap()))
                        .unwrap_or(0);
                    if raw.len() >= split + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&raw).to_string()
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn constructor_with_base_url() {
        let provider = provider().with_base_url("https://custom.proxy.com/");
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.base_url, "https://custom.proxy.com");
    }

    #[test]
    fn body_carries_system_blocks_tools_and_thinking() {
        let req = request();
        let body = serde_json::to_value(AnthropicProvider::build_body(&req)).unwrap();

        assert_eq!(body["model"], "claude-3-7-sonnet-20250219");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["system"][0]["cache_control"], json!({"type": "ephemeral"}));
        assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
        assert_eq!(body["thinking"], json!({"type": "enabled", "budget_tokens": 1024}));
        assert_eq!(
            body["messages"][0],
            json!({"role": "user", "content": [{"type": "text", "text": "Open the browser"}]})
        );
    }

    #[test]
    fn body_omits_thinking_and_empty_lists() {
        let mut req = request();
        req.thinking_budget = None;
        req.tools.clear();
        req.system.clear();
        let body = serde_json::to_value(AnthropicProvider::build_body(&req)).unwrap();
        assert!(body.get("thinking").is_none());
        assert!(body.get("tools").is_none());
        assert!(body.get("system").is_none());
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            AnthropicProvider::error_for_status(429, Some(12), ""),
            ProviderError::RateLimited { retry_after_secs: 12 }
        ));
        assert!(matches!(
            AnthropicProvider::error_for_status(429, None, ""),
            ProviderError::RateLimited { retry_after_secs: DEFAULT_RETRY_AFTER_SECS }
        ));
        assert!(matches!(
            AnthropicProvider::error_for_status(401, None, ""),
            ProviderError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            AnthropicProvider::error_for_status(529, None, "overloaded"),
            ProviderError::ApiError { status_code: 529, .. }
        ));
    }

    #[test]
    fn error_body_message_is_extracted() {
        let body = r#"{"type":"error","error":{"type":"invalid_request_error","message":"max_tokens: too large"}}"#;
        match AnthropicProvider::error_for_status(400, None, body) {
            ProviderError::InvalidRequest(message) => assert_eq!(message, "max_tokens: too large"),
            other => panic!("Expected InvalidRequest, got: {other:?}"),
        }
    }

    #[test]
    fn parse_tool_use_response() {
        let pr = AnthropicProvider::parse_response(
            r#"{
                "id": "msg_02",
                "model": "claude-3-7-sonnet-20250219",
                "content": [
                    {"type": "thinking", "thinking": "Need a screenshot.", "signature": "EqQB"},
                    {"type": "text", "text": ""},
                    {"type": "tool_use", "id": "toolu_abc", "name": "computer", "input": {"action": "screenshot"}}
                ],
                "usage": {"input_tokens": 20, "output_tokens": 10, "cache_read_input_tokens": 7},
                "stop_reason": "tool_use"
            }"#,
        )
        .unwrap();

        assert_eq!(pr.content.len(), 2);
        assert!(matches!(&pr.content[0], ContentBlock::Thinking(t) if t.signature.as_deref() == Some("EqQB")));
        let tool_use = pr.content[1].as_tool_use().unwrap();
        assert_eq!(tool_use.id, "toolu_abc");
        assert_eq!(tool_use.input["action"], "screenshot");
        assert_eq!(pr.stop_reason.as_deref(), Some("tool_use"));
        assert_eq!(pr.usage.unwrap().cache_read_input_tokens, 7);
    }

    #[test]
    fn unknown_block_type_is_invalid_response() {
        let err = AnthropicProvider::parse_response(
            r#"{
                "id": "msg_03",
                "model": "m",
                "content": [{"type": "hologram"}],
                "usage": {"input_tokens": 1, "output_tokens": 1}
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn sends_headers_and_parses_reply() {
        let (base, server) = serve_once(
            "200 OK",
            "",
            r#"{"id":"msg_1","model":"claude-3-7-sonnet-20250219","content":[{"type":"text","text":"Done."}],"usage":{"input_tokens":3,"output_tokens":2},"stop_reason":"end_turn"}"#,
        )
        .await;

        let response = provider().with_base_url(base).complete(request()).await.unwrap();
        assert_eq!(response.id, "msg_1");
        assert_eq!(response.content, vec![ContentBlock::text("Done.")]);

        let raw = server.await.unwrap().to_ascii_lowercase();
        assert!(raw.starts_with("post /v1/messages"));
        assert!(raw.contains("x-api-key: sk-ant-test"));
        assert!(raw.contains("anthropic-version: 2023-06-01"));
        assert!(raw.contains("anthropic-beta: computer-use-2025-01-24,prompt-caching-2024-07-31"));
    }

    #[tokio::test]
    async fn rate_limit_reads_retry_after_header() {
        let (base, server) = serve_once(
            "429 Too Many Requests",
            "retry-after: 30\r\n",
            r#"{"type":"error","error":{"type":"rate_limit_error","message":"slow down"}}"#,
        )
        .await;

        let err = provider().with_base_url(base).complete(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { retry_after_secs: 30 }));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = provider()
            .with_base_url(format!("http://{addr}"))
            .complete(request())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), deskpilot_core::ProviderErrorKind::Transport);
    }
}
