//! 上游 chat-completion HTTP 客户端
//!
//! OpenAI 兼容协议（Fireworks 等），Bearer token 认证。

use anyhow::{Context, Result};
use async_trait::async_trait;
use http::{header, HeaderMap, HeaderValue};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::config::UpstreamConfig;
use crate::relay::{ChatCompletionRequest, CompletionBackend, RelayError};

pub struct ChatCompletionClient {
    client: Client,
    endpoint: String,
}

impl ChatCompletionClient {
    pub fn new(upstream: &UpstreamConfig) -> Result<Self> {
        Self::with_timeout(&upstream.base_url, upstream.timeout())
    }

    /// 指定端点和整体请求超时（连接 + 等待响应）
    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent())
            .build()
            .context("Failed to create chat-completion HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

fn user_agent() -> String {
    format!("uplift/{}", env!("CARGO_PKG_VERSION"))
}

fn build_headers(api_key: &str) -> Result<HeaderMap, RelayError> {
    let mut map = HeaderMap::new();

    let auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
        .map_err(|e| RelayError::RequestConstruction(format!("invalid API key header: {}", e)))?;
    map.insert(header::AUTHORIZATION, auth);
    map.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    map.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

    Ok(map)
}

/// 发送阶段的错误：构造失败 vs. 已发出但无响应
fn classify_send_error(err: reqwest::Error) -> RelayError {
    if err.is_builder() {
        RelayError::RequestConstruction(err.to_string())
    } else {
        RelayError::UpstreamUnreachable(err)
    }
}

/// 提取第一个 choice 的消息内容
fn extract_content(body: &Value) -> Option<String> {
    body.pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[async_trait]
impl CompletionBackend for ChatCompletionClient {
    async fn complete(
        &self,
        api_key: &str,
        request: &ChatCompletionRequest,
    ) -> Result<String, RelayError> {
        let headers = build_headers(api_key)?;

        let response = self
            .client
            .post(&self.endpoint)
            .headers(headers)
            .json(request)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            tracing::error!(
                status = status.as_u16(),
                body = %error_body,
                "chat-completion API error"
            );
            return Err(RelayError::from_upstream_status(
                status.as_u16(),
                &error_body,
            ));
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => return Err(RelayError::UpstreamUnreachable(e)),
            Err(e) => {
                tracing::error!("Failed to parse chat-completion response: {}", e);
                return Err(RelayError::MalformedResponse);
            }
        };

        extract_content(&body).ok_or_else(|| {
            tracing::error!(body = %body, "chat-completion response has no message content");
            RelayError::MalformedResponse
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::prompt::build_messages;
    use serde_json::json;
    use std::time::Instant;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const COMPLETIONS_PATH: &str = "/inference/v1/chat/completions";

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "accounts/test/models/tiny".to_string(),
            messages: build_messages("nervous", "a calm reminder"),
            temperature: 0.7,
            max_tokens: Some(200),
        }
    }

    fn client_for(server: &MockServer, timeout: Duration) -> ChatCompletionClient {
        let endpoint = format!("{}{}", server.uri(), COMPLETIONS_PATH);
        ChatCompletionClient::with_timeout(&endpoint, timeout).unwrap()
    }

    async fn respond_with(template: ResponseTemplate) -> (MockServer, ChatCompletionClient) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(COMPLETIONS_PATH))
            .respond_with(template)
            .expect(1)
            .mount(&server)
            .await;
        let client = client_for(&server, Duration::from_secs(5));
        (server, client)
    }

    #[tokio::test]
    async fn sends_bearer_key_and_generation_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(COMPLETIONS_PATH))
            .and(header("authorization", "Bearer fw-test-key"))
            .and(header("content-type", "application/json"))
            .and(body_partial_json(json!({
                "model": "accounts/test/models/tiny",
                "temperature": 0.7,
                "max_tokens": 200,
                "messages": [
                    { "role": "system" },
                    { "role": "user", "content": "nervous" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "You are ready." } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(5));
        let content = client.complete("fw-test-key", &request()).await.unwrap();
        assert_eq!(content, "You are ready.");
    }

    #[tokio::test]
    async fn status_codes_map_to_taxonomy_messages() {
        let cases: [(u16, &str); 4] = [
            (401, "Authentication failed. Please check your API key."),
            (
                403,
                "Access forbidden. Please check your billing status or API permissions.",
            ),
            (404, "The requested model is not available."),
            (429, "Rate limit exceeded. Please try again later."),
        ];

        for (status, message) in cases {
            let (_server, client) = respond_with(
                ResponseTemplate::new(status)
                    .set_body_json(json!({ "error": { "message": "upstream says no" } })),
            )
            .await;
            let err = client.complete("key", &request()).await.unwrap_err();
            assert_eq!(err.to_string(), message, "status {status}");
        }
    }

    #[tokio::test]
    async fn other_status_includes_status_and_error_message() {
        let (_server, client) = respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({ "error": { "message": "internal failure" } })),
        )
        .await;

        let err = client.complete("key", &request()).await.unwrap_err();
        assert!(matches!(err, RelayError::UpstreamOther { status: 500, .. }));
        assert_eq!(err.to_string(), "API error (500): internal failure");
    }

    #[tokio::test]
    async fn missing_content_is_a_malformed_response() {
        let (_server, client) =
            respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] }))).await;

        let err = client.complete("key", &request()).await.unwrap_err();
        assert!(matches!(err, RelayError::MalformedResponse));
    }

    #[tokio::test]
    async fn non_json_success_body_is_a_malformed_response() {
        let (_server, client) =
            respond_with(ResponseTemplate::new(200).set_body_string("not json")).await;

        let err = client.complete("key", &request()).await.unwrap_err();
        assert!(matches!(err, RelayError::MalformedResponse));
    }

    #[tokio::test]
    async fn slow_upstream_times_out_as_no_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "choices": [{ "message": { "content": "late" } }] }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_millis(200));
        let start = Instant::now();
        let err = client.complete("key", &request()).await.unwrap_err();

        assert!(matches!(err, RelayError::UpstreamUnreachable(_)));
        assert_eq!(
            err.to_string(),
            "No response from the AI service. Please try again."
        );
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn unreachable_host_is_no_response() {
        // 绑定后立即释放端口，保证连接被拒绝
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let endpoint = format!("http://{}{}", addr, COMPLETIONS_PATH);
        let client = ChatCompletionClient::with_timeout(&endpoint, Duration::from_secs(2)).unwrap();
        let err = client.complete("key", &request()).await.unwrap_err();
        assert!(matches!(err, RelayError::UpstreamUnreachable(_)));
    }

    #[tokio::test]
    async fn invalid_key_header_fails_before_sending() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(5));
        let err = client.complete("bad\nkey", &request()).await.unwrap_err();

        assert!(matches!(err, RelayError::RequestConstruction(_)));
        assert!(err.to_string().starts_with("Request setup error: "));
    }

    #[tokio::test]
    async fn invalid_endpoint_is_a_setup_error() {
        let client =
            ChatCompletionClient::with_timeout("not a url", Duration::from_secs(1)).unwrap();
        let err = client.complete("key", &request()).await.unwrap_err();
        assert!(matches!(err, RelayError::RequestConstruction(_)));
    }
}
