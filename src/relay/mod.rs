//! Completion relay
//!
//! 校验请求 → 构造 prompt → 调用上游 chat-completion → 映射结果。
//! 每个请求只发起一次上游调用，不重试。

pub mod client;
pub mod error;
pub mod prompt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use client::ChatCompletionClient;
pub use error::RelayError;
pub use prompt::ChatMessage;

use crate::config::UpstreamConfig;

/// POST /motivate 请求体
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotivationRequest {
    pub feeling: Option<String>,
    pub response_type: Option<String>,
}

/// 通过校验的请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub feeling: String,
    pub response_type: String,
}

impl MotivationRequest {
    /// 两个字段都必须存在且非空
    pub fn validate(self) -> Result<ValidatedRequest, RelayError> {
        match (self.feeling, self.response_type) {
            (Some(feeling), Some(response_type))
                if !feeling.is_empty() && !response_type.is_empty() =>
            {
                Ok(ValidatedRequest {
                    feeling,
                    response_type,
                })
            }
            _ => Err(RelayError::MissingField),
        }
    }
}

/// POST /motivate 成功响应体
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MotivationResult {
    pub motivation: String,
}

/// 发往上游的 chat-completion 请求体
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// 上游 chat-completion 服务的统一接口
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// 发送一次请求，返回 `choices[0].message.content`
    async fn complete(
        &self,
        api_key: &str,
        request: &ChatCompletionRequest,
    ) -> Result<String, RelayError>;
}

/// 模型生成参数
#[derive(Debug, Clone)]
struct Generation {
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

pub struct Relay {
    api_key: Option<String>,
    generation: Generation,
    backend: Arc<dyn CompletionBackend>,
}

impl Relay {
    pub fn new(
        api_key: Option<String>,
        upstream: &UpstreamConfig,
        backend: Arc<dyn CompletionBackend>,
    ) -> Self {
        Self {
            api_key,
            generation: Generation {
                model: upstream.model.clone(),
                temperature: upstream.temperature,
                max_tokens: upstream.max_tokens,
            },
            backend,
        }
    }

    /// 是否已配置上游密钥（不暴露密钥本身）
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn build_request(&self, request: &ValidatedRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.generation.model.clone(),
            messages: prompt::build_messages(&request.feeling, &request.response_type),
            temperature: self.generation.temperature,
            max_tokens: self.generation.max_tokens,
        }
    }

    /// 处理一次 /motivate 请求
    ///
    /// 密钥缺失或字段校验失败时直接返回，不会调用上游
    pub async fn motivate(
        &self,
        request: MotivationRequest,
    ) -> Result<MotivationResult, RelayError> {
        let api_key = self.api_key.as_deref().ok_or(RelayError::MissingApiKey)?;
        let validated = request.validate()?;
        let completion = self.build_request(&validated);

        tracing::info!(
            model = %completion.model,
            response_type = %validated.response_type,
            "request"
        );

        let start = std::time::Instant::now();
        let motivation = self.backend.complete(api_key, &completion).await?;

        tracing::info!(
            model = %completion.model,
            latency_ms = start.elapsed().as_millis() as u64,
            chars = motivation.len(),
            "response"
        );

        Ok(MotivationResult { motivation })
    }
}
