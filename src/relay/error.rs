//! Relay 错误分类
//!
//! 每个变体的 `Display` 即返回给调用方的固定文案；上游原始响应体只写日志。

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    /// 未配置上游密钥，不发起任何网络请求
    #[error("API key not found.")]
    MissingApiKey,

    /// 请求缺少 feeling 或 responseType
    #[error("Feeling and response type are required.")]
    MissingField,

    #[error("Authentication failed. Please check your API key.")]
    UpstreamAuth,

    #[error("Access forbidden. Please check your billing status or API permissions.")]
    UpstreamForbidden,

    #[error("The requested model is not available.")]
    UpstreamNotFound,

    #[error("Rate limit exceeded. Please try again later.")]
    UpstreamRateLimited,

    /// 其他非 2xx 状态码，`detail` 取自上游 JSON 中的 error 信息
    #[error("{}", other_message(.status, .detail))]
    UpstreamOther { status: u16, detail: Option<String> },

    /// 请求已发出但没有收到响应（连接失败或超时）
    #[error("No response from the AI service. Please try again.")]
    UpstreamUnreachable(#[source] reqwest::Error),

    /// 请求在发出之前就无法构造
    #[error("Request setup error: {0}")]
    RequestConstruction(String),

    /// 上游返回成功，但缺少 choices[0].message.content
    #[error("Failed to get a motivational response.")]
    MalformedResponse,
}

fn other_message(status: &u16, detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!("API error ({}): {}", status, detail),
        None => format!("API error ({})", status),
    }
}

impl RelayError {
    /// 根据上游非成功状态码和响应体构造错误
    pub fn from_upstream_status(status: u16, body: &str) -> Self {
        match status {
            401 => Self::UpstreamAuth,
            403 => Self::UpstreamForbidden,
            404 => Self::UpstreamNotFound,
            429 => Self::UpstreamRateLimited,
            _ => Self::UpstreamOther {
                status,
                detail: extract_error_detail(body),
            },
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingField => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// 从上游错误体中提取 `error.message` 或字符串形式的 `error`
fn extract_error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    error
        .get("message")
        .and_then(|m| m.as_str())
        .or_else(|| error.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            Self::MissingField => tracing::debug!("rejected: {}", self),
            Self::UpstreamUnreachable(source) => {
                tracing::error!(error = %source, "upstream unreachable")
            }
            _ => tracing::warn!(status = status.as_u16(), "relay failed: {}", self),
        }

        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
