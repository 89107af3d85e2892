//! Motivate API 处理器

use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    Json,
};

use crate::gateway::state::AppState;
use crate::relay::MotivationRequest;

/// POST /motivate 处理器
///
/// 无法解析的请求体按两个字段都缺失处理，仍然先检查密钥
pub async fn handle_motivate(
    State(state): State<AppState>,
    payload: Result<Json<MotivationRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!("unusable request body: {}", rejection.body_text());
            MotivationRequest::default()
        }
    };

    match state.relay().motivate(request).await {
        Ok(result) => Json(result).into_response(),
        Err(err) => err.into_response(),
    }
}
