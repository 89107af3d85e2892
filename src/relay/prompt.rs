//! Prompt 模板

use serde::Serialize;

/// chat-completion 消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

/// 生成 system 指令，支持类型原样写入引号内
pub fn system_prompt(response_type: &str) -> String {
    format!(
        "You are a compassionate and motivational assistant. The user is feeling a certain way \
         and has requested a specific type of support. Your response should be concise, directly \
         address their feeling, and provide the requested support. The support type is: \"{}\".",
        response_type
    )
}

/// system + user 两轮消息，feeling 不做任何改写
pub fn build_messages(feeling: &str, response_type: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage {
            role: "system",
            content: system_prompt(response_type),
        },
        ChatMessage {
            role: "user",
            content: feeling.to_string(),
        },
    ]
}
