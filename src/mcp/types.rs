//! MCP 协议类型：错误、远程工具描述、tools/call 结果解包
//!
//! 传输层由 rmcp 负责；这里只保留桥接层与工具层共用的领域类型，rmcp 的模型在 client 中转换过来。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// MCP 传输 / 协议错误
#[derive(Error, Debug)]
pub enum McpError {
    #[error("no server endpoint configured")]
    MissingEndpoint,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("tool reported an error: {0}")]
    ToolError(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("connection closed")]
    Closed,
}

/// tools/list 返回的远程工具描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Option<Value>,
}

/// 拼接 tools/call 结果中所有 text 内容
pub fn content_text(result: &Value) -> Option<String> {
    let texts: Vec<&str> = result
        .get("content")?
        .as_array()?
        .iter()
        .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|item| item.get("text").and_then(Value::as_str))
        .collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    }
}

pub fn is_error_result(result: &Value) -> bool {
    result.get("isError").and_then(Value::as_bool) == Some(true)
}

/// isError 结果转为 ToolError，其余原样返回
pub fn check_call_result(result: Value) -> Result<Value, McpError> {
    if is_error_result(&result) {
        let text = content_text(&result).unwrap_or_else(|| "remote tool failed".to_string());
        return Err(McpError::ToolError(text));
    }
    Ok(result)
}

/// 解包工具返回的有效负载：优先 structuredContent，其次首个 text 内容（能解析为 JSON 则解析），
/// 都没有时原样返回
pub fn unwrap_tool_payload(result: &Value) -> Value {
    if let Some(structured) = result.get("structuredContent") {
        return structured.clone();
    }
    let first_text = result
        .get("content")
        .and_then(Value::as_array)
        .and_then(|items| {
            items
                .iter()
                .find(|item| item.get("type").and_then(Value::as_str) == Some("text"))
        })
        .and_then(|item| item.get("text"))
        .and_then(Value::as_str);
    match first_text {
        Some(text) => serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())),
        None => result.clone(),
    }
}
