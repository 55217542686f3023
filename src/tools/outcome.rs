//! 工具结果信封
//!
//! 所有工具（本地与远程）都返回 ToolOutcome，失败也是数据而不是 Err；
//! 序列化为 `{"status": "completed" | "error", "result": ...}` 后作为 tool 消息写入历史。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{Task, TaskState};
use crate::mcp::unwrap_tool_payload;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// 原始错误描述
    pub error: String,
    /// 面向用户的提示
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "result", rename_all = "lowercase")]
pub enum ToolOutcome {
    Completed(Value),
    Error(ErrorDetail),
}

impl ToolOutcome {
    pub fn completed(value: Value) -> Self {
        ToolOutcome::Completed(value)
    }

    pub fn error(error: impl Into<String>, message: impl Into<String>) -> Self {
        ToolOutcome::Error(ErrorDetail {
            error: error.into(),
            message: message.into(),
        })
    }

    /// 工具执行失败的统一提示
    pub fn failed_to_execute(tool: &str, error: impl Into<String>) -> Self {
        Self::error(
            error,
            format!("Failed to execute {tool}. Please try again later."),
        )
    }

    /// 本地工具直接产出的 Task
    pub fn task(task: &Task) -> Self {
        match serde_json::to_value(task) {
            Ok(v) => ToolOutcome::Completed(v),
            Err(e) => Self::error(e.to_string(), "Failed to serialize task result."),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolOutcome::Error(_))
    }

    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"status":"error","result":{{"error":"{e}","message":"Unserializable tool result."}}}}"#)
        })
    }

    /// 从 tool 消息内容恢复 ToolOutcome；不是信封格式时视为原始成功负载
    pub fn from_message_content(content: &str) -> Self {
        match serde_json::from_str::<ToolOutcome>(content) {
            Ok(outcome) => outcome,
            Err(_) => ToolOutcome::Completed(
                serde_json::from_str(content).unwrap_or_else(|_| Value::String(content.to_string())),
            ),
        }
    }

    /// 本轮候选 Task：成功负载解包后能反序列化为 Task 即为候选；错误结果合成 failed Task
    pub fn candidate_task(&self, identity: &str) -> Option<Task> {
        match self {
            ToolOutcome::Completed(value) => {
                let payload = unwrap_tool_payload(value);
                serde_json::from_value::<Task>(payload).ok()
            }
            ToolOutcome::Error(detail) => {
                let id = if identity.is_empty() { "unknown-user" } else { identity };
                Some(Task::with_text(
                    id,
                    TaskState::Failed,
                    format!("{} ({})", detail.message, detail.error),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_shape() {
        let ok = ToolOutcome::completed(json!({ "a": 1 }));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({ "status": "completed", "result": { "a": 1 } })
        );
        let err = ToolOutcome::failed_to_execute("swapTokens", "timeout");
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({
                "status": "error",
                "result": {
                    "error": "timeout",
                    "message": "Failed to execute swapTokens. Please try again later."
                }
            })
        );
    }

    #[test]
    fn test_candidate_from_mcp_text_content() {
        let raw = json!({
            "content": [{
                "type": "text",
                "text": "{\"id\":\"0xabc\",\"status\":{\"state\":\"completed\"}}"
            }]
        });
        let task = ToolOutcome::completed(raw).candidate_task("0xabc").unwrap();
        assert_eq!(task.id, "0xabc");
        assert_eq!(task.status.state, TaskState::Completed);
    }

    #[test]
    fn test_non_task_payload_is_not_candidate() {
        let outcome = ToolOutcome::completed(json!({ "answer": 42 }));
        assert!(outcome.candidate_task("u").is_none());
    }

    #[test]
    fn test_error_becomes_failed_task() {
        let outcome = ToolOutcome::failed_to_execute("lookup", "connection refused");
        let task = outcome.candidate_task("0xuser").unwrap();
        assert_eq!(task.id, "0xuser");
        assert_eq!(task.status.state, TaskState::Failed);
        assert!(task.text().unwrap().contains("connection refused"));
    }

    #[test]
    fn test_message_content_roundtrip() {
        let outcome = ToolOutcome::error("e", "m");
        assert_eq!(ToolOutcome::from_message_content(&outcome.to_json_string()), outcome);
        assert_eq!(
            ToolOutcome::from_message_content("plain"),
            ToolOutcome::Completed(json!("plain"))
        );
    }
}
