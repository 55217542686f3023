//! 错误恢复引擎
//!
//! 根据 AgentError 类型返回 RecoveryAction，供推理循环决定是纠正重试还是终止本轮。

use crate::core::{AgentError, RecoveryAction};

/// 语义化错误恢复：模型输出格式错误可以带提示重试，其余错误终止
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &AgentError) -> RecoveryAction {
        match err {
            AgentError::JsonParseError(raw) => RecoveryAction::RetryWithPrompt(format!(
                "Your previous tool call was not valid JSON: {raw}. \
                When calling a tool you must output only one JSON object (or a JSON array of them) \
                and nothing else. The format is: {{\"tool\": \"<tool name>\", \"args\": {{...}}}}. \
                For example: {{\"tool\": \"askEncyclopedia\", \"args\": {{\"question\": \"What is Camelot?\"}}}}."
            )),
            _ => RecoveryAction::Abort,
        }
    }
}
