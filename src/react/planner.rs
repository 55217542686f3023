//! Planner：调用 LLM 并解析输出
//!
//! 调用 LLM 得到纯文本回复或 JSON Tool Call；parse_llm_output 支持单个对象、对象数组与 ```json 代码块。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::Message;

/// LLM 返回的 Tool Call（{"tool": "swapTokens", "args": {...}}，也接受 "toolName"）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(alias = "toolName")]
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

/// Planner 输出
#[derive(Debug, Clone, PartialEq)]
pub enum PlannerOutput {
    /// 直接回复用户
    Response(String),
    /// 本步需要执行的工具（按输出顺序）
    ToolCalls(Vec<ToolCall>),
}

fn parse_calls(json_str: &str) -> Result<Vec<ToolCall>, AgentError> {
    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| AgentError::JsonParseError(format!("{}: {}", e, json_str)))?;
    let calls = match value {
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value::<ToolCall>)
            .collect::<Result<Vec<_>, _>>(),
        other => serde_json::from_value::<ToolCall>(other).map(|c| vec![c]),
    }
    .map_err(|e| AgentError::JsonParseError(format!("{}: {}", e, json_str)))?;
    Ok(calls.into_iter().filter(|c| !c.tool.is_empty()).collect())
}

/// 解析 LLM 输出
///
/// 以 `{` / `[` 开头或含 ```json 代码块、且出现 "tool" / "toolName" 键时必须是合法的 Tool Call，
/// 否则返回 JsonParseError；不含这些键的按普通文本继续处理。
/// 文本中夹带的 `{...}` 能解析为 Tool Call 时也当作调用，解析不了就按普通回复处理。
pub fn parse_llm_output(output: &str) -> Result<PlannerOutput, AgentError> {
    let trimmed = output.trim();

    let strict = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        Some(rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim()))
    } else if trimmed.starts_with('{') || trimmed.starts_with('[') {
        Some(trimmed)
    } else {
        None
    };

    if let Some(json_str) = strict {
        match parse_calls(json_str) {
            Ok(calls) => {
                return Ok(if calls.is_empty() {
                    PlannerOutput::Response(trimmed.to_string())
                } else {
                    PlannerOutput::ToolCalls(calls)
                });
            }
            // 明显是工具调用但格式坏了，交给重试
            Err(e) if names_a_tool(json_str) => return Err(e),
            Err(e) => {
                tracing::debug!(error = %e, "Reply looks like JSON but names no tool, treating as text");
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(calls) = parse_calls(&trimmed[start..=end]) {
                if !calls.is_empty() {
                    return Ok(PlannerOutput::ToolCalls(calls));
                }
            }
        }
    }
    Ok(PlannerOutput::Response(trimmed.to_string()))
}

fn names_a_tool(text: &str) -> bool {
    text.contains("\"tool\"") || text.contains("\"toolName\"")
}

/// Planner：持有 LLM 与 system prompt，拼 system + 历史后调用 LLM
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, system_prompt: impl Into<String>) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.into(),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// 获取 LLM 累计 token 使用统计
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    pub async fn plan(&self, messages: &[Message]) -> Result<String, AgentError> {
        let mut full_messages = Vec::with_capacity(messages.len() + 1);
        full_messages.push(Message::system(self.system_prompt.clone()));
        full_messages.extend_from_slice(messages);
        self.llm
            .complete(&full_messages)
            .await
            .map_err(AgentError::LlmError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_text_is_response() {
        assert_eq!(
            parse_llm_output("  Which chain should I use?  ").unwrap(),
            PlannerOutput::Response("Which chain should I use?".into())
        );
    }

    #[test]
    fn test_single_call_and_alias() {
        let out = parse_llm_output(r#"{"toolName": "askEncyclopedia", "args": {"question": "q"}}"#).unwrap();
        assert_eq!(
            out,
            PlannerOutput::ToolCalls(vec![ToolCall {
                tool: "askEncyclopedia".into(),
                args: json!({ "question": "q" })
            }])
        );
    }

    #[test]
    fn test_array_and_fence() {
        let out = parse_llm_output(
            "Sure.\n```json\n[{\"tool\": \"a\", \"args\": {}}, {\"tool\": \"b\"}]\n```",
        )
        .unwrap();
        match out {
            PlannerOutput::ToolCalls(calls) => {
                assert_eq!(calls.len(), 2);
                assert_eq!(calls[1].tool, "b");
                assert_eq!(calls[1].args, Value::Null);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_embedded_call_in_prose() {
        let out = parse_llm_output(
            r#"I will swap now: {"tool": "swapTokens", "args": {"amount": "1"}}"#,
        )
        .unwrap();
        assert!(matches!(out, PlannerOutput::ToolCalls(ref c) if c[0].tool == "swapTokens"));
        assert!(matches!(
            parse_llm_output("Use the {amount} field").unwrap(),
            PlannerOutput::Response(_)
        ));
    }

    #[test]
    fn test_broken_json_is_parse_error() {
        assert!(matches!(
            parse_llm_output(r#"{"tool": "swapTokens", "args": "#),
            Err(AgentError::JsonParseError(_))
        ));
        assert!(matches!(
            parse_llm_output("```json\n{\"toolName\": \"swapTokens\", \"args\": \n```"),
            Err(AgentError::JsonParseError(_))
        ));
    }

    #[test]
    fn test_bracketed_prose_is_response() {
        assert_eq!(
            parse_llm_output("[Note] Swaps on Arbitrum settle in about a minute.").unwrap(),
            PlannerOutput::Response("[Note] Swaps on Arbitrum settle in about a minute.".into())
        );
        assert_eq!(
            parse_llm_output("{braces} are just text here").unwrap(),
            PlannerOutput::Response("{braces} are just text here".into())
        );
        assert!(matches!(
            parse_llm_output(r#"{"no_tool": 1}"#).unwrap(),
            PlannerOutput::Response(_)
        ));
    }
}
