//! Agent 错误类型与恢复动作
//!
//! 初始化错误（配置、连接、能力校验、模型不可用）在 start 阶段直接返回；
//! 单轮错误（推理引擎失败、无结果）写入历史后抛给调用方；工具级错误不经过这里，而是作为 ToolOutcome 数据回流。

use thiserror::Error;

use crate::llm::LlmError;
use crate::mcp::McpError;

/// Agent 运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Agent not initialized. Call start() first.")]
    NotInitialized,

    #[error(
        "Agent processing failed: No tool result task processed and no final text response available."
    )]
    NoResult,

    #[error("Fetched capabilities failed validation: {0}")]
    CapabilityValidation(String),

    #[error("Failed to fetch capabilities from MCP server: {0}")]
    CapabilityFetch(String),

    #[error("MCP error: {0}")]
    Mcp(#[from] McpError),

    #[error("LLM error: {0}")]
    LlmError(#[from] LlmError),

    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("No usable model: {0}")]
    NoModelAvailable(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Agent initialization failed: {0}")]
    Initialization(String),
}

impl From<config::ConfigError> for AgentError {
    fn from(e: config::ConfigError) -> Self {
        AgentError::ConfigError(e.to_string())
    }
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone)]
pub enum RecoveryAction {
    /// 将提示注入下一轮，让 LLM 重试（如 JSON 格式错误）
    RetryWithPrompt(String),
    /// 终止当前轮次，把错误交给调用方
    Abort,
}
