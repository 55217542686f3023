//! onchain-agent - 链上工具智能体编排引擎
//!
//! 模块划分：
//! - **agent**: 会话编排（start / process_user_input / stop）
//! - **capabilities**: 能力存储（getCapabilities 校验、缓存、代币索引）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误与恢复、Task 模型与状态机
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）与模型选择
//! - **mcp**: MCP 传输、协议桥、多服务器聚合
//! - **memory**: 会话历史
//! - **prompt**: System 提示词
//! - **react**: Planner 与有界推理循环
//! - **tools**: 工具箱（远程工具、swapTokens、askEncyclopedia）与执行器

pub mod agent;
pub mod capabilities;
pub mod config;
pub mod core;
pub mod llm;
pub mod mcp;
pub mod memory;
pub mod observability;
pub mod prompt;
pub mod react;
pub mod tools;

pub use agent::Agent;
