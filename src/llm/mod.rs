//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock）与候选模型选择

pub mod mock;
pub mod openai;
pub mod selector;
pub mod traits;

pub use mock::{ScriptStep, ScriptedLlmClient};
pub use openai::{observation_text, OpenAiClient, TokenUsage};
pub use selector::{select_from_config, select_model};
pub use traits::{LlmClient, LlmError};
