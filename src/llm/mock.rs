//! Mock LLM 客户端（用于测试与离线运行，无需 API）
//!
//! 按脚本依次返回预设输出；脚本用完后若设置了 fallback 则一直返回它，否则报错。
//! 会记录每次收到的消息列表，便于断言 prompt 内容。

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::llm::{LlmClient, LlmError};
use crate::memory::Message;

/// 脚本中的一步：正常回复或模拟失败
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Reply(String),
    Fail(String),
}

/// 脚本化 Mock 客户端
#[derive(Debug)]
pub struct ScriptedLlmClient {
    name: String,
    script: Mutex<VecDeque<ScriptStep>>,
    fallback: Option<String>,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlmClient {
    pub fn new(replies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::from_steps(replies.into_iter().map(|r| ScriptStep::Reply(r.into())))
    }

    pub fn from_steps(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self {
            name: "mock".to_string(),
            script: Mutex::new(steps.into_iter().collect()),
            fallback: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// 每次都返回同一输出
    pub fn repeating(reply: impl Into<String>) -> Self {
        Self::new(Vec::<String>::new()).with_fallback(reply)
    }

    pub fn with_fallback(mut self, reply: impl Into<String>) -> Self {
        self.fallback = Some(reply.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 已调用次数
    pub async fn calls(&self) -> usize {
        self.seen.lock().await.len()
    }

    /// 第 n 次调用收到的消息
    pub async fn request(&self, n: usize) -> Option<Vec<Message>> {
        self.seen.lock().await.get(n).cloned()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    fn model_name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.seen.lock().await.push(messages.to_vec());
        match self.script.lock().await.pop_front() {
            Some(ScriptStep::Reply(r)) => Ok(r),
            Some(ScriptStep::Fail(e)) => Err(LlmError::Request(e)),
            None => self
                .fallback
                .clone()
                .ok_or_else(|| LlmError::Request("mock script exhausted".to_string())),
        }
    }
}
