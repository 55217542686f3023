//! askEncyclopedia 本地工具：基于配置的文档回答协议相关问题

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::{schema_for, JsonSchema};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::{Task, TaskState};
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::tools::swap::SessionIdentity;
use crate::tools::{Tool, ToolOutcome};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AskEncyclopediaArgs {
    /// 关于协议的问题
    pub question: String,
}

/// 依次读取文档文件；每个文件前加来源标记，读取失败的文件留下失败标记
pub async fn load_documentation(paths: &[PathBuf]) -> String {
    let mut out = String::new();
    let mut loaded = 0usize;
    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                out.push_str(&format!("\n\n--- Content from {name} ---\n{content}"));
                loaded += 1;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load documentation");
                out.push_str(&format!("\n\n--- Failed to load {name} ---"));
            }
        }
    }
    if loaded == 0 {
        tracing::warn!("No documentation content loaded");
    } else {
        tracing::info!(files = loaded, chars = out.len(), "Documentation loaded");
    }
    out
}

pub struct AskEncyclopediaTool {
    llm: Arc<dyn LlmClient>,
    documentation: Arc<str>,
    identity: SessionIdentity,
}

impl AskEncyclopediaTool {
    pub fn new(llm: Arc<dyn LlmClient>, documentation: impl Into<Arc<str>>, identity: SessionIdentity) -> Self {
        Self {
            llm,
            documentation: documentation.into(),
            identity,
        }
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are a protocol expert. Answer the user's question using only the documentation below. \
            If the documentation does not cover the question, say so plainly. \
            Never respond in markdown, always use plain text.\n\n<documentation>{}\n</documentation>",
            self.documentation
        )
    }
}

#[async_trait]
impl Tool for AskEncyclopediaTool {
    fn name(&self) -> &str {
        "askEncyclopedia"
    }

    fn description(&self) -> &str {
        "Ask questions about the protocol to get expert information from its documentation."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::to_value(schema_for!(AskEncyclopediaArgs)).unwrap_or_else(|_| json!({ "type": "object" }))
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        let args: AskEncyclopediaArgs = match serde_json::from_value(args) {
            Ok(a) => a,
            Err(e) => return ToolOutcome::failed_to_execute(self.name(), e.to_string()),
        };
        if self.documentation.trim().is_empty() {
            return ToolOutcome::error(
                "documentation unavailable",
                "The documentation is not available right now.",
            );
        }
        let messages = [Message::system(self.system_prompt()), Message::user(args.question)];
        match self.llm.complete(&messages).await {
            Ok(answer) => {
                let id = self.identity.read().await.clone().unwrap_or_default();
                ToolOutcome::task(&Task::with_text(id, TaskState::Completed, answer.trim()))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Encyclopedia lookup failed");
                ToolOutcome::failed_to_execute(self.name(), e.to_string())
            }
        }
    }
}
