//! 会话编排：Agent 即一个会话
//!
//! start 建立协议桥、加载能力表、组装工具集与 system prompt；
//! process_user_input 对单条用户输入跑有界推理循环，从本轮最后一条 tool 消息提取 Task 并交给状态机，
//! 终态清空历史；没有工具结果时以最终文本构造 completed Task；两者都没有则返回 NoResult。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::capabilities::{CapabilityStore, CapabilityTable};
use crate::config::AppConfig;
use crate::core::{dispose, AgentError, RecoveryEngine, Task, TaskState};
use crate::llm::{select_from_config, LlmClient};
use crate::mcp::{Connector, HttpConnector, ProtocolBridge, ServerDirectory};
use crate::memory::{ConversationMemory, Message, Role};
use crate::prompt::build_system_prompt;
use crate::react::{react_loop, Planner, ReactSession};
use crate::tools::{
    load_documentation, AskEncyclopediaTool, SessionIdentity, SwapTokensTool, Tool, ToolExecutor,
    ToolOutcome,
};

/// start 成功后才存在的会话资源
struct Runtime {
    bridge: ProtocolBridge,
    capabilities: Arc<CapabilityTable>,
    planner: Planner,
    executor: ToolExecutor,
}

pub struct Agent {
    config: AppConfig,
    llm: Arc<dyn LlmClient>,
    connector: Arc<dyn Connector>,
    identity: SessionIdentity,
    history: ConversationMemory,
    recovery: RecoveryEngine,
    runtime: Option<Runtime>,
}

impl Agent {
    pub fn new(config: AppConfig, llm: Arc<dyn LlmClient>, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            llm,
            connector,
            identity: Arc::new(RwLock::new(None)),
            history: ConversationMemory::new(),
            recovery: RecoveryEngine::new(),
            runtime: None,
        }
    }

    /// 按配置选择可用模型，使用 HTTP 传输
    pub async fn from_config(config: AppConfig) -> Result<Self, AgentError> {
        let llm = select_from_config(&config.llm).await?;
        tracing::info!(model = %llm.model_name(), "Using model");
        Ok(Self::new(config, llm, Arc::new(HttpConnector)))
    }

    fn provider_endpoint(&self) -> Result<String, AgentError> {
        let directory = ServerDirectory::from_config(&self.config.mcp);
        let endpoint = match self.config.mcp.provider_id() {
            Some(id) => directory.resolve_endpoint(&id),
            None => self.config.mcp.override_url.clone(),
        };
        endpoint
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AgentError::Initialization("no MCP server endpoint configured".to_string()))
    }

    pub async fn start(&mut self) -> Result<(), AgentError> {
        if self.runtime.is_some() {
            tracing::warn!("Agent already started");
            return Ok(());
        }
        let timeout = Duration::from_millis(self.config.mcp.timeout_ms);
        let endpoint = self.provider_endpoint()?;
        let bridge = ProtocolBridge::connect(self.connector.as_ref(), &endpoint, timeout)
            .await
            .map_err(|e| {
                tracing::error!(endpoint = %endpoint, error = %e, "Failed to connect to MCP server");
                AgentError::Mcp(e)
            })?;

        let store = CapabilityStore::new(bridge.connection(), &self.config.capabilities, timeout);
        let capabilities = match store.load(self.config.capabilities.cache_enabled).await {
            Ok(table) => Arc::new(table),
            Err(e) => {
                tracing::error!(error = %e, "Failed to load capabilities");
                bridge.close().await;
                return Err(e);
            }
        };
        tracing::info!(tokens = ?capabilities.available_symbols(), "Available tokens loaded");

        let mut tools = bridge.callables().await;
        let swap = SwapTokensTool::new(
            capabilities.clone(),
            bridge.connection(),
            self.config.capabilities.swap_tool.clone(),
            self.identity.clone(),
            timeout,
        );
        let mut local: Vec<Arc<dyn Tool>> = vec![Arc::new(swap)];
        if !self.config.agent.encyclopedia_paths.is_empty() {
            let docs = load_documentation(&self.config.agent.encyclopedia_paths).await;
            local.push(Arc::new(AskEncyclopediaTool::new(
                self.llm.clone(),
                docs,
                self.identity.clone(),
            )));
        }
        for tool in local {
            let name = tool.name().to_string();
            if tools.register_arc(name.clone(), tool).is_some() {
                tracing::info!(tool = %name, "Local tool shadows the remote tool with the same name");
            }
        }

        let system_prompt = build_system_prompt(&tools, capabilities.available_symbols());
        tracing::info!(tools = ?tools.tool_names(), "Agent initialized");
        self.history.clear();
        self.runtime = Some(Runtime {
            bridge,
            capabilities,
            planner: Planner::new(self.llm.clone(), system_prompt),
            executor: ToolExecutor::new(tools, self.config.tools.tool_timeout_secs),
        });
        Ok(())
    }

    /// 处理一轮用户输入，返回本轮的 Task
    pub async fn process_user_input(&mut self, text: &str, identity: &str) -> Result<Task, AgentError> {
        let Some(rt) = self.runtime.as_ref() else {
            return Err(AgentError::NotInitialized);
        };
        *self.identity.write().await = Some(identity.to_string());
        self.history.push(Message::user(text));

        let session = ReactSession::new(&rt.planner, &rt.executor, &self.recovery)
            .with_max_steps(self.config.agent.max_steps);
        let outcome = match react_loop(&session, self.history.messages()).await {
            Ok(o) => o,
            Err(e) => {
                tracing::error!(error = %e, "Reasoning failed");
                self.history.push(Message::assistant(format!("Error: {e}")));
                return Err(e);
            }
        };
        let (prompt_tokens, completion_tokens, total_tokens) = rt.planner.token_usage();
        tracing::info!(
            steps = outcome.steps,
            finish = ?outcome.finish_reason,
            prompt_tokens,
            completion_tokens,
            total_tokens,
            "Reasoning finished"
        );

        let candidate = outcome
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Tool)
            .and_then(|m| {
                tracing::debug!(tool = ?m.tool_name, "Processing last tool result");
                ToolOutcome::from_message_content(&m.content).candidate_task(identity)
            });
        self.history.extend(outcome.messages);

        if let Some(task) = candidate {
            let disposition = dispose(task, identity);
            if disposition.resets_history() {
                self.history.clear();
            }
            return Ok(disposition.into_task());
        }

        match outcome.text {
            Some(text) => Ok(Task::with_text(identity, TaskState::Completed, text)),
            None => {
                let err = AgentError::NoResult;
                self.history.push(Message::assistant(format!("Error: {err}")));
                Err(err)
            }
        }
    }

    /// 关闭协议桥；未启动或重复调用时无操作
    pub async fn stop(&mut self) {
        if let Some(rt) = self.runtime.take() {
            tracing::info!("Closing MCP client");
            rt.bridge.close().await;
        }
    }

    pub fn is_started(&self) -> bool {
        self.runtime.is_some()
    }

    pub fn history(&self) -> &[Message] {
        self.history.messages()
    }

    pub fn capabilities(&self) -> Option<Arc<CapabilityTable>> {
        self.runtime.as_ref().map(|rt| rt.capabilities.clone())
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.runtime
            .as_ref()
            .map(|rt| rt.executor.tool_names())
            .unwrap_or_default()
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.runtime.as_ref().map(|rt| rt.planner.system_prompt())
    }
}
