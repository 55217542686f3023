//! 内存 MCP 服务器（用于测试与离线运行，无需网络）
//!
//! 预设工具目录与每个工具的应答；记录每次调用的参数与 close 次数，便于断言。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::mcp::client::{Connector, McpConnection};
use crate::mcp::types::{McpError, RemoteToolDescriptor};

/// 预设应答
#[derive(Debug, Clone)]
pub enum MockReply {
    /// 以 JSON 文本内容返回（与真实服务器的 CallToolResult 一致）
    Json(Value),
    /// isError 结果，text 内容为给定文本
    Error(String),
    /// 永不返回，直到调用方超时
    Hang,
}

pub struct MockMcpServer {
    endpoint: String,
    tools: Vec<RemoteToolDescriptor>,
    replies: HashMap<String, MockReply>,
    fail_listing: bool,
    listing_delay: Option<Duration>,
    calls: Mutex<Vec<(String, Value)>>,
    close_calls: AtomicUsize,
    closed: AtomicBool,
}

impl MockMcpServer {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            tools: Vec::new(),
            replies: HashMap::new(),
            fail_listing: false,
            listing_delay: None,
            calls: Mutex::new(Vec::new()),
            close_calls: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_tool(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        self.tools.push(RemoteToolDescriptor {
            name: name.into(),
            description: Some(description.into()),
            input_schema: Some(input_schema),
        });
        self
    }

    pub fn on_call(mut self, name: impl Into<String>, reply: MockReply) -> Self {
        self.replies.insert(name.into(), reply);
        self
    }

    /// tools/list 返回协议错误
    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    /// tools/list 先等待 delay 再应答
    pub fn with_listing_delay(mut self, delay: Duration) -> Self {
        self.listing_delay = Some(delay);
        self
    }

    pub async fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().await.clone()
    }

    pub async fn calls_to(&self, name: &str) -> Vec<Value> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, args)| args.clone())
            .collect()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl McpConnection for MockMcpServer {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn list_tools(&self) -> Result<Vec<RemoteToolDescriptor>, McpError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::Closed);
        }
        if let Some(delay) = self.listing_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_listing {
            return Err(McpError::Rpc {
                code: -32603,
                message: "internal error".to_string(),
            });
        }
        Ok(self.tools.clone())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        timeout: Duration,
    ) -> Result<Value, McpError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::Closed);
        }
        self.calls.lock().await.push((name.to_string(), arguments));
        let reply = self
            .replies
            .get(name)
            .cloned()
            .ok_or_else(|| McpError::Rpc {
                code: -32602,
                message: format!("Unknown tool: {name}"),
            })?;
        match reply {
            MockReply::Json(value) => Ok(json!({
                "content": [{ "type": "text", "text": value.to_string() }]
            })),
            MockReply::Error(msg) => Ok(json!({
                "content": [{ "type": "text", "text": msg }],
                "isError": true
            })),
            MockReply::Hang => {
                tokio::time::timeout(timeout, std::future::pending::<()>())
                    .await
                    .map_err(|_| McpError::Timeout(timeout.as_millis() as u64))?;
                Err(McpError::Closed)
            }
        }
    }

    async fn close(&self) -> Result<(), McpError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// 按 endpoint 分发到预先登记的 MockMcpServer；未登记的 endpoint 视为不可达
#[derive(Default)]
pub struct MockConnector {
    servers: HashMap<String, Arc<MockMcpServer>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(mut self, server: Arc<MockMcpServer>) -> Self {
        self.servers.insert(server.endpoint.clone(), server);
        self
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        endpoint: &str,
        _timeout: Duration,
    ) -> Result<Arc<dyn McpConnection>, McpError> {
        if endpoint.trim().is_empty() {
            return Err(McpError::MissingEndpoint);
        }
        self.servers
            .get(endpoint)
            .cloned()
            .map(|s| s as Arc<dyn McpConnection>)
            .ok_or_else(|| McpError::Transport(format!("connection refused: {endpoint}")))
    }
}
