//! MCP 客户端：连接抽象与 streamable HTTP 实现
//!
//! McpConnection 是桥接层唯一依赖的远程接口（list_tools / call_tool / close）；
//! HttpMcpClient 基于 rmcp 的 streamable HTTP 客户端传输，握手、会话与分页都交给 rmcp，
//! 这里只负责超时与把 rmcp 模型转换为本地类型。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rmcp::model::{CallToolRequestParam, CallToolResult, Tool as McpTool};
use rmcp::service::{Peer, RoleClient, RunningService};
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::{ServiceError, ServiceExt};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::mcp::types::{McpError, RemoteToolDescriptor};

/// 一条到远程工具服务器的连接
#[async_trait]
pub trait McpConnection: Send + Sync {
    fn endpoint(&self) -> &str;

    async fn list_tools(&self) -> Result<Vec<RemoteToolDescriptor>, McpError>;

    /// 调用远程工具，返回原始 CallToolResult（含 isError 标记，由调用方解释）
    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        timeout: Duration,
    ) -> Result<Value, McpError>;

    /// 释放连接；重复调用无副作用
    async fn close(&self) -> Result<(), McpError>;
}

/// 建立连接的工厂，便于测试注入内存实现
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<Arc<dyn McpConnection>, McpError>;
}

/// 默认连接器：streamable HTTP
#[derive(Debug, Default, Clone)]
pub struct HttpConnector;

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(
        &self,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<Arc<dyn McpConnection>, McpError> {
        let client = HttpMcpClient::connect(endpoint, timeout).await?;
        Ok(Arc::new(client))
    }
}

impl From<ServiceError> for McpError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::McpError(data) => McpError::Rpc {
                code: i64::from(data.code.0),
                message: data.message.to_string(),
            },
            other => McpError::Transport(other.to_string()),
        }
    }
}

/// rmcp 工具描述 -> 本地描述（按 MCP 线格式转换，inputSchema 原样保留）
pub fn descriptor_from(tool: &McpTool) -> Result<RemoteToolDescriptor, McpError> {
    let value = serde_json::to_value(tool).map_err(|e| McpError::InvalidResponse(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| McpError::InvalidResponse(e.to_string()))
}

/// rmcp 调用结果 -> 原始 CallToolResult JSON
pub fn call_result_value(result: &CallToolResult) -> Result<Value, McpError> {
    serde_json::to_value(result).map_err(|e| McpError::InvalidResponse(e.to_string()))
}

pub struct HttpMcpClient {
    endpoint: String,
    peer: Peer<RoleClient>,
    service: Mutex<Option<RunningService<RoleClient, ()>>>,
    closed: AtomicBool,
    timeout: Duration,
}

impl HttpMcpClient {
    /// 校验 URL 并在超时内完成 initialize 握手
    pub async fn connect(endpoint: &str, timeout: Duration) -> Result<Self, McpError> {
        if endpoint.trim().is_empty() {
            return Err(McpError::MissingEndpoint);
        }
        reqwest::Url::parse(endpoint)
            .map_err(|e| McpError::Transport(format!("invalid endpoint {endpoint}: {e}")))?;

        let transport = StreamableHttpClientTransport::from_uri(endpoint.to_string());
        let service = tokio::time::timeout(timeout, ().serve(transport))
            .await
            .map_err(|_| McpError::Timeout(timeout.as_millis() as u64))?
            .map_err(|e| McpError::Transport(e.to_string()))?;
        tracing::debug!(
            endpoint = %endpoint,
            server = ?service.peer_info().map(|info| info.server_info.name.clone()),
            "MCP initialize ok"
        );

        Ok(Self {
            endpoint: endpoint.to_string(),
            peer: service.peer().clone(),
            service: Mutex::new(Some(service)),
            closed: AtomicBool::new(false),
            timeout,
        })
    }

    fn ensure_open(&self) -> Result<(), McpError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(McpError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl McpConnection for HttpMcpClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn list_tools(&self) -> Result<Vec<RemoteToolDescriptor>, McpError> {
        self.ensure_open()?;
        let tools = tokio::time::timeout(self.timeout, self.peer.list_all_tools())
            .await
            .map_err(|_| McpError::Timeout(self.timeout.as_millis() as u64))??;
        tools.iter().map(descriptor_from).collect()
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        timeout: Duration,
    ) -> Result<Value, McpError> {
        self.ensure_open()?;
        let request = CallToolRequestParam {
            name: name.to_string().into(),
            arguments: arguments.as_object().cloned(),
        };
        let result = tokio::time::timeout(timeout, self.peer.call_tool(request))
            .await
            .map_err(|_| McpError::Timeout(timeout.as_millis() as u64))??;
        call_result_value(&result)
    }

    async fn close(&self) -> Result<(), McpError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let service = self.service.lock().await.take();
        if let Some(service) = service {
            if let Err(e) = service.cancel().await {
                tracing::debug!(endpoint = %self.endpoint, error = %e, "MCP service shutdown failed");
            }
        }
        Ok(())
    }
}
