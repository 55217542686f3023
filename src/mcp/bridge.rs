//! 协议桥：一条到远程工具服务器的连接 + 工具目录发现 + 可调用工具构建
//!
//! 目录发现失败返回空列表；调用失败归一化为 ToolOutcome::Error；close 幂等。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::mcp::{Connector, McpConnection, McpError, RemoteToolDescriptor};
use crate::tools::{invoke_remote, RemoteTool, ToolOutcome, ToolRegistry};

pub struct ProtocolBridge {
    connection: Arc<dyn McpConnection>,
    timeout: Duration,
    closed: AtomicBool,
}

impl ProtocolBridge {
    /// 建立连接；endpoint 为空或连接失败返回 Err，由调用方决定是否视为空贡献
    pub async fn connect(
        connector: &dyn Connector,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<Self, McpError> {
        if endpoint.trim().is_empty() {
            return Err(McpError::MissingEndpoint);
        }
        tracing::info!(endpoint = %endpoint, "Connecting to MCP server");
        let connection = connector.connect(endpoint, timeout).await?;
        Ok(Self::from_connection(connection, timeout))
    }

    pub fn from_connection(connection: Arc<dyn McpConnection>, timeout: Duration) -> Self {
        Self {
            connection,
            timeout,
            closed: AtomicBool::new(false),
        }
    }

    pub fn endpoint(&self) -> &str {
        self.connection.endpoint()
    }

    pub fn connection(&self) -> Arc<dyn McpConnection> {
        self.connection.clone()
    }

    /// 列出远程工具；任何协议错误都降级为空列表
    pub async fn discover_tools(&self) -> Vec<RemoteToolDescriptor> {
        match self.connection.list_tools().await {
            Ok(tools) => {
                tracing::info!(endpoint = %self.endpoint(), count = tools.len(), "Discovered remote tools");
                tools
            }
            Err(e) => {
                tracing::warn!(endpoint = %self.endpoint(), error = %e, "Tool discovery failed");
                Vec::new()
            }
        }
    }

    pub fn to_callable(&self, descriptor: &RemoteToolDescriptor) -> RemoteTool {
        RemoteTool::new(descriptor, self.connection.clone(), self.timeout)
    }

    /// 发现并构建全部可调用工具（以远程原名注册）
    pub async fn callables(&self) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for descriptor in self.discover_tools().await {
            let tool = self.to_callable(&descriptor);
            registry.register(tool);
        }
        registry
    }

    /// 直接按名调用远程工具（不经参数校验）
    pub async fn invoke(&self, name: &str, args: Value) -> ToolOutcome {
        invoke_remote(self.connection.as_ref(), name, args, self.timeout).await
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// 释放连接；重复调用无副作用
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.connection.close().await {
            tracing::warn!(endpoint = %self.endpoint(), error = %e, "Error closing MCP connection");
        } else {
            tracing::info!(endpoint = %self.endpoint(), "MCP connection closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::{MockConnector, MockMcpServer, MockReply};
    use serde_json::json;

    #[tokio::test]
    async fn test_empty_endpoint_is_error() {
        let connector = MockConnector::new();
        let err = ProtocolBridge::connect(&connector, "  ", Duration::from_secs(1))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, McpError::MissingEndpoint));
    }

    #[tokio::test]
    async fn test_discovery_failure_is_empty() {
        let srv = Arc::new(MockMcpServer::new("mock://a").failing_listing());
        let bridge = ProtocolBridge::from_connection(srv, Duration::from_secs(1));
        assert!(bridge.discover_tools().await.is_empty());
        assert!(bridge.callables().await.is_empty());
    }

    #[tokio::test]
    async fn test_invoke_error_and_timeout_are_outcomes() {
        let srv = Arc::new(
            MockMcpServer::new("mock://a")
                .on_call("bad", MockReply::Error("insufficient liquidity".into()))
                .on_call("slow", MockReply::Hang),
        );
        let bridge = ProtocolBridge::from_connection(srv, Duration::from_millis(20));
        for name in ["bad", "slow", "missing"] {
            match bridge.invoke(name, json!({})).await {
                ToolOutcome::Error(d) => assert_eq!(
                    d.message,
                    format!("Failed to execute {name}. Please try again later.")
                ),
                other => panic!("unexpected: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let srv = Arc::new(MockMcpServer::new("mock://a"));
        let bridge = ProtocolBridge::from_connection(srv.clone(), Duration::from_secs(1));
        bridge.close().await;
        bridge.close().await;
        assert!(bridge.is_closed());
        assert_eq!(srv.close_calls(), 1);
    }
}
