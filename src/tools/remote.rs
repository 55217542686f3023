//! 远程工具：把一个 MCP 工具描述包装成本地可调用的 Tool
//!
//! 执行前按转换得到的 ParamSchema 校验参数；任何失败（参数、传输、协议、超时、isError）
//! 都归一化为 "Failed to execute <name>. Please try again later."。
//! 例外：isError 结果的内容本身是一个 Task 时原样交给状态机，保留远端的状态与说明。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::Task;
use crate::mcp::{check_call_result, is_error_result, unwrap_tool_payload, McpConnection, RemoteToolDescriptor};
use crate::tools::{ParamSchema, Tool, ToolOutcome};

pub struct RemoteTool {
    name: String,
    description: String,
    schema: ParamSchema,
    connection: Arc<dyn McpConnection>,
    timeout: Duration,
}

impl RemoteTool {
    pub fn new(
        descriptor: &RemoteToolDescriptor,
        connection: Arc<dyn McpConnection>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: descriptor.name.clone(),
            description: descriptor.description.clone().unwrap_or_default(),
            schema: ParamSchema::from_json_schema(descriptor.input_schema.as_ref()),
            connection,
            timeout,
        }
    }
}

#[async_trait]
impl Tool for RemoteTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.to_json_schema()
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        let args = match self.schema.validate(&args) {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!(tool = %self.name, error = %e, "Invalid arguments for remote tool");
                return ToolOutcome::failed_to_execute(&self.name, e);
            }
        };
        invoke_remote(self.connection.as_ref(), &self.name, args, self.timeout).await
    }
}

/// 调用远程工具并归一化结果；成功时返回原始 CallToolResult
pub async fn invoke_remote(
    connection: &dyn McpConnection,
    name: &str,
    args: Value,
    timeout: Duration,
) -> ToolOutcome {
    tracing::debug!(tool = %name, endpoint = %connection.endpoint(), "Calling remote tool");
    let result = connection.call_tool(name, args, timeout).await.and_then(|raw| {
        if is_error_result(&raw) && carries_task(&raw) {
            tracing::warn!(tool = %name, "Remote tool failed with its own task");
            return Ok(raw);
        }
        check_call_result(raw)
    });
    match result {
        Ok(raw) => ToolOutcome::completed(raw),
        Err(e) => {
            tracing::warn!(tool = %name, error = %e, "Remote tool call failed");
            ToolOutcome::failed_to_execute(name, e.to_string())
        }
    }
}

fn carries_task(raw: &Value) -> bool {
    serde_json::from_value::<Task>(unwrap_tool_payload(raw)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::{MockMcpServer, MockReply};
    use serde_json::json;

    fn server() -> Arc<MockMcpServer> {
        Arc::new(
            MockMcpServer::new("mock://lending")
                .with_tool(
                    "borrow",
                    "Borrow a token",
                    json!({
                        "type": "object",
                        "properties": {
                            "tokenSymbol": { "type": "string" },
                            "amount": { "type": "number" }
                        }
                    }),
                )
                .on_call("borrow", MockReply::Json(json!({ "tx": "0x01" }))),
        )
    }

    #[tokio::test]
    async fn test_valid_call_strips_unknown_keys() {
        let srv = server();
        let desc = srv.list_tools().await.unwrap().remove(0);
        let tool = RemoteTool::new(&desc, srv.clone(), Duration::from_secs(1));
        let outcome = tool
            .execute(json!({ "tokenSymbol": "USDC", "amount": 10, "junk": 1 }))
            .await;
        assert!(!outcome.is_error());
        assert_eq!(
            srv.calls_to("borrow").await,
            vec![json!({ "tokenSymbol": "USDC", "amount": 10 })]
        );
    }

    #[tokio::test]
    async fn test_invalid_args_never_reach_server() {
        let srv = server();
        let desc = srv.list_tools().await.unwrap().remove(0);
        let tool = RemoteTool::new(&desc, srv.clone(), Duration::from_secs(1));
        match tool.execute(json!({ "tokenSymbol": "USDC" })).await {
            ToolOutcome::Error(d) => {
                assert_eq!(d.message, "Failed to execute borrow. Please try again later.");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(srv.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_remote_failed_task_is_passed_through() {
        let failed = json!({
            "id": "0xuser",
            "status": {
                "state": "failed",
                "message": { "role": "agent", "parts": [{ "type": "text", "text": "Insufficient collateral" }] }
            }
        });
        let srv = Arc::new(
            MockMcpServer::new("mock://lending").on_call("borrow", MockReply::Error(failed.to_string())),
        );
        let outcome = invoke_remote(srv.as_ref(), "borrow", json!({}), Duration::from_secs(1)).await;
        assert!(!outcome.is_error());
        let task = outcome.candidate_task("0xuser").unwrap();
        assert_eq!(task.status.state, crate::core::TaskState::Failed);
        assert_eq!(task.text(), Some("Insufficient collateral"));
    }

    #[tokio::test]
    async fn test_plain_error_text_stays_generic() {
        let srv = Arc::new(
            MockMcpServer::new("mock://lending")
                .on_call("borrow", MockReply::Error("upstream unavailable".into())),
        );
        match invoke_remote(srv.as_ref(), "borrow", json!({}), Duration::from_secs(1)).await {
            ToolOutcome::Error(d) => {
                assert_eq!(d.message, "Failed to execute borrow. Please try again later.");
                assert!(d.error.contains("upstream unavailable"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
