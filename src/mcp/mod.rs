//! MCP 层：协议类型、连接与传输、内存 Mock、协议桥与多服务器聚合

pub mod aggregator;
pub mod bridge;
pub mod client;
pub mod mock;
pub mod types;

pub use aggregator::{AggregatedTools, Aggregator, ServerDirectory};
pub use bridge::ProtocolBridge;
pub use client::{Connector, HttpConnector, HttpMcpClient, McpConnection};
pub use mock::{MockConnector, MockMcpServer, MockReply};
pub use types::{
    check_call_result, is_error_result, unwrap_tool_payload, McpError, RemoteToolDescriptor,
};
