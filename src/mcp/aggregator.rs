//! 多服务器聚合：并发发现所有配置服务器的工具，以 `serverId-toolName` 命名合并
//!
//! 单个服务器失败（无 endpoint、连接失败、发现失败）只贡献空集合，不影响其他服务器。

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;

use crate::config::McpSection;
use crate::mcp::{Connector, ProtocolBridge};
use crate::tools::{Tool, ToolRegistry};

/// 服务器 id -> 默认 URL，外加一个全局覆盖 URL
#[derive(Clone, Debug, Default)]
pub struct ServerDirectory {
    servers: BTreeMap<String, String>,
    override_url: Option<String>,
}

impl ServerDirectory {
    pub fn new(servers: BTreeMap<String, String>, override_url: Option<String>) -> Self {
        Self {
            servers,
            override_url: override_url.filter(|u| !u.trim().is_empty()),
        }
    }

    pub fn from_config(cfg: &McpSection) -> Self {
        Self::new(cfg.servers.clone(), cfg.override_url.clone())
    }

    /// 覆盖 URL 优先，其次该服务器的默认 URL
    pub fn resolve_endpoint(&self, server_id: &str) -> Option<String> {
        self.override_url
            .clone()
            .or_else(|| self.servers.get(server_id).cloned())
            .filter(|u| !u.trim().is_empty())
    }

    pub fn server_ids(&self) -> Vec<String> {
        self.servers.keys().cloned().collect()
    }
}

/// 聚合结果：合并后的工具表与为此打开的全部桥接
pub struct AggregatedTools {
    pub tools: ToolRegistry,
    pub bridges: Vec<(String, ProtocolBridge)>,
}

impl AggregatedTools {
    pub async fn close(&self) {
        join_all(self.bridges.iter().map(|(_, b)| b.close())).await;
    }
}

pub struct Aggregator {
    directory: ServerDirectory,
    connector: Arc<dyn Connector>,
    timeout: Duration,
}

impl Aggregator {
    pub fn new(directory: ServerDirectory, connector: Arc<dyn Connector>, timeout: Duration) -> Self {
        Self {
            directory,
            connector,
            timeout,
        }
    }

    async fn open(&self, server_id: &str) -> Option<(ProtocolBridge, ToolRegistry)> {
        let Some(endpoint) = self.directory.resolve_endpoint(server_id) else {
            tracing::warn!(server = %server_id, "No endpoint configured, skipping server");
            return None;
        };
        let bridge = match ProtocolBridge::connect(self.connector.as_ref(), &endpoint, self.timeout).await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(server = %server_id, endpoint = %endpoint, error = %e, "Failed to connect, skipping server");
                return None;
            }
        };
        let tools = bridge.callables().await;
        Some((bridge, tools))
    }

    /// 并发连接并发现全部服务器，工具名加 `serverId-` 前缀
    pub async fn aggregate(&self, server_ids: &[String]) -> AggregatedTools {
        let results = join_all(server_ids.iter().map(|id| async move {
            (id.clone(), self.open(id).await)
        }))
        .await;

        let mut merged = ToolRegistry::new();
        let mut bridges = Vec::new();
        for (id, result) in results {
            let Some((bridge, tools)) = result else {
                continue;
            };
            for (name, tool) in tools.iter() {
                let key = format!("{id}-{name}");
                if merged.register_arc(key.clone(), Arc::clone(tool) as Arc<dyn Tool>).is_some() {
                    tracing::warn!(tool = %key, "Duplicate aggregated tool name, keeping the later one");
                }
            }
            bridges.push((id, bridge));
        }
        tracing::info!(servers = bridges.len(), tools = merged.len(), "Aggregated remote tools");
        AggregatedTools {
            tools: merged,
            bridges,
        }
    }

    /// None 或 "all" 聚合全部服务器；单个 id 直接返回该服务器的工具（不加前缀）
    pub async fn load_tools(&self, selection: Option<&str>) -> AggregatedTools {
        match selection {
            None | Some("all") => self.aggregate(&self.directory.server_ids()).await,
            Some(id) => match self.open(id).await {
                Some((bridge, tools)) => AggregatedTools {
                    tools,
                    bridges: vec![(id.to_string(), bridge)],
                },
                None => AggregatedTools {
                    tools: ToolRegistry::new(),
                    bridges: Vec::new(),
                },
            },
        }
    }
}
