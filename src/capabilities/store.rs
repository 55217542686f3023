//! 能力存储：读缓存或实时拉取 getCapabilities，校验后建立代币索引
//!
//! 缓存无 TTL，只在 start 时读一次；缓存读取、解析或校验失败都视为未命中，转为实时拉取。
//! 拉取成功后写回缓存，写失败只告警。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::capabilities::{validate, CapabilityTable, GetCapabilitiesResponse};
use crate::config::CapabilitiesSection;
use crate::core::AgentError;
use crate::mcp::{check_call_result, unwrap_tool_payload, McpConnection};

const GET_CAPABILITIES_TOOL: &str = "getCapabilities";

pub struct CapabilityStore {
    connection: Arc<dyn McpConnection>,
    kind: String,
    cache_path: PathBuf,
    timeout: Duration,
}

impl CapabilityStore {
    pub fn new(connection: Arc<dyn McpConnection>, cfg: &CapabilitiesSection, timeout: Duration) -> Self {
        Self {
            connection,
            kind: cfg.kind.clone(),
            cache_path: cfg.cache_path.clone(),
            timeout,
        }
    }

    pub async fn load(&self, cache_enabled: bool) -> Result<CapabilityTable, AgentError> {
        if cache_enabled {
            if let Some(resp) = self.read_cache().await {
                tracing::info!(path = %self.cache_path.display(), "Loaded capabilities from cache");
                return Ok(CapabilityTable::from_response(&resp));
            }
        }
        let resp = self.fetch_live().await?;
        Ok(CapabilityTable::from_response(&resp))
    }

    async fn read_cache(&self) -> Option<GetCapabilitiesResponse> {
        let text = match tokio::fs::read_to_string(&self.cache_path).await {
            Ok(t) => t,
            Err(e) => {
                tracing::info!(path = %self.cache_path.display(), error = %e, "Capability cache not found");
                return None;
            }
        };
        let raw: Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(path = %self.cache_path.display(), error = %e, "Capability cache is not valid JSON, fetching fresh capabilities");
                return None;
            }
        };
        match validate(&raw) {
            Ok(resp) => Some(resp),
            Err(e) => {
                tracing::warn!(path = %self.cache_path.display(), error = %e, "Cached capabilities failed validation, fetching fresh capabilities");
                None
            }
        }
    }

    /// 实时拉取并校验；成功后写缓存
    pub async fn fetch_live(&self) -> Result<GetCapabilitiesResponse, AgentError> {
        tracing::info!(kind = %self.kind, "Fetching capabilities via MCP");
        let raw = self
            .connection
            .call_tool(GET_CAPABILITIES_TOOL, json!({ "type": self.kind }), self.timeout)
            .await
            .and_then(check_call_result)
            .map_err(|e| AgentError::CapabilityFetch(e.to_string()))?;
        let payload = unwrap_tool_payload(&raw);
        let resp = validate(&payload).map_err(|e| {
            tracing::error!(error = %e, "Fetched capabilities failed validation");
            AgentError::CapabilityValidation(e)
        })?;
        if let Err(e) = self.write_cache(&resp).await {
            tracing::warn!(path = %self.cache_path.display(), error = %e, "Failed to write capability cache");
        }
        Ok(resp)
    }

    async fn write_cache(&self, resp: &GetCapabilitiesResponse) -> std::io::Result<()> {
        if let Some(parent) = self.cache_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let text = serde_json::to_string_pretty(resp)?;
        tokio::fs::write(&self.cache_path, text).await?;
        tracing::info!(path = %self.cache_path.display(), "Capabilities cached");
        Ok(())
    }
}
