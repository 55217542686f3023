//! 模型选择：按顺序尝试候选模型，返回第一个通过探活的客户端
//!
//! 候选列表与客户端工厂都由调用方注入，测试可传入确定性的 Mock。

use std::sync::Arc;
use std::time::Duration;

use crate::core::AgentError;
use crate::llm::{LlmClient, OpenAiClient};
use crate::memory::Message;

const HEALTH_CHECK_PROMPT: &str = "Say hello";

/// 依次构建候选模型并探活；全部失败返回 NoModelAvailable
pub async fn select_model<F>(
    candidates: &[String],
    factory: F,
    check_timeout: Duration,
) -> Result<Arc<dyn LlmClient>, AgentError>
where
    F: Fn(&str) -> Arc<dyn LlmClient>,
{
    let mut failures = Vec::new();
    for name in candidates {
        tracing::info!(model = %name, "Checking model");
        let client = factory(name);
        let check = tokio::time::timeout(
            check_timeout,
            client.complete(&[Message::user(HEALTH_CHECK_PROMPT)]),
        )
        .await;
        match check {
            Ok(Ok(reply)) => {
                tracing::info!(model = %name, reply = %reply.trim(), "Model health check succeeded");
                return Ok(client);
            }
            Ok(Err(e)) => {
                tracing::warn!(model = %name, error = %e, "Model health check failed");
                failures.push(format!("{}: {}", name, e));
            }
            Err(_) => {
                tracing::warn!(model = %name, "Model health check timed out");
                failures.push(format!("{}: health check timed out", name));
            }
        }
    }
    if candidates.is_empty() {
        return Err(AgentError::NoModelAvailable("no candidate models configured".to_string()));
    }
    Err(AgentError::NoModelAvailable(failures.join("; ")))
}

/// 从配置构建 OpenAI 兼容客户端并选择第一个可用模型；API Key 缺失直接报错
pub async fn select_from_config(cfg: &crate::config::LlmSection) -> Result<Arc<dyn LlmClient>, AgentError> {
    let api_key = std::env::var(&cfg.api_key_env)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| AgentError::ConfigError(format!("{} not set!", cfg.api_key_env)))?;
    let base_url = cfg.base_url.clone();
    let request_timeout = cfg.timeouts.request;
    select_model(
        &cfg.models,
        |name| {
            Arc::new(OpenAiClient::new(&base_url, name, &api_key, request_timeout))
                as Arc<dyn LlmClient>
        },
        Duration::from_secs(cfg.timeouts.health_check),
    )
    .await
}
