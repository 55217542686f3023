//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），由 ToolRegistry 按名注册与查找，
//! ToolExecutor 在调用时加超时并输出审计日志。本地工具与远程桥接工具共用同一 trait。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::ToolOutcome;

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（用于 JSON 中的 "tool" 字段）
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 参数 JSON Schema（供 LLM 生成正确的参数格式）
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 执行工具；失败以 ToolOutcome::Error 表示
    async fn execute(&self, args: Value) -> ToolOutcome;
}

/// 工具注册表：按名称有序存储 Arc<dyn Tool>
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    /// 以指定名称注册（聚合器用 `serverId-toolName` 作为键）；返回被覆盖的旧工具
    pub fn register_arc(&mut self, name: impl Into<String>, tool: Arc<dyn Tool>) -> Option<Arc<dyn Tool>> {
        self.tools.insert(name.into(), tool)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub async fn execute(&self, name: &str, args: Value) -> ToolOutcome {
        match self.tools.get(name) {
            Some(tool) => tool.execute(args).await,
            None => ToolOutcome::error(
                format!("Unknown tool: {name}"),
                format!("Tool {name} is not available."),
            ),
        }
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<dyn Tool>)> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 工具目录 JSON（名称为注册键），拼入 system prompt
    pub fn to_schema_json(&self) -> String {
        let tools: Vec<Value> = self
            .tools
            .iter()
            .map(|(name, tool)| {
                serde_json::json!({
                    "name": name,
                    "description": tool.description(),
                    "parameters": tool.parameters_schema()
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the arguments back"
        }

        async fn execute(&self, args: Value) -> ToolOutcome {
            ToolOutcome::completed(args)
        }
    }

    #[tokio::test]
    async fn test_register_and_execute() {
        let mut reg = ToolRegistry::new();
        reg.register(Echo);
        assert!(reg.contains("echo"));
        assert_eq!(
            reg.execute("echo", json!({ "x": 1 })).await,
            ToolOutcome::completed(json!({ "x": 1 }))
        );
        assert!(reg.execute("missing", json!({})).await.is_error());
    }

    #[test]
    fn test_register_arc_under_prefixed_name() {
        let mut reg = ToolRegistry::new();
        assert!(reg.register_arc("swapping-echo", Arc::new(Echo)).is_none());
        assert!(reg.register_arc("swapping-echo", Arc::new(Echo)).is_some());
        assert_eq!(reg.tool_names(), vec!["swapping-echo".to_string()]);
        let catalogue: Value = serde_json::from_str(&reg.to_schema_json()).unwrap();
        assert_eq!(catalogue[0]["name"], "swapping-echo");
    }
}
