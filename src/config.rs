//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `AGENT__*` 覆盖（双下划线表示嵌套，如 `AGENT__MCP__OVERRIDE_URL=http://...`）。

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub mcp: McpSection,
    pub capabilities: CapabilitiesSection,
    pub agent: AgentSection,
    pub tools: ToolsSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [llm] 段：OpenAI 兼容端点、Key 所在环境变量、候选模型（按顺序回退）与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub base_url: String,
    pub api_key_env: String,
    pub models: Vec<String>,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key_env: "OPENROUTER_API_KEY".to_string(),
            models: default_models(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_models() -> Vec<String> {
    vec![
        "meta-llama/llama-4-maverick:free".into(),
        "meta-llama/llama-4-scout:free".into(),
        "meta-llama/llama-3.3-70b-instruct:free".into(),
        "meta-llama/llama-3.1-8b-instruct:free".into(),
    ]
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
    /// 探活请求超时（秒）
    #[serde(default = "default_health_check_timeout")]
    pub health_check: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
            health_check: default_health_check_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

fn default_health_check_timeout() -> u64 {
    20
}

/// [mcp] 段：远程工具服务器目录与选择
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct McpSection {
    /// 服务器 id -> 默认 URL
    pub servers: BTreeMap<String, String>,
    /// 覆盖 URL：设置后对所有服务器生效
    pub override_url: Option<String>,
    /// 选中的服务器；为空或 "all" 表示聚合全部
    pub selected: Option<String>,
    /// 会话使用的能力提供方；为空时回退到 selected，再回退到第一个配置的服务器
    pub provider: Option<String>,
    /// 单次远程调用超时（毫秒）
    pub timeout_ms: u64,
}

impl Default for McpSection {
    fn default() -> Self {
        Self {
            servers: BTreeMap::new(),
            override_url: None,
            selected: None,
            provider: None,
            timeout_ms: 60_000,
        }
    }
}

impl McpSection {
    /// 会话能力提供方 id
    pub fn provider_id(&self) -> Option<String> {
        self.provider
            .clone()
            .or_else(|| self.selected.clone().filter(|s| s != "all"))
            .or_else(|| self.servers.keys().next().cloned())
    }
}

/// [capabilities] 段：能力类型、缓存与 swap 远程工具名
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CapabilitiesSection {
    pub kind: String,
    pub cache_enabled: bool,
    pub cache_path: PathBuf,
    pub swap_tool: String,
}

impl Default for CapabilitiesSection {
    fn default() -> Self {
        Self {
            kind: "SWAP".to_string(),
            cache_enabled: false,
            cache_path: PathBuf::from(".cache/swap_capabilities.json"),
            swap_tool: "swapTokens".to_string(),
        }
    }
}

/// [agent] 段：推理步数上限与百科文档
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub max_steps: usize,
    pub encyclopedia_paths: Vec<PathBuf>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_steps: 10,
            encyclopedia_paths: Vec::new(),
        }
    }
}

/// [tools] 段
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒），包住整个本地/远程工具执行
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

fn default_tool_timeout_secs() -> u64 {
    90
}

/// 从 config 目录加载配置，环境变量 AGENT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 AGENT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("AGENT")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
