//! swapTokens 本地工具
//!
//! 通过能力表把代币符号解析为链上地址与精度，把人类可读数量换算为最小单位，
//! 再调用远程 swap 工具取得交易计划。同一符号存在于多条链且用户没指定链时，返回 input-required Task 追问。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use schemars::{schema_for, JsonSchema};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::capabilities::{CapabilityTable, TokenEntry};
use crate::core::{Task, TaskState};
use crate::mcp::{unwrap_tool_payload, McpConnection};
use crate::tools::{invoke_remote, Tool, ToolOutcome};

/// 当前轮次的用户身份（地址），由 Agent 在每轮开始时写入
pub type SessionIdentity = Arc<RwLock<Option<String>>>;

const KNOWN_CHAINS: &[(&str, &str)] = &[
    ("ethereum", "1"),
    ("mainnet", "1"),
    ("arbitrum", "42161"),
    ("optimism", "10"),
    ("polygon", "137"),
    ("matic", "137"),
    ("base", "8453"),
];

/// 数量：字符串或数字
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Amount {
    Text(String),
    Number(f64),
}

impl Amount {
    fn as_decimal_string(&self) -> String {
        match self {
            Amount::Text(s) => s.trim().to_string(),
            Amount::Number(n) => n.to_string(),
        }
    }
}

/// swapTokens 参数
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SwapTokensArgs {
    /// 要卖出的数量（人类可读，如 "1.5"）
    pub amount: Amount,
    /// 卖出代币符号
    pub from_token: String,
    /// 买入代币符号
    pub to_token: String,
    /// 卖出代币所在链（名称或链 id）
    #[serde(default)]
    pub from_chain: Option<String>,
    /// 买入代币所在链（名称或链 id）
    #[serde(default)]
    pub to_chain: Option<String>,
}

/// 链名或数字链 id -> 链 id
pub fn chain_id_for(name: &str) -> Option<String> {
    let key = name.trim().to_lowercase();
    if key.is_empty() {
        return None;
    }
    if let Some((_, id)) = KNOWN_CHAINS.iter().find(|(n, _)| *n == key) {
        return Some((*id).to_string());
    }
    if key.chars().all(|c| c.is_ascii_digit()) {
        return Some(key);
    }
    None
}

/// 链 id -> 展示用链名
pub fn chain_name(chain_id: &str) -> String {
    KNOWN_CHAINS
        .iter()
        .find(|(_, id)| *id == chain_id)
        .map(|(n, _)| {
            let mut c = n.chars();
            match c.next() {
                Some(first) => first.to_uppercase().collect::<String>() + c.as_str(),
                None => String::new(),
            }
        })
        .unwrap_or_else(|| format!("chain {chain_id}"))
}

/// decimals 上限：u256 最多 78 位十进制数字
const MAX_DECIMALS: u32 = 77;

/// 把十进制数量换算为最小单位（纯字符串运算，不经浮点）
pub fn to_base_units(amount: &str, decimals: u32) -> Result<String, String> {
    if decimals > MAX_DECIMALS {
        return Err(format!(
            "Token decimals {decimals} exceed the supported maximum of {MAX_DECIMALS}"
        ));
    }
    let amount = amount.trim();
    let (int_part, frac_part) = match amount.split_once('.') {
        Some((i, f)) => (i, f),
        None => (amount, ""),
    };
    let valid = !(int_part.is_empty() && frac_part.is_empty())
        && int_part.chars().all(|c| c.is_ascii_digit())
        && frac_part.chars().all(|c| c.is_ascii_digit());
    if !valid {
        return Err(format!("Invalid amount: {amount}"));
    }
    let frac_trimmed = frac_part.trim_end_matches('0');
    if frac_trimmed.len() > decimals as usize {
        return Err(format!(
            "Amount {amount} has more than {decimals} decimal places"
        ));
    }
    let mut digits = String::with_capacity(int_part.len() + decimals as usize);
    digits.push_str(int_part);
    digits.push_str(frac_trimmed);
    digits.extend(std::iter::repeat('0').take(decimals as usize - frac_trimmed.len()));
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Err("Amount must be greater than zero".to_string());
    }
    Ok(digits.to_string())
}

/// 单侧代币解析结果
enum Resolved<'a> {
    Entry(&'a str, &'a TokenEntry),
    NeedsChain(&'a str, &'a [TokenEntry]),
}

pub struct SwapTokensTool {
    table: Arc<CapabilityTable>,
    connection: Arc<dyn McpConnection>,
    remote_tool: String,
    identity: SessionIdentity,
    timeout: Duration,
}

impl SwapTokensTool {
    pub fn new(
        table: Arc<CapabilityTable>,
        connection: Arc<dyn McpConnection>,
        remote_tool: impl Into<String>,
        identity: SessionIdentity,
        timeout: Duration,
    ) -> Self {
        Self {
            table,
            connection,
            remote_tool: remote_tool.into(),
            identity,
            timeout,
        }
    }

    fn resolve<'a>(&'a self, symbol: &str, chain: Option<&str>) -> Result<Resolved<'a>, ToolOutcome> {
        let Some((canonical, entries)) = self.table.find(symbol) else {
            let available = self.table.available_symbols().join(", ");
            return Err(ToolOutcome::error(
                format!("unknown token {symbol}"),
                format!("Token {symbol} is not supported. Available tokens: {available}"),
            ));
        };
        match chain {
            Some(chain) => {
                let Some(chain_id) = chain_id_for(chain) else {
                    return Err(ToolOutcome::error(
                        format!("unknown chain {chain}"),
                        format!("Chain {chain} is not supported."),
                    ));
                };
                entries
                    .iter()
                    .find(|e| e.chain_id == chain_id)
                    .map(|e| Resolved::Entry(canonical, e))
                    .ok_or_else(|| {
                        ToolOutcome::error(
                            format!("token {canonical} not on chain {chain_id}"),
                            format!("Token {canonical} is not supported on {}.", chain_name(&chain_id)),
                        )
                    })
            }
            None if entries.len() == 1 => Ok(Resolved::Entry(canonical, &entries[0])),
            None => Ok(Resolved::NeedsChain(canonical, entries)),
        }
    }
}

fn clarify_chain(identity: &str, symbol: &str, entries: &[TokenEntry]) -> ToolOutcome {
    let chains: Vec<String> = entries.iter().map(|e| chain_name(&e.chain_id)).collect();
    let task = Task::with_text(
        identity,
        TaskState::InputRequired,
        format!(
            "Which chain is {symbol} on? Please specify one of: {}.",
            chains.join(", ")
        ),
    );
    ToolOutcome::task(&task)
}

#[async_trait]
impl Tool for SwapTokensTool {
    fn name(&self) -> &str {
        "swapTokens"
    }

    fn description(&self) -> &str {
        "Swap or convert tokens."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::to_value(schema_for!(SwapTokensArgs)).unwrap_or_else(|_| json!({ "type": "object" }))
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        let args: SwapTokensArgs = match serde_json::from_value(args) {
            Ok(a) => a,
            Err(e) => return ToolOutcome::failed_to_execute(self.name(), e.to_string()),
        };
        let Some(user) = self.identity.read().await.clone().filter(|u| !u.is_empty()) else {
            return ToolOutcome::error("missing user address", "User address is not set.");
        };

        let from = match self.resolve(&args.from_token, args.from_chain.as_deref()) {
            Ok(Resolved::Entry(s, e)) => (s, e),
            Ok(Resolved::NeedsChain(s, entries)) => return clarify_chain(&user, s, entries),
            Err(outcome) => return outcome,
        };
        let to = match self.resolve(&args.to_token, args.to_chain.as_deref()) {
            Ok(Resolved::Entry(s, e)) => (s, e),
            Ok(Resolved::NeedsChain(s, entries)) => return clarify_chain(&user, s, entries),
            Err(outcome) => return outcome,
        };

        let human_amount = args.amount.as_decimal_string();
        let base_amount = match to_base_units(&human_amount, from.1.decimals) {
            Ok(a) => a,
            Err(e) => return ToolOutcome::error(e.clone(), e),
        };

        let request = json!({
            "fromTokenAddress": from.1.address,
            "fromTokenChainId": from.1.chain_id,
            "toTokenAddress": to.1.address,
            "toTokenChainId": to.1.chain_id,
            "amount": base_amount,
            "userAddress": user,
        });
        tracing::info!(
            from = %from.0, to = %to.0, amount = %human_amount,
            from_chain = %from.1.chain_id, to_chain = %to.1.chain_id,
            "Requesting swap plan"
        );

        match invoke_remote(self.connection.as_ref(), &self.remote_tool, request, self.timeout).await {
            ToolOutcome::Completed(raw) => {
                let payload = unwrap_tool_payload(&raw);
                if let Ok(task) = serde_json::from_value::<Task>(payload.clone()) {
                    return ToolOutcome::task(&task);
                }
                let task = Task::with_text(
                    user,
                    TaskState::Completed,
                    format!(
                        "Transaction plan ready: swap {human_amount} {} on {} for {} on {}.",
                        from.0,
                        chain_name(&from.1.chain_id),
                        to.0,
                        chain_name(&to.1.chain_id)
                    ),
                )
                .with_artifact("transaction-plan", payload);
                ToolOutcome::task(&task)
            }
            ToolOutcome::Error(detail) => ToolOutcome::Error(detail),
        }
    }
}
