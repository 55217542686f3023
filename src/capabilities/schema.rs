//! getCapabilities 响应的数据结构与代币索引表
//!
//! 字段都允许缺省（远程目录可能不完整），但出现时类型必须正确，否则整个负载校验失败。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 来源数据缺少 decimals 时的默认精度
pub const DEFAULT_DECIMALS: u32 = 18;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GetCapabilitiesResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Vec<CapabilityEntry>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swap_capability: Option<SwapCapability>,
    /// 其他能力类型（借贷等）原样保留
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapCapability {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability_id: Option<String>,
    #[serde(default)]
    pub supported_tokens: Vec<SupportedToken>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedToken {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uid: Option<TokenUid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_native: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUid {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// 按 schema 校验原始负载；失败时返回 serde 的诊断信息
pub fn validate(raw: &Value) -> Result<GetCapabilitiesResponse, String> {
    serde_json::from_value(raw.clone()).map_err(|e| e.to_string())
}

/// 某个代币在一条链上的记录
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenEntry {
    pub chain_id: String,
    pub address: String,
    pub decimals: u32,
}

/// 代币符号 -> 各链记录；available_symbols 保持首次出现的顺序
#[derive(Clone, Debug, Default)]
pub struct CapabilityTable {
    tokens: HashMap<String, Vec<TokenEntry>>,
    available_symbols: Vec<String>,
}

impl CapabilityTable {
    pub fn from_response(resp: &GetCapabilitiesResponse) -> Self {
        let mut table = Self::default();
        let Some(capabilities) = &resp.capabilities else {
            tracing::warn!("No capabilities array found, token table is empty");
            return table;
        };
        for token in capabilities
            .iter()
            .filter_map(|c| c.swap_capability.as_ref())
            .flat_map(|swap| swap.supported_tokens.iter())
        {
            let (Some(symbol), Some(uid)) = (&token.symbol, &token.token_uid) else {
                continue;
            };
            let (Some(chain_id), Some(address)) = (&uid.chain_id, &uid.address) else {
                continue;
            };
            if symbol.is_empty() || chain_id.is_empty() || address.is_empty() {
                continue;
            }
            let entries = table.tokens.entry(symbol.clone()).or_insert_with(|| {
                table.available_symbols.push(symbol.clone());
                Vec::new()
            });
            entries.push(TokenEntry {
                chain_id: chain_id.clone(),
                address: address.clone(),
                decimals: token.decimals.unwrap_or(DEFAULT_DECIMALS),
            });
        }
        if table.is_empty() {
            tracing::warn!("Capabilities contained no usable swap tokens");
        }
        table
    }

    /// 精确匹配
    pub fn entries(&self, symbol: &str) -> Option<&[TokenEntry]> {
        self.tokens.get(symbol).map(Vec::as_slice)
    }

    /// 大小写不敏感匹配（精确匹配优先），返回表中的规范符号与记录
    pub fn find(&self, symbol: &str) -> Option<(&str, &[TokenEntry])> {
        let canonical = self
            .available_symbols
            .iter()
            .find(|s| s.as_str() == symbol)
            .or_else(|| {
                self.available_symbols
                    .iter()
                    .find(|s| s.eq_ignore_ascii_case(symbol))
            })?;
        self.tokens
            .get(canonical)
            .map(|e| (canonical.as_str(), e.as_slice()))
    }

    pub fn available_symbols(&self) -> &[String] {
        &self.available_symbols
    }

    pub fn len(&self) -> usize {
        self.available_symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.available_symbols.is_empty()
    }
}
