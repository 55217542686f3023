//! 参数 Schema：远程工具的 JSON Schema 转换与校验，以及工具调用格式的 Schema 生成
//!
//! ParamSchema::from_json_schema 是纯函数：object schema 逐属性映射为 string / number / boolean，
//! 其余类型（含 integer）一律视为 any；缺失或非 object 的 schema 得到空参数表。
//! 校验时声明为具体类型的属性必须存在且类型匹配，any 属性可缺省，未声明的键被剥离。

use std::collections::BTreeMap;

use schemars::{schema_for, JsonSchema};
use serde_json::{json, Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Any,
}

impl ParamType {
    fn from_type_name(name: Option<&str>) -> Self {
        match name {
            Some("string") => ParamType::String,
            Some("number") => ParamType::Number,
            Some("boolean") => ParamType::Boolean,
            _ => ParamType::Any,
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Any => true,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Any => "any",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParamProp {
    pub ty: ParamType,
    pub description: Option<String>,
}

/// 远程工具的参数表
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamSchema {
    properties: BTreeMap<String, ParamProp>,
}

impl ParamSchema {
    pub fn from_json_schema(schema: Option<&Value>) -> Self {
        let Some(schema) = schema else {
            return Self::default();
        };
        if schema.get("type").and_then(Value::as_str) != Some("object") {
            return Self::default();
        }
        let Some(props) = schema.get("properties").and_then(Value::as_object) else {
            return Self::default();
        };
        let properties = props
            .iter()
            .map(|(key, prop)| {
                let ty = ParamType::from_type_name(prop.get("type").and_then(Value::as_str));
                let description = prop
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                (key.clone(), ParamProp { ty, description })
            })
            .collect();
        Self { properties }
    }

    pub fn properties(&self) -> &BTreeMap<String, ParamProp> {
        &self.properties
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// 校验并规范化参数：返回只含声明属性的对象
    pub fn validate(&self, args: &Value) -> Result<Value, String> {
        let obj = match args {
            Value::Object(map) => map,
            Value::Null => return self.validate(&Value::Object(Map::new())),
            other => return Err(format!("expected an object of arguments, got {other}")),
        };
        let mut cleaned = Map::new();
        for (key, prop) in &self.properties {
            match obj.get(key) {
                Some(value) if prop.ty.accepts(value) => {
                    cleaned.insert(key.clone(), value.clone());
                }
                Some(value) => {
                    return Err(format!(
                        "argument '{key}' must be a {}, got {value}",
                        prop.ty.as_str()
                    ));
                }
                None if prop.ty == ParamType::Any => {}
                None => return Err(format!("missing required argument '{key}'")),
            }
        }
        Ok(Value::Object(cleaned))
    }

    /// 重新导出为 JSON Schema（拼入工具目录）
    pub fn to_json_schema(&self) -> Value {
        let mut props = Map::new();
        let mut required = Vec::new();
        for (key, prop) in &self.properties {
            let mut p = Map::new();
            if prop.ty != ParamType::Any {
                p.insert("type".into(), json!(prop.ty.as_str()));
                required.push(json!(key));
            }
            if let Some(desc) = &prop.description {
                p.insert("description".into(), json!(desc));
            }
            props.insert(key.clone(), Value::Object(p));
        }
        json!({
            "type": "object",
            "properties": props,
            "required": required,
        })
    }
}

/// 工具调用请求格式：与推理循环解析的 `{"tool": "...", "args": {...}}` 一致（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ToolCallFormat {
    /// 工具名，如 swapTokens、askEncyclopedia
    pub tool: String,
    /// 工具参数，依工具不同而不同
    pub args: BTreeMap<String, Value>,
}

/// 返回工具调用的 JSON Schema 字符串，可拼入 system prompt
pub fn tool_call_schema_json() -> String {
    let schema = schema_for!(ToolCallFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
