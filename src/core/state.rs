//! 任务状态：Task 数据模型与状态机
//!
//! 每个 Task 代表一次结果，生来就处于某个状态；状态机不负责推进状态，只负责「处置」：
//! 终态（completed / failed / canceled）返回并清空会话历史，非终态返回并保留历史，
//! 无法识别的状态转成一个合成的 failed Task。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 任务状态（A2A 词表）；Other 仅用于把无法识别的原始值带到状态机
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskState {
    Submitted,
    Working,
    InputRequired,
    Completed,
    Failed,
    Canceled,
    Unknown,
    Other(String),
}

impl TaskState {
    pub fn as_str(&self) -> &str {
        match self {
            TaskState::Submitted => "submitted",
            TaskState::Working => "working",
            TaskState::InputRequired => "input-required",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Canceled => "canceled",
            TaskState::Unknown => "unknown",
            TaskState::Other(s) => s,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Canceled
        )
    }
}

impl From<String> for TaskState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "submitted" => TaskState::Submitted,
            "working" => TaskState::Working,
            "input-required" => TaskState::InputRequired,
            "completed" => TaskState::Completed,
            "failed" => TaskState::Failed,
            "canceled" => TaskState::Canceled,
            "unknown" => TaskState::Unknown,
            _ => TaskState::Other(s),
        }
    }
}

impl From<TaskState> for String {
    fn from(state: TaskState) -> Self {
        state.as_str().to_string()
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 消息片段：文本、结构化数据或文件；其他类型的片段按 Unsupported 接收，不影响整个 Task 的解析
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Part {
    Text { text: String },
    Data { data: Value },
    File { file: Value },
    #[serde(other)]
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub role: String,
    pub parts: Vec<Part>,
}

impl TaskMessage {
    pub fn agent_text(text: impl Into<String>) -> Self {
        Self {
            role: "agent".to_string(),
            parts: vec![Part::Text { text: text.into() }],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<TaskMessage>,
    /// RFC 3339 时间戳
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// 任务产物（如 swap 工具返回的交易数据）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub parts: Vec<Part>,
}

/// 一次工作单元的结果；id 为调用方提供的关联键（本领域即用户地址）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
}

impl Task {
    /// 以单条文本消息构造 Task，并打上当前时间戳
    pub fn with_text(id: impl Into<String>, state: TaskState, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus {
                state,
                message: Some(TaskMessage::agent_text(text)),
                timestamp: Some(chrono::Utc::now().to_rfc3339()),
            },
            artifacts: Vec::new(),
        }
    }

    pub fn with_artifact(mut self, name: impl Into<String>, data: Value) -> Self {
        self.artifacts.push(Artifact {
            name: Some(name.into()),
            parts: vec![Part::Data { data }],
        });
        self
    }

    pub fn state(&self) -> &TaskState {
        &self.status.state
    }

    /// 状态消息中的第一段文本
    pub fn text(&self) -> Option<&str> {
        self.status
            .message
            .as_ref()?
            .parts
            .iter()
            .find_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
    }
}

/// 状态机的处置结果
#[derive(Clone, Debug, PartialEq)]
pub enum Disposition {
    /// 工作单元结束：返回 Task，并清空会话历史
    Terminal(Task),
    /// 工作单元继续：返回 Task，历史保留给下一轮
    Continue(Task),
}

impl Disposition {
    pub fn resets_history(&self) -> bool {
        matches!(self, Disposition::Terminal(_))
    }

    pub fn into_task(self) -> Task {
        match self {
            Disposition::Terminal(t) | Disposition::Continue(t) => t,
        }
    }
}

/// 对一个候选 Task 做处置；identity 用于合成 failed Task 的 id
pub fn dispose(task: Task, identity: &str) -> Disposition {
    match task.state() {
        TaskState::Completed | TaskState::Failed | TaskState::Canceled => {
            tracing::info!(
                state = %task.state(),
                "Task finished, clearing conversation history"
            );
            Disposition::Terminal(task)
        }
        TaskState::InputRequired | TaskState::Submitted | TaskState::Working | TaskState::Unknown => {
            Disposition::Continue(task)
        }
        TaskState::Other(raw) => {
            tracing::warn!(state = %raw, "Unexpected task state");
            let id = if identity.is_empty() { "unknown-user" } else { identity };
            Disposition::Continue(Task::with_text(
                id,
                TaskState::Failed,
                format!("Agent encountered unexpected task state: {}", raw),
            ))
        }
    }
}
