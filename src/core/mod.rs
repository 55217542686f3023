//! 核心层：错误与恢复、任务模型与状态机

pub mod error;
pub mod recovery;
pub mod state;

pub use error::{AgentError, RecoveryAction};
pub use recovery::RecoveryEngine;
pub use state::{dispose, Artifact, Disposition, Part, Task, TaskMessage, TaskState, TaskStatus};
