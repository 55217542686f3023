//! 工具层：Tool trait 与注册表、执行器、结果信封、参数 Schema，以及远程与本地工具

pub mod encyclopedia;
pub mod executor;
pub mod outcome;
pub mod registry;
pub mod remote;
pub mod schema;
pub mod swap;

pub use encyclopedia::{load_documentation, AskEncyclopediaTool};
pub use executor::ToolExecutor;
pub use outcome::{ErrorDetail, ToolOutcome};
pub use registry::{Tool, ToolRegistry};
pub use remote::{invoke_remote, RemoteTool};
pub use schema::{tool_call_schema_json, ParamSchema, ParamType};
pub use swap::{SessionIdentity, SwapTokensTool};
