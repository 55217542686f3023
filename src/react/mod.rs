//! 认知层：Planner（提示与输出解析）与有界推理循环

pub mod loop_;
pub mod planner;

pub use loop_::{react_loop, FinishReason, LoopOutcome, ReactSession, DEFAULT_MAX_STEPS};
pub use planner::{parse_llm_output, Planner, PlannerOutput, ToolCall};
