//! 有界推理循环
//!
//! Plan -> Act (Tool) -> Observe -> 下一轮 Plan，直到模型给出纯文本回复或步数用尽。
//! 同一步的多个工具调用并发执行，全部完成后按调用顺序写回 tool 消息；
//! 模型输出格式错误时由 RecoveryEngine 决定注入纠正提示重试（消耗一步）还是终止。

use futures_util::future::join_all;

use crate::core::{AgentError, RecoveryAction, RecoveryEngine};
use crate::memory::Message;
use crate::react::{parse_llm_output, Planner, PlannerOutput};
use crate::tools::ToolExecutor;

/// 单次对话内默认最大推理步数
pub const DEFAULT_MAX_STEPS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// 模型不再调用工具
    Stop,
    /// 步数用尽
    StepLimit,
}

/// 一次循环的结果：最终文本（可能没有）与本轮新增的消息
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub text: Option<String>,
    pub finish_reason: FinishReason,
    pub messages: Vec<Message>,
    pub steps: usize,
}

/// 推理会话：一轮所需的全部协作者
pub struct ReactSession<'a> {
    pub planner: &'a Planner,
    pub executor: &'a ToolExecutor,
    pub recovery: &'a RecoveryEngine,
    pub max_steps: usize,
}

impl<'a> ReactSession<'a> {
    pub fn new(planner: &'a Planner, executor: &'a ToolExecutor, recovery: &'a RecoveryEngine) -> Self {
        Self {
            planner,
            executor,
            recovery,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }
}

/// 以 history 为上下文运行循环；返回的 messages 只含本轮新增部分
pub async fn react_loop(session: &ReactSession<'_>, history: &[Message]) -> Result<LoopOutcome, AgentError> {
    let mut context = history.to_vec();
    let mut added: Vec<Message> = Vec::new();

    let push = |context: &mut Vec<Message>, added: &mut Vec<Message>, msg: Message| {
        context.push(msg.clone());
        added.push(msg);
    };

    for step in 0..session.max_steps {
        tracing::debug!(step, max_steps = session.max_steps, "Planning");
        let output = match session.planner.plan(&context).await {
            Ok(o) => o,
            Err(e) => match session.recovery.handle(&e) {
                RecoveryAction::RetryWithPrompt(prompt) => {
                    push(&mut context, &mut added, Message::user(prompt));
                    continue;
                }
                RecoveryAction::Abort => {
                    tracing::warn!(step, error = %e, "Reasoning aborted");
                    return Err(e);
                }
            },
        };

        match parse_llm_output(&output) {
            Ok(PlannerOutput::Response(text)) => {
                let text = (!text.is_empty()).then_some(text);
                if let Some(t) = &text {
                    push(&mut context, &mut added, Message::assistant(t.clone()));
                }
                return Ok(LoopOutcome {
                    text,
                    finish_reason: FinishReason::Stop,
                    messages: added,
                    steps: step + 1,
                });
            }
            Ok(PlannerOutput::ToolCalls(calls)) => {
                tracing::info!(
                    step,
                    tools = ?calls.iter().map(|c| c.tool.as_str()).collect::<Vec<_>>(),
                    "Tool calls requested"
                );
                push(&mut context, &mut added, Message::assistant(output.trim().to_string()));
                let outcomes = join_all(
                    calls
                        .iter()
                        .map(|c| session.executor.execute(&c.tool, c.args.clone())),
                )
                .await;
                for (call, outcome) in calls.iter().zip(outcomes) {
                    push(
                        &mut context,
                        &mut added,
                        Message::tool(call.tool.clone(), outcome.to_json_string()),
                    );
                }
            }
            Err(e) => match session.recovery.handle(&e) {
                RecoveryAction::RetryWithPrompt(prompt) => {
                    tracing::warn!(step, error = %e, "Model output was not valid, retrying with correction");
                    push(&mut context, &mut added, Message::user(prompt));
                }
                RecoveryAction::Abort => return Err(e),
            },
        }
    }

    tracing::warn!(max_steps = session.max_steps, "Step budget exhausted");
    Ok(LoopOutcome {
        text: None,
        finish_reason: FinishReason::StepLimit,
        messages: added,
        steps: session.max_steps,
    })
}
