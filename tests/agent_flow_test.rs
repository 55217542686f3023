//! 会话编排集成测试：内存 MCP 服务器 + 脚本化 LLM

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tempfile::TempDir;

use onchain_agent::config::AppConfig;
use onchain_agent::core::{AgentError, TaskState};
use onchain_agent::llm::{ScriptStep, ScriptedLlmClient};
use onchain_agent::mcp::{Aggregator, MockConnector, MockMcpServer, MockReply, ServerDirectory};
use onchain_agent::memory::Role;
use onchain_agent::Agent;

const USER: &str = "0x1111111111111111111111111111111111111111";

fn capabilities() -> Value {
    json!({
        "capabilities": [{ "swapCapability": { "capabilityId": "swap", "supportedTokens": [
            { "symbol": "ETH", "tokenUid": { "chainId": "1", "address": "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE" } },
            { "symbol": "USDC", "decimals": 6, "tokenUid": { "chainId": "1", "address": "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48" } },
            { "symbol": "USDC", "decimals": 6, "tokenUid": { "chainId": "42161", "address": "0xFF970A61A04b1cA14834A43f5dE4533eBDDB5CC8" } }
        ]}}]
    })
}

fn swapping_server() -> MockMcpServer {
    MockMcpServer::new("mock://swapping")
        .with_tool("getCapabilities", "List capabilities", json!({
            "type": "object", "properties": { "type": { "type": "string" } }
        }))
        .with_tool("swapTokens", "Build a swap plan", json!({ "type": "object" }))
        .with_tool("getYield", "Current yield for a token", json!({
            "type": "object", "properties": { "token": { "type": "string" } }
        }))
        .on_call("getCapabilities", MockReply::Json(capabilities()))
        .on_call("swapTokens", MockReply::Json(json!({ "transactions": [{ "to": "0xrouter", "data": "0x" }] })))
}

fn config(dir: &TempDir) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.mcp.servers.insert("swapping".into(), "mock://swapping".into());
    cfg.mcp.provider = Some("swapping".into());
    cfg.mcp.timeout_ms = 500;
    cfg.capabilities.cache_path = dir.path().join("caps.json");
    cfg
}

async fn started_agent(
    server: MockMcpServer,
    llm: ScriptedLlmClient,
) -> (Agent, Arc<MockMcpServer>, Arc<ScriptedLlmClient>, TempDir) {
    let dir = TempDir::new().unwrap();
    let server = Arc::new(server);
    let llm = Arc::new(llm);
    let connector = Arc::new(MockConnector::new().with_server(server.clone()));
    let mut agent = Agent::new(config(&dir), llm.clone(), connector);
    agent.start().await.unwrap();
    (agent, server, llm, dir)
}

#[tokio::test]
async fn test_process_before_start_is_not_initialized() {
    let dir = TempDir::new().unwrap();
    let mut agent = Agent::new(
        config(&dir),
        Arc::new(ScriptedLlmClient::repeating("hi")),
        Arc::new(MockConnector::new()),
    );
    assert!(matches!(
        agent.process_user_input("hello", USER).await,
        Err(AgentError::NotInitialized)
    ));
}

#[tokio::test]
async fn test_start_builds_tool_set_and_prompt() {
    let (agent, server, _, _dir) = started_agent(swapping_server(), ScriptedLlmClient::repeating("ok")).await;
    assert_eq!(
        agent.tool_names(),
        vec!["getCapabilities", "getYield", "swapTokens"]
    );
    assert_eq!(agent.capabilities().unwrap().available_symbols(), ["ETH".to_string(), "USDC".to_string()]);
    let prompt = agent.system_prompt().unwrap();
    assert!(prompt.contains("Supported tokens: ETH, USDC."));
    assert!(prompt.contains("\"fromToken\""));
    assert_eq!(server.calls_to("getCapabilities").await, vec![json!({ "type": "SWAP" })]);
}

#[tokio::test]
async fn test_completed_swap_resets_history() {
    let llm = ScriptedLlmClient::new([
        r#"{"tool": "swapTokens", "args": {"amount": "1", "fromToken": "ETH", "toToken": "USDC", "toChain": "Ethereum"}}"#,
        "Your swap plan is ready.",
    ]);
    let (mut agent, server, _, _dir) = started_agent(swapping_server(), llm).await;

    let task = agent.process_user_input("swap 1 ETH to USDC", USER).await.unwrap();
    assert_eq!(task.id, USER);
    assert_eq!(task.status.state, TaskState::Completed);
    assert_eq!(task.artifacts.len(), 1);
    assert!(agent.history().is_empty());

    let swap_calls = server.calls_to("swapTokens").await;
    assert_eq!(swap_calls.len(), 1);
    assert_eq!(swap_calls[0]["amount"], "1000000000000000000");
    assert_eq!(swap_calls[0]["userAddress"], USER);
}

#[tokio::test]
async fn test_input_required_keeps_history_for_next_turn() {
    let llm = ScriptedLlmClient::new([
        r#"{"tool": "swapTokens", "args": {"amount": "100", "fromToken": "USDC", "toToken": "ETH"}}"#,
        "Which chain is your USDC on?",
        r#"{"tool": "swapTokens", "args": {"amount": "100", "fromToken": "USDC", "fromChain": "arbitrum", "toToken": "ETH"}}"#,
        "Done.",
    ]);
    let (mut agent, server, llm, _dir) = started_agent(swapping_server(), llm).await;

    let task = agent.process_user_input("swap 100 USDC to ETH", USER).await.unwrap();
    assert_eq!(task.status.state, TaskState::InputRequired);
    assert!(task.text().unwrap().contains("Arbitrum"));
    assert!(server.calls_to("swapTokens").await.is_empty());
    let roles: Vec<Role> = agent.history().iter().map(|m| m.role.clone()).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);

    let task = agent.process_user_input("on arbitrum", USER).await.unwrap();
    assert_eq!(task.status.state, TaskState::Completed);
    assert!(agent.history().is_empty());

    // 第二轮的首次规划能看到第一轮的完整对话
    let third = llm.request(2).await.unwrap();
    assert_eq!(third[0].role, Role::System);
    assert_eq!(third[1].content, "swap 100 USDC to ETH");
    assert_eq!(third.last().unwrap().content, "on arbitrum");
    assert_eq!(server.calls_to("swapTokens").await[0]["fromTokenChainId"], "42161");
}

#[tokio::test]
async fn test_failing_tool_still_yields_task() {
    let server = swapping_server().on_call("getYield", MockReply::Error("upstream unavailable".into()));
    let llm = ScriptedLlmClient::new([
        r#"{"tool": "getYield", "args": {"token": "USDC"}}"#,
        "Sorry, something went wrong.",
    ]);
    let (mut agent, _, _, _dir) = started_agent(server, llm).await;

    let task = agent.process_user_input("what is the USDC yield?", USER).await.unwrap();
    assert_eq!(task.status.state, TaskState::Failed);
    assert!(task.text().unwrap().contains("Failed to execute getYield"));
    assert!(agent.history().is_empty());
}

#[tokio::test]
async fn test_timeout_is_a_failed_task() {
    let server = swapping_server().on_call("getYield", MockReply::Hang);
    let llm = ScriptedLlmClient::new([r#"{"tool": "getYield", "args": {"token": "USDC"}}"#, "..."]);
    let (mut agent, _, _, _dir) = started_agent(server, llm).await;
    let task = agent.process_user_input("yield?", USER).await.unwrap();
    assert_eq!(task.status.state, TaskState::Failed);
}

#[tokio::test]
async fn test_plain_payload_falls_back_to_text() {
    let server = swapping_server().on_call("getYield", MockReply::Json(json!({ "apy": "4.2%" })));
    let llm = ScriptedLlmClient::new([
        r#"{"tool": "getYield", "args": {"token": "USDC"}}"#,
        "USDC currently yields 4.2%.",
    ]);
    let (mut agent, _, _, _dir) = started_agent(server, llm).await;

    let task = agent.process_user_input("USDC yield?", USER).await.unwrap();
    assert_eq!(task.status.state, TaskState::Completed);
    assert_eq!(task.text(), Some("USDC currently yields 4.2%."));
    assert_eq!(agent.history().len(), 4);
}

#[tokio::test]
async fn test_unexpected_state_becomes_failed_task() {
    let server = swapping_server().on_call(
        "getYield",
        MockReply::Json(json!({ "id": "remote", "status": { "state": "paused" } })),
    );
    let llm = ScriptedLlmClient::new([r#"{"tool": "getYield", "args": {"token": "USDC"}}"#, "ok"]);
    let (mut agent, _, _, _dir) = started_agent(server, llm).await;

    let task = agent.process_user_input("yield?", USER).await.unwrap();
    assert_eq!(task.id, USER);
    assert_eq!(task.status.state, TaskState::Failed);
    assert!(task.text().unwrap().contains("unexpected task state: paused"));
    assert!(!agent.history().is_empty());
}

#[tokio::test]
async fn test_text_only_turns_grow_history() {
    let llm = ScriptedLlmClient::new(["Hello! What would you like to swap?", "Sure, which token?"]);
    let (mut agent, _, _, _dir) = started_agent(swapping_server(), llm).await;

    let task = agent.process_user_input("hi", USER).await.unwrap();
    assert_eq!(task.status.state, TaskState::Completed);
    assert_eq!(agent.history().len(), 2);
    agent.process_user_input("I want to swap", USER).await.unwrap();
    assert_eq!(agent.history().len(), 4);
}

#[tokio::test]
async fn test_exhausted_budget_is_no_result() {
    let (mut agent, _, llm, _dir) =
        started_agent(swapping_server(), ScriptedLlmClient::repeating(r#"{"tool": "swapTokens", "args": "#)).await;

    let err = agent.process_user_input("swap", USER).await.err().unwrap();
    assert!(matches!(err, AgentError::NoResult));
    assert_eq!(llm.calls().await, 10);
    let last = agent.history().last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert!(last.content.contains("No tool result task processed"));
}

#[tokio::test]
async fn test_empty_reply_is_no_result() {
    let (mut agent, _, _, _dir) = started_agent(swapping_server(), ScriptedLlmClient::new([""])).await;
    assert!(matches!(
        agent.process_user_input("hello", USER).await,
        Err(AgentError::NoResult)
    ));
}

#[tokio::test]
async fn test_model_failure_is_recorded_and_returned() {
    let llm = ScriptedLlmClient::from_steps([ScriptStep::Fail("rate limited".into())]);
    let (mut agent, _, _, _dir) = started_agent(swapping_server(), llm).await;

    let err = agent.process_user_input("swap", USER).await.err().unwrap();
    assert!(matches!(err, AgentError::LlmError(_)));
    let last = agent.history().last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert!(last.content.contains("rate limited"));
}

#[tokio::test]
async fn test_invalid_capabilities_fail_start_and_close_bridge() {
    let dir = TempDir::new().unwrap();
    let server = Arc::new(
        MockMcpServer::new("mock://swapping")
            .on_call("getCapabilities", MockReply::Json(json!({ "capabilities": { "not": "a list" } }))),
    );
    let connector = Arc::new(MockConnector::new().with_server(server.clone()));
    let mut agent = Agent::new(config(&dir), Arc::new(ScriptedLlmClient::repeating("x")), connector);
    assert!(matches!(agent.start().await, Err(AgentError::CapabilityValidation(_))));
    assert!(!agent.is_started());
    assert_eq!(server.close_calls(), 1);
}

#[tokio::test]
async fn test_unreachable_provider_fails_start() {
    let dir = TempDir::new().unwrap();
    let mut agent = Agent::new(
        config(&dir),
        Arc::new(ScriptedLlmClient::repeating("x")),
        Arc::new(MockConnector::new()),
    );
    assert!(matches!(agent.start().await, Err(AgentError::Mcp(_))));
}

#[tokio::test]
async fn test_stop_twice_is_noop() {
    let (mut agent, server, _, _dir) = started_agent(swapping_server(), ScriptedLlmClient::repeating("x")).await;
    agent.stop().await;
    agent.stop().await;
    assert_eq!(server.close_calls(), 1);
    assert!(matches!(
        agent.process_user_input("hi", USER).await,
        Err(AgentError::NotInitialized)
    ));
}

#[tokio::test]
async fn test_aggregator_skips_unreachable_server() {
    let swapping = Arc::new(swapping_server());
    let broken = Arc::new(MockMcpServer::new("mock://broken").failing_listing());
    let connector = Arc::new(
        MockConnector::new()
            .with_server(swapping.clone())
            .with_server(broken),
    );
    let directory = ServerDirectory::new(
        [
            ("swapping".to_string(), "mock://swapping".to_string()),
            ("lending".to_string(), "mock://lending".to_string()),
            ("broken".to_string(), "mock://broken".to_string()),
        ]
        .into_iter()
        .collect(),
        None,
    );
    let aggregator = Aggregator::new(directory, connector, Duration::from_millis(500));
    let loaded = aggregator.load_tools(Some("all")).await;

    assert_eq!(
        loaded.tools.tool_names(),
        vec!["swapping-getCapabilities", "swapping-getYield", "swapping-swapTokens"]
    );
    assert_eq!(loaded.bridges.len(), 2);

    let outcome = loaded
        .tools
        .execute("swapping-getCapabilities", json!({ "type": "SWAP" }))
        .await;
    assert!(!outcome.is_error());
    assert_eq!(swapping.calls_to("getCapabilities").await.len(), 1);

    loaded.close().await;
    assert_eq!(swapping.close_calls(), 1);
}

#[tokio::test]
async fn test_completed_task_with_file_part_resets_history() {
    let server = swapping_server().on_call(
        "getYield",
        MockReply::Json(json!({
            "id": "remote",
            "status": {
                "state": "completed",
                "message": { "role": "agent", "parts": [
                    { "type": "file", "file": { "name": "report.csv", "mimeType": "text/csv" } },
                    { "type": "text", "text": "Yield report attached." }
                ] }
            }
        })),
    );
    let llm = ScriptedLlmClient::new([r#"{"tool": "getYield", "args": {"token": "USDC"}}"#, "Here you go."]);
    let (mut agent, _, _, _dir) = started_agent(server, llm).await;

    let task = agent.process_user_input("USDC yield report", USER).await.unwrap();
    assert_eq!(task.status.state, TaskState::Completed);
    assert_eq!(task.id, "remote");
    assert!(agent.history().is_empty());
}

#[tokio::test]
async fn test_remote_failed_task_keeps_its_message() {
    let failed = json!({
        "id": "remote",
        "status": {
            "state": "failed",
            "message": { "role": "agent", "parts": [{ "type": "text", "text": "Insufficient liquidity on route" }] }
        }
    });
    let server = swapping_server().on_call("getYield", MockReply::Error(failed.to_string()));
    let llm = ScriptedLlmClient::new([r#"{"tool": "getYield", "args": {"token": "USDC"}}"#, "Sorry."]);
    let (mut agent, _, _, _dir) = started_agent(server, llm).await;

    let task = agent.process_user_input("yield?", USER).await.unwrap();
    assert_eq!(task.status.state, TaskState::Failed);
    assert_eq!(task.id, "remote");
    assert_eq!(task.text(), Some("Insufficient liquidity on route"));
    assert!(agent.history().is_empty());
}

#[tokio::test]
async fn test_aggregator_discovers_servers_concurrently() {
    let delay = Duration::from_millis(200);
    let swapping = Arc::new(swapping_server().with_listing_delay(delay));
    let lending = Arc::new(
        MockMcpServer::new("mock://lending")
            .with_tool("borrow", "Borrow a token", json!({ "type": "object" }))
            .with_listing_delay(delay),
    );
    let connector = Arc::new(MockConnector::new().with_server(swapping).with_server(lending));
    let directory = ServerDirectory::new(
        [
            ("swapping".to_string(), "mock://swapping".to_string()),
            ("lending".to_string(), "mock://lending".to_string()),
        ]
        .into_iter()
        .collect(),
        None,
    );
    let aggregator = Aggregator::new(directory, connector, Duration::from_secs(2));

    let started = Instant::now();
    let loaded = aggregator.load_tools(Some("all")).await;
    let elapsed = started.elapsed();

    assert_eq!(loaded.bridges.len(), 2);
    assert_eq!(loaded.tools.tool_names().len(), 4);
    // 两个服务器的列举各需 200ms，串行至少 400ms
    assert!(elapsed < Duration::from_millis(380), "discovery took {elapsed:?}");
    loaded.close().await;
}
