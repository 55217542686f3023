//! onchain-agent 命令行入口
//!
//! chat：逐行读取 stdin，每行输出一个 Task JSON；tools：列出聚合或单个服务器的工具目录。
//! 日志写 stderr，stdout 只有结果。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use onchain_agent::config::load_config;
use onchain_agent::core::{Task, TaskState};
use onchain_agent::mcp::{Aggregator, HttpConnector, ServerDirectory};
use onchain_agent::{observability, Agent};

/// 链上工具智能体：发现远程 MCP 工具并驱动多步推理
#[derive(Parser, Debug)]
#[command(name = "onchain-agent")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 额外的配置文件（覆盖 config/default.toml）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 交互式会话：每行一条用户输入
    Chat {
        /// 用户地址，作为 Task id
        #[arg(short, long)]
        identity: String,
    },

    /// 列出远程工具目录
    Tools {
        /// 只看单个服务器（不加前缀）；缺省按配置的 selected，"all" 聚合全部
        #[arg(short, long)]
        server: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();
    let cli = Cli::parse();
    let cfg = load_config(cli.config).context("Failed to load config")?;

    match cli.command {
        Commands::Chat { identity } => {
            let mut agent = Agent::from_config(cfg).await.context("Failed to create agent")?;
            agent.start().await.context("Agent initialization failed")?;

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if matches!(input, "exit" | "quit") {
                    break;
                }
                let task = match agent.process_user_input(input, &identity).await {
                    Ok(task) => task,
                    Err(e) => Task::with_text(identity.as_str(), TaskState::Failed, e.to_string()),
                };
                println!("{}", serde_json::to_string(&task)?);
            }
            agent.stop().await;
        }
        Commands::Tools { server } => {
            let selection = server.or_else(|| cfg.mcp.selected.clone());
            let aggregator = Aggregator::new(
                ServerDirectory::from_config(&cfg.mcp),
                Arc::new(HttpConnector),
                Duration::from_millis(cfg.mcp.timeout_ms),
            );
            let loaded = aggregator.load_tools(selection.as_deref()).await;
            println!("{}", loaded.tools.to_schema_json());
            loaded.close().await;
        }
    }
    Ok(())
}
