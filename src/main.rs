//! Idle Guard CLI
//!
//! 无子命令时作为守护进程运行：接入事件流并定时检测空闲区域。

use anyhow::Result;
use clap::{Parser, Subcommand};
use idle_guard::cli::{
    handle_backdate, handle_check, handle_clear_state, handle_simulate, load_engine_config,
    resolve_state_path, BackdateArgs, CheckArgs, SimulateArgs,
};
use idle_guard::{Engine, EngineConfig, StateStore};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "idle-guard")]
#[command(about = "Idle Guard - 监控区域长时间无活动时发送告警")]
#[command(version)]
struct Cli {
    /// 配置文件路径 (.yaml / .json / .toml)，默认 ~/.config/idle-guard/rules.yaml
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// 状态文件路径，覆盖配置中的 state_file
    #[arg(long, global = true)]
    state: Option<PathBuf>,
    /// 守护进程模式下只打印告警不发送
    #[arg(long)]
    dry_run: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// 把区域的最后活动时间设为现在
    Simulate(SimulateArgs),
    /// 把区域的最后活动时间设为 N 分钟前
    Backdate(BackdateArgs),
    /// 清空所有活动和告警记录
    ClearState,
    /// 执行一轮空闲检测（不连接事件流）
    Check(CheckArgs),
}

#[tokio::main]
async fn main() {
    // 日志输出到 stderr，stdout 留给命令输出
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("idle_guard=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    // clap 在参数错误时以退出码 2 结束
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!(error = %format!("{:#}", e), "Fatal error");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        None => {
            let config = load_engine_config(cli.config.as_deref())?;
            let engine = Engine::build(config, cli.state, cli.dry_run)?;
            engine.run().await?;
            info!("Idle guard stopped");
        }
        Some(Commands::Check(args)) => {
            let config = load_engine_config(cli.config.as_deref())?;
            let engine = Engine::build(config, cli.state, cli.dry_run || args.dry_run)?;
            handle_check(&engine).await?;
        }
        Some(Commands::Simulate(args)) => {
            let (store, config) = open_store(cli.config, cli.state)?;
            handle_simulate(&args, &store, config.as_ref())?;
        }
        Some(Commands::Backdate(args)) => {
            let (store, config) = open_store(cli.config, cli.state)?;
            handle_backdate(&args, &store, config.as_ref())?;
        }
        Some(Commands::ClearState) => {
            let (store, _) = open_store(cli.config, cli.state)?;
            handle_clear_state(&store)?;
        }
    }

    Ok(())
}

/// 状态命令：指定 `--state` 时配置可选，否则必须能加载配置来确定状态路径
fn open_store(
    config: Option<PathBuf>,
    state: Option<PathBuf>,
) -> Result<(StateStore, Option<EngineConfig>)> {
    let config = match (&state, &config) {
        (Some(_), None) => load_engine_config(None).ok(),
        _ => Some(load_engine_config(config.as_deref())?),
    };
    let path = resolve_state_path(state.as_deref(), config.as_ref());
    Ok((StateStore::open(path), config))
}
