//! Uplift - 心情激励中继服务
//!
//! 接收用户的心情和想要的支持类型，转发给 chat-completion API，
//! 并把生成的文字原样返回。
//!
//! # 功能特性
//!
//! - 静态落地页
//! - `POST /motivate` 单次上游调用，超时有界，不重试
//! - 细分的上游错误文案
//! - `GET /health` 报告密钥是否已配置
//!
//! # 命令行接口
//!
//! - `serve`: 启动 HTTP 服务器
//! - `test`: 向本地服务器发送测试请求

mod commands;
mod config;
mod gateway;
mod relay;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Uplift CLI
#[derive(Parser)]
#[command(name = "uplift")]
#[command(about = "Motivational chat-completion relay", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// 可用的命令
#[derive(Subcommand)]
enum Commands {
    /// 启动 HTTP 服务器
    Serve,
    /// 向本地服务器发送测试请求
    Test {
        /// 心情描述
        #[arg(short, long, default_value = "a little overwhelmed today")]
        feeling: String,
        /// 想要的支持类型
        #[arg(short, long, default_value = "encouragement")]
        response_type: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 加载 .env 文件（如果存在）
    if let Ok(dotenv_path) = std::env::var("UPLIFT_ENV_FILE") {
        dotenvy::from_path(&dotenv_path).ok();
    } else {
        dotenvy::dotenv().ok();
    }

    // 初始化日志系统，UPLIFT_LOG_JSON=1 时输出 JSON
    let json_logs = std::env::var("UPLIFT_LOG_JSON")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "uplift=info".into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(|| {
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false)
        }))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Serve => commands::serve_command(config).await,
        Commands::Test {
            feeling,
            response_type,
        } => commands::test_command(config, feeling, response_type).await,
    }
}
