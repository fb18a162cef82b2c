//! # Discourse API Proxy 主程序
//!
//! 加载配置并启动代理服务。配置无效时服务依然启动，所有请求返回 500。

use clap::Parser;
use std::path::PathBuf;

use discourse_api_proxy::{
    ProxyError, lerror, linfo,
    config::{ConfigManager, DEFAULT_LISTEN, ENV_PREFIX},
    error::Context,
    logging::{self, LogComponent, LogStage},
    proxy::{ProxyServer, ProxySettings, ProxyState},
};

/// Discourse API 鉴权代理
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 监听地址（覆盖配置文件）
    #[arg(short, long)]
    listen: Option<String>,

    /// 日志级别
    #[arg(long)]
    log_level: Option<String>,

    /// 只校验配置文件，失败时以非零状态退出
    #[arg(long)]
    check: bool,

    /// 打印日志配置说明
    #[arg(long)]
    log_help: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.log_help {
        logging::print_logging_help();
        return Ok(());
    }

    logging::init_optimized_logging(cli.log_level.as_ref());

    let path = ConfigManager::resolve_path(cli.config.as_deref());
    let loaded = ConfigManager::from_file(&path);

    if cli.check {
        let manager = loaded.context("配置加载失败")?;
        let settings = ProxySettings::from_config(manager.config()).context("配置校验失败")?;
        println!(
            "配置有效: {} (上游 {}, {} 个客户端密钥)",
            path.display(),
            settings.upstream.as_str(),
            settings.credentials.len()
        );
        return Ok(());
    }

    let (state, configured_listen) = match loaded {
        Ok(manager) => {
            let config = manager.into_config();
            (ProxyState::from_config(&config), Some(config.server.listen))
        }
        Err(e) => (
            ProxyState::misconfigured(ProxyError::from(e)),
            std::env::var(format!("{ENV_PREFIX}LISTEN")).ok(),
        ),
    };

    if let Err(err) = state.runtime() {
        lerror!(
            "system",
            LogStage::Configuration,
            LogComponent::Main,
            "config_invalid",
            &format!("配置不可用，所有请求将返回 500: {err}"),
            path = %path.display()
        );
    }

    let listen = cli
        .listen
        .or(configured_listen)
        .unwrap_or_else(|| DEFAULT_LISTEN.to_string());

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Main,
        "service_starting",
        "服务启动",
        listen = %listen
    );

    if let Err(e) = ProxyServer::new(listen, state).serve().await {
        lerror!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "service_start_failed",
            &format!("服务启动失败: {e:?}")
        );
        std::process::exit(1);
    }

    linfo!(
        "system",
        LogStage::Shutdown,
        LogComponent::Main,
        "service_shutdown",
        "服务正常关闭"
    );
    Ok(())
}
