use std::env;
use std::sync::Arc;

use qrcode_mcp::features::mcp::SERVER_NAME;
use qrcode_mcp::{AppConfig, McpServer, QrGenerator};
use serde_json::json;

const DESCRIPTION: &str =
    "MCP server: generate awesome QR codes with custom styles, gradients, logos, and more.";

#[derive(Debug, Default)]
struct Args {
    verbose: bool,
    info: bool,
    help: bool,
}

impl Args {
    fn parse(argv: Vec<String>) -> Result<Self, String> {
        let mut args = Self::default();
        for a in &argv {
            match a.as_str() {
                "-v" | "--verbose" => args.verbose = true,
                "--info" => args.info = true,
                "-h" | "--help" => args.help = true,
                other => return Err(format!("未知参数: {other}")),
            }
        }
        Ok(args)
    }
}

fn print_help() {
    println!("{}", usage());
}

fn usage() -> String {
    format!(
        "{SERVER_NAME} {}\n{DESCRIPTION}\n\n用法: {SERVER_NAME} [选项]\n\n选项:\n  -v, --verbose  输出调试日志\n      --info     打印服务能力与可用样式后退出\n  -h, --help     显示帮助\n\n环境变量:\n  QRCODE_MCP_CONFIG  配置文件路径（默认 ./config.toml）\n  RUST_LOG           日志过滤（优先于 --verbose 与配置文件）",
        env!("CARGO_PKG_VERSION")
    )
}

fn init_tracing(verbose: bool, configured_level: &str) {
    let default_filter = if verbose {
        "qrcode_mcp=debug".to_string()
    } else {
        format!("qrcode_mcp={configured_level}")
    };
    // stdout 承载协议帧，日志只能写 stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let args = match Args::parse(env::args().skip(1).collect()) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}\n\n{}", usage());
            std::process::exit(2);
        }
    };
    if args.help {
        print_help();
        return;
    }

    // Load config
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(args.verbose, "info");
            tracing::error!("Config init failed: {}", e);
            std::process::exit(1);
        }
    };
    init_tracing(args.verbose, &config.logging.level);
    match &config.source {
        Some(path) => tracing::info!("已从 {:?} 加载配置文件", path),
        None => tracing::info!("未找到配置文件，使用内置默认值与环境变量"),
    }
    tracing::debug!("配置加载完成: {:?}", config);

    let defaults = match config.generation_defaults() {
        Ok(defaults) => defaults,
        Err(e) => {
            tracing::error!("配置校验失败: {}", e);
            std::process::exit(1);
        }
    };
    tracing::debug!("生成默认值: {:?}", defaults);
    let generator = QrGenerator::new(defaults);

    if args.info {
        let info = json!({
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "description": DESCRIPTION,
            "capabilities": generator.capabilities(),
        });
        match serde_json::to_string_pretty(&info) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                tracing::error!("序列化服务信息失败: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    let parallelism = config.render.effective_parallelism();
    tracing::info!(
        "Starting {} v{} (渲染并发上限 {})",
        SERVER_NAME,
        env!("CARGO_PKG_VERSION"),
        parallelism
    );
    let server = Arc::new(McpServer::new(generator, parallelism));
    if let Err(e) = server.serve_stdio().await {
        tracing::error!("MCP 服务异常退出: {}", e);
        std::process::exit(1);
    }
}
