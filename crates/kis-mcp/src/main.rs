//! KIS MCP 서버 실행 파일.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use kis_exchange::{KisClient, KisConfig};
use kis_mcp::{create_router, McpState, ServerConfig};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "kis-mcp")]
#[command(about = "KIS MCP Server (Korea Investment & Securities)", long_about = None)]
#[command(version)]
struct Cli {
    /// 바인딩 호스트 (기본: MCP_HOST 또는 0.0.0.0)
    #[arg(long)]
    host: Option<String>,

    /// 바인딩 포트 (기본: MCP_PORT 또는 8080)
    #[arg(long)]
    port: Option<u16>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // stdout은 MCP 클라이언트가 점유할 수 있으므로 로그는 stderr로
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "kis_mcp={},kis_exchange={},tower_http={}",
                    cli.log_level, cli.log_level, cli.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let server = ServerConfig::from_env().with_overrides(cli.host, cli.port);
    let kis = KisConfig::from_env().context("KIS 설정 로드 실패")?;
    info!(config = ?kis, "KIS 설정 로드 완료");

    let client = Arc::new(KisClient::new(kis).context("KIS 클라이언트 생성 실패")?);
    let app = create_router(McpState::new(client), &server.path);

    let addr = server
        .socket_addr()
        .with_context(|| format!("잘못된 바인딩 주소: {}:{}", server.host, server.port))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("KIS MCP Server listening on http://{}{}", addr, server.path);

    let shutdown_token = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown_token.clone()));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_token.cancelled_owned())
        .await?;

    info!("Server stopped gracefully");
    Ok(())
}

/// Ctrl+C 또는 SIGTERM 수신 시 종료 토큰 취소.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    shutdown_token.cancel();
}
