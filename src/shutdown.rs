//! 退出信号监听
//!
//! Unix 上同时监听 SIGINT / SIGTERM，其他平台只监听 Ctrl+C。

use tracing::{error, info};

/// 退出原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// 用户中断信号 (Ctrl+C)
    Interrupt,
    /// 终止信号 (SIGTERM)
    Terminate,
}

/// 等待第一个退出信号；信号注册失败时永不返回（由 stdin EOF 结束服务）
pub async fn wait_for_signal() -> ShutdownReason {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let (mut sigint, mut sigterm) =
            match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
                (Ok(i), Ok(t)) => (i, t),
                (Err(e), _) | (_, Err(e)) => {
                    error!("注册信号处理器失败: {}", e);
                    return std::future::pending().await;
                }
            };

        tokio::select! {
            _ = sigint.recv() => {
                info!("接收到SIGINT信号 (Ctrl+C)");
                ShutdownReason::Interrupt
            }
            _ = sigterm.recv() => {
                info!("接收到SIGTERM信号");
                ShutdownReason::Terminate
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("监听Ctrl+C信号失败: {}", e);
            return std::future::pending().await;
        }
        info!("接收到Ctrl+C信号");
        ShutdownReason::Interrupt
    }
}
