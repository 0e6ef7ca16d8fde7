/// 统一错误处理模块
pub mod error;

/// 配置模块
pub mod config;

/// 功能聚合模块
pub mod features;

/// 退出信号监听模块
pub mod shutdown;

// 导出常用类型供外部使用
pub use config::{AppConfig, GenerationDefaults};
pub use error::QrError;
pub use features::mcp::McpServer;
pub use features::qr::QrGenerator;
