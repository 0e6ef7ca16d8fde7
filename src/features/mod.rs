/// MCP 工具服务（协议、工具目录、stdio 循环）
pub mod mcp;

/// 样式化二维码生成流水线
pub mod qr;
