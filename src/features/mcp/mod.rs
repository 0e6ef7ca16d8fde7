//! MCP（Model Context Protocol）工具服务：stdio 上的 JSON-RPC 2.0。

pub mod protocol;
pub mod server;
pub mod tools;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION};
pub use server::{McpServer, SERVER_NAME};
pub use tools::{CallToolResult, ToolCall, ToolDefinition, tool_definitions};
