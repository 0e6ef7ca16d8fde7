//! stdio 上的 MCP 服务循环。
//!
//! 每行一个 JSON-RPC 消息。tools/call 各自在独立任务中执行，渲染移入阻塞线程并受
//! `render_semaphore` 限流；所有回复经由单一写任务输出，保证帧不交错。

use std::future::Future;
use std::io;
use std::sync::Arc;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;

use super::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION};
use super::tools::{CallToolResult, ToolCall, execute, tool_definitions};
use crate::features::qr::QrGenerator;

pub const SERVER_NAME: &str = "qrcode-mcp";

const INSTRUCTIONS: &str = "An MCP server that generates awesome QR codes with custom styles. \
Create QR codes with custom colors, gradients, embedded logos, artistic shapes \
(circles, rounded, bars), background images, and transparent PNGs. \
Just provide the data to encode and pick a style.";

/// 回复通道容量
const OUTBOUND_CAPACITY: usize = 64;

#[derive(Debug)]
pub struct McpServer {
    generator: Arc<QrGenerator>,
    render_semaphore: Arc<Semaphore>,
}

impl McpServer {
    pub fn new(generator: QrGenerator, max_parallel: usize) -> Self {
        Self {
            generator: Arc::new(generator),
            render_semaphore: Arc::new(Semaphore::new(max_parallel.max(1))),
        }
    }

    /// 处理单行消息；通知返回 None
    pub async fn handle_message(&self, line: &str) -> Option<JsonRpcResponse> {
        match parse_line(line) {
            Ok(req) => self.dispatch(req).await,
            Err(resp) => Some(resp),
        }
    }

    async fn dispatch(&self, req: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if req.jsonrpc.as_deref().is_some_and(|v| v != "2.0") {
            tracing::debug!("非标准 jsonrpc 版本: {:?}", req.jsonrpc);
        }
        if req.is_notification() {
            tracing::debug!("收到通知: {}", req.method);
            return None;
        }
        let id = req.id.unwrap_or(Value::Null);

        let outcome = match req.method.as_str() {
            "initialize" => Ok(self.initialize_result()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": tool_definitions() })),
            "tools/call" => self.call_tool(req.params).await,
            other => Err(JsonRpcError::method_not_found(other)),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        })
    }

    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            },
            "instructions": INSTRUCTIONS,
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let mut params = match params {
            Some(Value::Object(map)) => map,
            _ => return Err(JsonRpcError::invalid_params("tools/call 需要 name 参数")),
        };
        let name = match params.remove("name") {
            Some(Value::String(name)) => name,
            _ => return Err(JsonRpcError::invalid_params("tools/call 需要 name 参数")),
        };
        let call = ToolCall::parse(&name, params.remove("arguments"))?;
        let tool = call.name();

        let outcome = if call.renders() {
            let _permit = self
                .render_semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| JsonRpcError::internal(format!("获取渲染信号量失败: {e}")))?;
            let generator = Arc::clone(&self.generator);
            tokio::task::spawn_blocking(move || execute(&generator, &call))
                .await
                .map_err(|e| JsonRpcError::internal(format!("阻塞渲染任务执行失败: {e}")))?
        } else {
            execute(&self.generator, &call)
        };

        let result = match outcome {
            Ok(value) => CallToolResult::success(value),
            Err(err) => {
                // 校验类错误只记 info
                if err.is_validation() {
                    tracing::info!("工具参数无效: tool={}, code={}, {}", tool, err.stable_code(), err);
                } else {
                    tracing::warn!("工具调用失败: tool={}, code={}, {}", tool, err.stable_code(), err);
                }
                CallToolResult::failure(&err)
            }
        };
        serde_json::to_value(result).map_err(JsonRpcError::internal)
    }

    /// 服务循环：读到 EOF 或 `shutdown` 完成即停止接收，等待进行中的调用结束后返回。
    pub async fn run<R, W, S>(self: Arc<Self>, reader: R, writer: W, shutdown: S) -> io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
        S: Future<Output = ()>,
    {
        let (tx, mut rx) = mpsc::channel::<JsonRpcResponse>(OUTBOUND_CAPACITY);
        let writer_task = tokio::spawn(async move {
            let mut writer = writer;
            while let Some(resp) = rx.recv().await {
                let mut frame = match serde_json::to_string(&resp) {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::error!("回复序列化失败: {}", e);
                        continue;
                    }
                };
                frame.push('\n');
                writer.write_all(frame.as_bytes()).await?;
                writer.flush().await?;
            }
            Ok::<(), io::Error>(())
        });

        let mut lines = BufReader::new(reader).lines();
        let mut in_flight = JoinSet::new();
        let mut read_error = None;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("收到退出信号，停止接收新请求");
                    break;
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!("请求任务异常退出: {}", e);
                    }
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match parse_line(&line) {
                            Err(resp) => {
                                let _ = tx.send(resp).await;
                            }
                            Ok(req) if req.method == "tools/call" && !req.is_notification() => {
                                let server = Arc::clone(&self);
                                let tx = tx.clone();
                                in_flight.spawn(async move {
                                    if let Some(resp) = server.dispatch(req).await {
                                        let _ = tx.send(resp).await;
                                    }
                                });
                            }
                            Ok(req) => {
                                if let Some(resp) = self.dispatch(req).await {
                                    let _ = tx.send(resp).await;
                                }
                            }
                        }
                    }
                    Ok(None) => {
                        tracing::debug!("输入流已关闭");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("读取输入失败: {}", e);
                        read_error = Some(e);
                        break;
                    }
                },
            }
        }

        if !in_flight.is_empty() {
            tracing::info!("等待 {} 个进行中的调用完成", in_flight.len());
        }
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                tracing::error!("请求任务异常退出: {}", e);
            }
        }
        drop(tx);

        match writer_task.await {
            Ok(result) => result?,
            Err(e) => return Err(io::Error::other(e)),
        }
        match read_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// 在 stdin/stdout 上运行，直到 EOF 或收到退出信号
    pub async fn serve_stdio(self: Arc<Self>) -> io::Result<()> {
        tracing::info!("MCP 服务已启动 (stdio, protocol {})", MCP_PROTOCOL_VERSION);
        let shutdown = async {
            let reason = crate::shutdown::wait_for_signal().await;
            tracing::info!("退出原因: {:?}", reason);
        };
        let result = self.run(tokio::io::stdin(), tokio::io::stdout(), shutdown).await;
        tracing::info!("MCP 服务已退出");
        result
    }
}

/// 解析单行；格式错误时直接给出错误回复
fn parse_line(line: &str) -> Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_str(line)
        .map_err(|e| JsonRpcResponse::failure(Value::Null, JsonRpcError::parse_error(e)))?;
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    serde_json::from_value(value)
        .map_err(|e| JsonRpcResponse::failure(id, JsonRpcError::invalid_request(e)))
}
