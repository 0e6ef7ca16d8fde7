use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use qrcode_mcp::features::qr::OutputFormat;
use qrcode_mcp::{GenerationDefaults, McpServer, QrGenerator};
use serde_json::{Value, json};
use tokio::io::AsyncReadExt;

fn server(dir: &Path) -> Arc<McpServer> {
    Arc::new(McpServer::new(
        QrGenerator::new(GenerationDefaults {
            output_dir: dir.to_path_buf(),
            size: 6,
            border: 2,
            format: OutputFormat::Png,
        }),
        2,
    ))
}

/// 逐行发送请求直到 EOF，按 id 收集所有回复
async fn exchange(server: Arc<McpServer>, requests: &[Value]) -> HashMap<String, Value> {
    let mut input = String::new();
    for r in requests {
        input.push_str(&r.to_string());
        input.push('\n');
    }
    let (mut client, server_out) = tokio::io::duplex(1 << 20);
    server
        .run(input.as_bytes(), server_out, std::future::pending::<()>())
        .await
        .expect("server loop");

    let mut out = String::new();
    client.read_to_string(&mut out).await.expect("read replies");
    out.lines()
        .map(|l| {
            let v: Value = serde_json::from_str(l).expect("reply is json");
            (v["id"].to_string(), v)
        })
        .collect()
}

fn call(id: u64, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": name, "arguments": arguments }
    })
}

#[tokio::test]
async fn handshake_and_tool_listing() {
    let tmp = tempfile::tempdir().unwrap();
    let replies = exchange(
        server(tmp.path()),
        &[
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {
                "protocolVersion": "2024-11-05", "capabilities": {}, "clientInfo": {"name": "t", "version": "0"}
            }}),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
            json!({"jsonrpc": "2.0", "id": 3, "method": "ping"}),
        ],
    )
    .await;

    // 通知不产生回复
    assert_eq!(replies.len(), 3);
    assert_eq!(replies["1"]["result"]["protocolVersion"], "2024-11-05");
    let tools = replies["2"]["result"]["tools"].as_array().unwrap();
    let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(names.len(), 7);
    assert!(names.contains(&"generate_transparent_qr"));
    assert!(names.contains(&"list_styles"));
    for t in tools {
        assert!(t["inputSchema"]["properties"].is_object());
    }
    assert_eq!(replies["3"]["result"], json!({}));
}

#[tokio::test]
async fn generate_qr_writes_file_and_returns_structured_result() {
    let tmp = tempfile::tempdir().unwrap();
    let replies = exchange(
        server(tmp.path()),
        &[call(7, "generate_qr", json!({ "data": "hello", "filename": "hello" }))],
    )
    .await;

    let result = &replies["7"]["result"];
    assert_eq!(result["isError"], false);
    let structured = &result["structuredContent"];
    assert_eq!(structured["style"], "basic");
    assert_eq!(structured["size"], 6);
    assert_eq!(structured["error_correction"], "H");
    let saved = structured["saved_path"].as_str().unwrap();
    assert_eq!(Path::new(saved), tmp.path().join("hello.png"));
    assert!(Path::new(saved).is_file());

    let text = result["content"][0]["text"].as_str().unwrap();
    let echoed: Value = serde_json::from_str(text).unwrap();
    assert_eq!(&echoed, structured);
}

#[tokio::test]
async fn domain_errors_are_tool_results_not_protocol_errors() {
    let tmp = tempfile::tempdir().unwrap();
    let replies = exchange(
        server(tmp.path()),
        &[
            call(1, "generate_qr", json!({ "data": "x", "fg_color": "#12" })),
            call(2, "generate_gradient_qr", json!({ "data": "x", "fill_mode": "solid" })),
        ],
    )
    .await;

    let bad_color = &replies["1"]["result"];
    assert_eq!(bad_color["isError"], true);
    assert!(
        bad_color["content"][0]["text"]
            .as_str()
            .unwrap()
            .starts_with("INVALID_COLOR_FORMAT: ")
    );
    assert_eq!(bad_color["structuredContent"]["code"], "INVALID_COLOR_FORMAT");

    let solid = &replies["2"]["result"];
    assert_eq!(solid["isError"], true);
    assert_eq!(solid["structuredContent"]["code"], "UNSUPPORTED_STYLE_OPTION");
}

#[tokio::test]
async fn protocol_errors_use_jsonrpc_codes() {
    let tmp = tempfile::tempdir().unwrap();
    let replies = exchange(
        server(tmp.path()),
        &[
            json!({"jsonrpc": "2.0", "id": 1, "method": "prompts/list"}),
            call(2, "generate_barcode", json!({ "data": "x" })),
            call(3, "generate_logo_qr", json!({ "data": "x" })),
            json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call", "params": {}}),
        ],
    )
    .await;

    assert_eq!(replies["1"]["error"]["code"], -32601);
    assert_eq!(replies["2"]["error"]["code"], -32602);
    assert_eq!(replies["3"]["error"]["code"], -32602);
    assert_eq!(replies["4"]["error"]["code"], -32602);
}

#[tokio::test]
async fn list_styles_reports_catalog_and_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    let replies = exchange(server(tmp.path()), &[call(9, "list_styles", json!({}))]).await;
    let caps = &replies["9"]["result"]["structuredContent"];
    assert_eq!(caps["module_shapes"][0], "square");
    assert_eq!(caps["gradient_styles"].as_array().unwrap().len(), 5);
    assert_eq!(caps["error_correction_levels"][3]["level"], "H");
    assert_eq!(caps["output_formats"], json!(["png", "svg"]));
    assert_eq!(caps["defaults"]["size"], 6);
    assert_eq!(caps["defaults"]["format"], "png");
    assert_eq!(
        caps["defaults"]["output_dir"],
        tmp.path().display().to_string()
    );
}

#[tokio::test]
async fn concurrent_calls_all_complete_before_exit() {
    let tmp = tempfile::tempdir().unwrap();
    let requests: Vec<Value> = (0..6)
        .map(|i| {
            call(
                100 + i,
                "generate_styled_qr",
                json!({ "data": format!("item-{i}"), "filename": format!("item_{i}"), "gradient_style": "radial" }),
            )
        })
        .collect();
    let replies = exchange(server(tmp.path()), &requests).await;

    assert_eq!(replies.len(), 6);
    for i in 0..6 {
        let r = &replies[&(100 + i).to_string()]["result"];
        assert_eq!(r["isError"], false, "{r}");
        assert!(tmp.path().join(format!("item_{i}.png")).is_file());
    }
}

#[tokio::test]
async fn malformed_line_gets_parse_error_and_loop_continues() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut client, server_out) = tokio::io::duplex(1 << 16);
    let input = "{oops\n{\"jsonrpc\":\"2.0\",\"id\":5,\"method\":\"ping\"}\n";
    server(tmp.path())
        .run(input.as_bytes(), server_out, std::future::pending::<()>())
        .await
        .unwrap();

    let mut out = String::new();
    client.read_to_string(&mut out).await.unwrap();
    let lines: Vec<Value> = out.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["error"]["code"], -32700);
    assert_eq!(lines[1]["id"], 5);
}
