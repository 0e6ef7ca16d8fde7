//! MCP 工具目录：名称、说明、输入 JSON Schema，以及到 [`QrGenerator`] 的分发。

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use super::protocol::JsonRpcError;
use crate::error::QrError;
use crate::features::qr::{
    BasicRequest, EcLevel, FillMode, GradientRequest, ImageRequest, LogoRequest, ModuleShape,
    OutputFormat, QrGenerator, StyleKey, StyledRequest, TransparentRequest,
};

pub const GENERATE_QR: &str = "generate_qr";
pub const GENERATE_STYLED_QR: &str = "generate_styled_qr";
pub const GENERATE_GRADIENT_QR: &str = "generate_gradient_qr";
pub const GENERATE_LOGO_QR: &str = "generate_logo_qr";
pub const GENERATE_IMAGE_QR: &str = "generate_image_qr";
pub const GENERATE_TRANSPARENT_QR: &str = "generate_transparent_qr";
pub const LIST_STYLES: &str = "list_styles";
/// 旧名称，仍可调用但不在 tools/list 中出现
const LIST_STYLES_LEGACY: &str = "list_qr_styles";

#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

/// tools/call 的结果体
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<TextContent>,
    pub structured_content: Value,
    pub is_error: bool,
}

impl CallToolResult {
    pub fn success(value: Value) -> Self {
        let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
        Self {
            content: vec![TextContent { kind: "text", text }],
            structured_content: value,
            is_error: false,
        }
    }

    pub fn failure(err: &QrError) -> Self {
        let code = err.stable_code();
        let message = err.to_string();
        Self {
            content: vec![TextContent {
                kind: "text",
                text: format!("{code}: {message}"),
            }],
            structured_content: json!({ "code": code, "message": message }),
            is_error: true,
        }
    }
}

/// 解析后的工具调用
#[derive(Debug, Clone)]
pub enum ToolCall {
    Basic(BasicRequest),
    Styled(StyledRequest),
    Gradient(GradientRequest),
    Logo(LogoRequest),
    Image(ImageRequest),
    Transparent(TransparentRequest),
    ListStyles,
}

impl ToolCall {
    /// 按工具名反序列化参数；未知工具或参数不合法返回 -32602
    pub fn parse(name: &str, arguments: Option<Value>) -> Result<Self, JsonRpcError> {
        let args = arguments.unwrap_or_else(|| Value::Object(Map::new()));
        Ok(match name {
            GENERATE_QR => ToolCall::Basic(args_for(name, args)?),
            GENERATE_STYLED_QR => ToolCall::Styled(args_for(name, args)?),
            GENERATE_GRADIENT_QR => ToolCall::Gradient(args_for(name, args)?),
            GENERATE_LOGO_QR => ToolCall::Logo(args_for(name, args)?),
            GENERATE_IMAGE_QR => ToolCall::Image(args_for(name, args)?),
            GENERATE_TRANSPARENT_QR => ToolCall::Transparent(args_for(name, args)?),
            LIST_STYLES | LIST_STYLES_LEGACY => ToolCall::ListStyles,
            other => return Err(JsonRpcError::invalid_params(format!("Unknown tool: {other}"))),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::Basic(_) => GENERATE_QR,
            ToolCall::Styled(_) => GENERATE_STYLED_QR,
            ToolCall::Gradient(_) => GENERATE_GRADIENT_QR,
            ToolCall::Logo(_) => GENERATE_LOGO_QR,
            ToolCall::Image(_) => GENERATE_IMAGE_QR,
            ToolCall::Transparent(_) => GENERATE_TRANSPARENT_QR,
            ToolCall::ListStyles => LIST_STYLES,
        }
    }

    /// 是否需要渲染（需要占用渲染许可并移入阻塞线程）
    pub fn renders(&self) -> bool {
        !matches!(self, ToolCall::ListStyles)
    }
}

fn args_for<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, JsonRpcError> {
    serde_json::from_value(args)
        .map_err(|e| JsonRpcError::invalid_params(format!("{tool}: {e}")))
}

/// 同步执行工具调用（可能阻塞：图片解码 / 栅格化 / 写盘）
pub fn execute(generator: &QrGenerator, call: &ToolCall) -> Result<Value, QrError> {
    let value = match call {
        ToolCall::Basic(req) => to_value(generator.generate_basic(req)?),
        ToolCall::Styled(req) => to_value(generator.generate_styled(req)?),
        ToolCall::Gradient(req) => to_value(generator.generate_gradient(req)?),
        ToolCall::Logo(req) => to_value(generator.generate_logo(req)?),
        ToolCall::Image(req) => to_value(generator.generate_image(req)?),
        ToolCall::Transparent(req) => to_value(generator.generate_transparent(req)?),
        ToolCall::ListStyles => to_value(generator.capabilities()),
    };
    value.map_err(|e| QrError::Render(format!("结果序列化失败: {e}")))
}

fn to_value<T: Serialize>(v: T) -> serde_json::Result<Value> {
    serde_json::to_value(v)
}

// ---------------- schemas ----------------

fn string_prop(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

fn enum_prop(description: &str, values: Vec<&str>, default: &str) -> Value {
    json!({ "type": "string", "description": description, "enum": values, "default": default })
}

fn color_prop(description: &str, default: &str) -> Value {
    json!({ "type": "string", "description": description, "default": default })
}

/// data + 输出相关的公共参数
fn base_properties() -> Map<String, Value> {
    let mut props = Map::new();
    props.insert(
        "data".into(),
        string_prop("The text, URL, or data to encode in the QR code."),
    );
    props.insert(
        "output_dir".into(),
        string_prop("Directory where the QR image will be saved. Defaults to the configured output directory."),
    );
    props.insert(
        "filename".into(),
        string_prop("Custom filename without extension or directory parts. Auto-generated if omitted."),
    );
    props.insert(
        "size".into(),
        json!({ "type": "integer", "minimum": 1, "description": "Pixel size of each QR module (default from config, 10)." }),
    );
    props.insert(
        "border".into(),
        json!({ "type": "integer", "minimum": 0, "description": "Number of blank modules around the QR (default from config, 2)." }),
    );
    props
}

fn error_correction_prop() -> Value {
    enum_prop(
        "Error tolerance: L (~7%), M (~15%), Q (~25%), H (~30%).",
        EcLevel::keys(),
        "H",
    )
}

fn shape_prop(default: &str) -> Value {
    enum_prop("Shape of each module.", ModuleShape::keys(), default)
}

fn output_format_prop() -> Value {
    enum_prop("Output format.", OutputFormat::keys(), "png")
}

fn schema(mut props: Map<String, Value>, extra: Vec<(&str, Value)>, required: &[&str]) -> Value {
    for (k, v) in extra {
        props.insert(k.to_string(), v);
    }
    json!({
        "type": "object",
        "properties": props,
        "required": required,
    })
}

/// tools/list 返回的全部工具
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: GENERATE_QR,
            description: "Generate a basic QR code with custom foreground and background colors.",
            input_schema: schema(
                base_properties(),
                vec![
                    ("fg_color", color_prop("Module color in hex, e.g. #000000.", "#000000")),
                    ("bg_color", color_prop("Background color in hex, e.g. #FFFFFF.", "#FFFFFF")),
                    ("error_correction", error_correction_prop()),
                    ("output_format", output_format_prop()),
                ],
                &["data"],
            ),
        },
        ToolDefinition {
            name: GENERATE_STYLED_QR,
            description: "Generate a QR code with a custom module shape and an optional gradient fill.",
            input_schema: schema(
                base_properties(),
                vec![
                    ("module_shape", shape_prop("circle")),
                    (
                        "gradient_style",
                        enum_prop(
                            "Color fill mode (alias: fill_mode).",
                            FillMode::keys(),
                            "solid",
                        ),
                    ),
                    (
                        "gradient_center_color",
                        string_prop("Gradient center/start color in hex. Defaults to fg_color."),
                    ),
                    (
                        "gradient_edge_color",
                        color_prop("Gradient edge/end color in hex.", "#000088"),
                    ),
                    ("fg_color", color_prop("Module color for the solid fill.", "#000000")),
                    ("bg_color", color_prop("Background color in hex.", "#FFFFFF")),
                    ("error_correction", error_correction_prop()),
                    ("output_format", output_format_prop()),
                ],
                &["data"],
            ),
        },
        ToolDefinition {
            name: GENERATE_GRADIENT_QR,
            description: "Generate a QR code filled with a radial, square, horizontal or vertical color gradient.",
            input_schema: schema(
                base_properties(),
                vec![
                    (
                        "gradient_style",
                        enum_prop(
                            "Gradient kind (alias: fill_mode).",
                            FillMode::gradient_keys(),
                            "radial",
                        ),
                    ),
                    ("center_color", color_prop("Inner/start gradient color in hex.", "#FF0000")),
                    ("edge_color", color_prop("Outer/end gradient color in hex.", "#0000FF")),
                    ("bg_color", color_prop("Background color in hex.", "#FFFFFF")),
                    ("module_shape", shape_prop("square")),
                    ("error_correction", error_correction_prop()),
                    ("output_format", output_format_prop()),
                ],
                &["data"],
            ),
        },
        ToolDefinition {
            name: GENERATE_LOGO_QR,
            description: "Generate a QR code with a logo centered on a white rounded pad. Error correction is always H.",
            input_schema: schema(
                base_properties(),
                vec![
                    ("logo_path", string_prop("Absolute path to the logo image (PNG, JPEG, ...).")),
                    (
                        "logo_size_ratio",
                        json!({
                            "type": "number",
                            "minimum": 0.1,
                            "maximum": 0.4,
                            "default": 0.3,
                            "description": "Logo's longest side relative to the QR width; clamped to 0.1-0.4."
                        }),
                    ),
                    ("module_shape", shape_prop("square")),
                    ("fg_color", color_prop("Module color in hex.", "#000000")),
                    ("bg_color", color_prop("Background color in hex.", "#FFFFFF")),
                    ("output_format", output_format_prop()),
                ],
                &["data", "logo_path"],
            ),
        },
        ToolDefinition {
            name: GENERATE_IMAGE_QR,
            description: "Generate a QR code whose modules take their colors from an image.",
            input_schema: schema(
                base_properties(),
                vec![
                    ("image_path", string_prop("Absolute path to the source image.")),
                    ("module_shape", shape_prop("circle")),
                    ("error_correction", error_correction_prop()),
                    ("output_format", output_format_prop()),
                ],
                &["data", "image_path"],
            ),
        },
        ToolDefinition {
            name: GENERATE_TRANSPARENT_QR,
            description: "Generate a PNG QR code with a transparent background.",
            input_schema: schema(
                base_properties(),
                vec![
                    ("module_shape", shape_prop("square")),
                    ("fg_color", color_prop("Module color in hex.", "#000000")),
                    ("error_correction", error_correction_prop()),
                ],
                &["data"],
            ),
        },
        ToolDefinition {
            name: LIST_STYLES,
            description: "List all available module shapes, gradient styles, error correction levels, output formats and current defaults.",
            input_schema: json!({ "type": "object", "properties": {} }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationDefaults;

    #[test]
    fn seven_tools_with_object_schemas() {
        let defs = tool_definitions();
        let names: Vec<_> = defs.iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec![
                "generate_qr",
                "generate_styled_qr",
                "generate_gradient_qr",
                "generate_logo_qr",
                "generate_image_qr",
                "generate_transparent_qr",
                "list_styles"
            ]
        );
        for d in &defs {
            assert_eq!(d.input_schema["type"], "object", "{}", d.name);
        }
        let logo = &defs[3].input_schema;
        assert_eq!(logo["required"], json!(["data", "logo_path"]));
        // Logo 工具不暴露纠错级别
        assert!(logo["properties"].get("error_correction").is_none());
    }

    #[test]
    fn schema_enums_follow_style_registry() {
        let defs = tool_definitions();
        let styled = &defs[1].input_schema["properties"];
        assert_eq!(styled["module_shape"]["enum"], json!(ModuleShape::keys()));
        assert_eq!(styled["gradient_style"]["enum"], json!(FillMode::keys()));
        assert_eq!(styled["error_correction"]["enum"], json!(["L", "M", "Q", "H"]));
        assert_eq!(styled["output_format"]["enum"], json!(["png", "svg"]));

        let gradient = &defs[2].input_schema["properties"]["gradient_style"]["enum"];
        assert_eq!(gradient, &json!(["radial", "square", "horizontal", "vertical"]));
    }

    #[test]
    fn logo_ratio_is_echoed_without_float_widening() {
        let tmp = tempfile::tempdir().unwrap();
        let logo = tmp.path().join("logo.png");
        image::RgbaImage::from_pixel(20, 20, image::Rgba([200, 0, 0, 255]))
            .save(&logo)
            .unwrap();
        let generator = QrGenerator::new(GenerationDefaults {
            output_dir: tmp.path().to_path_buf(),
            size: 4,
            border: 1,
            format: OutputFormat::Png,
        });

        for (requested, echoed) in [(json!(0.3), json!(0.3)), (json!(0.95), json!(0.4))] {
            let call = ToolCall::parse(
                GENERATE_LOGO_QR,
                Some(json!({
                    "data": "ratio",
                    "logo_path": logo.display().to_string(),
                    "logo_size_ratio": requested,
                })),
            )
            .unwrap();
            let v = execute(&generator, &call).unwrap();
            assert_eq!(v["logo_size_ratio"], echoed);
        }
    }

    #[test]
    fn unknown_tool_is_invalid_params() {
        let err = ToolCall::parse("make_coffee", None).expect_err("unknown");
        assert_eq!(err.code, super::super::protocol::INVALID_PARAMS);
    }

    #[test]
    fn missing_required_argument_is_invalid_params() {
        let err = ToolCall::parse(GENERATE_IMAGE_QR, Some(json!({ "data": "x" }))).expect_err("no path");
        assert_eq!(err.code, super::super::protocol::INVALID_PARAMS);
        assert!(err.message.contains("image_path"), "{}", err.message);
    }

    #[test]
    fn legacy_list_name_still_resolves() {
        let call = ToolCall::parse("list_qr_styles", None).unwrap();
        assert_eq!(call.name(), LIST_STYLES);
        assert!(!call.renders());
    }

    #[test]
    fn domain_failure_becomes_error_result() {
        let tmp = tempfile::tempdir().unwrap();
        let generator = QrGenerator::new(GenerationDefaults {
            output_dir: tmp.path().to_path_buf(),
            size: 4,
            border: 1,
            format: OutputFormat::Png,
        });
        let call = ToolCall::parse(
            GENERATE_STYLED_QR,
            Some(json!({ "data": "x", "module_shape": "hexagon" })),
        )
        .unwrap();
        let err = execute(&generator, &call).expect_err("bad shape");
        let result = CallToolResult::failure(&err);
        assert!(result.is_error);
        assert!(result.content[0].text.starts_with("UNSUPPORTED_STYLE_OPTION: "));
        assert_eq!(result.structured_content["code"], "UNSUPPORTED_STYLE_OPTION");
    }
}
