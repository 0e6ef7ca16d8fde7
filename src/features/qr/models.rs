use serde::{Deserialize, Serialize};

use super::styles::EcLevelInfo;

/// 各操作共享的输出参数；未提供时使用进程级默认值
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputOptions {
    /// 输出目录
    #[serde(default)]
    pub output_dir: Option<String>,
    /// 文件名（不含扩展名）
    #[serde(default)]
    pub filename: Option<String>,
    /// 每个模块的像素尺寸
    #[serde(default)]
    pub size: Option<u32>,
    /// 静区宽度（模块数）
    #[serde(default)]
    pub border: Option<u32>,
}

/// 基础二维码：纯色前景 + 背景
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BasicRequest {
    pub data: String,
    #[serde(flatten)]
    pub output: OutputOptions,
    #[serde(default)]
    pub fg_color: Option<String>,
    #[serde(default)]
    pub bg_color: Option<String>,
    #[serde(default)]
    pub error_correction: Option<String>,
    #[serde(default)]
    pub output_format: Option<String>,
}

/// 自定义形状 + 可选渐变
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StyledRequest {
    pub data: String,
    #[serde(flatten)]
    pub output: OutputOptions,
    #[serde(default)]
    pub module_shape: Option<String>,
    #[serde(default, alias = "fill_mode")]
    pub gradient_style: Option<String>,
    /// 渐变中心色（缺省取 fg_color）
    #[serde(default)]
    pub gradient_center_color: Option<String>,
    /// 渐变边缘色（缺省 #000088）
    #[serde(default)]
    pub gradient_edge_color: Option<String>,
    #[serde(default)]
    pub fg_color: Option<String>,
    #[serde(default)]
    pub bg_color: Option<String>,
    #[serde(default)]
    pub error_correction: Option<String>,
    #[serde(default)]
    pub output_format: Option<String>,
}

/// 渐变填充（不接受 solid）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GradientRequest {
    pub data: String,
    #[serde(flatten)]
    pub output: OutputOptions,
    #[serde(default)]
    pub module_shape: Option<String>,
    #[serde(default, alias = "fill_mode")]
    pub gradient_style: Option<String>,
    #[serde(default)]
    pub center_color: Option<String>,
    #[serde(default)]
    pub edge_color: Option<String>,
    #[serde(default)]
    pub bg_color: Option<String>,
    #[serde(default)]
    pub error_correction: Option<String>,
    #[serde(default)]
    pub output_format: Option<String>,
}

/// 居中 Logo；纠错级别固定为 H，传入的 error_correction 会被忽略
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogoRequest {
    pub data: String,
    pub logo_path: String,
    #[serde(flatten)]
    pub output: OutputOptions,
    #[serde(default)]
    pub module_shape: Option<String>,
    #[serde(default)]
    pub fg_color: Option<String>,
    #[serde(default)]
    pub bg_color: Option<String>,
    #[serde(default)]
    pub logo_size_ratio: Option<f64>,
    #[serde(default)]
    pub error_correction: Option<String>,
    #[serde(default)]
    pub output_format: Option<String>,
}

/// 模块颜色取自外部图片
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageRequest {
    pub data: String,
    pub image_path: String,
    #[serde(flatten)]
    pub output: OutputOptions,
    #[serde(default)]
    pub module_shape: Option<String>,
    #[serde(default)]
    pub error_correction: Option<String>,
    #[serde(default)]
    pub output_format: Option<String>,
}

/// 透明背景；始终输出 PNG
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransparentRequest {
    pub data: String,
    #[serde(flatten)]
    pub output: OutputOptions,
    #[serde(default)]
    pub module_shape: Option<String>,
    #[serde(default)]
    pub fg_color: Option<String>,
    #[serde(default)]
    pub error_correction: Option<String>,
}

/// 单次生成的结果记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationResult {
    pub saved_path: String,
    /// 原始数据的前 200 个字符
    pub data: String,
    pub style: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_shape: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradient_style: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fg_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_size_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    pub size: u32,
    pub border: u32,
    pub error_correction: &'static str,
    pub format: &'static str,
    /// 实际采用的二维码版本（1..=40）
    pub version: i16,
}

/// `list_styles` 中的当前默认值
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityDefaults {
    pub size: u32,
    pub border: u32,
    pub format: &'static str,
    pub output_dir: String,
    pub error_correction: &'static str,
}

/// 样式目录与当前默认值
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub module_shapes: Vec<&'static str>,
    pub gradient_styles: Vec<&'static str>,
    pub error_correction_levels: Vec<EcLevelInfo>,
    pub output_formats: Vec<&'static str>,
    pub qr_styles: Vec<&'static str>,
    pub defaults: CapabilityDefaults,
}
