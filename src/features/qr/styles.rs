//! 固定样式目录：模块形状、填充模式、纠错级别、输出格式。
//!
//! 所有字符串到行为的映射都集中在这里，其余组件只接触枚举值。

use serde::Serialize;

use crate::error::QrError;

/// 由小写字符串键索引的封闭目录
pub trait StyleKey: Sized + Copy + 'static {
    /// 调用方参数名（用于错误信息）
    const FIELD: &'static str;
    /// 目录全集（目录顺序）
    const ALL: &'static [Self];

    fn key(self) -> &'static str;

    /// 大小写不敏感查找；未知键返回 `UnsupportedStyleOption`，附带排序后的合法值列表。
    fn parse(raw: &str) -> Result<Self, QrError> {
        let wanted = raw.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.key().to_ascii_lowercase() == wanted)
            .ok_or_else(|| unsupported(Self::FIELD, raw, Self::ALL.iter().map(|v| v.key())))
    }

    /// 目录顺序的全部键
    fn keys() -> Vec<&'static str> {
        Self::ALL.iter().map(|v| v.key()).collect()
    }
}

fn unsupported(
    field: &'static str,
    raw: &str,
    keys: impl Iterator<Item = &'static str>,
) -> QrError {
    let mut valid: Vec<&'static str> = keys.collect();
    valid.sort_unstable();
    QrError::UnsupportedStyleOption {
        field,
        value: raw.to_string(),
        valid,
    }
}

/// 暗模块的绘制形状
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleShape {
    Square,
    Gapped,
    Circle,
    Rounded,
    VerticalBars,
    HorizontalBars,
}

impl StyleKey for ModuleShape {
    const FIELD: &'static str = "module_shape";
    const ALL: &'static [Self] = &[
        ModuleShape::Square,
        ModuleShape::Gapped,
        ModuleShape::Circle,
        ModuleShape::Rounded,
        ModuleShape::VerticalBars,
        ModuleShape::HorizontalBars,
    ];

    fn key(self) -> &'static str {
        match self {
            ModuleShape::Square => "square",
            ModuleShape::Gapped => "gapped",
            ModuleShape::Circle => "circle",
            ModuleShape::Rounded => "rounded",
            ModuleShape::VerticalBars => "vertical_bars",
            ModuleShape::HorizontalBars => "horizontal_bars",
        }
    }
}

/// 颜色填充模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FillMode {
    Solid,
    Radial,
    Square,
    Horizontal,
    Vertical,
}

impl StyleKey for FillMode {
    const FIELD: &'static str = "gradient_style";
    const ALL: &'static [Self] = &[
        FillMode::Solid,
        FillMode::Radial,
        FillMode::Square,
        FillMode::Horizontal,
        FillMode::Vertical,
    ];

    fn key(self) -> &'static str {
        match self {
            FillMode::Solid => "solid",
            FillMode::Radial => "radial",
            FillMode::Square => "square",
            FillMode::Horizontal => "horizontal",
            FillMode::Vertical => "vertical",
        }
    }
}

impl FillMode {
    /// 仅接受渐变（非 solid）模式
    pub fn parse_gradient(raw: &str) -> Result<Self, QrError> {
        match Self::parse(raw) {
            Ok(mode) if mode != FillMode::Solid => Ok(mode),
            _ => Err(unsupported(Self::FIELD, raw, Self::gradient_keys().into_iter())),
        }
    }

    /// 除 solid 外的渐变键（目录顺序）
    pub fn gradient_keys() -> Vec<&'static str> {
        Self::ALL
            .iter()
            .filter(|m| **m != FillMode::Solid)
            .map(|m| m.key())
            .collect()
    }
}

/// 纠错级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EcLevel {
    L,
    M,
    Q,
    H,
}

impl StyleKey for EcLevel {
    const FIELD: &'static str = "error_correction";
    const ALL: &'static [Self] = &[EcLevel::L, EcLevel::M, EcLevel::Q, EcLevel::H];

    fn key(self) -> &'static str {
        match self {
            EcLevel::L => "L",
            EcLevel::M => "M",
            EcLevel::Q => "Q",
            EcLevel::H => "H",
        }
    }
}

impl EcLevel {
    /// 可恢复的码字比例（近似）
    pub fn recovery(self) -> &'static str {
        match self {
            EcLevel::L => "~7%",
            EcLevel::M => "~15%",
            EcLevel::Q => "~25%",
            EcLevel::H => "~30%",
        }
    }

    pub fn note(self) -> &'static str {
        match self {
            EcLevel::L => "smallest QR",
            EcLevel::M => "balanced",
            EcLevel::Q => "good for styling",
            EcLevel::H => "best for logos",
        }
    }

    pub(crate) fn to_qrcode(self) -> qrcode::EcLevel {
        match self {
            EcLevel::L => qrcode::EcLevel::L,
            EcLevel::M => qrcode::EcLevel::M,
            EcLevel::Q => qrcode::EcLevel::Q,
            EcLevel::H => qrcode::EcLevel::H,
        }
    }
}

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PNG（栅格，支持 alpha）
    #[default]
    Png,
    /// SVG（矢量）
    Svg,
}

impl StyleKey for OutputFormat {
    const FIELD: &'static str = "output_format";
    const ALL: &'static [Self] = &[OutputFormat::Png, OutputFormat::Svg];

    fn key(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Svg => "svg",
        }
    }
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        self.key()
    }
}

/// 纠错级别说明（list_styles 输出）
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EcLevelInfo {
    pub level: &'static str,
    pub recovery: &'static str,
    pub note: &'static str,
}

/// 生成风格一览（与六个生成操作一一对应）
pub const QR_STYLES: &[&str] = &[
    "basic — solid colors, clean look",
    "styled — custom shapes + optional gradients",
    "gradient — beautiful color gradient fills",
    "logo — embedded center image/logo",
    "background_image — modules colored from an image",
    "transparent — PNG with transparent background",
];

pub fn ec_level_catalog() -> Vec<EcLevelInfo> {
    EcLevel::ALL
        .iter()
        .map(|l| EcLevelInfo {
            level: l.key(),
            recovery: l.recovery(),
            note: l.note(),
        })
        .collect()
}
