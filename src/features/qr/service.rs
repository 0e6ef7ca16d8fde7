use std::path::{Path, PathBuf};

use super::color::{Rgb, parse_hex_color};
use super::encoder::encode;
use super::models::{
    BasicRequest, Capabilities, CapabilityDefaults, GenerationResult, GradientRequest,
    ImageRequest, LogoRequest, OutputOptions, StyledRequest, TransparentRequest,
};
use super::output::{OutputWriter, check_filename};
use super::overlay::{self, LOGO_RATIO_DEFAULT, LogoOverlay, Overlay, OverlayAsset, clamp_logo_ratio};
use super::renderer::{ColorFill, StyleSpec, render};
use super::styles::{
    EcLevel, FillMode, ModuleShape, OutputFormat, QR_STYLES, StyleKey, ec_level_catalog,
};
use crate::config::GenerationDefaults;
use crate::error::QrError;

/// 结果记录中保留的数据长度（字符）
pub const DATA_ECHO_LIMIT: usize = 200;

const DEFAULT_FG: Rgb = Rgb::BLACK;
const DEFAULT_BG: Rgb = Rgb::WHITE;
const DEFAULT_LEVEL: EcLevel = EcLevel::H;
const STYLED_EDGE: Rgb = Rgb::new(0x00, 0x00, 0x88);
const GRADIENT_CENTER: Rgb = Rgb::new(0xFF, 0x00, 0x00);
const GRADIENT_EDGE: Rgb = Rgb::new(0x00, 0x00, 0xFF);

/// 二维码生成门面：六个生成操作 + 样式目录
///
/// 无跨请求状态，可在多个线程间共享（`Arc<QrGenerator>`）。
/// 每个操作先完成全部校验，再依次执行 编码 → 渲染 → 后处理 → 落盘。
#[derive(Debug, Clone)]
pub struct QrGenerator {
    defaults: GenerationDefaults,
}

/// 合并默认值后的输出参数
struct ResolvedOutput {
    writer: OutputWriter,
    filename: Option<String>,
    size: u32,
    border: u32,
}

impl QrGenerator {
    pub fn new(defaults: GenerationDefaults) -> Self {
        Self { defaults }
    }

    /// 纯色前景 + 背景的基础二维码
    pub fn generate_basic(&self, req: &BasicRequest) -> Result<GenerationResult, QrError> {
        let fg = color("fg_color", req.fg_color.as_deref(), DEFAULT_FG)?;
        let bg = color("bg_color", req.bg_color.as_deref(), DEFAULT_BG)?;
        let level = self.level(req.error_correction.as_deref())?;
        let format = self.format(req.output_format.as_deref())?;
        let out = self.resolve_output(&req.output)?;

        let spec = StyleSpec {
            shape: ModuleShape::Square,
            fill: ColorFill::Solid { front: fg, back: bg },
            ec_level: level,
            box_size: out.size,
            border: out.border,
            format,
            overlay: Overlay::None,
        };
        let (path, version) = self.produce(&req.data, &spec, &out, "qr_basic")?;

        Ok(GenerationResult {
            fg_color: Some(fg.to_string()),
            bg_color: Some(bg.to_string()),
            ..base_result("basic", &req.data, &path, &spec, version)
        })
    }

    /// 自定义模块形状，可选渐变填充
    pub fn generate_styled(&self, req: &StyledRequest) -> Result<GenerationResult, QrError> {
        let shape = shape(req.module_shape.as_deref(), ModuleShape::Circle)?;
        let mode = match req.gradient_style.as_deref() {
            Some(raw) => FillMode::parse(raw)?,
            None => FillMode::Solid,
        };
        let fg = color("fg_color", req.fg_color.as_deref(), DEFAULT_FG)?;
        let bg = color("bg_color", req.bg_color.as_deref(), DEFAULT_BG)?;
        let fill = if mode == FillMode::Solid {
            ColorFill::Solid { front: fg, back: bg }
        } else {
            ColorFill::Gradient {
                mode,
                center: color("gradient_center_color", req.gradient_center_color.as_deref(), fg)?,
                edge: color("gradient_edge_color", req.gradient_edge_color.as_deref(), STYLED_EDGE)?,
                back: bg,
            }
        };
        let level = self.level(req.error_correction.as_deref())?;
        let format = self.format(req.output_format.as_deref())?;
        let out = self.resolve_output(&req.output)?;

        let (center_color, edge_color) = match &fill {
            ColorFill::Gradient { center, edge, .. } => (Some(center.to_string()), Some(edge.to_string())),
            _ => (None, None),
        };
        let spec = StyleSpec {
            shape,
            fill,
            ec_level: level,
            box_size: out.size,
            border: out.border,
            format,
            overlay: Overlay::None,
        };
        let prefix = format!("qr_{}_{}", shape.key(), mode.key());
        let (path, version) = self.produce(&req.data, &spec, &out, &prefix)?;

        Ok(GenerationResult {
            module_shape: Some(shape.key()),
            gradient_style: Some(mode.key()),
            fg_color: Some(fg.to_string()),
            bg_color: Some(bg.to_string()),
            center_color,
            edge_color,
            ..base_result("styled", &req.data, &path, &spec, version)
        })
    }

    /// 渐变填充（只接受非 solid 模式）
    pub fn generate_gradient(&self, req: &GradientRequest) -> Result<GenerationResult, QrError> {
        let shape = shape(req.module_shape.as_deref(), ModuleShape::Square)?;
        let mode = match req.gradient_style.as_deref() {
            Some(raw) => FillMode::parse_gradient(raw)?,
            None => FillMode::Radial,
        };
        let center = color("center_color", req.center_color.as_deref(), GRADIENT_CENTER)?;
        let edge = color("edge_color", req.edge_color.as_deref(), GRADIENT_EDGE)?;
        let bg = color("bg_color", req.bg_color.as_deref(), DEFAULT_BG)?;
        let level = self.level(req.error_correction.as_deref())?;
        let format = self.format(req.output_format.as_deref())?;
        let out = self.resolve_output(&req.output)?;

        let spec = StyleSpec {
            shape,
            fill: ColorFill::Gradient {
                mode,
                center,
                edge,
                back: bg,
            },
            ec_level: level,
            box_size: out.size,
            border: out.border,
            format,
            overlay: Overlay::None,
        };
        let prefix = format!("qr_gradient_{}", mode.key());
        let (path, version) = self.produce(&req.data, &spec, &out, &prefix)?;

        Ok(GenerationResult {
            module_shape: Some(shape.key()),
            gradient_style: Some(mode.key()),
            center_color: Some(center.to_string()),
            edge_color: Some(edge.to_string()),
            bg_color: Some(bg.to_string()),
            ..base_result("gradient", &req.data, &path, &spec, version)
        })
    }

    /// 居中 Logo；纠错级别固定为 H
    pub fn generate_logo(&self, req: &LogoRequest) -> Result<GenerationResult, QrError> {
        let shape = shape(req.module_shape.as_deref(), ModuleShape::Square)?;
        let fg = color("fg_color", req.fg_color.as_deref(), DEFAULT_FG)?;
        let bg = color("bg_color", req.bg_color.as_deref(), DEFAULT_BG)?;
        let format = self.format(req.output_format.as_deref())?;
        let out = self.resolve_output(&req.output)?;
        let ratio = clamp_logo_ratio(req.logo_size_ratio.unwrap_or(LOGO_RATIO_DEFAULT));
        if let Some(requested) = req.error_correction.as_deref()
            && !requested.trim().eq_ignore_ascii_case("H")
        {
            tracing::debug!("Logo 模式忽略纠错级别 '{}'，固定使用 H", requested);
        }
        let asset = OverlayAsset::load(Path::new(&req.logo_path))?;
        let logo_path = asset.path().display().to_string();

        let spec = StyleSpec {
            shape,
            fill: ColorFill::Solid { front: fg, back: bg },
            ec_level: EcLevel::H,
            box_size: out.size,
            border: out.border,
            format,
            overlay: Overlay::Logo(LogoOverlay { asset, ratio }),
        };
        let (path, version) = self.produce(&req.data, &spec, &out, "qr_logo")?;

        Ok(GenerationResult {
            module_shape: Some(shape.key()),
            fg_color: Some(fg.to_string()),
            bg_color: Some(bg.to_string()),
            logo_path: Some(logo_path),
            logo_size_ratio: Some(ratio),
            ..base_result("logo", &req.data, &path, &spec, version)
        })
    }

    /// 模块颜色取自外部图片
    pub fn generate_image(&self, req: &ImageRequest) -> Result<GenerationResult, QrError> {
        let shape = shape(req.module_shape.as_deref(), ModuleShape::Circle)?;
        let level = self.level(req.error_correction.as_deref())?;
        let format = self.format(req.output_format.as_deref())?;
        let out = self.resolve_output(&req.output)?;
        let asset = OverlayAsset::load(Path::new(&req.image_path))?;
        let image_path = asset.path().display().to_string();

        let spec = StyleSpec {
            shape,
            fill: ColorFill::Image(asset),
            ec_level: level,
            box_size: out.size,
            border: out.border,
            format,
            overlay: Overlay::None,
        };
        let (path, version) = self.produce(&req.data, &spec, &out, "qr_image")?;

        Ok(GenerationResult {
            module_shape: Some(shape.key()),
            image_path: Some(image_path),
            ..base_result("background_image", &req.data, &path, &spec, version)
        })
    }

    /// 透明背景 PNG：先以白底渲染，再把近白像素设为全透明
    pub fn generate_transparent(&self, req: &TransparentRequest) -> Result<GenerationResult, QrError> {
        let shape = shape(req.module_shape.as_deref(), ModuleShape::Square)?;
        let fg = color("fg_color", req.fg_color.as_deref(), DEFAULT_FG)?;
        let level = self.level(req.error_correction.as_deref())?;
        let out = self.resolve_output(&req.output)?;

        let spec = StyleSpec {
            shape,
            fill: ColorFill::Solid {
                front: fg,
                back: Rgb::WHITE,
            },
            ec_level: level,
            box_size: out.size,
            border: out.border,
            format: OutputFormat::Png,
            overlay: Overlay::Transparent,
        };
        let (path, version) = self.produce(&req.data, &spec, &out, "qr_transparent")?;

        Ok(GenerationResult {
            module_shape: Some(shape.key()),
            fg_color: Some(fg.to_string()),
            ..base_result("transparent", &req.data, &path, &spec, version)
        })
    }

    /// 样式目录 + 当前默认值
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            module_shapes: ModuleShape::keys(),
            gradient_styles: FillMode::keys(),
            error_correction_levels: ec_level_catalog(),
            output_formats: OutputFormat::keys(),
            qr_styles: QR_STYLES.to_vec(),
            defaults: CapabilityDefaults {
                size: self.defaults.size,
                border: self.defaults.border,
                format: self.defaults.format.key(),
                output_dir: self.defaults.output_dir.display().to_string(),
                error_correction: DEFAULT_LEVEL.key(),
            },
        }
    }

    fn level(&self, raw: Option<&str>) -> Result<EcLevel, QrError> {
        raw.map(EcLevel::parse).unwrap_or(Ok(DEFAULT_LEVEL))
    }

    fn format(&self, raw: Option<&str>) -> Result<OutputFormat, QrError> {
        raw.map(OutputFormat::parse).unwrap_or(Ok(self.defaults.format))
    }

    fn resolve_output(&self, opts: &OutputOptions) -> Result<ResolvedOutput, QrError> {
        let size = opts.size.unwrap_or(self.defaults.size);
        if size == 0 {
            return Err(QrError::InvalidParameter {
                field: "size",
                reason: "必须大于 0".to_string(),
            });
        }
        if let Some(name) = opts.filename.as_deref() {
            check_filename(name)?;
        }
        let dir = match opts.output_dir.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => self.defaults.output_dir.clone(),
        };
        Ok(ResolvedOutput {
            writer: OutputWriter::new(dir),
            filename: opts.filename.clone(),
            size,
            border: opts.border.unwrap_or(self.defaults.border),
        })
    }

    /// 编码 → 渲染 → 后处理 → 落盘
    fn produce(
        &self,
        data: &str,
        spec: &StyleSpec,
        out: &ResolvedOutput,
        prefix: &str,
    ) -> Result<(PathBuf, i16), QrError> {
        let matrix = encode(data, spec.ec_level)?;
        let canvas = render(&matrix, spec)?;
        let canvas = overlay::apply(canvas, &spec.overlay)?;
        let path = out.writer.save(&canvas, out.filename.as_deref(), prefix)?;
        tracing::info!(
            "二维码已生成: prefix={}, version={}, path={}",
            prefix,
            matrix.version(),
            path.display()
        );
        Ok((path, matrix.version()))
    }
}

fn color(field: &str, raw: Option<&str>, default: Rgb) -> Result<Rgb, QrError> {
    match raw {
        Some(raw) => parse_hex_color(field, raw),
        None => Ok(default),
    }
}

fn shape(raw: Option<&str>, default: ModuleShape) -> Result<ModuleShape, QrError> {
    raw.map(ModuleShape::parse).unwrap_or(Ok(default))
}

/// 按字符截断，不追加省略号
pub fn truncate_data(data: &str) -> String {
    data.chars().take(DATA_ECHO_LIMIT).collect()
}

fn base_result(
    style: &'static str,
    data: &str,
    path: &Path,
    spec: &StyleSpec,
    version: i16,
) -> GenerationResult {
    GenerationResult {
        saved_path: path.display().to_string(),
        data: truncate_data(data),
        style,
        module_shape: None,
        gradient_style: None,
        fg_color: None,
        bg_color: None,
        center_color: None,
        edge_color: None,
        logo_path: None,
        logo_size_ratio: None,
        image_path: None,
        size: spec.box_size,
        border: spec.border,
        error_correction: spec.ec_level.key(),
        format: spec.format.key(),
        version,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(dir: &Path) -> QrGenerator {
        QrGenerator::new(GenerationDefaults {
            output_dir: dir.to_path_buf(),
            size: 4,
            border: 2,
            format: OutputFormat::Png,
        })
    }

    #[test]
    fn data_echo_is_truncated_by_chars() {
        let long = "码".repeat(250);
        let t = truncate_data(&long);
        assert_eq!(t.chars().count(), 200);
        assert_eq!(truncate_data("short"), "short");
    }

    #[test]
    fn invalid_color_fails_before_any_file_is_written() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("never");
        let g = generator(&out);
        let err = g
            .generate_basic(&BasicRequest {
                data: "x".into(),
                fg_color: Some("#GG0000".into()),
                ..Default::default()
            })
            .expect_err("bad color");
        assert_eq!(err.stable_code(), "INVALID_COLOR_FORMAT");
        assert!(!out.exists());
    }

    #[test]
    fn gradient_rejects_solid() {
        let tmp = tempfile::tempdir().unwrap();
        let g = generator(tmp.path());
        let err = g
            .generate_gradient(&GradientRequest {
                data: "x".into(),
                gradient_style: Some("solid".into()),
                ..Default::default()
            })
            .expect_err("solid is not a gradient");
        assert_eq!(
            err.to_string(),
            "不支持的样式选项: gradient_style = 'solid'，可选值: horizontal, radial, square, vertical"
        );
    }

    #[test]
    fn styled_prefix_names_shape_and_fill() {
        let tmp = tempfile::tempdir().unwrap();
        let g = generator(tmp.path());
        let r = g
            .generate_styled(&StyledRequest {
                data: "styled".into(),
                module_shape: Some("Rounded".into()),
                gradient_style: Some("vertical".into()),
                ..Default::default()
            })
            .unwrap();
        let name = Path::new(&r.saved_path).file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("qr_rounded_vertical_"), "{name}");
        assert_eq!(r.module_shape, Some("rounded"));
        assert_eq!(r.center_color.as_deref(), Some("#000000"));
        assert_eq!(r.edge_color.as_deref(), Some("#000088"));
        assert_eq!(r.error_correction, "H");
    }

    #[test]
    fn zero_size_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let g = generator(tmp.path());
        let err = g
            .generate_transparent(&TransparentRequest {
                data: "x".into(),
                output: OutputOptions {
                    size: Some(0),
                    ..Default::default()
                },
                ..Default::default()
            })
            .expect_err("size 0");
        assert_eq!(err.stable_code(), "INVALID_PARAMETER");
    }

    #[test]
    fn filename_with_path_is_rejected_before_writing() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("out");
        let g = generator(&out);
        let err = g
            .generate_basic(&BasicRequest {
                data: "x".into(),
                output: OutputOptions {
                    filename: Some("../outside".into()),
                    ..Default::default()
                },
                ..Default::default()
            })
            .expect_err("path traversal");
        assert_eq!(err.stable_code(), "INVALID_PARAMETER");
        assert!(!out.exists());
        assert!(!tmp.path().join("outside.png").exists());
    }

    #[test]
    fn capabilities_follow_registry_order() {
        let tmp = tempfile::tempdir().unwrap();
        let caps = generator(tmp.path()).capabilities();
        assert_eq!(caps.module_shapes[0], "square");
        assert_eq!(caps.module_shapes[5], "horizontal_bars");
        assert_eq!(caps.gradient_styles, vec!["solid", "radial", "square", "horizontal", "vertical"]);
        assert_eq!(caps.error_correction_levels.len(), 4);
        assert_eq!(caps.output_formats, vec!["png", "svg"]);
        assert_eq!(caps.qr_styles.len(), 6);
        assert_eq!(caps.defaults.size, 4);
        assert_eq!(caps.defaults.error_correction, "H");
    }
}
