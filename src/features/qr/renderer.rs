//! 样式化渲染：把模块矩阵按形状 + 填充策略绘制成栅格或矢量画布。
//!
//! 两条输出路径共享同一份几何布局（[`Primitive`] 列表）：
//! - 栅格：tiny-skia 生成抗锯齿覆盖率掩码，再逐像素按填充策略着色；
//! - 矢量：同一组几何写成 SVG path，渐变尽量映射为 SVG 渐变，其余按图元取色。

use std::collections::HashMap;
use std::f32::consts::SQRT_2;
use std::fmt::Write;

use image::{Rgba, RgbaImage};
use tiny_skia::{FillRule, Mask, PathBuilder, Transform};

use super::color::Rgb;
use super::encoder::SymbolMatrix;
use super::overlay::{Overlay, OverlayAsset};
use super::styles::{EcLevel, FillMode, ModuleShape, OutputFormat};
use crate::error::QrError;

/// gapped 模块占格子的比例
const GAPPED_RATIO: f32 = 0.8;
/// 条形模块横向占格子的比例
const BAR_RATIO: f32 = 0.8;
/// 三次贝塞尔近似四分之一圆的控制点系数
const KAPPA: f32 = 0.552_284_8;
/// 画布边长上限（像素）
const MAX_CANVAS_SIDE: u64 = 16_384;

/// 颜色填充策略（每个变体只携带自身需要的参数）
#[derive(Debug, Clone)]
pub enum ColorFill {
    /// 单色前景
    Solid { front: Rgb, back: Rgb },
    /// 渐变（mode 不为 Solid）
    Gradient {
        mode: FillMode,
        center: Rgb,
        edge: Rgb,
        back: Rgb,
    },
    /// 从外部图片按比例取色，背景为白色
    Image(OverlayAsset),
}

impl ColorFill {
    /// 非模块像素的颜色
    pub fn background(&self) -> Rgb {
        match self {
            ColorFill::Solid { back, .. } | ColorFill::Gradient { back, .. } => *back,
            ColorFill::Image(_) => Rgb::WHITE,
        }
    }

    /// 画布 (x, y) 处暗模块像素的颜色
    pub fn foreground_at(&self, x: f32, y: f32, width: f32, height: f32) -> Rgb {
        match self {
            ColorFill::Solid { front, .. } => *front,
            ColorFill::Gradient {
                mode, center, edge, ..
            } => center.lerp(*edge, gradient_ratio(*mode, x, y, width, height)),
            ColorFill::Image(asset) => {
                let tex = asset.image();
                let sx = scale_coord(x, width, tex.width());
                let sy = scale_coord(y, height, tex.height());
                let p = tex.get_pixel(sx, sy);
                Rgb::new(p[0], p[1], p[2])
            }
        }
    }
}

fn scale_coord(v: f32, extent: f32, target: u32) -> u32 {
    if extent <= 0.0 || target == 0 {
        return 0;
    }
    let scaled = (v.max(0.0) * target as f32 / extent) as u32;
    scaled.min(target - 1)
}

/// 渐变归一化位置，结果落在 [0, 1]
fn gradient_ratio(mode: FillMode, x: f32, y: f32, width: f32, height: f32) -> f32 {
    let half_w = width / 2.0;
    let (dx, dy) = (x - half_w, y - half_w);
    let t = match mode {
        FillMode::Solid => 0.0,
        FillMode::Radial => dx.hypot(dy) / (SQRT_2 * half_w),
        FillMode::Square => dx.abs().max(dy.abs()) / half_w,
        FillMode::Horizontal => x / width,
        FillMode::Vertical => y / height,
    };
    if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 }
}

/// 一次生成所需的完整样式描述（不可变）
#[derive(Debug, Clone)]
pub struct StyleSpec {
    pub shape: ModuleShape,
    pub fill: ColorFill,
    pub ec_level: EcLevel,
    /// 每个模块的像素边长（> 0）
    pub box_size: u32,
    /// 静区宽度（模块数）
    pub border: u32,
    pub format: OutputFormat,
    pub overlay: Overlay,
}

/// 渲染产物
#[derive(Debug, Clone)]
pub enum Canvas {
    Raster(RgbaImage),
    Vector(SvgCanvas),
}

impl Canvas {
    pub fn format(&self) -> OutputFormat {
        match self {
            Canvas::Raster(_) => OutputFormat::Png,
            Canvas::Vector(_) => OutputFormat::Svg,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Canvas::Raster(img) => img.dimensions(),
            Canvas::Vector(svg) => (svg.width, svg.height),
        }
    }
}

/// 尚未定稿的 SVG 文档
#[derive(Debug, Clone)]
pub struct SvgCanvas {
    pub width: u32,
    pub height: u32,
    defs: String,
    body: String,
}

impl SvgCanvas {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            defs: String::new(),
            body: String::new(),
        }
    }

    pub(crate) fn body_mut(&mut self) -> &mut String {
        &mut self.body
    }

    /// 输出完整 SVG 文档（统一使用 \n 换行）
    pub fn to_document(&self) -> String {
        let mut out = String::with_capacity(self.defs.len() + self.body.len() + 256);
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str(&format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" version=\"1.1\" width=\"{0}\" height=\"{1}\" viewBox=\"0 0 {0} {1}\" shape-rendering=\"geometricPrecision\">\n",
            self.width, self.height
        ));
        if !self.defs.is_empty() {
            out.push_str("<defs>\n");
            out.push_str(&self.defs);
            out.push_str("</defs>\n");
        }
        out.push_str(&self.body);
        out.push_str("</svg>\n");
        out
    }
}

/// 单个几何图元（像素坐标）
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Primitive {
    /// 圆角矩形，radii 顺序为 左上 / 右上 / 右下 / 左下
    Rect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        radii: [f32; 4],
    },
    Circle { cx: f32, cy: f32, r: f32 },
}

impl Primitive {
    fn center(&self) -> (f32, f32) {
        match *self {
            Primitive::Rect { x, y, w, h, .. } => (x + w / 2.0, y + h / 2.0),
            Primitive::Circle { cx, cy, .. } => (cx, cy),
        }
    }

    fn push_to(&self, pb: &mut PathBuilder) {
        match *self {
            Primitive::Circle { cx, cy, r } => pb.push_circle(cx, cy, r),
            Primitive::Rect {
                x,
                y,
                w,
                h,
                radii: [tl, tr, br, bl],
            } => {
                pb.move_to(x + tl, y);
                pb.line_to(x + w - tr, y);
                if tr > 0.0 {
                    pb.cubic_to(x + w - tr + tr * KAPPA, y, x + w, y + tr - tr * KAPPA, x + w, y + tr);
                }
                pb.line_to(x + w, y + h - br);
                if br > 0.0 {
                    pb.cubic_to(x + w, y + h - br + br * KAPPA, x + w - br + br * KAPPA, y + h, x + w - br, y + h);
                }
                pb.line_to(x + bl, y + h);
                if bl > 0.0 {
                    pb.cubic_to(x + bl - bl * KAPPA, y + h, x, y + h - bl + bl * KAPPA, x, y + h - bl);
                }
                pb.line_to(x, y + tl);
                if tl > 0.0 {
                    pb.cubic_to(x, y + tl - tl * KAPPA, x + tl - tl * KAPPA, y, x + tl, y);
                }
                pb.close();
            }
        }
    }

    fn write_svg_path(&self, d: &mut String) -> std::fmt::Result {
        match *self {
            Primitive::Circle { cx, cy, r } => write!(
                d,
                "M{},{}a{r},{r} 0 1 0 {},0a{r},{r} 0 1 0 {},0Z",
                num(cx - r),
                num(cy),
                num(2.0 * r),
                num(-2.0 * r),
                r = num(r)
            ),
            Primitive::Rect {
                x,
                y,
                w,
                h,
                radii: [tl, tr, br, bl],
            } => {
                write!(d, "M{},{}H{}", num(x + tl), num(y), num(x + w - tr))?;
                if tr > 0.0 {
                    write!(d, "A{r},{r} 0 0 1 {},{}", num(x + w), num(y + tr), r = num(tr))?;
                }
                write!(d, "V{}", num(y + h - br))?;
                if br > 0.0 {
                    write!(d, "A{r},{r} 0 0 1 {},{}", num(x + w - br), num(y + h), r = num(br))?;
                }
                write!(d, "H{}", num(x + bl))?;
                if bl > 0.0 {
                    write!(d, "A{r},{r} 0 0 1 {},{}", num(x), num(y + h - bl), r = num(bl))?;
                }
                write!(d, "V{}", num(y + tl))?;
                if tl > 0.0 {
                    write!(d, "A{r},{r} 0 0 1 {},{}", num(x + tl), num(y), r = num(tl))?;
                }
                d.push('Z');
                Ok(())
            }
        }
    }
}

/// 保留两位小数，整数不带小数点
fn num(v: f32) -> f32 {
    let r = (v * 100.0).round() / 100.0;
    if r == 0.0 { 0.0 } else { r }
}

/// 画布边长（像素）
pub fn canvas_side(matrix: &SymbolMatrix, box_size: u32, border: u32) -> Result<u32, QrError> {
    let modules = matrix.width() as u64 + 2 * border as u64;
    let side = modules * box_size as u64;
    if side == 0 || side > MAX_CANVAS_SIDE {
        return Err(QrError::InvalidParameter {
            field: "size",
            reason: format!("画布边长 {side}px 超出允许范围 (1..={MAX_CANVAS_SIDE})，请减小 size 或 border"),
        });
    }
    Ok(side as u32)
}

/// 按形状把暗模块布局为几何图元
pub(crate) fn layout_modules(
    matrix: &SymbolMatrix,
    shape: ModuleShape,
    box_size: u32,
    border: u32,
) -> Vec<Primitive> {
    let n = matrix.width() as i64;
    let b = box_size as f32;
    let origin = |i: i64| (border as i64 + i) as f32 * b;
    let mut out = Vec::with_capacity(matrix.dark_count());

    match shape {
        ModuleShape::VerticalBars => {
            let inset = b * (1.0 - BAR_RATIO) / 2.0;
            let cap = b * BAR_RATIO / 2.0;
            for x in 0..n {
                for (start, len) in runs(n, |y| matrix.is_dark(x, y)) {
                    out.push(Primitive::Rect {
                        x: origin(x) + inset,
                        y: origin(start),
                        w: b * BAR_RATIO,
                        h: len as f32 * b,
                        radii: [cap; 4],
                    });
                }
            }
        }
        ModuleShape::HorizontalBars => {
            let inset = b * (1.0 - BAR_RATIO) / 2.0;
            let cap = b * BAR_RATIO / 2.0;
            for y in 0..n {
                for (start, len) in runs(n, |x| matrix.is_dark(x, y)) {
                    out.push(Primitive::Rect {
                        x: origin(start),
                        y: origin(y) + inset,
                        w: len as f32 * b,
                        h: b * BAR_RATIO,
                        radii: [cap; 4],
                    });
                }
            }
        }
        _ => {
            for y in 0..n {
                for x in 0..n {
                    if !matrix.is_dark(x, y) {
                        continue;
                    }
                    let (px, py) = (origin(x), origin(y));
                    out.push(module_primitive(matrix, shape, x, y, px, py, b));
                }
            }
        }
    }
    out
}

fn module_primitive(
    matrix: &SymbolMatrix,
    shape: ModuleShape,
    x: i64,
    y: i64,
    px: f32,
    py: f32,
    b: f32,
) -> Primitive {
    match shape {
        ModuleShape::Gapped => {
            let inset = b * (1.0 - GAPPED_RATIO) / 2.0;
            Primitive::Rect {
                x: px + inset,
                y: py + inset,
                w: b * GAPPED_RATIO,
                h: b * GAPPED_RATIO,
                radii: [0.0; 4],
            }
        }
        ModuleShape::Circle => Primitive::Circle {
            cx: px + b / 2.0,
            cy: py + b / 2.0,
            r: b / 2.0,
        },
        ModuleShape::Rounded => {
            // 只有两侧相邻模块都为浅色的角才做圆角，相连的模块保持贴合
            let n = matrix.is_dark(x, y - 1);
            let s = matrix.is_dark(x, y + 1);
            let w = matrix.is_dark(x - 1, y);
            let e = matrix.is_dark(x + 1, y);
            let r = b / 2.0;
            let corner = |a: bool, c: bool| if a || c { 0.0 } else { r };
            Primitive::Rect {
                x: px,
                y: py,
                w: b,
                h: b,
                radii: [corner(n, w), corner(n, e), corner(s, e), corner(s, w)],
            }
        }
        _ => Primitive::Rect {
            x: px,
            y: py,
            w: b,
            h: b,
            radii: [0.0; 4],
        },
    }
}

/// 连续暗模块段：(起点, 长度)
fn runs(n: i64, dark: impl Fn(i64) -> bool) -> Vec<(i64, i64)> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < n {
        if dark(i) {
            let start = i;
            while i < n && dark(i) {
                i += 1;
            }
            out.push((start, i - start));
        } else {
            i += 1;
        }
    }
    out
}

/// 把图元栅格化为抗锯齿覆盖率掩码（每像素 0..=255）
pub(crate) fn rasterize_coverage(
    width: u32,
    height: u32,
    primitives: &[Primitive],
) -> Result<Mask, QrError> {
    let mut mask = Mask::new(width, height)
        .ok_or_else(|| QrError::Render(format!("无法分配 {width}x{height} 的掩码")))?;
    let mut pb = PathBuilder::new();
    for p in primitives {
        p.push_to(&mut pb);
    }
    if let Some(path) = pb.finish() {
        mask.fill_path(&path, FillRule::Winding, true, Transform::identity());
    }
    Ok(mask)
}

/// 按样式渲染模块矩阵
pub fn render(matrix: &SymbolMatrix, spec: &StyleSpec) -> Result<Canvas, QrError> {
    if spec.box_size == 0 {
        return Err(QrError::InvalidParameter {
            field: "size",
            reason: "必须大于 0".to_string(),
        });
    }
    let side = canvas_side(matrix, spec.box_size, spec.border)?;
    let primitives = layout_modules(matrix, spec.shape, spec.box_size, spec.border);
    tracing::debug!(
        "渲染二维码: shape={:?}, format={:?}, side={}px, primitives={}",
        spec.shape,
        spec.format,
        side,
        primitives.len()
    );

    match spec.format {
        OutputFormat::Png => render_raster(side, &primitives, &spec.fill).map(Canvas::Raster),
        OutputFormat::Svg => render_vector(side, &primitives, &spec.fill).map(Canvas::Vector),
    }
}

fn render_raster(side: u32, primitives: &[Primitive], fill: &ColorFill) -> Result<RgbaImage, QrError> {
    let mask = rasterize_coverage(side, side, primitives)?;
    let coverage = mask.data();
    let back = fill.background();
    let extent = side as f32;

    Ok(RgbaImage::from_fn(side, side, |x, y| {
        let t = coverage[(y * side + x) as usize];
        if t == 0 {
            return Rgba(back.to_rgba());
        }
        let front = fill.foreground_at(x as f32, y as f32, extent, extent);
        let c = if t == 255 {
            front
        } else {
            back.lerp(front, t as f32 / 255.0)
        };
        Rgba(c.to_rgba())
    }))
}

const FILL_GRADIENT_ID: &str = "qr-fill";

fn render_vector(side: u32, primitives: &[Primitive], fill: &ColorFill) -> Result<SvgCanvas, QrError> {
    let mut svg = SvgCanvas::new(side, side);
    let extent = side as f32;
    writeln!(
        svg.body,
        "<rect width=\"{side}\" height=\"{side}\" fill=\"{}\"/>",
        fill.background()
    )?;

    // 能直接映射为 SVG 渐变的模式共用一条 path；其余按图元中心取色分组
    let shared_paint = match fill {
        ColorFill::Solid { front, .. } => Some(front.to_string()),
        ColorFill::Gradient {
            mode, center, edge, ..
        } => write_gradient_def(&mut svg.defs, *mode, *center, *edge, extent)?
            .then(|| format!("url(#{FILL_GRADIENT_ID})")),
        ColorFill::Image(_) => None,
    };

    match shared_paint {
        Some(paint) => {
            let mut d = String::new();
            for p in primitives {
                p.write_svg_path(&mut d)?;
            }
            writeln!(svg.body, "<path fill=\"{paint}\" d=\"{d}\"/>")?;
        }
        None => {
            let mut groups: Vec<(Rgb, String)> = Vec::new();
            let mut index: HashMap<Rgb, usize> = HashMap::new();
            for p in primitives {
                let (cx, cy) = p.center();
                let color = fill.foreground_at(cx, cy, extent, extent);
                let slot = *index.entry(color).or_insert_with(|| {
                    groups.push((color, String::new()));
                    groups.len() - 1
                });
                p.write_svg_path(&mut groups[slot].1)?;
            }
            for (color, d) in &groups {
                writeln!(svg.body, "<path fill=\"{color}\" d=\"{d}\"/>")?;
            }
        }
    }
    Ok(svg)
}

/// 写入渐变定义；没有对应 SVG 渐变的模式返回 false
fn write_gradient_def(
    defs: &mut String,
    mode: FillMode,
    center: Rgb,
    edge: Rgb,
    extent: f32,
) -> Result<bool, QrError> {
    let half = extent / 2.0;
    match mode {
        FillMode::Radial => writeln!(
            defs,
            "<radialGradient id=\"{FILL_GRADIENT_ID}\" gradientUnits=\"userSpaceOnUse\" cx=\"{}\" cy=\"{}\" r=\"{}\">",
            num(half),
            num(half),
            num(SQRT_2 * half)
        )?,
        FillMode::Horizontal => writeln!(
            defs,
            "<linearGradient id=\"{FILL_GRADIENT_ID}\" gradientUnits=\"userSpaceOnUse\" x1=\"0\" y1=\"0\" x2=\"{}\" y2=\"0\">",
            num(extent)
        )?,
        FillMode::Vertical => writeln!(
            defs,
            "<linearGradient id=\"{FILL_GRADIENT_ID}\" gradientUnits=\"userSpaceOnUse\" x1=\"0\" y1=\"0\" x2=\"0\" y2=\"{}\">",
            num(extent)
        )?,
        FillMode::Square | FillMode::Solid => return Ok(false),
    }
    writeln!(defs, "<stop offset=\"0\" stop-color=\"{center}\"/>")?;
    writeln!(defs, "<stop offset=\"1\" stop-color=\"{edge}\"/>")?;
    let closing = if mode == FillMode::Radial {
        "</radialGradient>"
    } else {
        "</linearGradient>"
    };
    writeln!(defs, "{closing}")?;
    Ok(true)
}
