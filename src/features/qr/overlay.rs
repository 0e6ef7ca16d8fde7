//! 渲染后处理：居中 Logo（带白色圆角衬底）与近白像素透明化。
//!
//! 两种模式互斥，由 [`Overlay`] 表达；均产生新的画布缓冲区。

use std::path::{Path, PathBuf};

use base64::prelude::{BASE64_STANDARD, Engine as _};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use super::color::Rgb;
use super::output::encode_png;
use super::renderer::{Canvas, Primitive, SvgCanvas, rasterize_coverage};
use crate::error::QrError;

/// 透明化阈值：R/G/B 均大于该值的像素视为背景
pub const TRANSPARENT_THRESHOLD: u8 = 240;

pub const LOGO_RATIO_MIN: f64 = 0.1;
pub const LOGO_RATIO_MAX: f64 = 0.4;
pub const LOGO_RATIO_DEFAULT: f64 = 0.3;

/// 外部图片资源（Logo 或取色纹理）
///
/// 每次请求重新加载，不做跨请求缓存。
#[derive(Debug, Clone)]
pub struct OverlayAsset {
    path: PathBuf,
    image: RgbaImage,
}

impl OverlayAsset {
    /// 读取并解码图片；路径不存在、不是文件或无法解码均返回 `AssetNotFound`
    pub fn load(path: &Path) -> Result<Self, QrError> {
        if !path.is_file() {
            return Err(QrError::asset(path, "文件不存在"));
        }
        let image = image::open(path)
            .map_err(|e| QrError::asset(path, e))?
            .to_rgba8();
        if image.width() == 0 || image.height() == 0 {
            return Err(QrError::asset(path, "图片尺寸为 0"));
        }
        tracing::debug!(
            "已加载图片资源 {:?} ({}x{})",
            path,
            image.width(),
            image.height()
        );
        Ok(Self {
            path: path.to_path_buf(),
            image,
        })
    }

    pub fn from_image(path: PathBuf, image: RgbaImage) -> Self {
        Self { path, image }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

/// 将调用方传入的 Logo 占比限制在 [0.1, 0.4]
pub fn clamp_logo_ratio(ratio: f64) -> f64 {
    if ratio.is_nan() {
        return LOGO_RATIO_DEFAULT;
    }
    ratio.clamp(LOGO_RATIO_MIN, LOGO_RATIO_MAX)
}

#[derive(Debug, Clone)]
pub struct LogoOverlay {
    pub asset: OverlayAsset,
    /// 已限制到合法区间
    pub ratio: f64,
}

/// 后处理模式
#[derive(Debug, Clone, Default)]
pub enum Overlay {
    #[default]
    None,
    Logo(LogoOverlay),
    /// 近白像素转为全透明（仅栅格）
    Transparent,
}

/// Logo 及白色衬底在画布上的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogoPlacement {
    /// 缩放后的 Logo 尺寸
    pub logo_w: u32,
    pub logo_h: u32,
    /// Logo 左上角
    pub logo_x: i64,
    pub logo_y: i64,
    /// 衬底边距（= Logo 宽度的 10%），同时是衬底圆角半径
    pub pad: i64,
    /// 衬底矩形 (x0, y0, x1, y1)
    pub halo: (i64, i64, i64, i64),
}

/// 按占比计算 Logo 缩放尺寸与居中位置（保持宽高比，最长边 = ratio × 画布宽）
pub fn logo_placement(
    canvas_w: u32,
    canvas_h: u32,
    logo_w: u32,
    logo_h: u32,
    ratio: f64,
) -> LogoPlacement {
    // 以单精度取整，0.3 × 300 恰为 90
    let longest = ((canvas_w as f32 * ratio as f32).floor() as u32).max(1);
    let (w, h) = if logo_w >= logo_h {
        let h = (longest as f64 * logo_h as f64 / logo_w.max(1) as f64).round() as u32;
        (longest, h.max(1))
    } else {
        let w = (longest as f64 * logo_w as f64 / logo_h.max(1) as f64).round() as u32;
        (w.max(1), longest)
    };

    let pad = (w / 10) as i64;
    let (cx, cy) = ((canvas_w / 2) as i64, (canvas_h / 2) as i64);
    let (hw, hh) = ((w / 2) as i64, (h / 2) as i64);
    LogoPlacement {
        logo_w: w,
        logo_h: h,
        logo_x: cx - hw,
        logo_y: cy - hh,
        pad,
        halo: (cx - hw - pad, cy - hh - pad, cx + hw + pad, cy + hh + pad),
    }
}

/// 应用后处理，返回新画布
pub fn apply(canvas: Canvas, overlay: &Overlay) -> Result<Canvas, QrError> {
    match overlay {
        Overlay::None => Ok(canvas),
        Overlay::Logo(logo) => apply_logo(canvas, logo),
        Overlay::Transparent => match canvas {
            Canvas::Raster(img) => Ok(Canvas::Raster(make_transparent(&img))),
            Canvas::Vector(_) => Err(QrError::Render(
                "透明背景只能以 PNG 栅格输出".to_string(),
            )),
        },
    }
}

/// 居中叠加 Logo（先绘制白色圆角衬底）
pub fn apply_logo(canvas: Canvas, logo: &LogoOverlay) -> Result<Canvas, QrError> {
    let (cw, ch) = canvas.dimensions();
    let src = logo.asset.image();
    let place = logo_placement(cw, ch, src.width(), src.height(), logo.ratio);
    let resized = imageops::resize(src, place.logo_w, place.logo_h, FilterType::Lanczos3);
    tracing::debug!(
        "叠加 Logo: {}x{} -> {}x{}, pad={}",
        src.width(),
        src.height(),
        place.logo_w,
        place.logo_h,
        place.pad
    );

    match canvas {
        Canvas::Raster(mut img) => {
            paint_halo(&mut img, &place)?;
            imageops::overlay(&mut img, &resized, place.logo_x, place.logo_y);
            Ok(Canvas::Raster(img))
        }
        Canvas::Vector(mut svg) => {
            embed_logo_svg(&mut svg, &place, &resized)?;
            Ok(Canvas::Vector(svg))
        }
    }
}

fn paint_halo(img: &mut RgbaImage, place: &LogoPlacement) -> Result<(), QrError> {
    let (x0, y0, x1, y1) = place.halo;
    let r = place.pad as f32;
    let halo = Primitive::Rect {
        x: x0 as f32,
        y: y0 as f32,
        w: (x1 - x0) as f32,
        h: (y1 - y0) as f32,
        radii: [r; 4],
    };
    let (w, h) = img.dimensions();
    let mask = rasterize_coverage(w, h, &[halo])?;
    let coverage = mask.data();

    for (x, y, px) in img.enumerate_pixels_mut() {
        let t = coverage[(y * w + x) as usize];
        if t == 0 {
            continue;
        }
        let under = Rgb::new(px[0], px[1], px[2]);
        let c = under.lerp(Rgb::WHITE, t as f32 / 255.0);
        *px = Rgba([c.r, c.g, c.b, px[3].max(t)]);
    }
    Ok(())
}

fn embed_logo_svg(
    svg: &mut SvgCanvas,
    place: &LogoPlacement,
    logo: &RgbaImage,
) -> Result<(), QrError> {
    use std::fmt::Write;

    let png = encode_png(logo)?;
    let (x0, y0, x1, y1) = place.halo;
    let body = svg.body_mut();
    writeln!(
        body,
        "<rect x=\"{x0}\" y=\"{y0}\" width=\"{}\" height=\"{}\" rx=\"{2}\" ry=\"{2}\" fill=\"#FFFFFF\"/>",
        x1 - x0,
        y1 - y0,
        place.pad
    )?;
    writeln!(
        body,
        "<image x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" href=\"data:image/png;base64,{}\"/>",
        place.logo_x,
        place.logo_y,
        place.logo_w,
        place.logo_h,
        BASE64_STANDARD.encode(png)
    )?;
    Ok(())
}

/// 近白像素透明化：逐像素独立判断，产生新的缓冲区
pub fn make_transparent(img: &RgbaImage) -> RgbaImage {
    RgbaImage::from_fn(img.width(), img.height(), |x, y| {
        let p = img.get_pixel(x, y);
        let near_white = p[0] > TRANSPARENT_THRESHOLD
            && p[1] > TRANSPARENT_THRESHOLD
            && p[2] > TRANSPARENT_THRESHOLD;
        Rgba([p[0], p[1], p[2], if near_white { 0 } else { 255 }])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([200, 0, 0, 255])
            } else {
                Rgba([0, 0, 200, 255])
            }
        })
    }

    #[test]
    fn ratio_is_clamped() {
        assert_eq!(clamp_logo_ratio(0.05), 0.1);
        assert_eq!(clamp_logo_ratio(0.9), 0.4);
        assert_eq!(clamp_logo_ratio(0.25), 0.25);
        assert_eq!(clamp_logo_ratio(f64::NAN), 0.3);
    }

    #[test]
    fn placement_preserves_aspect_and_centers() {
        let p = logo_placement(300, 300, 200, 100, 0.3);
        assert_eq!((p.logo_w, p.logo_h), (90, 45));
        assert_eq!(p.pad, 9);
        assert_eq!((p.logo_x, p.logo_y), (105, 128));
        assert_eq!(p.halo, (96, 119, 204, 181));

        let tall = logo_placement(300, 300, 50, 100, 0.3);
        assert_eq!((tall.logo_w, tall.logo_h), (45, 90));
    }

    #[test]
    fn logo_sits_on_white_halo() {
        let base = RgbaImage::from_pixel(300, 300, Rgba([0, 0, 0, 255]));
        let logo = LogoOverlay {
            asset: OverlayAsset::from_image(PathBuf::from("mem"), checker(40, 40)),
            ratio: 0.3,
        };
        let Canvas::Raster(out) = apply_logo(Canvas::Raster(base), &logo).unwrap() else {
            panic!("expected raster");
        };
        // 90x90 logo at (105,105), pad 9 -> halo 96..204
        assert_eq!(out.get_pixel(100, 150), &Rgba([255, 255, 255, 255]));
        assert_eq!(out.get_pixel(150, 100), &Rgba([255, 255, 255, 255]));
        assert_eq!(out.get_pixel(90, 150), &Rgba([0, 0, 0, 255]));
        // 圆角：衬底外角仍是原画布
        assert_eq!(out.get_pixel(96, 96), &Rgba([0, 0, 0, 255]));
        let center = out.get_pixel(150, 150);
        assert_ne!(center, &Rgba([255, 255, 255, 255]));
        assert_ne!(center, &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn transparency_is_per_pixel() {
        let mut img = RgbaImage::from_pixel(3, 1, Rgba([255, 255, 255, 255]));
        img.put_pixel(1, 0, Rgba([241, 241, 240, 255]));
        img.put_pixel(2, 0, Rgba([10, 10, 10, 255]));
        let out = make_transparent(&img);
        assert_eq!(out.get_pixel(0, 0)[3], 0);
        assert_eq!(out.get_pixel(1, 0)[3], 255);
        assert_eq!(out.get_pixel(2, 0)[3], 255);
        // 输入缓冲区不被修改
        assert_eq!(img.get_pixel(0, 0)[3], 255);
    }

    #[test]
    fn transparency_rejects_vector_canvas() {
        let svg = Canvas::Vector(SvgCanvas::new(10, 10));
        let err = apply(svg, &Overlay::Transparent).expect_err("vector");
        assert_eq!(err.stable_code(), "RENDER_FAILED");
    }

    #[test]
    fn missing_asset_is_reported() {
        let err = OverlayAsset::load(Path::new("/definitely/not/here.png")).expect_err("missing");
        assert_eq!(err.stable_code(), "ASSET_NOT_FOUND");
        assert!(err.to_string().contains("/definitely/not/here.png"));
    }
}
