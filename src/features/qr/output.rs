//! 输出落盘：解析目标路径、确保目录存在、按格式写入文件。

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use image::RgbaImage;
use sha2::{Digest, Sha256};

use super::renderer::Canvas;
use super::styles::OutputFormat;
use crate::error::QrError;

/// 自动文件名后缀长度（十六进制字符）
const TOKEN_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct OutputWriter {
    dir: PathBuf,
}

impl OutputWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// 显式文件名追加扩展名（已带同名扩展名时不重复追加）；
    /// 未提供时生成 `<prefix>_<token>.<ext>`。
    pub fn resolve_path(&self, filename: Option<&str>, prefix: &str, format: OutputFormat) -> PathBuf {
        let ext = format.extension();
        let name = match filename.map(str::trim).filter(|f| !f.is_empty()) {
            Some(name) => {
                let suffix = format!(".{ext}");
                if name.to_ascii_lowercase().ends_with(&suffix) {
                    name.to_string()
                } else {
                    format!("{name}{suffix}")
                }
            }
            None => format!("{prefix}_{}.{ext}", unique_token()),
        };
        self.dir.join(name)
    }

    /// 写入画布，返回最终路径。目录按需递归创建。
    pub fn save(&self, canvas: &Canvas, filename: Option<&str>, prefix: &str) -> Result<PathBuf, QrError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| QrError::storage(&self.dir, e))?;
        let path = self.resolve_path(filename, prefix, canvas.format());

        let bytes = match canvas {
            Canvas::Raster(img) => encode_png(img)?,
            Canvas::Vector(svg) => svg.to_document().into_bytes(),
        };
        std::fs::write(&path, &bytes).map_err(|e| QrError::storage(&path, e))?;
        tracing::debug!("已写入 {:?} ({} 字节)", path, bytes.len());
        Ok(path)
    }
}

/// 显式文件名只能是单个路径分量，不得含目录分隔符或 `..`
pub fn check_filename(name: &str) -> Result<(), QrError> {
    let name = name.trim();
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(QrError::InvalidParameter {
            field: "filename",
            reason: format!("不能包含路径: {name:?}"),
        });
    }
    Ok(())
}

/// 基于纳秒时间戳的短摘要；仅降低冲突概率，不保证唯一
pub fn unique_token() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let digest = Sha256::digest(nanos.to_string().as_bytes());
    let mut token = hex::encode(digest);
    token.truncate(TOKEN_LEN);
    token
}

/// RGBA8 → PNG 字节
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, QrError> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, img.width(), img.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Default);
        encoder.set_filter(png::FilterType::Paeth);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(img.as_raw())?;
        writer.finish()?;
    }
    Ok(out)
}
