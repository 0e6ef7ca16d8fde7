use qrcode::types::QrError as EncodeError;
use qrcode::{Color, QrCode, Version};

use super::styles::{EcLevel, StyleKey};
use crate::error::QrError;

/// 二维码模块矩阵（只读）
///
/// 每次请求新建，构造后不再修改；渲染器只读消费。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolMatrix {
    width: usize,
    version: i16,
    ec_level: EcLevel,
    modules: Vec<bool>,
}

impl SymbolMatrix {
    /// 每边模块数
    pub fn width(&self) -> usize {
        self.width
    }

    /// 版本号（1..=40）
    pub fn version(&self) -> i16 {
        self.version
    }

    pub fn ec_level(&self) -> EcLevel {
        self.ec_level
    }

    /// 坐标越界（含静区）一律视为浅色模块
    pub fn is_dark(&self, x: i64, y: i64) -> bool {
        if x < 0 || y < 0 {
            return false;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= self.width || y >= self.width {
            return false;
        }
        self.modules[y * self.width + x]
    }

    pub fn dark_count(&self) -> usize {
        self.modules.iter().filter(|d| **d).count()
    }
}

/// 按纠错级别编码数据，自动选择能容纳数据的最小版本。
///
/// 不会为了塞下数据而静默降低纠错级别。
pub fn encode(data: &str, level: EcLevel) -> Result<SymbolMatrix, QrError> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), level.to_qrcode())
        .map_err(|e| match e {
            EncodeError::DataTooLong => QrError::PayloadTooLarge {
                len: data.len(),
                level: level.key(),
            },
            other => QrError::Render(format!("二维码编码失败: {other}")),
        })?;

    let version = match code.version() {
        Version::Normal(v) => v,
        Version::Micro(v) => v,
    };
    let width = code.width();
    let modules = code
        .to_colors()
        .into_iter()
        .map(|c| c == Color::Dark)
        .collect();

    tracing::debug!(
        "二维码编码完成: version={}, width={}, level={}, bytes={}",
        version,
        width,
        level.key(),
        data.len()
    );

    Ok(SymbolMatrix {
        width,
        version,
        ec_level: level,
        modules,
    })
}
