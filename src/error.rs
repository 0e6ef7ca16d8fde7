use std::path::{Path, PathBuf};

use thiserror::Error;

/// 二维码生成统一错误类型
///
/// 所有变体对当前请求都是终止性的：不在内部重试，原样（人类可读）返回给调用方。
#[derive(Error, Debug)]
pub enum QrError {
    /// 颜色字符串不是 `RGB` / `RRGGBB`（可带 `#`）形式
    #[error("颜色格式无效: {field} = '{value}'，请使用 #FF0000 或 #F00 这类十六进制格式")]
    InvalidColorFormat { field: String, value: String },

    /// 未知的样式键（形状 / 填充 / 纠错级别 / 输出格式）
    #[error("不支持的样式选项: {field} = '{value}'，可选值: {}", .valid.join(", "))]
    UnsupportedStyleOption {
        field: &'static str,
        value: String,
        /// 已按字母序排列的合法取值
        valid: Vec<&'static str>,
    },

    /// 数值参数越界（如 size = 0）
    #[error("参数无效: {field}，{reason}")]
    InvalidParameter { field: &'static str, reason: String },

    /// 数据超出所选纠错级别下的最大容量
    #[error("数据过长: {len} 字节超出纠错级别 {level} 下的二维码最大容量")]
    PayloadTooLarge { len: usize, level: &'static str },

    /// Logo / 取色图片不存在或无法解码
    #[error("资源文件不可用: {path}（{reason}）")]
    AssetNotFound { path: PathBuf, reason: String },

    /// 目录创建或文件写入失败
    #[error("存储错误: {path}（{reason}）")]
    StorageError { path: PathBuf, reason: String },

    /// 栅格化 / 编码等内部错误
    #[error("图像渲染错误: {0}")]
    Render(String),
}

impl QrError {
    /// 稳定的错误码，用于程序化处理。
    pub fn stable_code(&self) -> &'static str {
        match self {
            QrError::InvalidColorFormat { .. } => "INVALID_COLOR_FORMAT",
            QrError::UnsupportedStyleOption { .. } => "UNSUPPORTED_STYLE_OPTION",
            QrError::InvalidParameter { .. } => "INVALID_PARAMETER",
            QrError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            QrError::AssetNotFound { .. } => "ASSET_NOT_FOUND",
            QrError::StorageError { .. } => "STORAGE_ERROR",
            QrError::Render(_) => "RENDER_FAILED",
        }
    }

    /// 是否属于调用方输入问题（校验阶段即可发现，尚未产生任何文件）。
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            QrError::InvalidColorFormat { .. }
                | QrError::UnsupportedStyleOption { .. }
                | QrError::InvalidParameter { .. }
                | QrError::PayloadTooLarge { .. }
                | QrError::AssetNotFound { .. }
        )
    }

    pub(crate) fn storage(path: &Path, err: impl std::fmt::Display) -> Self {
        QrError::StorageError {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn asset(path: &Path, err: impl std::fmt::Display) -> Self {
        QrError::AssetNotFound {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }
}

// =============== Error conversions for common external errors ===============

impl From<png::EncodingError> for QrError {
    fn from(err: png::EncodingError) -> Self {
        QrError::Render(format!("PNG 编码失败: {err}"))
    }
}

impl From<std::fmt::Error> for QrError {
    fn from(err: std::fmt::Error) -> Self {
        QrError::Render(format!("SVG formatting error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::QrError;
    use std::path::PathBuf;

    #[test]
    fn unsupported_option_lists_valid_keys() {
        let err = QrError::UnsupportedStyleOption {
            field: "module_shape",
            value: "hexagon".to_string(),
            valid: vec!["circle", "square"],
        };
        let msg = err.to_string();
        assert!(msg.contains("module_shape"), "{msg}");
        assert!(msg.contains("'hexagon'"), "{msg}");
        assert!(msg.ends_with("circle, square"), "{msg}");
        assert_eq!(err.stable_code(), "UNSUPPORTED_STYLE_OPTION");
        assert!(err.is_validation());
    }

    #[test]
    fn storage_error_names_attempted_path() {
        let err = QrError::storage(&PathBuf::from("/nope/qr.png"), "permission denied");
        assert!(err.to_string().contains("/nope/qr.png"));
        assert_eq!(err.stable_code(), "STORAGE_ERROR");
        assert!(!err.is_validation());
    }
}
