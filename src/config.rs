use config::{Config as ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::QrError;
use crate::features::qr::styles::{OutputFormat, StyleKey};

/// 指定配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "QRCODE_MCP_CONFIG";

/// 环境变量覆盖前缀，例如：QRCODE_MCP__OUTPUT__DEFAULT_SIZE=12
const ENV_PREFIX: &str = "QRCODE_MCP";

/// 输出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// 输出目录（相对路径相对于配置文件所在目录；留空使用 ~/Downloads/qrcode_mcp）
    #[serde(default)]
    pub dir: Option<String>,
    /// 每个模块的像素尺寸
    #[serde(default = "OutputConfig::default_size")]
    pub default_size: u32,
    /// 静区宽度（模块数）
    #[serde(default = "OutputConfig::default_border")]
    pub default_border: u32,
    /// 默认输出格式：png / svg
    #[serde(default = "OutputConfig::default_format")]
    pub default_format: String,
}

impl OutputConfig {
    fn default_size() -> u32 {
        10
    }
    fn default_border() -> u32 {
        2
    }
    fn default_format() -> String {
        "png".to_string()
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: None,
            default_size: Self::default_size(),
            default_border: Self::default_border(),
            default_format: Self::default_format(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别（RUST_LOG 优先）
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 渲染配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RenderConfig {
    /// 并发渲染许可数（0=自动，取 CPU 核心数）
    #[serde(default)]
    pub max_parallel: u32,
}

impl RenderConfig {
    pub fn effective_parallelism(&self) -> usize {
        let m = self.max_parallel as usize;
        if m == 0 { num_cpus::get() } else { m }
    }
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub render: RenderConfig,
    /// 配置文件所在目录（用于解析相对输出目录，不参与反序列化）
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
    /// 实际读取的配置文件路径（文件不存在时为 None）
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl AppConfig {
    /// 从配置文件加载配置，支持环境变量覆盖；配置文件缺失时使用内置默认值。
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path();
        Self::load_from(&config_path)
    }

    /// 从指定路径加载（文件可不存在）
    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        let builder = ConfigBuilder::builder()
            .add_source(
                File::from(config_path)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Self = builder.try_deserialize()?;
        config.base_dir = config_path
            .parent()
            .map(|p| p.to_path_buf())
            .filter(|p| !p.as_os_str().is_empty());
        config.source = config_path.is_file().then(|| config_path.to_path_buf());
        Ok(config)
    }

    /// 获取配置文件路径
    fn get_config_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// 解析后的默认输出目录
    pub fn output_dir(&self) -> PathBuf {
        match self.output.dir.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => {
                let p = PathBuf::from(dir);
                if p.is_absolute() {
                    p
                } else {
                    match &self.base_dir {
                        Some(base) => base.join(p),
                        None => p,
                    }
                }
            }
            _ => default_output_dir(),
        }
    }

    /// 校验并转换为生成器使用的不可变默认值
    pub fn generation_defaults(&self) -> Result<GenerationDefaults, QrError> {
        let format = OutputFormat::parse(&self.output.default_format)?;
        if self.output.default_size == 0 {
            return Err(QrError::InvalidParameter {
                field: "output.default_size",
                reason: "必须大于 0".to_string(),
            });
        }
        Ok(GenerationDefaults {
            output_dir: self.output_dir(),
            size: self.output.default_size,
            border: self.output.default_border,
            format,
        })
    }
}

/// 进程级生成默认值：启动时构造一次，之后只读，显式传入生成器。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationDefaults {
    pub output_dir: PathBuf,
    pub size: u32,
    pub border: u32,
    pub format: OutputFormat,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            size: OutputConfig::default_size(),
            border: OutputConfig::default_border(),
            format: OutputFormat::Png,
        }
    }
}

/// 用户主目录下的固定位置：~/Downloads/qrcode_mcp
pub fn default_output_dir() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join("Downloads").join("qrcode_mcp"),
        None => PathBuf::from("qrcode_mcp"),
    }
}
