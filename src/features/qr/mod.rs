pub mod color;
pub mod encoder;
mod models;
pub mod output;
pub mod overlay;
pub mod renderer;
mod service;
pub mod styles;

pub use color::{Rgb, parse_hex_color};
pub use encoder::{SymbolMatrix, encode};
pub use models::{
    BasicRequest, Capabilities, CapabilityDefaults, GenerationResult, GradientRequest,
    ImageRequest, LogoRequest, OutputOptions, StyledRequest, TransparentRequest,
};
pub use renderer::{Canvas, ColorFill, StyleSpec, render};
pub use service::{DATA_ECHO_LIMIT, QrGenerator, truncate_data};
pub use styles::{EcLevel, FillMode, ModuleShape, OutputFormat, StyleKey};
