use std::fmt;

use crate::error::QrError;

/// 归一化后的 RGB 颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// 按 t ∈ [0, 1] 在 self 与 other 之间线性插值
    pub fn lerp(self, other: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Rgb::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }

    /// 欧氏颜色距离的平方
    pub fn distance_sq(self, other: Rgb) -> u32 {
        let d = |a: u8, b: u8| {
            let v = a as i32 - b as i32;
            (v * v) as u32
        };
        d(self.r, other.r) + d(self.g, other.g) + d(self.b, other.b)
    }

    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// 解析 `RRGGBB` / `#RRGGBB` / `RGB` / `#RGB`。
///
/// 三位简写按位复制展开（`F00` → `FF0000`）。`field` 仅用于错误信息。
pub fn parse_hex_color(field: &str, raw: &str) -> Result<Rgb, QrError> {
    let invalid = || QrError::InvalidColorFormat {
        field: field.to_string(),
        value: raw.to_string(),
    };

    let hex_part = raw.trim();
    let hex_part = hex_part.strip_prefix('#').unwrap_or(hex_part);
    if !hex_part.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let expanded: String = match hex_part.len() {
        3 => hex_part.chars().flat_map(|c| [c, c]).collect(),
        6 => hex_part.to_string(),
        _ => return Err(invalid()),
    };

    let bytes = hex::decode(&expanded).map_err(|_| invalid())?;
    match bytes.as_slice() {
        [r, g, b] => Ok(Rgb::new(*r, *g, *b)),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn six_digit_forms_decode_pairwise() {
        assert_eq!(parse_hex_color("c", "#FF8000").unwrap(), Rgb::new(255, 128, 0));
        assert_eq!(parse_hex_color("c", "0a0B0c").unwrap(), Rgb::new(10, 11, 12));
        assert_eq!(parse_hex_color("c", "  #000088 ").unwrap(), Rgb::new(0, 0, 0x88));
    }

    #[test]
    fn shorthand_equals_its_expansion() {
        for (short, long) in [("F00", "FF0000"), ("#abc", "#aabbcc"), ("09f", "0099ff")] {
            assert_eq!(
                parse_hex_color("c", short).unwrap(),
                parse_hex_color("c", long).unwrap(),
                "{short} vs {long}"
            );
        }
    }

    #[test]
    fn rejects_bad_length_and_non_hex() {
        for bad in ["", "#", "FF", "FFFF", "#FFFFF", "FFFFFFF", "GG0000", "#12345z", "+1+", "ÿÿÿ"] {
            let err = parse_hex_color("fg_color", bad).expect_err(bad);
            assert!(
                matches!(err, QrError::InvalidColorFormat { ref field, .. } if field == "fg_color"),
                "{bad}: {err:?}"
            );
        }
    }

    #[test]
    fn display_round_trips_through_parser() {
        let c = Rgb::new(1, 200, 99);
        assert_eq!(c.to_string(), "#01C863");
        assert_eq!(parse_hex_color("c", &c.to_string()).unwrap(), c);
    }

    #[test]
    fn lerp_hits_endpoints() {
        let red = Rgb::new(255, 0, 0);
        let blue = Rgb::new(0, 0, 255);
        assert_eq!(red.lerp(blue, 0.0), red);
        assert_eq!(red.lerp(blue, 1.0), blue);
        assert_eq!(red.lerp(blue, 7.0), blue);
        assert_eq!(red.lerp(blue, 0.5), Rgb::new(128, 0, 128));
    }
}
