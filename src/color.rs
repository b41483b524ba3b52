use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColorError {
    #[error("invalid hex colour '{0}' (expected #rgb or #rrggbb)")]
    InvalidHex(String),
}

/// A CSS-style hex colour, normalised to lowercase `#rrggbb`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor(String);

impl HexColor {
    pub fn parse(value: &str) -> Result<Self, ColorError> {
        let trimmed = value.trim();
        let digits = trimmed
            .strip_prefix('#')
            .ok_or_else(|| ColorError::InvalidHex(value.to_string()))?;
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorError::InvalidHex(value.to_string()));
        }
        let expanded = match digits.len() {
            3 => digits.chars().flat_map(|c| [c, c]).collect::<String>(),
            6 => digits.to_string(),
            _ => return Err(ColorError::InvalidHex(value.to_string())),
        };
        Ok(Self(format!("#{}", expanded.to_ascii_lowercase())))
    }

    pub fn from_rgb8(rgb: [u8; 3]) -> Self {
        Self(format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_rgb8(&self) -> [u8; 3] {
        // Invariant: always "#rrggbb" with valid hex digits.
        let channel = |start: usize| u8::from_str_radix(&self.0[start..start + 2], 16).unwrap_or(0);
        [channel(1), channel(3), channel(5)]
    }

    pub fn to_linear(&self) -> LinearRgb {
        LinearRgb::from_srgb8(self.to_rgb8())
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for HexColor {
    type Error = ColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<HexColor> for String {
    fn from(value: HexColor) -> Self {
        value.0
    }
}

/// Linear-light RGB as consumed by the shading code.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LinearRgb(pub [f32; 3]);

impl LinearRgb {
    pub const BLACK: Self = Self([0.0, 0.0, 0.0]);
    pub const WHITE: Self = Self([1.0, 1.0, 1.0]);

    pub fn from_srgb8(rgb: [u8; 3]) -> Self {
        Self(rgb.map(|c| srgb_to_linear(c as f32 / 255.0)))
    }

    pub fn scaled(self, factor: f32) -> Self {
        Self(self.0.map(|c| c * factor))
    }
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::{HexColor, LinearRgb};

    fn to_srgb8(linear: LinearRgb) -> [u8; 3] {
        linear.0.map(|c| {
            let c = c.clamp(0.0, 1.0);
            let encoded = if c <= 0.003_130_8 {
                c * 12.92
            } else {
                1.055 * c.powf(1.0 / 2.4) - 0.055
            };
            (encoded * 255.0).round() as u8
        })
    }

    #[test]
    fn parses_long_and_short_forms() {
        assert_eq!(HexColor::parse("#112233").unwrap().as_str(), "#112233");
        assert_eq!(HexColor::parse("#ABC").unwrap().as_str(), "#aabbcc");
        assert_eq!(HexColor::parse("  #FF6347 ").unwrap().as_str(), "#ff6347");
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(HexColor::parse("112233").is_err());
        assert!(HexColor::parse("#12345").is_err());
        assert!(HexColor::parse("#gg0000").is_err());
        assert!(HexColor::parse("").is_err());
    }

    #[test]
    fn rgb8_conversion_matches_digits() {
        let color = HexColor::parse("#ff6347").unwrap();
        assert_eq!(color.to_rgb8(), [0xff, 0x63, 0x47]);
        assert_eq!(HexColor::from_rgb8([0xff, 0x63, 0x47]), color);
    }

    #[test]
    fn linear_conversion_survives_round_trip_through_srgb() {
        let color = HexColor::parse("#112233").unwrap();
        let linear = color.to_linear();
        assert!(linear.0.iter().all(|c| (0.0..=1.0).contains(c)));
        assert_eq!(to_srgb8(linear), [0x11, 0x22, 0x33]);
        assert_eq!(LinearRgb::from_srgb8([255, 255, 255]), LinearRgb::WHITE);
    }

    #[test]
    fn serde_uses_plain_string_and_validates() {
        let color: HexColor = serde_json::from_str("\"#AABBCC\"").unwrap();
        assert_eq!(serde_json::to_string(&color).unwrap(), "\"#aabbcc\"");
        assert!(serde_json::from_str::<HexColor>("\"red\"").is_err());
    }
}
