//! sRGB color type
//!
//! Canvas tiles and templates are 8-bit sRGB, so this type stores the raw
//! channel bytes and leaves gamma decoding to [`LinearRgb`].

use std::fmt;
use std::str::FromStr;

use super::linear_rgb::LinearRgb;
use crate::palette::ParseColorError;

/// A color in 8-bit sRGB color space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Srgb {
    /// Red channel (gamma-encoded)
    pub r: u8,
    /// Green channel (gamma-encoded)
    pub g: u8,
    /// Blue channel (gamma-encoded)
    pub b: u8,
}

impl Srgb {
    /// Create an Srgb color from 8-bit channel values.
    ///
    /// # Example
    /// ```
    /// use canvas_palette::Srgb;
    /// let red = Srgb::from_u8(255, 0, 0);
    /// assert_eq!(red.to_bytes(), [255, 0, 0]);
    /// ```
    #[inline]
    pub const fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Create an Srgb color from a byte array [R, G, B].
    #[inline]
    pub const fn from_bytes(bytes: [u8; 3]) -> Self {
        Self::from_u8(bytes[0], bytes[1], bytes[2])
    }

    /// Convert to a byte array [R, G, B].
    #[inline]
    pub const fn to_bytes(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Pack the color into a 24-bit key (`0xRRGGBB`).
    ///
    /// Used as the memoization key for nearest-color lookups.
    #[inline]
    pub const fn key(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    /// Squared Euclidean distance in raw RGB space.
    #[inline]
    pub fn distance_squared(self, other: Srgb) -> u32 {
        let dr = self.r as i32 - other.r as i32;
        let dg = self.g as i32 - other.g as i32;
        let db = self.b as i32 - other.b as i32;
        (dr * dr + dg * dg + db * db) as u32
    }

    /// Decode to linear light.
    #[inline]
    pub fn to_linear(self) -> LinearRgb {
        LinearRgb::from(self)
    }
}

impl fmt::Display for Srgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Srgb {
    type Err = ParseColorError;

    /// Parse an sRGB color from a hex string.
    ///
    /// Supports `#RRGGBB`, `RRGGBB`, `#RGB` and `RGB`. Parsing is
    /// case-insensitive and surrounding whitespace is trimmed.
    ///
    /// # Examples
    ///
    /// ```
    /// use canvas_palette::Srgb;
    ///
    /// let white: Srgb = "#FFFFFF".parse().unwrap();
    /// assert_eq!(white, Srgb::from_u8(255, 255, 255));
    ///
    /// let red: Srgb = "#F00".parse().unwrap();
    /// assert_eq!(red, Srgb::from_u8(255, 0, 0));
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix('#').unwrap_or(s);

        match s.len() {
            3 => {
                // Shorthand: expand each digit by multiplying by 17 (0xF -> 0xFF)
                let r = u8::from_str_radix(&s[0..1], 16)? * 17;
                let g = u8::from_str_radix(&s[1..2], 16)? * 17;
                let b = u8::from_str_radix(&s[2..3], 16)? * 17;
                Ok(Self::from_u8(r, g, b))
            }
            6 => {
                let r = u8::from_str_radix(&s[0..2], 16)?;
                let g = u8::from_str_radix(&s[2..4], 16)?;
                let b = u8::from_str_radix(&s[4..6], 16)?;
                Ok(Self::from_u8(r, g, b))
            }
            _ => Err(ParseColorError::InvalidLength),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_packs_channels() {
        assert_eq!(Srgb::from_u8(0x12, 0x34, 0x56).key(), 0x123456);
        assert_eq!(Srgb::from_u8(0, 0, 0).key(), 0);
    }

    #[test]
    fn test_distance_squared() {
        let a = Srgb::from_u8(10, 20, 30);
        let b = Srgb::from_u8(13, 24, 30);
        assert_eq!(a.distance_squared(b), 25);
        assert_eq!(a.distance_squared(a), 0);
    }

    #[test]
    fn test_display_is_lower_hex() {
        assert_eq!(Srgb::from_u8(237, 28, 36).to_string(), "#ed1c24");
    }

    #[test]
    fn test_parse_hex_6_digit() {
        let color: Srgb = "#FF8000".parse().unwrap();
        assert_eq!(color, Srgb::from_u8(255, 128, 0));
        let color: Srgb = "ff8000".parse().unwrap();
        assert_eq!(color, Srgb::from_u8(255, 128, 0));
    }

    #[test]
    fn test_parse_hex_3_digit() {
        let color: Srgb = "#fff".parse().unwrap();
        assert_eq!(color, Srgb::from_u8(255, 255, 255));
    }

    #[test]
    fn test_parse_hex_whitespace() {
        let color: Srgb = "  #000000  ".parse().unwrap();
        assert_eq!(color, Srgb::from_u8(0, 0, 0));
    }

    #[test]
    fn test_parse_invalid_length() {
        assert_eq!(
            "#FFFF".parse::<Srgb>(),
            Err(ParseColorError::InvalidLength)
        );
        assert_eq!("".parse::<Srgb>(), Err(ParseColorError::InvalidLength));
    }

    #[test]
    fn test_parse_invalid_hex() {
        assert!(matches!(
            "#GGGGGG".parse::<Srgb>(),
            Err(ParseColorError::InvalidHex(_))
        ));
    }
}
