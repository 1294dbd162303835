use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Straight-alpha ARGB colour, written in config as `#RRGGBB` or `#AARRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid colour \"{0}\": expected #RRGGBB or #AARRGGBB")]
pub struct ColorParseError(String);

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self { a, r, g, b }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::argb(255, r, g, b)
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ColorParseError(s.to_string());
        let hex = s.strip_prefix('#').ok_or_else(err)?;
        if !hex.is_ascii() || !(hex.len() == 6 || hex.len() == 8) {
            return Err(err());
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());
        if hex.len() == 6 {
            Ok(Color::rgb(byte(0)?, byte(2)?, byte(4)?))
        } else {
            Ok(Color::argb(byte(0)?, byte(2)?, byte(4)?, byte(6)?))
        }
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02X}{:02X}{:02X}{:02X}", self.a, self.r, self.g, self.b)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_opaque_rgb() {
        assert_eq!("#3D94FF".parse(), Ok(Color::rgb(61, 148, 255)));
        assert_eq!("#3d94ff".parse(), Ok(Color::rgb(61, 148, 255)));
    }

    #[test]
    fn parses_argb() {
        assert_eq!("#F70F0F0F".parse(), Ok(Color::argb(247, 15, 15, 15)));
    }

    #[test]
    fn rejects_malformed_colours() {
        for bad in ["", "3D94FF", "#3D94F", "#GGGGGG", "#3D94FF00FF", "#ÿÿÿ"] {
            assert!(bad.parse::<Color>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn display_omits_opaque_alpha() {
        assert_eq!(Color::rgb(1, 2, 255).to_string(), "#0102FF");
        assert_eq!(Color::argb(16, 1, 2, 3).to_string(), "#10010203");
    }
}
