// src/render/color.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 24-bit colour, written as `#rrggbb` in config files.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return Err(format!("invalid hex colour `{s}`"));
        }
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return Err(format!("expected #rgb or #rrggbb, got `{s}`")),
        };
        let channel = |i: usize| {
            u8::from_str_radix(&expanded[i..i + 2], 16)
                .map_err(|_| format!("invalid hex colour `{s}`"))
        };
        Ok(Rgb::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_string()
    }
}

/// Colours used by the renderer.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct Palette {
    pub played: Rgb,
    pub unplayed: Rgb,
    pub menu_background: Rgb,
    pub menu_text: Rgb,
    pub menu_active: Rgb,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            played: Rgb::new(0x22, 0xc5, 0x5e),
            unplayed: Rgb::new(0x14, 0x53, 0x2d),
            menu_background: Rgb::new(0x1a, 0x1a, 0x1a),
            menu_text: Rgb::new(0xff, 0xff, 0xff),
            menu_active: Rgb::new(0x22, 0xc5, 0x5e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_print() {
        let c: Rgb = "#22c55e".parse().unwrap();
        assert_eq!(c, Rgb::new(0x22, 0xc5, 0x5e));
        assert_eq!(c.to_string(), "#22c55e");
        assert_eq!("#fff".parse::<Rgb>().unwrap(), Rgb::new(255, 255, 255));
        assert!("#12345".parse::<Rgb>().is_err());
        assert!("#zzzzzz".parse::<Rgb>().is_err());
    }
}
