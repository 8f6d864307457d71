//! Colors and per-layer paint settings used by the image renderer.

use std::fmt;
use std::str::FromStr;

use crate::error::MapError;

/// An 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    pub const WHITE: Color = Color::rgba(255, 255, 255, 255);
    pub const BLACK: Color = Color::rgba(0, 0, 0, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    pub fn to_skia(self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.r, self.g, self.b, self.a)
    }
}

/// Parses `#rrggbb` or `#rrggbbaa`.
impl FromStr for Color {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MapError::Configuration(format!("invalid color '{}'", s));
        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        let a = if hex.len() == 8 { channel(6)? } else { 255 };
        Ok(Color::rgba(channel(0)?, channel(2)?, channel(4)?, a))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if self.a != 255 {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

/// How a layer's features are painted into images.
///
/// Grid rendering ignores styles entirely; every feature footprint is
/// stamped with its feature id.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerStyle {
    pub fill: Option<Color>,
    pub stroke: Option<Color>,
    pub stroke_width: f32,
    pub point_radius: f32,
}

impl Default for LayerStyle {
    fn default() -> Self {
        Self {
            fill: Some(Color::rgba(70, 130, 180, 200)),
            stroke: Some(Color::rgb(40, 40, 40)),
            stroke_width: 1.0,
            point_radius: 3.0,
        }
    }
}

impl LayerStyle {
    pub fn with_fill(mut self, fill: Option<Color>) -> Self {
        self.fill = fill;
        self
    }

    pub fn with_stroke(mut self, stroke: Option<Color>, width: f32) -> Self {
        self.stroke = stroke;
        self.stroke_width = width;
        self
    }

    pub fn with_point_radius(mut self, radius: f32) -> Self {
        self.point_radius = radius;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_colors() {
        assert_eq!("#ff8000".parse::<Color>().unwrap(), Color::rgb(255, 128, 0));
        assert_eq!(
            "#00000080".parse::<Color>().unwrap(),
            Color::rgba(0, 0, 0, 128)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("red".parse::<Color>().is_err());
        assert!("#12345".parse::<Color>().is_err());
        assert!("#gg0000".parse::<Color>().is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        for text in ["#102030", "#a0b0c0d0"] {
            assert_eq!(text.parse::<Color>().unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_style_builder() {
        let style = LayerStyle::default()
            .with_fill(None)
            .with_stroke(Some(Color::BLACK), 2.5)
            .with_point_radius(6.0);
        assert_eq!(style.fill, None);
        assert_eq!(style.stroke_width, 2.5);
        assert_eq!(style.point_radius, 6.0);
    }
}
