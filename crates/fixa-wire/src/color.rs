use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WireError};

/// A straight-alpha sRGB color with normalized float channels.
///
/// Channels are nominally in `[0, 1]`; the codec neither clamps nor rounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);
    /// Placeholder for color fixables that have not been given a value.
    pub const MAGENTA: Color = Color::rgba(1.0, 0.0, 1.0, 1.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::rgba(r, g, b, 1.0)
    }

    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::rgba(
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
            f32::from(a) / 255.0,
        )
    }

    /// Quantize to 8-bit channels, clamping out-of-range values.
    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    /// Parse `#rrggbb` or `#rrggbbaa` (the leading `#` is optional).
    pub fn from_hex(input: &str) -> Result<Self> {
        let digits = input.trim().trim_start_matches('#');
        if !(digits.len() == 6 || digits.len() == 8) || !digits.is_ascii() {
            return Err(WireError::InvalidColor(input.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| WireError::InvalidColor(input.to_string()))
        };
        let alpha = if digits.len() == 8 { channel(6)? } else { 255 };
        Ok(Self::from_rgba8(channel(0)?, channel(2)?, channel(4)?, alpha))
    }

    /// Lowercase `#rrggbbaa`.
    pub fn to_hex(self) -> String {
        let [r, g, b, a] = self.to_rgba8();
        format!("#{r:02x}{g:02x}{b:02x}{a:02x}")
    }

    pub fn clamped(self) -> Self {
        Self::rgba(
            self.r.clamp(0.0, 1.0),
            self.g.clamp(0.0, 1.0),
            self.b.clamp(0.0, 1.0),
            self.a.clamp(0.0, 1.0),
        )
    }

    pub(crate) fn is_finite(&self) -> bool {
        [self.r, self.g, self.b, self.a].iter().all(|c| c.is_finite())
    }
}

impl FromStr for Color {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
