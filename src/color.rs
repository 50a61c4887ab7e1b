//! Route line colour supplied alongside a planned geometry.

use std::fmt;

use log::warn;

/// An sRGB colour parsed from `#RRGGBB` or `#AARRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteColor {
    pub alpha: u8,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl RouteColor {
    /// Yellow, used when the host supplies no usable colour.
    pub const DEFAULT: RouteColor = RouteColor::rgb(0xFF, 0xFF, 0x00);

    pub const fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self {
            alpha: 0xFF,
            red,
            green,
            blue,
        }
    }

    /// Parse `#RRGGBB` or `#AARRGGBB` (case-insensitive). Returns `None` for
    /// anything else.
    pub fn parse(raw: &str) -> Option<Self> {
        let hex = raw.trim().strip_prefix('#')?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let value = u32::from_str_radix(hex, 16).ok()?;
        match hex.len() {
            6 => Some(Self::rgb((value >> 16) as u8, (value >> 8) as u8, value as u8)),
            8 => Some(Self {
                alpha: (value >> 24) as u8,
                red: (value >> 16) as u8,
                green: (value >> 8) as u8,
                blue: value as u8,
            }),
            _ => None,
        }
    }

    /// Parse an optional host value, falling back to [`RouteColor::DEFAULT`].
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        match raw {
            None => Self::DEFAULT,
            Some(value) => Self::parse(value).unwrap_or_else(|| {
                warn!("[Guidance] Unparsable route colour {:?}, using {}", value, Self::DEFAULT);
                Self::DEFAULT
            }),
        }
    }

    /// Hex form; alpha is only written when not fully opaque.
    pub fn to_hex(&self) -> String {
        self.to_string()
    }
}

impl Default for RouteColor {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for RouteColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.alpha == 0xFF {
            write!(f, "#{:02X}{:02X}{:02X}", self.red, self.green, self.blue)
        } else {
            write!(
                f,
                "#{:02X}{:02X}{:02X}{:02X}",
                self.alpha, self.red, self.green, self.blue
            )
        }
    }
}
