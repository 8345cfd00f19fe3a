use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::CircosError;

/// An opaque RGB color, written as `#rrggbb` in configs and SVG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);
    pub const BLACK: Rgb = Rgb(0, 0, 0);
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

impl FromStr for Rgb {
    type Err = CircosError;

    /// Accepts `#rrggbb` or `r,g,b`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bad = || CircosError::Config(format!("invalid color '{}'", s));

        if let Some(hex) = s.strip_prefix('#') {
            if hex.len() != 6 || !hex.is_ascii() {
                return Err(bad());
            }
            let channel = |range: std::ops::Range<usize>| {
                u8::from_str_radix(&hex[range], 16).map_err(|_| bad())
            };
            return Ok(Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?));
        }

        let parts: Vec<u8> = s
            .split(',')
            .map(|p| p.trim().parse::<u8>())
            .collect::<Result<_, _>>()
            .map_err(|_| bad())?;
        match parts.as_slice() {
            [r, g, b] => Ok(Rgb(*r, *g, *b)),
            _ => Err(bad()),
        }
    }
}

impl TryFrom<String> for Rgb {
    type Error = CircosError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_string()
    }
}

/// Deterministic color for a track name.
///
/// Picks three bytes of the SHA-256 digest, normalizes them by their sum and
/// brightens the result so that no component saturates beyond 1.5x.
pub fn track_color(name: &str) -> Rgb {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();

    let mut r = digest[24] as f32 / 255.0;
    let mut g = digest[8] as f32 / 255.0;
    let mut b = digest[16] as f32 / 255.0;

    let sum = r + g + b;
    if sum > 0.0 {
        r /= sum;
        g /= sum;
        b /= sum;
    }

    let max_component = r.max(g).max(b);
    let f = if max_component > 0.0 {
        1.5f32.min(1.0 / max_component)
    } else {
        1.0
    };

    let channel = |c: f32| (255.0 * (c * f).min(1.0)).round() as u8;
    Rgb(channel(r), channel(g), channel(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_and_triplet() {
        assert_eq!("#ff8000".parse::<Rgb>().unwrap(), Rgb(255, 128, 0));
        assert_eq!(" 10, 20,30 ".parse::<Rgb>().unwrap(), Rgb(10, 20, 30));
        assert!("#ff80".parse::<Rgb>().is_err());
        assert!("1,2".parse::<Rgb>().is_err());
        assert!("red".parse::<Rgb>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        let c = Rgb(1, 171, 255);
        assert_eq!(c.to_string(), "#01abff");
        assert_eq!(c.to_string().parse::<Rgb>().unwrap(), c);
    }

    #[test]
    fn test_track_color_is_stable_and_name_dependent() {
        assert_eq!(track_color("coverage"), track_color("coverage"));
        assert_ne!(track_color("coverage"), track_color("gc-content"));
    }
}
