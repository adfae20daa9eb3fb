//! Colour value type: three 8-bit channels with named blend operations.

use ratatui::style::Color;

use crate::theme::ThemeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Luma grey (ITU-R 601 weights), used for the game-over board.
    pub fn desaturate(self) -> Self {
        let gray = 0.299 * f32::from(self.r) + 0.587 * f32::from(self.g) + 0.114 * f32::from(self.b);
        let gray = gray as u8;
        Self::new(gray, gray, gray)
    }

    /// Add `amount` to every channel, saturating at 255.
    pub fn lighten(self, amount: u8) -> Self {
        Self::new(
            self.r.saturating_add(amount),
            self.g.saturating_add(amount),
            self.b.saturating_add(amount),
        )
    }

    /// Subtract `amount` from every channel, saturating at 0.
    pub fn darken(self, amount: u8) -> Self {
        Self::new(
            self.r.saturating_sub(amount),
            self.g.saturating_sub(amount),
            self.b.saturating_sub(amount),
        )
    }

    /// Paint `over` on top of `self` with opacity `alpha` (0.0 keeps `self`, 1.0 gives `over`).
    pub fn blend(self, over: Self, alpha: f32) -> Self {
        let a = alpha.clamp(0.0, 1.0);
        let mix = |base: u8, top: u8| {
            (f32::from(base) + (f32::from(top) - f32::from(base)) * a).round() as u8
        };
        Self::new(mix(self.r, over.r), mix(self.g, over.g), mix(self.b, over.b))
    }
}

impl From<Rgb> for Color {
    fn from(c: Rgb) -> Self {
        Self::Rgb(c.r, c.g, c.b)
    }
}

/// Parse hex colour "#RRGGBB" or "#RGB".
pub fn parse_hex(s: &str) -> Result<Rgb, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    if !s.is_ascii() {
        return Err(ThemeError::InvalidHex(s.to_string()));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&s[range], 16).map_err(|_| ThemeError::InvalidHex(s.to_string()))
    };
    match s.len() {
        6 => Ok(Rgb::new(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
        3 => Ok(Rgb::new(
            channel(0..1)? * 17,
            channel(1..2)? * 17,
            channel(2..3)? * 17,
        )),
        _ => Err(ThemeError::InvalidHex(s.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_6() {
        assert_eq!(parse_hex("#98C379").unwrap(), Rgb::new(0x98, 0xC3, 0x79));
    }

    #[test]
    fn test_parse_hex_3() {
        assert_eq!(parse_hex("#FFF").unwrap(), Rgb::WHITE);
    }

    #[test]
    fn test_parse_hex_rejects_garbage() {
        assert!(parse_hex("#12345").is_err());
        assert!(parse_hex("#GGGGGG").is_err());
    }

    #[test]
    fn test_desaturate_is_grey() {
        let g = Rgb::new(255, 0, 0).desaturate();
        assert_eq!(g, Rgb::new(76, 76, 76));
        let g = Rgb::new(0, 0, 255).desaturate();
        assert_eq!((g.r, g.g, g.b), (29, 29, 29));
    }

    #[test]
    fn test_lighten_darken_saturate() {
        let c = Rgb::new(230, 20, 128);
        assert_eq!(c.lighten(50), Rgb::new(255, 70, 178));
        assert_eq!(c.darken(50), Rgb::new(180, 0, 78));
    }

    #[test]
    fn test_blend_endpoints() {
        let base = Rgb::new(20, 20, 30);
        assert_eq!(base.blend(Rgb::WHITE, 0.0), base);
        assert_eq!(base.blend(Rgb::WHITE, 1.0), Rgb::WHITE);
        assert_eq!(Rgb::BLACK.blend(Rgb::new(200, 100, 0), 0.5), Rgb::new(100, 50, 0));
    }
}
