//! Theme loading: btop-style `theme[key]="value"` files and the piece palette.

use crate::color::{Rgb, parse_hex};
use crate::game::PieceKind;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Board, panel and piece colours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    /// Piece colours indexed by `PieceKind::index()`: I, O, T, S, Z, J, L.
    pub pieces: [Rgb; 7],
    /// Board background.
    pub bg: Rgb,
    /// Grid marks and borders.
    pub grid: Rgb,
    /// Side panel background.
    pub panel: Rgb,
    /// Score / next boxes.
    pub panel_box: Rgb,
    /// Text.
    pub text: Rgb,
    /// Ghost piece outline.
    pub ghost: Rgb,
    pub button: Rgb,
    pub button_hover: Rgb,
    pub button_text: Rgb,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

const CLASSIC_PIECES: [Rgb; 7] = [
    Rgb::new(0, 255, 255),
    Rgb::new(255, 255, 0),
    Rgb::new(128, 0, 128),
    Rgb::new(0, 255, 0),
    Rgb::new(255, 0, 0),
    Rgb::new(0, 0, 255),
    Rgb::new(255, 127, 0),
];

const HIGH_CONTRAST_PIECES: [Rgb; 7] = [
    Rgb::new(0, 255, 255),
    Rgb::new(255, 255, 0),
    Rgb::new(255, 0, 255),
    Rgb::new(0, 255, 0),
    Rgb::new(255, 0, 0),
    Rgb::new(0, 136, 255),
    Rgb::new(255, 160, 0),
];

// Paul Tol's bright/vibrant schemes, distinguishable under common colour-vision deficiencies.
const COLORBLIND_PIECES: [Rgb; 7] = [
    Rgb::new(0x33, 0xBB, 0xEE),
    Rgb::new(0xCC, 0xBB, 0x44),
    Rgb::new(0xAA, 0x33, 0x77),
    Rgb::new(0x00, 0x99, 0x88),
    Rgb::new(0xCC, 0x33, 0x11),
    Rgb::new(0x00, 0x77, 0xBB),
    Rgb::new(0xEE, 0x77, 0x33),
];

impl Default for Theme {
    fn default() -> Self {
        Self::classic()
    }
}

impl Theme {
    /// The stock look: dark navy board, bright guideline piece colours.
    pub fn classic() -> Self {
        Self {
            pieces: CLASSIC_PIECES,
            bg: Rgb::new(20, 20, 30),
            grid: Rgb::new(40, 40, 60),
            panel: Rgb::new(30, 30, 50),
            panel_box: Rgb::new(25, 25, 40),
            text: Rgb::new(230, 230, 230),
            ghost: Rgb::new(255, 255, 255),
            button: Rgb::new(80, 80, 110),
            button_hover: Rgb::new(110, 110, 140),
            button_text: Rgb::new(255, 255, 255),
        }
    }

    /// Load theme from a btop-style file: `theme[key]="value"` or `theme[key]='value'`.
    /// Falls back to the classic theme if path is None or the file is missing.
    /// `palette` then overrides the piece colours unless it is `Normal`.
    pub fn load(path: Option<&Path>, palette: crate::Palette) -> Result<Self, ThemeError> {
        let mut theme = match path {
            Some(p) if p.exists() => {
                let s = std::fs::read_to_string(p)?;
                debug!(path = %p.display(), "loaded theme file");
                Self::from_map(&parse_theme_file(&s))
            }
            Some(p) => {
                warn!(path = %p.display(), "theme file not found, using defaults");
                Self::classic()
            }
            None => Self::classic(),
        };
        theme.apply_palette(palette);
        Ok(theme)
    }

    /// Override piece colours for high-contrast or colorblind play.
    pub fn apply_palette(&mut self, palette: crate::Palette) {
        match palette {
            crate::Palette::Normal => {}
            crate::Palette::HighContrast => self.pieces = HIGH_CONTRAST_PIECES,
            crate::Palette::Colorblind => self.pieces = COLORBLIND_PIECES,
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let base = Self::classic();
        let get = |key: &str, fallback: Rgb| match map.get(key).map(|v| parse_hex(v)) {
            Some(Ok(rgb)) => rgb,
            Some(Err(err)) => {
                warn!(key, %err, "ignoring theme colour");
                fallback
            }
            None => fallback,
        };
        let mut pieces = base.pieces;
        for kind in PieceKind::ALL {
            let key = format!("piece_{}", kind.letter().to_ascii_lowercase());
            pieces[kind.index()] = get(&key, pieces[kind.index()]);
        }
        // Board/panel keys reuse btop names where one fits.
        Self {
            pieces,
            bg: get("main_bg", base.bg),
            grid: get("div_line", base.grid),
            panel: get("meter_bg", base.panel),
            panel_box: get("box_bg", base.panel_box),
            text: get("main_fg", base.text),
            ghost: get("hi_fg", base.ghost),
            button: get("selected_bg", base.button),
            button_hover: get("hover_bg", base.button_hover),
            button_text: get("selected_fg", base.button_text),
        }
    }
}

/// `theme[key]="value"` lines to a map. Comments, junk and empty values are skipped.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    s.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line.strip_prefix("theme[")?.split_once(']')?;
            let value = value.trim().strip_prefix('=')?.trim();
            let value = value.trim_matches(|c: char| c == '"' || c == '\'');
            (!value.is_empty()).then(|| (key.trim().to_owned(), value.to_owned()))
        })
        .collect()
}
