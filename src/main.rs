//! Lumitris: falling-block puzzle in the terminal with flashing, shattering line clears.

mod app;
mod audio;
mod color;
mod game;
mod input;
mod particles;
mod session;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, ValueEnum};
use color::Rgb;
use std::path::PathBuf;
use tracing::{Level, warn};

/// What a game session needs from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    /// Fixed seed for the piece bag; random when `None`.
    pub seed: Option<u64>,
    /// Piece colours indexed by `PieceKind::index()`.
    pub palette: [Rgb; 7],
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_else(|err| {
        warn!(%err, "theme not loaded, using defaults");
        let mut theme = theme::Theme::classic();
        theme.apply_palette(args.palette);
        theme
    });
    let config = GameConfig {
        seed: args.seed,
        palette: theme.pieces,
    };
    let mut app = App::new(&args, config, theme);
    app.run()?;
    Ok(())
}

/// Logs go to `--log-file` only; the terminal belongs to the game.
fn init_logging(args: &Args) -> Result<()> {
    let Some(path) = &args.log_file else {
        return Ok(());
    };
    let file = std::fs::File::create(path)
        .with_context(|| format!("cannot create log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();
    Ok(())
}

/// Falling-block puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "lumitris",
    version,
    about = "Falling-block puzzle in the terminal. Fill rows to clear them; they flash, shatter and score.",
    long_about = "Lumitris is a falling-block puzzle game for the terminal.\n\n\
        Pieces come from a shuffled bag of all seven shapes. Complete rows flash, shatter \
        into particles and drop the stack. 1/2/3/4 rows score 100/300/500/800; a hard \
        drop adds 2 points per row fallen.\n\n\
        CONTROLS:\n  Left/Right  Move    Up         Rotate     Down       Soft drop (hold)\n  \
        Space       Hard drop   P          Pause      Q / Esc    Quit\n  \
        Tab/Enter   Choose and press overlay buttons (mouse works too)\n\n\
        Vim keys h/l/k/j work as Left/Right/Up/Down. Use --theme to load a btop-style theme. \
        Sound needs a build with the `audio` feature and files in --assets."
)]
pub struct Args {
    /// Frames (and simulation ticks) per second.
    #[arg(long, default_value = "60.0", value_name = "RATE")]
    pub fps: f64,

    /// Seed for the piece bag and particle effects. Random if not set.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses the classic look if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Directory with rotate.wav, drop.wav, lock.wav, line_clear.wav and background.mp3.
    #[arg(long, default_value = "assets", value_name = "DIR")]
    pub assets: PathBuf,

    /// Disable sound effects and music.
    #[arg(long)]
    pub mute: bool,

    /// Write logs to this file (nothing is logged otherwise).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Maximum log level: error, warn, info, debug or trace.
    #[arg(long, default_value = "info", value_name = "LEVEL")]
    pub log_level: Level,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["lumitris"]).unwrap();
        assert!((args.fps - 60.0).abs() < f64::EPSILON);
        assert_eq!(args.seed, None);
        assert_eq!(args.palette, Palette::Normal);
        assert_eq!(args.assets, PathBuf::from("assets"));
        assert!(!args.mute);
        assert_eq!(args.log_level, Level::INFO);
    }

    #[test]
    fn test_flags_parse() {
        let args = Args::try_parse_from([
            "lumitris",
            "--seed",
            "42",
            "--palette",
            "colourblind",
            "--log-level",
            "debug",
            "-t",
            "onedark.theme",
        ])
        .unwrap();
        assert_eq!(args.seed, Some(42));
        assert_eq!(args.palette, Palette::Colorblind);
        assert_eq!(args.log_level, Level::DEBUG);
        assert_eq!(args.theme, Some(PathBuf::from("onedark.theme")));
    }

    #[test]
    fn test_bad_palette_rejected() {
        assert!(Args::try_parse_from(["lumitris", "--palette", "sepia"]).is_err());
    }
}
