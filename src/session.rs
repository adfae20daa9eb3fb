//! Game session: piece lifecycle, line-clear animation and the play/pause/game-over machine.
//!
//! A [`Session`] is advanced once per frame with [`Session::tick`], which consumes the
//! inputs queued since the previous frame and the elapsed time. Everything the session
//! wants the outside world to do (sounds, music, particles) is queued as [`Signal`]s and
//! collected with [`Session::drain_signals`]; the renderer reads a [`View`].

use crate::GameConfig;
use crate::color::Rgb;
use crate::game::{self, Bag, Board, Piece};
use std::time::Duration;
use tracing::{debug, info};

/// Gravity step with no drop key held.
pub const FALL_DEFAULT: Duration = Duration::from_millis(500);
/// Gravity step while soft drop is held.
pub const FALL_SOFT_DROP: Duration = Duration::from_millis(50);
/// Gravity step after a sonic (hard) drop.
pub const FALL_SONIC_DROP: Duration = Duration::from_millis(10);
/// Full rows flash for this long before they shatter.
pub const FLASH_DURATION: Duration = Duration::from_millis(150);
/// Countdown after the rows are removed, before the board compacts.
pub const SHATTER_DURATION: Duration = Duration::from_millis(350);

const HARD_DROP_POINTS_PER_ROW: u32 = 2;
/// Fraction of the remaining distance the render row covers per 60 Hz frame.
const INTERPOLATION_PER_FRAME: f32 = 0.3;
const REFERENCE_FRAME: Duration = Duration::from_micros(16_667);

/// Player intent, already decoupled from keys and mouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    MoveLeft,
    MoveRight,
    Rotate,
    SoftDropStart,
    SoftDropStop,
    HardDrop,
    TogglePause,
    Resume,
    Replay,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sound {
    Rotate,
    HardDrop,
    Lock,
    LineClear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MusicCue {
    Play,
    Pause,
    Resume,
    Stop,
}

/// Fire-and-forget requests for the audio and particle collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Sound(Sound),
    Music(MusicCue),
    /// A locked block was removed by a line clear.
    Shatter { col: i32, row: i32, color: Rgb },
    /// A cell the piece passes through during a sonic drop.
    Trace { col: i32, row: i32, color: Rgb },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Playing,
    /// Playing, with the piece frozen while full rows animate.
    LineClearing,
    Paused,
    GameOver,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Playing,
    Paused,
    GameOver,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearPhase {
    Flashing,
    Shattering,
}

/// Timed removal of full rows: flash, then shatter, then compact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineClear {
    rows: Vec<usize>,
    elapsed: Duration,
    phase: ClearPhase,
}

impl LineClear {
    fn new(rows: Vec<usize>) -> Self {
        Self {
            rows,
            elapsed: Duration::ZERO,
            phase: ClearPhase::Flashing,
        }
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn count(&self) -> usize {
        self.rows.len()
    }

    pub fn phase(&self) -> ClearPhase {
        self.phase
    }

    /// Overlay opacity: 1.0 when the flash starts, 0.0 once it is over.
    pub fn flash_alpha(&self) -> f32 {
        match self.phase {
            ClearPhase::Flashing => {
                (1.0 - self.elapsed.as_secs_f32() / FLASH_DURATION.as_secs_f32()).clamp(0.0, 1.0)
            }
            ClearPhase::Shattering => 0.0,
        }
    }

    fn advance(&mut self, dt: Duration) {
        self.elapsed += dt;
    }

    /// Flashing -> Shattering, exactly once, when the flash time has run out.
    fn begin_shatter(&mut self) -> bool {
        if self.phase == ClearPhase::Flashing && self.elapsed >= FLASH_DURATION {
            self.phase = ClearPhase::Shattering;
            return true;
        }
        false
    }

    fn is_complete(&self) -> bool {
        self.elapsed >= FLASH_DURATION + SHATTER_DURATION
    }
}

/// Flash overlay for the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Flash<'a> {
    pub rows: &'a [usize],
    pub alpha: f32,
}

/// Read-only picture of the session for one frame.
#[derive(Debug, Clone)]
pub struct View<'a> {
    pub state: SessionState,
    /// Locked blocks; greyed out after game over.
    pub locked: Vec<((i32, i32), Rgb)>,
    /// Falling piece (with its interpolated row), only while it can move.
    pub active: Option<&'a Piece>,
    /// Row the active piece would rest on.
    pub ghost_row: Option<i32>,
    pub next: &'a Piece,
    pub flash: Option<Flash<'a>>,
    pub score: u32,
}

#[derive(Debug)]
pub struct Session {
    config: GameConfig,
    bag: Bag,
    board: Board,
    current: Piece,
    next: Piece,
    score: u32,
    fall_timer: Duration,
    soft_dropping: bool,
    sonic_dropping: bool,
    /// Bonus earned by the pending sonic drop, paid out when the piece locks.
    sonic_bonus: u32,
    line_clear: Option<LineClear>,
    status: Status,
    signals: Vec<Signal>,
}

impl Session {
    /// Fresh game: new bag, empty board, zero score, music starting.
    pub fn new(config: GameConfig) -> Self {
        let mut bag = config.seed.map_or_else(Bag::new, Bag::seeded);
        let current = bag.next(&config.palette);
        let next = bag.next(&config.palette);
        info!(seed = ?config.seed, first = ?current.kind, "new session");
        Self {
            config,
            bag,
            board: Board::new(),
            current,
            next,
            score: 0,
            fall_timer: Duration::ZERO,
            soft_dropping: false,
            sonic_dropping: false,
            sonic_bonus: 0,
            line_clear: None,
            status: Status::Playing,
            signals: vec![Signal::Music(MusicCue::Play)],
        }
    }

    pub fn state(&self) -> SessionState {
        match self.status {
            Status::Playing if self.line_clear.is_some() => SessionState::LineClearing,
            Status::Playing => SessionState::Playing,
            Status::Paused => SessionState::Paused,
            Status::GameOver => SessionState::GameOver,
            Status::Terminated => SessionState::Terminated,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.status == Status::Terminated
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    /// Signals queued since the last call, oldest first.
    pub fn drain_signals(&mut self) -> impl Iterator<Item = Signal> + '_ {
        self.signals.drain(..)
    }

    /// One frame: apply queued inputs in order, then advance timers by `dt`.
    pub fn tick<I>(&mut self, inputs: I, dt: Duration)
    where
        I: IntoIterator<Item = Input>,
    {
        for input in inputs {
            self.handle(input);
        }
        self.update(dt);
    }

    fn handle(&mut self, input: Input) {
        match (self.status, input) {
            (Status::Terminated, _) => {}
            (_, Input::Quit) => {
                info!(score = self.score, "quit");
                self.status = Status::Terminated;
            }
            (Status::GameOver, Input::Replay) => self.replay(),
            (Status::GameOver, _) => {}
            (_, Input::SoftDropStop) => self.soft_dropping = false,
            (Status::Paused, Input::TogglePause | Input::Resume) => {
                debug!("resumed");
                self.status = Status::Playing;
                self.signals.push(Signal::Music(MusicCue::Resume));
            }
            (Status::Paused, _) => {}
            (Status::Playing, Input::TogglePause) => {
                debug!("paused");
                self.status = Status::Paused;
                self.signals.push(Signal::Music(MusicCue::Pause));
            }
            (Status::Playing, Input::Resume | Input::Replay) => {}
            (Status::Playing, _) if self.line_clear.is_some() => {}
            (Status::Playing, Input::MoveLeft) => self.shift(-1),
            (Status::Playing, Input::MoveRight) => self.shift(1),
            (Status::Playing, Input::Rotate) => self.rotate(),
            (Status::Playing, Input::SoftDropStart) => self.soft_dropping = true,
            (Status::Playing, Input::HardDrop) => self.sonic_drop(),
        }
    }

    fn update(&mut self, dt: Duration) {
        if self.status != Status::Playing {
            return;
        }
        self.current.ease_visual(interpolation_factor(dt));

        if self.line_clear.is_some() {
            self.update_line_clear(dt);
            return;
        }

        self.fall_timer += dt;
        if self.fall_timer >= self.fall_threshold() {
            self.fall_timer = Duration::ZERO;
            let grid = self.board.snapshot();
            if game::is_valid(&self.current, &grid, 0, 1, None) {
                self.current.row += 1;
            } else {
                self.lock_current();
            }
        }
    }

    /// Current gravity step; sonic beats soft beats default.
    pub fn fall_threshold(&self) -> Duration {
        if self.sonic_dropping {
            FALL_SONIC_DROP
        } else if self.soft_dropping {
            FALL_SOFT_DROP
        } else {
            FALL_DEFAULT
        }
    }

    fn shift(&mut self, dx: i32) {
        let grid = self.board.snapshot();
        if game::is_valid(&self.current, &grid, dx, 0, None) {
            self.current.col += dx;
        }
    }

    fn rotate(&mut self) {
        let rotated = self.current.shape.rotated();
        let grid = self.board.snapshot();
        if game::is_valid(&self.current, &grid, 0, 0, Some(&rotated)) {
            self.current.shape = rotated;
            self.signals.push(Signal::Sound(Sound::Rotate));
        }
    }

    /// Start the fast fall; the distance and bonus are fixed now, the lock happens later.
    fn sonic_drop(&mut self) {
        if self.sonic_dropping {
            return;
        }
        self.sonic_dropping = true;
        self.signals.push(Signal::Sound(Sound::HardDrop));

        let grid = self.board.snapshot();
        let distance = game::drop_distance(&self.current, &grid);
        for step in 0..distance {
            for (col, row) in self.current.cells_at(0, step, None) {
                self.signals.push(Signal::Trace {
                    col,
                    row,
                    color: self.current.color,
                });
            }
        }
        self.sonic_bonus = distance as u32 * HARD_DROP_POINTS_PER_ROW;
        debug!(distance, bonus = self.sonic_bonus, "sonic drop");
    }

    fn lock_current(&mut self) {
        // A sonic drop already played its own sound.
        if !self.sonic_dropping {
            self.signals.push(Signal::Sound(Sound::Lock));
        }
        self.score += self.sonic_bonus;
        self.soft_dropping = false;
        self.sonic_dropping = false;
        self.sonic_bonus = 0;

        let written = self.board.lock(&self.current);
        debug!(
            kind = ?self.current.kind,
            col = self.current.col,
            row = self.current.row,
            cells = written,
            locked = self.board.len(),
            "piece locked"
        );

        let full = game::full_rows(&self.board.snapshot());
        if full.is_empty() {
            self.advance_piece();
        } else {
            debug!(rows = ?full, "line clear started");
            self.signals.push(Signal::Sound(Sound::LineClear));
            self.line_clear = Some(LineClear::new(full));
        }
    }

    fn update_line_clear(&mut self, dt: Duration) {
        if let Some(clear) = self.line_clear.as_mut() {
            clear.advance(dt);
            if clear.begin_shatter() {
                for ((col, row), color) in self.board.remove_rows(&clear.rows) {
                    self.signals.push(Signal::Shatter { col, row, color });
                }
            }
        }

        if let Some(clear) = self.line_clear.take_if(|c| c.is_complete()) {
            self.board.compact(clear.rows());
            let points = game::line_clear_points(clear.count());
            self.score += points;
            debug!(rows = clear.count(), points, score = self.score, "line clear finished");
            self.advance_piece();
        }
    }

    /// Promote the preview piece, draw a new preview, and check the spawn.
    fn advance_piece(&mut self) {
        let drawn = self.bag.next(&self.config.palette);
        self.current = std::mem::replace(&mut self.next, drawn);
        self.current.sync_visual();

        let grid = self.board.snapshot();
        if game::is_valid(&self.current, &grid, 0, 0, None) {
            debug!(kind = ?self.current.kind, next = ?self.next.kind, "spawned");
        } else {
            info!(score = self.score, "game over");
            self.status = Status::GameOver;
            self.signals.push(Signal::Music(MusicCue::Stop));
        }
    }

    fn replay(&mut self) {
        let mut pending = std::mem::take(&mut self.signals);
        *self = Self::new(self.config.clone());
        pending.append(&mut self.signals);
        self.signals = pending;
    }

    pub fn view(&self) -> View<'_> {
        let state = self.state();
        let game_over = state == SessionState::GameOver;
        let locked = self
            .board
            .iter()
            .map(|(pos, color)| (pos, if game_over { color.desaturate() } else { color }))
            .collect();

        let (active, ghost_row) = if state == SessionState::Playing {
            let grid = self.board.snapshot();
            let rest = self.current.row + game::drop_distance(&self.current, &grid);
            (Some(&self.current), Some(rest))
        } else {
            (None, None)
        };

        let flash = self
            .line_clear
            .as_ref()
            .filter(|c| c.phase() == ClearPhase::Flashing)
            .map(|c| Flash {
                rows: c.rows(),
                alpha: c.flash_alpha(),
            });

        View {
            state,
            locked,
            active,
            ghost_row,
            next: &self.next,
            flash,
            score: self.score,
        }
    }
}

/// Frame-rate independent version of "move 30% closer every 60 Hz frame".
fn interpolation_factor(dt: Duration) -> f32 {
    let frames = dt.as_secs_f32() / REFERENCE_FRAME.as_secs_f32();
    1.0 - (1.0 - INTERPOLATION_PER_FRAME).powf(frames)
}
