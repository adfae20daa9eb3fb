//! App: terminal init, frame loop, key/mouse routing and signal dispatch.

use crate::audio::Audio;
use crate::input::{Action, is_soft_drop_release, key_to_action};
use crate::particles::Particles;
use crate::session::{Input, Session, SessionState, Signal};
use crate::theme::Theme;
use crate::ui::{self, Button, OverlayUi};
use crate::{Args, GameConfig};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use ratatui::DefaultTerminal;
use ratatui::layout::{Position, Rect};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Without key-release reporting, a key counts as held while its presses arrive within
/// this window. Longer than the usual initial auto-repeat delay (500-660 ms).
const KEY_HOLD_WINDOW: Duration = Duration::from_millis(700);
const MAX_FPS: f64 = 240.0;

pub struct App {
    session: Session,
    theme: Theme,
    audio: Audio,
    particles: Particles,
    overlay: OverlayUi,
    frame_time: Duration,
    /// Inputs collected since the last tick, in arrival order.
    pending: Vec<Input>,
    soft_drop_until: Option<Instant>,
    /// Hard drop key still held; repeats until then are ignored.
    hard_drop_until: Option<Instant>,
    /// Terminal reports key releases (keyboard enhancement active).
    release_events: bool,
    /// Screen size at the last draw, for mouse hit-testing.
    area: Rect,
}

impl App {
    pub fn new(args: &Args, config: GameConfig, theme: Theme) -> Self {
        let fps = if args.fps.is_finite() {
            args.fps.clamp(1.0, MAX_FPS)
        } else {
            60.0
        };
        Self {
            particles: Particles::new(config.seed),
            session: Session::new(config),
            theme,
            audio: Audio::new(&args.assets, !args.mute),
            overlay: OverlayUi::default(),
            frame_time: Duration::from_secs_f64(1.0 / fps),
            pending: Vec::new(),
            soft_drop_until: None,
            hard_drop_until: None,
            release_events: false,
            area: Rect::default(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{
                DisableMouseCapture, EnableMouseCapture, KeyboardEnhancementFlags,
                PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
            },
            execute,
            terminal::{
                EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
                supports_keyboard_enhancement,
            },
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

        // Release events let soft drop stop exactly when the key comes up.
        self.release_events = supports_keyboard_enhancement().unwrap_or(false);
        if self.release_events {
            if let Err(err) = execute!(
                stdout,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            ) {
                warn!(%err, "keyboard enhancement unavailable");
                self.release_events = false;
            }
        }
        info!(release_events = self.release_events, audio = self.audio.is_enabled(), "terminal ready");

        let mut terminal =
            DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;
        let result = self.run_loop(&mut terminal);

        // Restore
        if self.release_events {
            let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
        }
        execute!(std::io::stdout(), DisableMouseCapture, LeaveAlternateScreen)?;
        disable_raw_mode()?;
        terminal.show_cursor()?;

        info!(score = self.session.score(), "exit");
        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let mut last_tick = Instant::now();
        while !self.session.is_terminated() {
            let frame_start = Instant::now();
            terminal.draw(|f| {
                self.area = f.area();
                let view = self.session.view();
                ui::draw(f, &view, &self.particles, &self.theme, &mut self.overlay, frame_start);
            })?;

            let deadline = frame_start + self.frame_time;
            loop {
                let timeout = deadline.saturating_duration_since(Instant::now());
                if !event::poll(timeout)? {
                    break;
                }
                let event = event::read()?;
                self.handle_event(event, Instant::now());
            }

            let now = Instant::now();
            self.expire_soft_drop(now);
            let dt = now.saturating_duration_since(last_tick);
            last_tick = now;
            self.tick(dt);
        }
        Ok(())
    }

    /// Feed queued inputs to the session and fan its signals out.
    fn tick(&mut self, dt: Duration) {
        let inputs = std::mem::take(&mut self.pending);
        self.session.tick(inputs, dt);

        for signal in self.session.drain_signals() {
            self.audio.handle(&signal);
            match signal {
                Signal::Shatter { col, row, color } => self.particles.spawn_shatter(col, row, color),
                Signal::Trace { col, row, color } => self.particles.spawn_trace(col, row, color),
                Signal::Sound(_) | Signal::Music(_) => {}
            }
        }

        if !matches!(
            self.session.state(),
            SessionState::Paused | SessionState::GameOver
        ) {
            self.particles.update(dt);
        }
    }

    fn handle_event(&mut self, event: Event, now: Instant) {
        match event {
            Event::Key(key) => self.handle_key(key, now),
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            _ => {}
        }
    }

    fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        if is_soft_drop_release(key) {
            self.soft_drop_until = None;
            self.pending.push(Input::SoftDropStop);
            return;
        }
        let action = key_to_action(key);
        let first_press = key.kind == KeyEventKind::Press;

        if self.overlay.shown().is_some() {
            match action {
                Action::NextButton | Action::MoveRight => self.overlay.focus_next(),
                Action::PrevButton | Action::MoveLeft => self.overlay.focus_prev(),
                Action::Confirm => {
                    if let Some(button) = self.overlay.focused() {
                        self.press(button);
                    }
                }
                Action::Pause if first_press => self.pending.push(Input::TogglePause),
                Action::Quit => self.pending.push(Input::Quit),
                _ => {}
            }
            return;
        }

        match action {
            Action::MoveLeft => self.pending.push(Input::MoveLeft),
            Action::MoveRight => self.pending.push(Input::MoveRight),
            Action::Rotate if first_press => self.pending.push(Input::Rotate),
            Action::SoftDrop => {
                self.pending.push(Input::SoftDropStart);
                if !self.release_events {
                    self.soft_drop_until = Some(now + KEY_HOLD_WINDOW);
                }
            }
            Action::HardDrop if first_press => self.hard_drop(now),
            Action::Pause if first_press => self.pending.push(Input::TogglePause),
            Action::Quit => self.pending.push(Input::Quit),
            _ => {}
        }
    }

    /// Legacy terminals report auto-repeat as presses; only the first of a run drops.
    fn hard_drop(&mut self, now: Instant) {
        let held = self.hard_drop_until.is_some_and(|until| now < until);
        if !self.release_events {
            self.hard_drop_until = Some(now + KEY_HOLD_WINDOW);
        }
        if !held {
            self.pending.push(Input::HardDrop);
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let Some(overlay) = self.overlay.shown() else {
            return;
        };
        let hit = ui::button_at(self.area, overlay, Position::new(mouse.column, mouse.row));
        match mouse.kind {
            MouseEventKind::Moved => self.overlay.hovered = hit,
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(button) = hit {
                    self.press(button);
                }
            }
            _ => {}
        }
    }

    fn press(&mut self, button: Button) {
        debug!(?button, "button pressed");
        match button {
            Button::Resume => self.pending.push(Input::Resume),
            Button::Replay => {
                self.particles.clear();
                self.soft_drop_until = None;
                self.hard_drop_until = None;
                self.pending.push(Input::Replay);
            }
            Button::Quit => self.pending.push(Input::Quit),
        }
    }

    fn expire_soft_drop(&mut self, now: Instant) {
        if self.soft_drop_until.is_some_and(|until| now >= until) {
            self.soft_drop_until = None;
            self.pending.push(Input::SoftDropStop);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Palette;
    use clap::Parser;
    use crossterm::event::{KeyCode, KeyModifiers};

    fn app() -> App {
        let args = Args::parse_from(["lumitris", "--seed", "7", "--mute"]);
        let theme = Theme::classic();
        let config = GameConfig {
            seed: args.seed,
            palette: theme.pieces,
        };
        assert_eq!(args.palette, Palette::Normal);
        App::new(&args, config, theme)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_keys_queue_inputs_in_order() {
        let mut app = app();
        let now = Instant::now();
        for code in [KeyCode::Left, KeyCode::Up, KeyCode::Char(' '), KeyCode::Char('p')] {
            app.handle_key(key(code), now);
        }
        assert_eq!(
            app.pending,
            vec![Input::MoveLeft, Input::Rotate, Input::HardDrop, Input::TogglePause]
        );
    }

    #[test]
    fn test_soft_drop_hold_window_expires() {
        let mut app = app();
        let now = Instant::now();
        app.handle_key(key(KeyCode::Down), now);
        assert_eq!(app.pending, vec![Input::SoftDropStart]);
        app.expire_soft_drop(now + Duration::from_millis(600));
        assert_eq!(app.pending.len(), 1, "still inside the initial repeat delay");
        app.expire_soft_drop(now + KEY_HOLD_WINDOW);
        assert_eq!(app.pending, vec![Input::SoftDropStart, Input::SoftDropStop]);
        assert!(app.soft_drop_until.is_none());
    }

    #[test]
    fn test_held_space_hard_drops_once() {
        let mut app = app();
        let start = Instant::now();
        app.handle_key(key(KeyCode::Char(' ')), start);
        // Auto-repeat arrives as plain presses: first after 400 ms, then every 33 ms.
        let mut at = Duration::from_millis(400);
        while at < Duration::from_millis(1500) {
            app.handle_key(key(KeyCode::Char(' ')), start + at);
            at += Duration::from_millis(33);
        }
        assert_eq!(app.pending, vec![Input::HardDrop]);

        // A fresh press after letting go drops again.
        app.handle_key(key(KeyCode::Char(' ')), start + Duration::from_millis(2500));
        assert_eq!(app.pending, vec![Input::HardDrop, Input::HardDrop]);
    }

    #[test]
    fn test_hard_drop_repeats_counted_once() {
        let mut app = app();
        let start = Instant::now();
        for i in 0..10 {
            app.handle_key(key(KeyCode::Char(' ')), start + Duration::from_millis(33 * i));
        }
        assert_eq!(app.pending, vec![Input::HardDrop]);
    }

    #[test]
    fn test_tick_routes_shatter_to_particles() {
        let mut app = app();
        app.tick(Duration::ZERO);
        assert!(app.particles.is_empty());
        app.handle_key(key(KeyCode::Char(' ')), Instant::now());
        app.tick(Duration::ZERO);
        assert!(!app.particles.is_empty(), "hard drop leaves a trace");
        assert!(app.pending.is_empty());
    }

    #[test]
    fn test_overlay_keys_pick_buttons() {
        let mut app = app();
        app.handle_key(key(KeyCode::Char('p')), Instant::now());
        app.tick(Duration::ZERO);
        assert_eq!(app.session.state(), SessionState::Paused);

        app.overlay.sync(ui::Overlay::for_state(app.session.state()));
        app.handle_key(key(KeyCode::Enter), Instant::now());
        assert_eq!(app.pending, vec![Input::Resume]);
        app.tick(Duration::ZERO);
        assert_eq!(app.session.state(), SessionState::Playing);
    }

    #[test]
    fn test_quit_button_terminates() {
        let mut app = app();
        app.handle_key(key(KeyCode::Char('p')), Instant::now());
        app.tick(Duration::ZERO);
        app.overlay.sync(ui::Overlay::for_state(app.session.state()));
        app.handle_key(key(KeyCode::Tab), Instant::now());
        app.handle_key(key(KeyCode::Enter), Instant::now());
        app.tick(Duration::ZERO);
        assert!(app.session.is_terminated());
    }
}
