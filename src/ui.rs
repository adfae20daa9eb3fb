//! Layout and drawing: board canvas, side panel, pause and game-over overlays.

use crate::color::Rgb;
use crate::game::{COLS, Piece, ROWS};
use crate::particles::{CELL_PX, Particle, Particles};
use crate::session::{SessionState, View};
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Widget};
use std::time::Instant;
use tachyonfx::{Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx};

/// Canvas pixels per board cell along each axis. Half-blocks (▀) stack two pixels
/// per terminal cell, so a board cell is two columns by one terminal row.
const PX_PER_CELL: usize = 2;
const BOARD_PX_W: usize = COLS * PX_PER_CELL;
const BOARD_PX_H: usize = ROWS * PX_PER_CELL;
const BOARD_W: u16 = BOARD_PX_W as u16;
const BOARD_H: u16 = (BOARD_PX_H / 2) as u16;
const PANEL_WIDTH: u16 = 22;

const SHADE: u8 = 50;
const GHOST_ALPHA: f32 = 0.25;
const DIM_ALPHA: f32 = 180.0 / 255.0;

const POPUP_WIDTH: u16 = 18;
const POPUP_HEIGHT: u16 = 9;
const BUTTON_WIDTH: u16 = 12;
const BUTTONS: usize = 2;
const OVERLAY_FADE_MS: u32 = 250;

/// Off-screen RGB pixel grid, flushed to the terminal with half-blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<Rgb>,
}

impl Canvas {
    pub fn new(width: usize, height: usize, fill: Rgb) -> Self {
        Self {
            width,
            height,
            pixels: vec![fill; width * height],
        }
    }

    pub fn get(&self, x: usize, y: usize) -> Option<Rgb> {
        (x < self.width && y < self.height).then(|| self.pixels[y * self.width + x])
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        let (x, y) = (usize::try_from(x).ok()?, usize::try_from(y).ok()?);
        (x < self.width && y < self.height).then_some(y * self.width + x)
    }

    /// Out-of-range writes are dropped.
    pub fn set(&mut self, x: i32, y: i32, color: Rgb) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = color;
        }
    }

    pub fn blend(&mut self, x: i32, y: i32, color: Rgb, alpha: f32) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = self.pixels[i].blend(color, alpha);
        }
    }

    pub fn blend_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: Rgb, alpha: f32) {
        for py in y..y + h {
            for px in x..x + w {
                self.blend(px, py, color, alpha);
            }
        }
    }

    /// One board cell at pixel `(x, y)`: lit top-left, shaded bottom-right.
    pub fn block(&mut self, x: i32, y: i32, color: Rgb) {
        self.set(x, y, color.lighten(SHADE));
        self.set(x + 1, y, color);
        self.set(x, y + 1, color);
        self.set(x + 1, y + 1, color.darken(SHADE));
    }

    /// Pixel column `x` maps to terminal column `area.x + x`; pixel rows pair up per terminal row.
    pub fn render(&self, area: Rect, buf: &mut Buffer) {
        let area = area.intersection(*buf.area());
        for ty in 0..area.height {
            for tx in 0..area.width {
                let (x, y) = (usize::from(tx), usize::from(ty) * 2);
                let Some(top) = self.get(x, y) else {
                    continue;
                };
                let bottom = self.get(x, y + 1).unwrap_or(top);
                buf[(area.x + tx, area.y + ty)]
                    .set_symbol("▀")
                    .set_style(Style::default().fg(Color::from(top)).bg(Color::from(bottom)));
            }
        }
    }
}

fn cell_px(cell: i32) -> i32 {
    cell * PX_PER_CELL as i32
}

/// Everything inside the board border for one frame.
pub fn compose_board(view: &View<'_>, particles: &Particles, theme: &Theme) -> Canvas {
    let mut canvas = Canvas::new(BOARD_PX_W, BOARD_PX_H, theme.bg);
    for row in 0..ROWS as i32 {
        for col in 0..COLS as i32 {
            canvas.set(cell_px(col), cell_px(row), theme.grid);
        }
    }

    for &((col, row), color) in &view.locked {
        canvas.block(cell_px(col), cell_px(row), color);
    }

    if let (Some(piece), Some(ghost_row)) = (view.active, view.ghost_row) {
        for (col, row) in piece.cells_at(0, ghost_row - piece.row, None) {
            canvas.blend_rect(cell_px(col), cell_px(row), 2, 2, theme.ghost, GHOST_ALPHA);
        }
        // The falling piece is drawn at its eased row, in half-cell steps.
        let top = (piece.visual_row * PX_PER_CELL as f32).round() as i32;
        for (x, y) in piece.shape.occupied() {
            canvas.block(cell_px(piece.col + x), top + cell_px(y), piece.color);
        }
    }

    if let Some(flash) = view.flash {
        for &row in flash.rows {
            canvas.blend_rect(0, cell_px(row as i32), BOARD_PX_W as i32, 2, Rgb::WHITE, flash.alpha);
        }
    }

    for particle in particles.iter() {
        draw_particle(&mut canvas, particle);
    }

    if matches!(view.state, SessionState::Paused | SessionState::GameOver) {
        canvas.blend_rect(0, 0, BOARD_PX_W as i32, BOARD_PX_H as i32, Rgb::BLACK, DIM_ALPHA);
    }
    canvas
}

fn draw_particle(canvas: &mut Canvas, particle: &Particle) {
    if particle.size < 1.0 {
        return;
    }
    let scale = PX_PER_CELL as f32 / CELL_PX;
    let extent = (particle.size * scale).ceil().max(1.0);
    let x0 = (particle.x * scale - extent / 2.0).round() as i32;
    let y0 = (particle.y * scale - extent / 2.0).round() as i32;
    let extent = extent as i32;
    canvas.blend_rect(x0, y0, extent, extent, particle.color, particle.alpha());
}

/// Next piece centred on a canvas of `width`×`height` pixels.
fn preview_canvas(piece: &Piece, width: usize, height: usize, bg: Rgb) -> Canvas {
    let mut canvas = Canvas::new(width, height, bg);
    let ox = width.saturating_sub(piece.shape.width() * PX_PER_CELL) / 2;
    let oy = height.saturating_sub(piece.shape.height() * PX_PER_CELL) / 2;
    for (x, y) in piece.shape.occupied() {
        canvas.block(ox as i32 + cell_px(x), oy as i32 + cell_px(y), piece.color);
    }
    canvas
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Areas {
    /// Board including its border.
    pub board: Rect,
    /// Board interior, where the canvas goes.
    pub board_inner: Rect,
    pub panel: Rect,
}

/// Board and side panel, centred in `area`.
pub fn layout(area: Rect) -> Areas {
    let board_w = BOARD_W + 2;
    let board_h = BOARD_H + 2;

    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(board_w),
            Constraint::Length(PANEL_WIDTH),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(board_h),
            Constraint::Fill(1),
        ])
        .split(area);

    let board = Rect {
        x: horiz[1].x,
        y: vert[1].y,
        width: horiz[1].width,
        height: vert[1].height,
    };
    let panel = Rect {
        x: horiz[2].x,
        y: vert[1].y,
        width: horiz[2].width,
        height: vert[1].height,
    };
    Areas {
        board,
        board_inner: Block::default().borders(Borders::ALL).inner(board),
        panel,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    Pause,
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Resume,
    Replay,
    Quit,
}

impl Button {
    fn label(self) -> &'static str {
        match self {
            Self::Resume => "RESUME",
            Self::Replay => "REPLAY",
            Self::Quit => "QUIT",
        }
    }
}

impl Overlay {
    pub fn for_state(state: SessionState) -> Option<Self> {
        match state {
            SessionState::Paused => Some(Self::Pause),
            SessionState::GameOver => Some(Self::GameOver),
            _ => None,
        }
    }

    pub fn buttons(self) -> [Button; BUTTONS] {
        match self {
            Self::Pause => [Button::Resume, Button::Quit],
            Self::GameOver => [Button::Replay, Button::Quit],
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::Pause => "PAUSED",
            Self::GameOver => "GAME OVER",
        }
    }
}

fn popup_rect(board_inner: Rect) -> Rect {
    let width = POPUP_WIDTH.min(board_inner.width);
    let height = POPUP_HEIGHT.min(board_inner.height);
    Rect {
        x: board_inner.x + board_inner.width.saturating_sub(width) / 2,
        y: board_inner.y + board_inner.height.saturating_sub(height) / 2,
        width,
        height,
    }
}

/// Button rows inside the popup, in `Overlay::buttons` order.
fn button_rects(popup: Rect) -> [Rect; BUTTONS] {
    let inner = Block::default().borders(Borders::ALL).inner(popup);
    let width = BUTTON_WIDTH.min(inner.width);
    let x = inner.x + inner.width.saturating_sub(width) / 2;
    [4, 6].map(|dy| Rect {
        x,
        y: inner.y + dy,
        width,
        height: 1,
    })
}

/// Overlay button under a terminal position, for mouse hover and clicks.
pub fn button_at(area: Rect, overlay: Overlay, pos: Position) -> Option<Button> {
    let rects = button_rects(popup_rect(layout(area).board_inner));
    overlay
        .buttons()
        .into_iter()
        .zip(rects)
        .find(|(_, rect)| rect.contains(pos))
        .map(|(button, _)| button)
}

/// Which overlay is up, which button has focus, and its fade-in effect.
#[derive(Default)]
pub struct OverlayUi {
    shown: Option<Overlay>,
    selected: usize,
    pub hovered: Option<Button>,
    effect: Option<Effect>,
    last_frame: Option<Instant>,
}

impl OverlayUi {
    /// A different overlay resets focus and restarts the fade.
    pub fn sync(&mut self, overlay: Option<Overlay>) {
        if overlay != self.shown {
            *self = Self {
                shown: overlay,
                ..Self::default()
            };
        }
    }

    pub fn shown(&self) -> Option<Overlay> {
        self.shown
    }

    pub fn focus_next(&mut self) {
        self.selected = (self.selected + 1) % BUTTONS;
    }

    pub fn focus_prev(&mut self) {
        self.selected = (self.selected + BUTTONS - 1) % BUTTONS;
    }

    pub fn focused(&self) -> Option<Button> {
        self.shown.map(|overlay| overlay.buttons()[self.selected])
    }
}

/// Draw the whole screen for one frame.
pub fn draw(
    frame: &mut Frame,
    view: &View<'_>,
    particles: &Particles,
    theme: &Theme,
    overlay: &mut OverlayUi,
    now: Instant,
) {
    let areas = layout(frame.area());
    draw_board(frame, view, particles, theme, &areas);
    draw_panel(frame, view, theme, areas.panel);

    overlay.sync(Overlay::for_state(view.state));
    if let Some(kind) = overlay.shown {
        draw_overlay(frame, view, theme, overlay, kind, areas.board_inner, now);
    }
}

fn border_style(theme: &Theme, bg: Rgb) -> Style {
    Style::default().fg(Color::from(theme.grid)).bg(Color::from(bg))
}

fn draw_board(frame: &mut Frame, view: &View<'_>, particles: &Particles, theme: &Theme, areas: &Areas) {
    let title_style = Style::default()
        .fg(Color::from(theme.text))
        .add_modifier(Modifier::BOLD);
    Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(theme, theme.bg))
        .title(Span::styled(" LUMITRIS ", title_style))
        .render(areas.board, frame.buffer_mut());
    compose_board(view, particles, theme).render(areas.board_inner, frame.buffer_mut());
}

fn draw_panel(frame: &mut Frame, view: &View<'_>, theme: &Theme, area: Rect) {
    let text = Style::default().fg(Color::from(theme.text));
    let label = text.add_modifier(Modifier::BOLD);
    let boxed = |title: &'static str| {
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style(theme, theme.panel_box))
            .style(Style::default().bg(Color::from(theme.panel_box)))
            .title(Span::styled(title, label))
            .title_alignment(Alignment::Center)
    };

    Block::default()
        .style(Style::default().bg(Color::from(theme.panel)))
        .render(area, frame.buffer_mut());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // score
            Constraint::Length(1),
            Constraint::Length(6), // next
            Constraint::Length(1),
            Constraint::Fill(1), // controls
        ])
        .split(area.inner(ratatui::layout::Margin::new(1, 0)));

    let score_block = boxed(" SCORE ");
    let score_inner = score_block.inner(chunks[0]);
    score_block.render(chunks[0], frame.buffer_mut());
    Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(view.score.to_string(), label)),
    ])
    .alignment(Alignment::Center)
    .render(score_inner, frame.buffer_mut());

    let next_block = boxed(" NEXT ");
    let next_inner = next_block.inner(chunks[2]);
    next_block.render(chunks[2], frame.buffer_mut());
    preview_canvas(
        view.next,
        usize::from(next_inner.width),
        usize::from(next_inner.height) * 2,
        theme.panel_box,
    )
    .render(next_inner, frame.buffer_mut());

    let keys = [
        ("← →", "move"),
        ("↑", "rotate"),
        ("↓", "soft drop"),
        ("space", "hard drop"),
        ("p", "pause"),
        ("q", "quit"),
    ];
    let lines: Vec<Line> = keys
        .iter()
        .map(|(key, what)| {
            Line::from(vec![
                Span::styled(format!("{key:>6} "), label),
                Span::styled(*what, text),
            ])
        })
        .collect();
    Paragraph::new(lines).render(chunks[4], frame.buffer_mut());
}

fn draw_overlay(
    frame: &mut Frame,
    view: &View<'_>,
    theme: &Theme,
    ui: &mut OverlayUi,
    kind: Overlay,
    board_inner: Rect,
    now: Instant,
) {
    let popup = popup_rect(board_inner);
    let text = Style::default().fg(Color::from(theme.text));
    let score_line = match kind {
        Overlay::GameOver => Line::from(Span::styled(format!("Score {}", view.score), text)),
        Overlay::Pause => Line::from(""),
    };
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(kind.title(), text.add_modifier(Modifier::BOLD))),
        score_line,
    ];

    Clear.render(popup, frame.buffer_mut());
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style(theme, theme.panel_box))
                .style(Style::default().bg(Color::from(theme.panel_box))),
        )
        .render(popup, frame.buffer_mut());

    for (i, (button, rect)) in kind.buttons().into_iter().zip(button_rects(popup)).enumerate() {
        let lit = ui.hovered == Some(button) || ui.selected == i;
        let mut style = Style::default().fg(Color::from(theme.button_text)).bg(if lit {
            Color::from(theme.button_hover)
        } else {
            Color::from(theme.button)
        });
        if lit {
            style = style.add_modifier(Modifier::BOLD);
        }
        Paragraph::new(button.label())
            .alignment(Alignment::Center)
            .style(style)
            .render(rect, frame.buffer_mut());
    }

    let delta = ui
        .last_frame
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    ui.last_frame = Some(now);
    let delta_ms = delta.as_millis().min(u128::from(u32::MAX)) as u32;
    let bg = Color::from(theme.bg);
    let effect = ui
        .effect
        .get_or_insert_with(|| fx::fade_from(bg, bg, (OVERLAY_FADE_MS, Interpolation::QuadOut)));
    if !effect.done() {
        frame.render_effect(effect, popup, TfxDuration::from_millis(delta_ms));
    }
}
