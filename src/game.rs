//! Board model: piece kinds and shapes, the 7-bag, locked cells, grid snapshot and validity.

use crate::color::Rgb;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;

pub const COLS: usize = 10;
pub const ROWS: usize = 20;

/// Render row a fresh piece starts from, above the visible board.
const SPAWN_VISUAL_ROW: f32 = -2.0;

/// Points for clearing 1..=4 rows at once.
const LINE_CLEAR_POINTS: [u32; 4] = [100, 300, 500, 800];

/// Tetromino kinds (I, O, T, S, Z, J, L).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PieceKind {
    I,
    O,
    T,
    S,
    Z,
    J,
    L,
}

impl PieceKind {
    pub const ALL: [Self; 7] = [Self::I, Self::O, Self::T, Self::S, Self::Z, Self::J, Self::L];

    /// Spawn orientation, top row first.
    fn rows(self) -> &'static [&'static [u8]] {
        match self {
            Self::I => &[&[1, 1, 1, 1]],
            Self::O => &[&[1, 1], &[1, 1]],
            Self::T => &[&[0, 1, 0], &[1, 1, 1]],
            Self::S => &[&[0, 1, 1], &[1, 1, 0]],
            Self::Z => &[&[1, 1, 0], &[0, 1, 1]],
            Self::J => &[&[1, 0, 0], &[1, 1, 1]],
            Self::L => &[&[0, 0, 1], &[1, 1, 1]],
        }
    }

    /// Canonical shape matrix. Always a fresh copy; the table itself is immutable.
    pub fn shape(self) -> Shape {
        Shape::from_rows(self.rows())
    }

    /// Index into a seven-colour palette.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn letter(self) -> char {
        match self {
            Self::I => 'I',
            Self::O => 'O',
            Self::T => 'T',
            Self::S => 'S',
            Self::Z => 'Z',
            Self::J => 'J',
            Self::L => 'L',
        }
    }
}

/// Rectangular occupancy matrix, stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    width: usize,
    height: usize,
    cells: Vec<bool>,
}

impl Shape {
    pub fn from_rows(rows: &[&[u8]]) -> Self {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.len());
        let cells = rows
            .iter()
            .flat_map(|row| row.iter().map(|&v| v != 0))
            .collect();
        Self { width, height, cells }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_filled(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.cells[y * self.width + x]
    }

    /// Local (x, y) of every occupied cell.
    pub fn occupied(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, filled)| **filled)
            .map(|(i, _)| ((i % self.width) as i32, (i / self.width) as i32))
    }

    /// Clockwise quarter turn: reverse the rows, then transpose.
    pub fn rotated(&self) -> Self {
        let (w, h) = (self.height, self.width);
        let mut cells = Vec::with_capacity(self.cells.len());
        for y in 0..h {
            for x in 0..w {
                cells.push(self.is_filled(y, self.height - 1 - x));
            }
        }
        Self {
            width: w,
            height: h,
            cells,
        }
    }
}

/// A piece on the board: kind, current orientation, anchor and smoothed render row.
#[derive(Debug, Clone, PartialEq)]
pub struct Piece {
    pub kind: PieceKind,
    pub shape: Shape,
    pub color: Rgb,
    pub col: i32,
    pub row: i32,
    /// Interpolated row for drawing only; never read by game logic.
    pub visual_row: f32,
}

impl Piece {
    /// New piece in spawn orientation, horizontally centred on row 0.
    pub fn spawn(kind: PieceKind, color: Rgb) -> Self {
        let shape = kind.shape();
        Self {
            kind,
            col: (COLS / 2 - shape.width() / 2) as i32,
            row: 0,
            visual_row: SPAWN_VISUAL_ROW,
            shape,
            color,
        }
    }

    /// Absolute cells for `shape` (or the current one) moved by (dx, dy).
    pub fn cells_at<'a>(
        &'a self,
        dx: i32,
        dy: i32,
        shape: Option<&'a Shape>,
    ) -> impl Iterator<Item = (i32, i32)> + 'a {
        let shape = shape.unwrap_or(&self.shape);
        shape
            .occupied()
            .map(move |(x, y)| (self.col + x + dx, self.row + y + dy))
    }

    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.cells_at(0, 0, None)
    }

    /// Snap the render row to the logical row.
    pub fn sync_visual(&mut self) {
        self.visual_row = self.row as f32;
    }

    /// Move the render row `factor` of the way towards the logical row.
    pub fn ease_visual(&mut self, factor: f32) {
        self.visual_row += (self.row as f32 - self.visual_row) * factor.clamp(0.0, 1.0);
    }
}

/// Bag of 7 tetrominoes (random order, then refill).
#[derive(Debug, Clone)]
pub struct Bag {
    queue: Vec<PieceKind>,
    rng: StdRng,
}

impl Bag {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        let mut b = Self {
            queue: Vec::with_capacity(PieceKind::ALL.len()),
            rng,
        };
        b.refill();
        b
    }

    /// Replace the queue with a fresh uniform permutation of all seven kinds.
    pub fn refill(&mut self) {
        self.queue.clear();
        self.queue.extend(PieceKind::ALL);
        self.queue.shuffle(&mut self.rng);
    }

    pub fn next_kind(&mut self) -> PieceKind {
        loop {
            if let Some(kind) = self.queue.pop() {
                return kind;
            }
            self.refill();
        }
    }

    /// Draw the next kind and build it at the spawn anchor with its palette colour.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self, palette: &[Rgb; 7]) -> Piece {
        let kind = self.next_kind();
        Piece::spawn(kind, palette[kind.index()])
    }
}

impl Default for Bag {
    fn default() -> Self {
        Self::new()
    }
}

/// Dense board snapshot; rows[0] is the top.
pub type Grid = [[Option<Rgb>; COLS]; ROWS];

/// Locked (placed) blocks keyed by (column, row).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Board {
    cells: BTreeMap<(i32, i32), Rgb>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn insert(&mut self, col: i32, row: i32, color: Rgb) {
        self.cells.insert((col, row), color);
    }

    pub fn iter(&self) -> impl Iterator<Item = ((i32, i32), Rgb)> + '_ {
        self.cells.iter().map(|(&pos, &color)| (pos, color))
    }

    /// Commit every cell of `piece` at its current position; returns how many were written.
    pub fn lock(&mut self, piece: &Piece) -> usize {
        let mut written = 0;
        for (col, row) in piece.cells() {
            self.insert(col, row, piece.color);
            written += 1;
        }
        written
    }

    /// Dense view; keys outside the board (e.g. negative rows) are skipped.
    pub fn snapshot(&self) -> Grid {
        let mut grid: Grid = [[None; COLS]; ROWS];
        for (&(col, row), &color) in &self.cells {
            if (0..COLS as i32).contains(&col) && (0..ROWS as i32).contains(&row) {
                grid[row as usize][col as usize] = Some(color);
            }
        }
        grid
    }

    /// Remove every cell on the given rows, returning what was removed.
    pub fn remove_rows(&mut self, rows: &[usize]) -> Vec<((i32, i32), Rgb)> {
        let mut removed = Vec::new();
        self.cells.retain(|&(col, row), &mut color| {
            let hit = row >= 0 && rows.contains(&(row as usize));
            if hit {
                removed.push(((col, row), color));
            }
            !hit
        });
        removed
    }

    /// Drop the given rows and shift every remaining cell down by the number of
    /// cleared rows beneath it.
    pub fn compact(&mut self, rows: &[usize]) {
        let old = std::mem::take(&mut self.cells);
        for ((col, row), color) in old {
            if row >= 0 && rows.contains(&(row as usize)) {
                continue;
            }
            let shift = rows.iter().filter(|&&cleared| row < cleared as i32).count() as i32;
            self.cells.insert((col, row + shift), color);
        }
    }
}

#[cfg(test)]
impl Board {
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, col: i32, row: i32) -> Option<Rgb> {
        self.cells.get(&(col, row)).copied()
    }
}

/// Whether `shape` (default: the piece's own) fits at the piece anchor moved by (dx, dy).
///
/// Cells above the board (negative rows) only need a valid column.
pub fn is_valid(piece: &Piece, grid: &Grid, dx: i32, dy: i32, shape: Option<&Shape>) -> bool {
    piece.cells_at(dx, dy, shape).all(|(x, y)| {
        if x < 0 || x >= COLS as i32 || y >= ROWS as i32 {
            return false;
        }
        y < 0 || grid[y as usize][x as usize].is_none()
    })
}

/// Rows the piece can still fall before it rests.
pub fn drop_distance(piece: &Piece, grid: &Grid) -> i32 {
    let mut dy = 0;
    while is_valid(piece, grid, 0, dy + 1, None) {
        dy += 1;
    }
    dy
}

/// Indices of fully occupied rows, top to bottom.
pub fn full_rows(grid: &Grid) -> Vec<usize> {
    grid.iter()
        .enumerate()
        .filter(|(_, row)| row.iter().all(Option::is_some))
        .map(|(y, _)| y)
        .collect()
}

/// Score for clearing `count` rows at once; anything outside 1..=4 scores nothing.
pub fn line_clear_points(count: usize) -> u32 {
    count
        .checked_sub(1)
        .and_then(|i| LINE_CLEAR_POINTS.get(i))
        .copied()
        .unwrap_or(0)
}
