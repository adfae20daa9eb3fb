//! Particle field for shatter and hard-drop trace effects.
//!
//! Positions are in board pixels, `CELL_PX` per cell, origin at the top-left of the
//! board. Velocities are pixels per 16 ms frame.

use crate::color::Rgb;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

pub const CELL_PX: f32 = 30.0;

const FRAME_MS: f32 = 16.0;
const SHRINK_PER_FRAME: f32 = 0.1;
const MAX_PARTICLES: usize = 4000;

const SHATTER_PER_CELL: usize = 10;
const SHATTER_LIFESPAN_MS: f32 = 400.0;
const SHATTER_GRAVITY: f32 = 0.4;
const TRACE_LIFESPAN_MS: f32 = 150.0;
const TRACE_SIZE: f32 = CELL_PX * 0.8;

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    vx: f32,
    vy: f32,
    pub size: f32,
    gravity: f32,
    life: f32,
    max_life: f32,
    pub color: Rgb,
}

impl Particle {
    fn new(x: f32, y: f32, color: Rgb, velocity: (f32, f32), size: f32, life: f32, gravity: f32) -> Self {
        Self {
            x,
            y,
            vx: velocity.0,
            vy: velocity.1,
            size,
            gravity,
            life,
            max_life: life,
            color,
        }
    }

    fn update(&mut self, dt_ms: f32) {
        let frames = dt_ms / FRAME_MS;
        self.life -= dt_ms;
        self.vy += self.gravity * frames;
        self.x += self.vx * frames;
        self.y += self.vy * frames;
        self.size = (self.size - SHRINK_PER_FRAME * frames).max(0.0);
    }

    /// Opacity from the remaining lifespan.
    pub fn alpha(&self) -> f32 {
        (self.life / self.max_life).clamp(0.0, 1.0)
    }

    pub fn is_alive(&self) -> bool {
        self.life > 0.0
    }
}

#[derive(Debug)]
pub struct Particles {
    items: Vec<Particle>,
    rng: StdRng,
}

fn cell_centre(col: i32, row: i32) -> (f32, f32) {
    ((col as f32 + 0.5) * CELL_PX, (row as f32 + 0.5) * CELL_PX)
}

impl Particles {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self {
            items: Vec::new(),
            rng,
        }
    }

    /// Burst of debris from a removed block.
    pub fn spawn_shatter(&mut self, col: i32, row: i32, color: Rgb) {
        let (x, y) = cell_centre(col, row);
        for _ in 0..SHATTER_PER_CELL {
            let velocity = (self.rng.gen_range(-4.0..=4.0), self.rng.gen_range(-6.0..=2.0));
            let size = self.rng.gen_range(3.0..=8.0);
            self.items.push(Particle::new(
                x,
                y,
                color,
                velocity,
                size,
                SHATTER_LIFESPAN_MS,
                SHATTER_GRAVITY,
            ));
        }
    }

    /// Static afterimage of a cell passed during a sonic drop.
    pub fn spawn_trace(&mut self, col: i32, row: i32, color: Rgb) {
        let (x, y) = cell_centre(col, row);
        self.items.push(Particle::new(
            x,
            y,
            color,
            (0.0, 0.0),
            TRACE_SIZE,
            TRACE_LIFESPAN_MS,
            0.0,
        ));
    }

    pub fn update(&mut self, dt: Duration) {
        let dt_ms = dt.as_secs_f32() * 1000.0;
        for particle in &mut self.items {
            particle.update(dt_ms);
        }
        self.items.retain(Particle::is_alive);
        if self.items.len() > MAX_PARTICLES {
            let excess = self.items.len() - MAX_PARTICLES;
            self.items.drain(..excess);
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb = Rgb::new(255, 0, 0);

    #[test]
    fn test_shatter_spawns_ten_at_cell_centre() {
        let mut field = Particles::new(Some(3));
        field.spawn_shatter(2, 5, RED);
        assert_eq!(field.len(), 10);
        for p in field.iter() {
            assert_eq!((p.x, p.y), (75.0, 165.0));
            assert!((3.0..=8.0).contains(&p.size));
            assert!((-4.0..=4.0).contains(&p.vx));
            assert!((-6.0..=2.0).contains(&p.vy));
            assert_eq!(p.color, RED);
        }
    }

    #[test]
    fn test_trace_is_static_and_short_lived() {
        let mut field = Particles::new(Some(3));
        field.spawn_trace(0, 0, RED);
        field.update(Duration::from_millis(16));
        let p = field.iter().next().unwrap();
        assert_eq!((p.x, p.y), (15.0, 15.0));
        assert!((p.size - (TRACE_SIZE - 0.1)).abs() < 1e-4);
        field.update(Duration::from_millis(134));
        assert!(field.is_empty());
    }

    #[test]
    fn test_gravity_pulls_shatter_down() {
        let mut p = Particle::new(0.0, 0.0, RED, (0.0, 0.0), 5.0, 400.0, 0.4);
        p.update(16.0);
        assert!((p.vy - 0.4).abs() < 1e-6);
        assert!((p.y - 0.4).abs() < 1e-6);
        p.update(16.0);
        assert!((p.y - 1.2).abs() < 1e-5);
    }

    #[test]
    fn test_update_prunes_dead_particles() {
        let mut field = Particles::new(Some(9));
        field.spawn_shatter(0, 0, RED);
        field.spawn_trace(1, 1, RED);
        field.update(Duration::from_millis(200));
        assert_eq!(field.len(), 10, "trace expired first");
        let alpha = field.iter().next().unwrap().alpha();
        assert!((alpha - 0.5).abs() < 1e-3);
        field.update(Duration::from_millis(200));
        assert!(field.is_empty());
    }

    #[test]
    fn test_size_never_negative() {
        let mut p = Particle::new(0.0, 0.0, RED, (0.0, 0.0), 0.05, 1000.0, 0.0);
        p.update(160.0);
        assert_eq!(p.size, 0.0);
        assert!(p.is_alive());
    }

    #[test]
    fn test_field_is_capped_dropping_oldest() {
        let mut field = Particles::new(Some(1));
        field.spawn_trace(9, 19, Rgb::WHITE);
        for _ in 0..MAX_PARTICLES / 10 {
            field.spawn_shatter(0, 0, RED);
        }
        field.update(Duration::ZERO);
        assert_eq!(field.len(), MAX_PARTICLES);
        assert!(field.iter().all(|p| p.color == RED));
    }

    #[test]
    fn test_clear_empties_field() {
        let mut field = Particles::new(None);
        field.spawn_shatter(4, 4, RED);
        field.clear();
        assert!(field.is_empty());
    }
}
