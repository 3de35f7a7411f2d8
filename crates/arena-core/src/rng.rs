//! Random sources
//!
//! Every roll in a battle (attack choice, payload, damage, detection,
//! stalemate) goes through [`RandomSource`], so a test can script the exact
//! sequence of draws.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform draws in `[0, 1)`
pub trait RandomSource: Send {
    /// Next draw, uniform in `[0, 1)`
    fn next_unit(&mut self) -> f64;

    /// Uniform index into a collection of `len` items (`len > 0`)
    fn pick(&mut self, len: usize) -> usize {
        let index = (self.next_unit() * len as f64).floor() as usize;
        index.min(len.saturating_sub(1))
    }

    /// `floor(random * width) + min`
    fn roll(&mut self, min: u32, width: u32) -> u32 {
        let offset = (self.next_unit() * f64::from(width)).floor() as u32;
        min.saturating_add(offset.min(width.saturating_sub(1)))
    }

    /// True with probability `p`
    fn chance(&mut self, p: f64) -> bool {
        self.next_unit() < p
    }
}

/// Adapter from any [`rand::Rng`]
#[derive(Debug, Clone)]
pub struct RngSource<R: Rng + Send>(R);

impl RngSource<StdRng> {
    /// Reproducible source from a seed
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }

    /// Source seeded from the operating system
    pub fn from_os_rng() -> Self {
        Self(StdRng::from_os_rng())
    }
}

impl<R: Rng + Send> RngSource<R> {
    /// Wrap an existing generator
    pub fn new(rng: R) -> Self {
        Self(rng)
    }
}

impl<R: Rng + Send> RandomSource for RngSource<R> {
    fn next_unit(&mut self) -> f64 {
        self.0.random::<f64>()
    }
}

/// Replays a fixed list of draws, cycling when it runs out
#[derive(Debug, Clone)]
pub struct Scripted {
    draws: Vec<f64>,
    cursor: usize,
}

impl Scripted {
    /// Replay `draws` in order. Values are clamped into `[0, 1)`.
    pub fn new(draws: Vec<f64>) -> Self {
        let draws = if draws.is_empty() { vec![0.0] } else { draws };
        Self { draws, cursor: 0 }
    }

    /// Always return `draw`
    pub fn constant(draw: f64) -> Self {
        Self::new(vec![draw])
    }

    /// Number of draws consumed so far
    pub fn consumed(&self) -> usize {
        self.cursor
    }
}

impl RandomSource for Scripted {
    fn next_unit(&mut self) -> f64 {
        let draw = self.draws[self.cursor % self.draws.len()];
        self.cursor += 1;
        draw.clamp(0.0, 1.0 - f64::EPSILON)
    }
}
