//! Emotional state of the companion
//!
//! Five bounded levels in [0, 100]. Each user turn nudges loneliness and
//! curiosity by an independent symmetric jitter; nostalgia, fragility and
//! hope are only ever replaced wholesale by a cloud sync.

use rand::Rng;
use serde::{Deserialize, Serialize};

pub const LEVEL_MIN: f64 = 0.0;
pub const LEVEL_MAX: f64 = 100.0;

/// Half-width of the per-turn loneliness jitter
pub const LONELINESS_JITTER: f64 = 2.0;
/// Half-width of the per-turn curiosity jitter
pub const CURIOSITY_JITTER: f64 = 2.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionalState {
    pub loneliness: f64,
    pub nostalgia: f64,
    pub fragility: f64,
    pub curiosity: f64,
    pub hope: f64,
}

impl Default for EmotionalState {
    fn default() -> Self {
        Self {
            loneliness: 85.0,
            nostalgia: 65.0,
            fragility: 50.0,
            curiosity: 90.0,
            hope: 20.0,
        }
    }
}

impl EmotionalState {
    /// Per-turn drift applied on every user submission
    pub fn apply_turn_jitter<R: Rng>(&mut self, rng: &mut R) {
        let loneliness_delta = rng.random_range(-LONELINESS_JITTER..=LONELINESS_JITTER);
        let curiosity_delta = rng.random_range(-CURIOSITY_JITTER..=CURIOSITY_JITTER);
        self.nudge(loneliness_delta, curiosity_delta);
    }

    /// Shift the two live fields and clamp them back into range
    pub fn nudge(&mut self, loneliness_delta: f64, curiosity_delta: f64) {
        self.loneliness = clamp_level(self.loneliness + finite_or_zero(loneliness_delta));
        self.curiosity = clamp_level(self.curiosity + finite_or_zero(curiosity_delta));
    }

    /// All five levels pulled back into range; applied to every loaded document
    pub fn clamped(self) -> Self {
        Self {
            loneliness: clamp_level(self.loneliness),
            nostalgia: clamp_level(self.nostalgia),
            fragility: clamp_level(self.fragility),
            curiosity: clamp_level(self.curiosity),
            hope: clamp_level(self.hope),
        }
    }

    pub fn is_within_bounds(&self) -> bool {
        [self.loneliness, self.nostalgia, self.fragility, self.curiosity, self.hope]
            .iter()
            .all(|v| (LEVEL_MIN..=LEVEL_MAX).contains(v))
    }
}

pub fn clamp_level(value: f64) -> f64 {
    if value.is_nan() {
        return LEVEL_MIN;
    }
    value.clamp(LEVEL_MIN, LEVEL_MAX)
}

fn finite_or_zero(delta: f64) -> f64 {
    if delta.is_finite() { delta } else { 0.0 }
}
