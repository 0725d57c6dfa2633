//! Musical time: steps and ticks, and their conversion to sample counts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

pub const STEPS_PER_BEAT: u32 = 4;
pub const TICKS_PER_STEP: u32 = 24;
pub const TICKS_PER_BEAT: u32 = STEPS_PER_BEAT * TICKS_PER_STEP;
pub const BEATS_PER_BAR: u32 = 4;

/// Snapshot of the transport parameters every time conversion depends on.
///
/// Taken once per rendered chunk so a tempo edit from another thread never
/// produces two different tempos inside the same chunk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    pub sample_rate: u32,
    pub bpm: f64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            sample_rate: crate::DEFAULT_SAMPLE_RATE,
            bpm: crate::DEFAULT_BPM,
        }
    }
}

impl TransportConfig {
    pub fn new(sample_rate: u32, bpm: f64) -> Self {
        Self { sample_rate, bpm }
    }

    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.bpm
    }

    pub fn samples_per_beat(&self) -> f64 {
        self.sample_rate as f64 * self.seconds_per_beat()
    }

    pub fn samples_per_step(&self) -> f64 {
        self.samples_per_beat() / STEPS_PER_BEAT as f64
    }
}

/// A position or length in musical time: `step` is a quarter of a beat,
/// `tick` is a 24th of a step. Always normalized so that `tick < 24`.
///
/// Ordering is lexicographic on `(step, tick)`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PatternTime {
    step: u32,
    tick: u32,
}

impl PatternTime {
    pub const ZERO: PatternTime = PatternTime { step: 0, tick: 0 };

    pub fn new(step: u32, tick: u32) -> Self {
        Self {
            step: step + tick / TICKS_PER_STEP,
            tick: tick % TICKS_PER_STEP,
        }
    }

    pub const fn steps(steps: u32) -> Self {
        Self { step: steps, tick: 0 }
    }

    pub const fn beats(beats: u32) -> Self {
        Self {
            step: beats * STEPS_PER_BEAT,
            tick: 0,
        }
    }

    /// Nearest tick to a (possibly fractional) beat count. Negative input is zero.
    pub fn from_beats(beats: f64) -> Self {
        if !(beats > 0.0) {
            return Self::ZERO;
        }
        Self::from_ticks((beats * TICKS_PER_BEAT as f64).round() as u64)
    }

    pub fn from_ticks(ticks: u64) -> Self {
        Self {
            step: (ticks / TICKS_PER_STEP as u64) as u32,
            tick: (ticks % TICKS_PER_STEP as u64) as u32,
        }
    }

    /// Converts an absolute sample count into musical time. The fractional
    /// part of the step is truncated to whole ticks.
    pub fn from_samples(samples: u64, transport: &TransportConfig) -> Self {
        let total_steps = samples as f64 / transport.samples_per_step();
        let step = total_steps.trunc();
        let tick = ((total_steps - step) * TICKS_PER_STEP as f64) as u32;
        Self {
            step: step as u32,
            tick: tick.min(TICKS_PER_STEP - 1),
        }
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn total_ticks(&self) -> u64 {
        self.step as u64 * TICKS_PER_STEP as u64 + self.tick as u64
    }

    pub fn total_beats(&self) -> f64 {
        self.step as f64 / STEPS_PER_BEAT as f64 + self.tick as f64 / TICKS_PER_BEAT as f64
    }

    pub fn to_samples(&self, transport: &TransportConfig) -> f64 {
        self.total_beats() * transport.samples_per_beat()
    }

    /// Whole-sample position of this time (fraction dropped).
    pub fn to_sample_index(&self, transport: &TransportConfig) -> u64 {
        self.to_samples(transport) as u64
    }

    pub fn checked_sub(self, rhs: PatternTime) -> Option<PatternTime> {
        self.total_ticks()
            .checked_sub(rhs.total_ticks())
            .map(Self::from_ticks)
    }

    /// Rounds up to the next whole bar (4 beats). Exact bar multiples are kept.
    pub fn round_up_to_bar(self) -> PatternTime {
        let bar = (BEATS_PER_BAR * TICKS_PER_BEAT) as u64;
        Self::from_ticks(self.total_ticks().div_ceil(bar) * bar)
    }
}

impl Add for PatternTime {
    type Output = PatternTime;

    fn add(self, rhs: PatternTime) -> PatternTime {
        Self::from_ticks(self.total_ticks() + rhs.total_ticks())
    }
}

/// Saturates at zero when `rhs > self`.
impl Sub for PatternTime {
    type Output = PatternTime;

    fn sub(self, rhs: PatternTime) -> PatternTime {
        self.checked_sub(rhs).unwrap_or(Self::ZERO)
    }
}

impl fmt::Display for PatternTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({} beats)", self.step, self.tick, self.total_beats())
    }
}
