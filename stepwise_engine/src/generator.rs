use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Waveform {
    #[default]
    Sine,
    Triangle,
    Square,
    Sawtooth,
}

impl Waveform {
    /// Value at `t` periods into the cycle, in [-1, 1].
    pub fn sample(self, t: f64) -> f32 {
        match self {
            Waveform::Sine => (TAU * t).sin() as f32,
            Waveform::Triangle => (saw(t).abs() * 2.0 - 1.0) as f32,
            Waveform::Square => {
                let s = (TAU * t).sin();
                if s > 0.0 {
                    1.0
                } else if s < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            Waveform::Sawtooth => saw(t) as f32,
        }
    }
}

fn saw(t: f64) -> f64 {
    2.0 * (t - (0.5 + t).floor())
}

/// Stateless oscillator. The phase is passed in by the caller as a sample
/// offset from the start of the note, so output does not depend on how the
/// note is split across chunks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaveformGenerator {
    pub waveform: Waveform,
    /// In periods.
    pub phase_offset: f64,
    pub gain: f32,
    pub pitch_scale: f64,
}

impl Default for WaveformGenerator {
    fn default() -> Self {
        Self {
            waveform: Waveform::Sine,
            phase_offset: 0.0,
            gain: 1.0,
            pitch_scale: 1.0,
        }
    }
}

impl WaveformGenerator {
    pub fn new(waveform: Waveform) -> Self {
        Self {
            waveform,
            ..Self::default()
        }
    }

    /// Adds `out.len()` samples of the waveform into `out`, starting
    /// `phase_start` samples into the note.
    pub fn generate(
        &self,
        out: &mut [f32],
        frequency: f64,
        phase_start: u64,
        sample_rate: u32,
        gain: f32,
    ) {
        let step = frequency * self.pitch_scale / sample_rate as f64;
        let amplitude = gain * self.gain;
        for (i, sample) in out.iter_mut().enumerate() {
            let t = (phase_start + i as u64) as f64 * step + self.phase_offset;
            *sample += self.waveform.sample(t) * amplitude;
        }
    }
}
