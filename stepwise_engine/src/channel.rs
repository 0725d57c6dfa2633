use crate::assets::{self, AssetError};
use crate::channel_state::MaterializedNote;
use crate::generator::{Waveform, WaveformGenerator};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use stepwise_shared::TransportConfig;

/// A sound source for one channel.
///
/// Renderers keep no note history between calls: everything they need comes
/// from the materialized notes and the window being rendered. Different
/// channels are rendered concurrently into disjoint buffers.
pub trait ChannelRenderer: Send + Sync {
    /// Adds this channel's output for `[start_sample, start_sample + out.len())` into `out`.
    fn render(
        &self,
        notes: &[MaterializedNote],
        start_sample: u64,
        out: &mut [f32],
        gain: f32,
        transport: &TransportConfig,
    );
}

/// Calls `f(note, buffer_offset, len, phase)` for every note overlapping the
/// window, where `phase` is how far into the note the overlap begins.
fn for_each_overlap(
    notes: &[MaterializedNote],
    start_sample: u64,
    len: usize,
    mut f: impl FnMut(&MaterializedNote, usize, usize, u64),
) {
    let end_sample = start_sample + len as u64;
    for note in notes {
        let effective_start = note.start_sample.max(start_sample);
        let effective_end = note.end_sample().min(end_sample);
        if effective_start >= effective_end {
            continue;
        }
        f(
            note,
            (effective_start - start_sample) as usize,
            (effective_end - effective_start) as usize,
            effective_start - note.start_sample,
        );
    }
}

#[derive(Debug, Clone, Default)]
pub struct OscillatorSynth {
    pub generator: WaveformGenerator,
}

impl OscillatorSynth {
    pub fn new(waveform: Waveform) -> Self {
        Self {
            generator: WaveformGenerator::new(waveform),
        }
    }
}

impl ChannelRenderer for OscillatorSynth {
    fn render(
        &self,
        notes: &[MaterializedNote],
        start_sample: u64,
        out: &mut [f32],
        gain: f32,
        transport: &TransportConfig,
    ) {
        for_each_overlap(notes, start_sample, out.len(), |note, offset, len, phase| {
            self.generator.generate(
                &mut out[offset..offset + len],
                note.frequency,
                phase,
                transport.sample_rate,
                gain * note.velocity,
            );
        });
    }
}

/// Three generators summed per note, each with its own waveform, pitch
/// scale and phase offset.
#[derive(Debug, Clone)]
pub struct MultiOscillatorSynth {
    pub generators: [WaveformGenerator; 3],
}

impl MultiOscillatorSynth {
    pub const GENERATOR_GAIN: f32 = 0.3;
}

impl Default for MultiOscillatorSynth {
    fn default() -> Self {
        let generator = WaveformGenerator {
            gain: Self::GENERATOR_GAIN,
            ..WaveformGenerator::default()
        };
        Self {
            generators: [generator; 3],
        }
    }
}

impl ChannelRenderer for MultiOscillatorSynth {
    fn render(
        &self,
        notes: &[MaterializedNote],
        start_sample: u64,
        out: &mut [f32],
        gain: f32,
        transport: &TransportConfig,
    ) {
        for_each_overlap(notes, start_sample, out.len(), |note, offset, len, phase| {
            let window = &mut out[offset..offset + len];
            for generator in &self.generators {
                generator.generate(
                    window,
                    note.frequency,
                    phase,
                    transport.sample_rate,
                    gain * note.velocity,
                );
            }
        });
    }
}

/// Plays back mono sample data from the start of each note. Reads past the
/// end of the data are silent.
#[derive(Clone, Default)]
pub struct Sampler {
    data: Arc<Vec<f32>>,
}

impl fmt::Debug for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sampler").field("len", &self.data.len()).finish()
    }
}

impl Sampler {
    pub fn new(data: Arc<Vec<f32>>) -> Self {
        Self { data }
    }

    pub fn silent() -> Self {
        Self::default()
    }

    /// Loads a WAV file. Fails if its sample rate differs from `sample_rate`.
    pub fn from_file(path: &Path, sample_rate: u32) -> Result<Self, AssetError> {
        Ok(Self::new(assets::load_sample(path, sample_rate)?))
    }

    /// Like `from_file`, but an unreadable or corrupt file yields a silent
    /// sampler instead of an error. A sample rate mismatch is still an error.
    pub fn from_file_or_silent(path: &Path, sample_rate: u32) -> Result<Self, AssetError> {
        match Self::from_file(path, sample_rate) {
            Ok(sampler) => Ok(sampler),
            Err(e @ AssetError::SampleRateMismatch { .. }) => Err(e),
            Err(e) => {
                tracing::warn!("[Sampler] {}: {}. Channel will be silent.", path.display(), e);
                Ok(Self::silent())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl ChannelRenderer for Sampler {
    fn render(
        &self,
        notes: &[MaterializedNote],
        start_sample: u64,
        out: &mut [f32],
        gain: f32,
        _transport: &TransportConfig,
    ) {
        let data = self.data.as_slice();
        for_each_overlap(notes, start_sample, out.len(), |note, offset, len, phase| {
            let Ok(phase) = usize::try_from(phase) else {
                return;
            };
            let Some(source) = data.get(phase..) else {
                return;
            };
            let amplitude = gain * note.velocity;
            for (dst, src) in out[offset..offset + len].iter_mut().zip(source) {
                *dst += src * amplitude;
            }
        });
    }
}

/// The closed set of renderers a channel can use.
#[derive(Debug, Clone)]
pub enum Instrument {
    Oscillator(OscillatorSynth),
    MultiOscillator(MultiOscillatorSynth),
    SamplePlayback(Sampler),
}

impl Instrument {
    pub fn kind(&self) -> &'static str {
        match self {
            Instrument::Oscillator(_) => "Oscillator",
            Instrument::MultiOscillator(_) => "MultiOscillator",
            Instrument::SamplePlayback(_) => "SamplePlayback",
        }
    }
}

impl ChannelRenderer for Instrument {
    fn render(
        &self,
        notes: &[MaterializedNote],
        start_sample: u64,
        out: &mut [f32],
        gain: f32,
        transport: &TransportConfig,
    ) {
        match self {
            Instrument::Oscillator(synth) => {
                synth.render(notes, start_sample, out, gain, transport)
            }
            Instrument::MultiOscillator(synth) => {
                synth.render(notes, start_sample, out, gain, transport)
            }
            Instrument::SamplePlayback(sampler) => {
                sampler.render(notes, start_sample, out, gain, transport)
            }
        }
    }
}

impl From<OscillatorSynth> for Instrument {
    fn from(synth: OscillatorSynth) -> Self {
        Instrument::Oscillator(synth)
    }
}

impl From<MultiOscillatorSynth> for Instrument {
    fn from(synth: MultiOscillatorSynth) -> Self {
        Instrument::MultiOscillator(synth)
    }
}

impl From<Sampler> for Instrument {
    fn from(sampler: Sampler) -> Self {
        Instrument::SamplePlayback(sampler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> TransportConfig {
        TransportConfig::new(44_100, 120.0)
    }

    #[test]
    fn test_oscillator_silent_outside_note() {
        let synth = OscillatorSynth::new(Waveform::Sine);
        let notes = [MaterializedNote::new(440.0, 100, 50, 1.0, 0.0)];
        let mut out = vec![0.0; 200];
        synth.render(&notes, 0, &mut out, 1.0, &transport());

        assert!(out[..100].iter().all(|&v| v == 0.0));
        assert!(out[150..].iter().all(|&v| v == 0.0));
        assert!(out[101..150].iter().any(|&v| v != 0.0));
    }

    #[test]
    fn test_render_is_chunk_size_invariant() {
        let synth = OscillatorSynth::new(Waveform::Triangle);
        let notes = [
            MaterializedNote::new(261.6, 37, 900, 0.8, 0.0),
            MaterializedNote::new(523.2, 400, 100, 0.5, 0.0),
        ];
        let t = transport();

        let mut whole = vec![0.0; 1_024];
        synth.render(&notes, 0, &mut whole, 0.7, &t);

        let mut chunked = vec![0.0; 1_024];
        for (i, chunk) in chunked.chunks_mut(97).enumerate() {
            synth.render(&notes, (i * 97) as u64, chunk, 0.7, &t);
        }
        assert_eq!(whole, chunked);
    }

    #[test]
    fn test_multi_oscillator_sums_generators() {
        let mut synth = MultiOscillatorSynth::default();
        for generator in &mut synth.generators {
            generator.waveform = Waveform::Square;
        }
        let notes = [MaterializedNote::new(100.0, 0, 64, 1.0, 0.0)];
        let mut out = vec![0.0; 64];
        synth.render(&notes, 0, &mut out, 1.0, &transport());
        // Square is positive over the first half period (220 samples at 100 Hz).
        assert!(out[1..].iter().all(|&v| (v - 0.9).abs() < 1e-6));
    }

    #[test]
    fn test_sampler_reads_by_index() {
        let sampler = Sampler::new(Arc::new(vec![0.1, 0.2, 0.3, 0.4]));
        let notes = [MaterializedNote::new(0.0, 2, 10, 0.5, 0.0)];
        let mut out = vec![0.0; 8];
        sampler.render(&notes, 3, &mut out, 1.0, &transport());
        // Window starts one sample into the note; data ends after four samples.
        let expected = [0.1, 0.15, 0.2, 0.0, 0.0, 0.0, 0.0, 0.0];
        for (v, e) in out.iter().zip(expected) {
            assert!((v - e).abs() < 1e-6, "{:?}", out);
        }
    }

    #[test]
    fn test_corrupt_sample_degrades_to_silence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"RIFF....WAVEjunk").unwrap();

        let sampler = Sampler::from_file_or_silent(&path, 44_100).unwrap();
        assert!(sampler.is_empty());
        let mut out = vec![0.0; 16];
        let note = MaterializedNote::new(0.0, 0, 16, 1.0, 0.0);
        sampler.render(&[note], 0, &mut out, 1.0, &transport());
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_sample_rate_mismatch_is_not_masked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("48k.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 48_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0i16).unwrap();
        writer.finalize().unwrap();

        assert!(matches!(
            Sampler::from_file_or_silent(&path, 44_100),
            Err(AssetError::SampleRateMismatch { .. })
        ));
    }

    #[test]
    fn test_instrument_dispatch() {
        let instrument: Instrument = Sampler::new(Arc::new(vec![1.0; 4])).into();
        assert_eq!(instrument.kind(), "SamplePlayback");
        let mut out = vec![0.0; 4];
        let note = MaterializedNote::new(0.0, 0, 4, 1.0, 0.0);
        instrument.render(&[note], 0, &mut out, 0.5, &transport());
        assert_eq!(out, vec![0.5; 4]);
    }
}
