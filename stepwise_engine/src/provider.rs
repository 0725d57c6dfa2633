use std::f64::consts::TAU;

/// Source of mono 16-bit PCM pulled in consecutive chunks.
///
/// Implemented by the sequencer, the combiner and the live monitor, so
/// sources nest freely.
pub trait StreamingDataProvider: Send {
    /// Fills all of `out` with the next samples of the stream.
    fn next_chunk(&mut self, out: &mut [i16]);

    fn seek_to(&mut self, sample: u64);
}

impl<P: StreamingDataProvider + ?Sized> StreamingDataProvider for Box<P> {
    fn next_chunk(&mut self, out: &mut [i16]) {
        (**self).next_chunk(out)
    }

    fn seek_to(&mut self, sample: u64) {
        (**self).seek_to(sample)
    }
}

/// Converts a float sample to 16-bit PCM, clamping to [-1, 1].
pub fn float_to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Constant sine tone, for device checks and tests.
#[derive(Debug, Clone)]
pub struct SineProvider {
    pub frequency: f64,
    pub amplitude: f32,
    sample_rate: u32,
    position: u64,
}

impl SineProvider {
    pub fn new(frequency: f64, sample_rate: u32) -> Self {
        Self {
            frequency,
            amplitude: 0.5,
            sample_rate,
            position: 0,
        }
    }
}

impl StreamingDataProvider for SineProvider {
    fn next_chunk(&mut self, out: &mut [i16]) {
        let step = self.frequency / self.sample_rate as f64;
        for (i, sample) in out.iter_mut().enumerate() {
            let t = (self.position + i as u64) as f64 * step;
            *sample = float_to_pcm16((TAU * t).sin() as f32 * self.amplitude);
        }
        self.position += out.len() as u64;
    }

    fn seek_to(&mut self, sample: u64) {
        self.position = sample;
    }
}
