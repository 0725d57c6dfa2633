use crate::provider::StreamingDataProvider;

/// Sums several providers into one stream. Each provider keeps its own
/// position; results are clamped to the 16-bit range rather than wrapping.
pub struct AudioStreamCombiner {
    providers: Vec<Box<dyn StreamingDataProvider>>,
    pub gain: f32,
    scratch: Vec<i16>,
    accumulator: Vec<i32>,
}

impl Default for AudioStreamCombiner {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioStreamCombiner {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            gain: 1.0,
            scratch: Vec::with_capacity(4096),
            accumulator: Vec::with_capacity(4096),
        }
    }

    /// Returns the provider's index for later removal.
    pub fn add(&mut self, provider: Box<dyn StreamingDataProvider>) -> usize {
        self.providers.push(provider);
        self.providers.len() - 1
    }

    pub fn remove(&mut self, index: usize) -> Option<Box<dyn StreamingDataProvider>> {
        (index < self.providers.len()).then(|| self.providers.remove(index))
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl StreamingDataProvider for AudioStreamCombiner {
    fn next_chunk(&mut self, out: &mut [i16]) {
        let n = out.len();
        // Keeps capacity once warmed up to the chunk size.
        self.scratch.resize(n, 0);
        self.accumulator.clear();
        self.accumulator.resize(n, 0);

        for provider in &mut self.providers {
            provider.next_chunk(&mut self.scratch[..n]);
            for (acc, &s) in self.accumulator.iter_mut().zip(&self.scratch) {
                *acc = acc.saturating_add(s as i32);
            }
        }

        for (dst, &acc) in out.iter_mut().zip(&self.accumulator) {
            let scaled = acc as f32 * self.gain;
            *dst = scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        }
    }

    fn seek_to(&mut self, sample: u64) {
        for provider in &mut self.providers {
            provider.seek_to(sample);
        }
    }
}
