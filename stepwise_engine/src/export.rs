//! Offline bounce: renders a provider to a mono 16-bit WAV file without
//! real-time constraints.

use crate::provider::StreamingDataProvider;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportConfig {
    pub sample_rate: u32,
    pub chunk_size: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            sample_rate: stepwise_shared::DEFAULT_SAMPLE_RATE,
            chunk_size: 512,
        }
    }
}

/// Pulls `total_samples` from `provider` in chunks and writes them to `path`.
pub fn render_to_wav(
    provider: &mut dyn StreamingDataProvider,
    total_samples: u64,
    path: &Path,
    config: &ExportConfig,
) -> Result<(), anyhow::Error> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;

    let mut chunk = vec![0i16; config.chunk_size.max(1)];
    let mut remaining = total_samples;
    while remaining > 0 {
        let n = remaining.min(chunk.len() as u64) as usize;
        provider.next_chunk(&mut chunk[..n]);
        for &s in &chunk[..n] {
            writer.write_sample(s)?;
        }
        remaining -= n as u64;
    }

    writer.finalize()?;
    tracing::info!(
        "[Export] Wrote {} samples ({:.2}s) to {}",
        total_samples,
        total_samples as f64 / config.sample_rate as f64,
        path.display()
    );
    Ok(())
}
