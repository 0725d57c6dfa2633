use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    /// The file is fine but would play at the wrong speed.
    #[error("sample rate of {found} Hz does not match the engine rate of {expected} Hz")]
    SampleRateMismatch { expected: u32, found: u32 },
    #[error("malformed sample file: {0}")]
    Malformed(String),
    #[error("could not read sample file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<hound::Error> for AssetError {
    fn from(e: hound::Error) -> Self {
        match e {
            hound::Error::IoError(io) => AssetError::Io(io),
            other => AssetError::Malformed(other.to_string()),
        }
    }
}

/// Loads a WAV file as mono f32 samples in [-1, 1]. Multi-channel files
/// contribute their first channel only.
pub fn load_sample(path: &Path, expected_rate: u32) -> Result<Arc<Vec<f32>>, AssetError> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    if spec.sample_rate != expected_rate {
        return Err(AssetError::SampleRateMismatch {
            expected: expected_rate,
            found: spec.sample_rate,
        });
    }
    if spec.channels == 0 {
        return Err(AssetError::Malformed("zero channels".to_string()));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max_val = 2.0_f32.powi(spec.bits_per_sample as i32 - 1);
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|x| x as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    let channels = spec.channels as usize;
    let data: Vec<f32> = if channels == 1 {
        interleaved
    } else {
        interleaved.iter().step_by(channels).copied().collect()
    };

    tracing::info!(
        "[Assets] Loaded {} ({} samples, {} channel(s), {}-bit)",
        path.display(),
        data.len(),
        spec.channels,
        spec.bits_per_sample
    );
    Ok(Arc::new(data))
}
