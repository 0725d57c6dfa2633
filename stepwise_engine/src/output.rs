use crate::streaming::PcmSink;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

/// Largest device callback handled without reallocating the scratch buffer.
const MAX_CALLBACK_FRAMES: usize = 8192;

/// The default output device, fed mono PCM from a `PcmSink` and duplicated
/// onto every device channel.
pub struct DeviceOutput {
    _stream: cpal::Stream,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DeviceOutput {
    pub fn open(
        mut sink: PcmSink,
        sample_rate: u32,
        frames_per_buffer: u32,
    ) -> anyhow::Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(anyhow::anyhow!("No output device available"))?;
        let config = device.default_output_config()?;
        let channels = config.channels();
        let sample_format = config.sample_format();

        if let cpal::SupportedBufferSize::Range { min, max } = config.buffer_size() {
            tracing::debug!("[Output] Device buffer range: {}-{}", min, max);
        }

        let mut stream_config: cpal::StreamConfig = config.into();
        stream_config.sample_rate = sample_rate;
        stream_config.buffer_size = cpal::BufferSize::Fixed(frames_per_buffer);
        tracing::info!("[Output] Using config: {:?}", stream_config);

        let err_fn = |err: cpal::StreamError| {
            let s = err.to_string();
            if !s.contains("underrun") && !s.contains("overrun") {
                tracing::error!("[Output] Stream error: {}", s);
            }
        };

        let frame_width = channels as usize;
        let mut scratch = vec![0i16; MAX_CALLBACK_FRAMES];
        let stream = match sample_format {
            cpal::SampleFormat::F32 => device.build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / frame_width;
                    if scratch.len() < frames {
                        scratch.resize(frames, 0);
                    }
                    let mono = &mut scratch[..frames];
                    sink.fill(mono);
                    for (frame, &s) in data.chunks_mut(frame_width).zip(mono.iter()) {
                        frame.fill(s as f32 / 32_768.0);
                    }
                },
                err_fn,
                None,
            )?,
            cpal::SampleFormat::I16 => device.build_output_stream(
                &stream_config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / frame_width;
                    if scratch.len() < frames {
                        scratch.resize(frames, 0);
                    }
                    let mono = &mut scratch[..frames];
                    sink.fill(mono);
                    for (frame, &s) in data.chunks_mut(frame_width).zip(mono.iter()) {
                        frame.fill(s);
                    }
                },
                err_fn,
                None,
            )?,
            _ => return Err(anyhow::anyhow!("Unsupported sample format {:?}", sample_format)),
        };

        stream.play()?;

        Ok(Self {
            _stream: stream,
            sample_rate,
            channels,
        })
    }
}
