use crate::channel::{ChannelRenderer, Instrument};
use crate::channel_state::ChannelState;
use crate::provider::float_to_pcm16;
use rayon::prelude::*;
use stepwise_shared::{ChannelInfo, TransportConfig};

/// Preallocated per-channel render buffers and the mono master mix.
pub struct ChannelBuffers {
    pub channel_bufs: Vec<Vec<f32>>,
    /// Channels whose contribution is dropped for the current chunk.
    pub channel_failed: Vec<bool>,
    pub master_mix: Vec<f32>,
}

impl ChannelBuffers {
    pub fn new(max_channels: usize, buffer_size: usize) -> Self {
        Self {
            channel_bufs: vec![vec![0.0; buffer_size]; max_channels],
            channel_failed: vec![false; max_channels],
            master_mix: vec![0.0; buffer_size],
        }
    }

    /// Sizes and clears every buffer for a chunk of `frames` samples.
    /// Only allocates when the chunk or the channel count grows.
    pub fn prepare(&mut self, frames: usize, channel_count: usize) {
        self.master_mix.resize(frames, 0.0);
        self.master_mix.fill(0.0);

        if self.channel_bufs.len() < channel_count {
            self.channel_bufs.resize(channel_count, vec![0.0; frames]);
        }
        self.channel_failed.resize(channel_count.max(self.channel_failed.len()), false);

        for (buf, failed) in self
            .channel_bufs
            .iter_mut()
            .zip(self.channel_failed.iter_mut())
            .take(channel_count)
        {
            buf.resize(frames, 0.0);
            buf.fill(0.0);
            *failed = false;
        }
    }

    /// Renders every channel into its own buffer, one rayon task per channel.
    /// Muted and failed channels stay silent.
    pub fn render_channels(
        &mut self,
        infos: &[ChannelInfo],
        instruments: &[Instrument],
        states: &[ChannelState],
        start_sample: u64,
        transport: &TransportConfig,
    ) {
        let count = infos.len().min(instruments.len()).min(states.len());
        self.channel_bufs[..count]
            .par_iter_mut()
            .zip(self.channel_failed[..count].par_iter())
            .zip(infos[..count].par_iter())
            .zip(instruments[..count].par_iter())
            .zip(states[..count].par_iter())
            .for_each(|((((buf, &failed), info), instrument), state)| {
                if failed || info.muted {
                    return;
                }
                instrument.render(state.notes(), start_sample, buf, info.gain, transport);
            });
    }

    pub fn mix_to_master(&mut self, channel_count: usize) {
        for buf in self.channel_bufs.iter().take(channel_count) {
            for (dst, &s) in self.master_mix.iter_mut().zip(buf) {
                *dst += s;
            }
        }
    }

    pub fn write_pcm(&self, out: &mut [i16]) {
        for (dst, &s) in out.iter_mut().zip(&self.master_mix) {
            *dst = float_to_pcm16(s);
        }
    }
}
