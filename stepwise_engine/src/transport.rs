/// Transport state shared between the control side and the audio thread.
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use stepwise_shared::TransportConfig;
use stepwise_shared::time::STEPS_PER_BEAT;

/// Live transport parameters. Writers publish a whole new `TransportConfig`;
/// the sequencer takes one snapshot per chunk.
#[derive(Clone)]
pub struct Transport {
    config: Arc<ArcSwap<TransportConfig>>,
}

impl Transport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    pub fn snapshot(&self) -> TransportConfig {
        **self.config.load()
    }

    pub fn set_bpm(&self, bpm: f64) {
        if !(bpm > 0.0) {
            tracing::warn!("[Transport] Ignoring invalid tempo {}", bpm);
            return;
        }
        self.config.rcu(|current| TransportConfig { bpm, ..**current });
    }

    pub fn set_sample_rate(&self, sample_rate: u32) {
        if sample_rate == 0 {
            tracing::warn!("[Transport] Ignoring zero sample rate");
            return;
        }
        self.config.rcu(|current| TransportConfig { sample_rate, ..**current });
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    #[default]
    Stopped,
    Playing,
}

/// Pattern mode loops the selected pattern; song mode follows the playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackMode {
    #[default]
    Pattern,
    Song,
}

/// Published by the sequencer after every chunk, read by the UI without locking.
#[derive(Debug, Default)]
pub struct PlaybackStatus {
    playing: AtomicBool,
    /// Loop-relative (song) position; only advances while playing.
    position: AtomicU64,
    /// Never pauses.
    absolute: AtomicU64,
}

impl PlaybackStatus {
    pub(crate) fn publish(&self, playing: bool, position: u64, absolute: u64) {
        self.playing.store(playing, Ordering::Relaxed);
        self.position.store(position, Ordering::Relaxed);
        self.absolute.store(absolute, Ordering::Relaxed);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    pub fn absolute_position(&self) -> u64 {
        self.absolute.load(Ordering::Relaxed)
    }

    /// Current step (16th note) for display.
    pub fn current_step(&self, transport: &TransportConfig) -> u64 {
        let beats = self.position() as f64 / transport.samples_per_beat();
        (beats * STEPS_PER_BEAT as f64) as u64
    }
}
