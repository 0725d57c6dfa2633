pub mod assets;
pub mod channel;
pub mod channel_state;
pub mod combiner;
pub mod commands;
pub mod config;
pub mod engine; // AudioEngine lives here
pub mod export;
pub mod generator;
pub mod live;
pub mod mixer;
pub mod monitor;
pub mod output;
pub mod provider;
pub mod schedule;
pub mod sequencer;
pub mod session;
pub mod streaming;
pub mod transport;

// Re-exports
pub use channel::{ChannelRenderer, Instrument, MultiOscillatorSynth, OscillatorSynth, Sampler};
pub use commands::SequencerHandle;
pub use config::EngineConfig;
pub use engine::AudioEngine;
pub use live::{LiveInput, LiveNotePlayer};
pub use provider::StreamingDataProvider;
pub use sequencer::Sequencer;
pub use session::{Session, SessionHandle};
pub use streaming::StreamingAudioSource;
pub use transport::{PlayState, PlaybackMode, Transport};

#[cfg(test)]
mod tests_playback;
