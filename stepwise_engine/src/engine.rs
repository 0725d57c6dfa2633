use crate::combiner::AudioStreamCombiner;
use crate::commands::SequencerHandle;
use crate::config::EngineConfig;
use crate::live::{LiveInput, LiveNotePlayer};
use crate::output::DeviceOutput;
use crate::sequencer::Sequencer;
use crate::session::{Session, SessionHandle};
use crate::streaming::StreamingAudioSource;
use crate::transport::{PlaybackMode, PlaybackStatus, Transport};
use std::sync::Arc;
use stepwise_shared::{Pitch, ProjectError};

/// Everything needed to hear a session: sequencer, fill thread and device
/// stream. All control methods are callable from any thread holding `&self`.
pub struct AudioEngine {
    _output: DeviceOutput,
    source: StreamingAudioSource,
    sequencer: SequencerHandle,
    live: LiveInput,
    transport: Transport,
    session: SessionHandle,
    pub config: EngineConfig,
}

impl AudioEngine {
    pub fn new(config: EngineConfig, session: Session) -> Result<Self, anyhow::Error> {
        config.validate()?;
        session.validate()?;
        tracing::info!(
            "[AudioEngine] Starting: {} channels, {} Hz, {} BPM",
            session.channel_count(),
            config.sample_rate,
            config.bpm
        );

        let transport = Transport::new(config.transport());
        let session = session.into_handle();
        let (player, live) = LiveNotePlayer::new();
        let (sequencer, handle) = Sequencer::new(session.clone(), transport.clone(), player);

        let mut master = AudioStreamCombiner::new();
        master.gain = config.master_gain;
        master.add(Box::new(sequencer));

        // Pre-fill before the device starts pulling.
        let (mut source, sink) = StreamingAudioSource::new(Box::new(master), config.stream());
        source.play()?;
        let output = DeviceOutput::open(sink, config.sample_rate, config.chunk_size as u32)?;

        Ok(Self {
            _output: output,
            source,
            sequencer: handle,
            live,
            transport,
            session,
            config,
        })
    }

    pub fn play(&self) {
        self.sequencer.play();
    }

    pub fn stop(&self) {
        self.sequencer.stop();
    }

    pub fn set_mode(&self, mode: PlaybackMode) {
        self.sequencer.set_mode(mode);
    }

    pub fn select_pattern(&self, index: usize) {
        self.sequencer.select_pattern(index);
    }

    pub fn seek_to(&self, sample: u64) {
        self.sequencer.seek_to(sample);
    }

    pub fn set_bpm(&self, bpm: f64) {
        self.transport.set_bpm(bpm);
    }

    pub fn key_event(&self, channel: usize, pitch: Pitch, is_key_down: bool) {
        self.live.add_key_event(channel, pitch, is_key_down);
    }

    pub fn is_key_pressed(&self, channel: usize, pitch: Pitch) -> bool {
        self.live.is_key_pressed(channel, pitch)
    }

    pub fn status(&self) -> &PlaybackStatus {
        self.sequencer.status()
    }

    pub fn session(&self) -> Arc<Session> {
        self.session.load_full()
    }

    /// Edits a copy of the session and publishes it if it still validates.
    /// The audio thread picks it up at its next chunk.
    pub fn update_session(&self, edit: impl FnOnce(&mut Session)) -> Result<(), ProjectError> {
        let mut next = Session::clone(&self.session.load());
        edit(&mut next);
        next.validate()?;
        self.session.store(Arc::new(next));
        Ok(())
    }

    pub fn samples_processed(&self) -> u64 {
        self.source.samples_processed()
    }

    pub fn underruns(&self) -> u64 {
        self.source.underruns()
    }
}
