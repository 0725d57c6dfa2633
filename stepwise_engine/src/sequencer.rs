use crate::channel_state::ChannelState;
use crate::commands::{SequencerCommand, SequencerHandle};
use crate::live::LiveNotePlayer;
use crate::mixer::ChannelBuffers;
use crate::provider::StreamingDataProvider;
use crate::schedule::{ScheduleNotes, ScheduleWindow};
use crate::session::{Session, SessionHandle};
use crate::transport::{PlayState, PlaybackMode, PlaybackStatus, Transport};
use crossbeam_channel::{Receiver, unbounded};
use std::sync::Arc;
use stepwise_shared::{EqualTemperament, Pattern, TransportConfig, TuningSystem};

const MAX_CHANNELS: usize = 32;
const MAX_CHUNK: usize = 4096;

/// Turns the session into audio, one chunk at a time.
///
/// Two clocks run side by side: the absolute clock never stops and anchors
/// every materialized note (including live ones), while the loop-relative
/// position only advances while playing and picks which pattern notes are due.
pub struct Sequencer {
    session: SessionHandle,
    transport: Transport,
    live: LiveNotePlayer,
    command_rx: Receiver<SequencerCommand>,
    status: Arc<PlaybackStatus>,
    tuning: Box<dyn TuningSystem>,

    state: PlayState,
    mode: PlaybackMode,
    selected_pattern: usize,
    absolute_clock: u64,
    loop_position: u64,

    channel_states: Vec<ChannelState>,
    buffers: ChannelBuffers,
    /// Channels that failed to schedule last time, to log transitions only.
    failing: Vec<bool>,
    missing_pattern: Option<usize>,
}

impl Sequencer {
    pub fn new(
        session: SessionHandle,
        transport: Transport,
        live: LiveNotePlayer,
    ) -> (Self, SequencerHandle) {
        let (command_tx, command_rx) = unbounded();
        let status = Arc::new(PlaybackStatus::default());
        let channel_count = session.load().channel_count();
        let sequencer = Self {
            session,
            transport,
            live,
            command_rx,
            status: status.clone(),
            tuning: Box::new(EqualTemperament),
            state: PlayState::Stopped,
            mode: PlaybackMode::Pattern,
            selected_pattern: 0,
            absolute_clock: 0,
            loop_position: 0,
            channel_states: (0..channel_count).map(|_| ChannelState::new()).collect(),
            buffers: ChannelBuffers::new(channel_count.max(MAX_CHANNELS), MAX_CHUNK),
            failing: vec![false; channel_count],
            missing_pattern: None,
        };
        (sequencer, SequencerHandle { command_tx, status })
    }

    pub fn set_tuning(&mut self, tuning: Box<dyn TuningSystem>) {
        self.tuning = tuning;
    }

    pub fn play(&mut self) {
        if self.state != PlayState::Playing {
            tracing::info!("[Sequencer] Play ({:?} mode)", self.mode);
        }
        self.state = PlayState::Playing;
    }

    /// Stops, rewinds and drops every scheduled and held note.
    pub fn stop(&mut self) {
        if self.state != PlayState::Stopped {
            tracing::info!("[Sequencer] Stop");
        }
        self.state = PlayState::Stopped;
        self.loop_position = 0;
        self.clear_all();
    }

    pub fn seek(&mut self, position: u64) {
        self.loop_position = position;
        self.clear_all();
    }

    pub fn set_mode(&mut self, mode: PlaybackMode) {
        self.mode = mode;
    }

    pub fn select_pattern(&mut self, index: usize) {
        self.selected_pattern = index;
    }

    pub fn play_state(&self) -> PlayState {
        self.state
    }

    pub fn absolute_clock(&self) -> u64 {
        self.absolute_clock
    }

    pub fn loop_position(&self) -> u64 {
        self.loop_position
    }

    pub fn channel_states(&self) -> &[ChannelState] {
        &self.channel_states
    }

    fn clear_all(&mut self) {
        for state in &mut self.channel_states {
            state.clear_all();
        }
        self.live.publish_held_keys(&self.channel_states);
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.command_rx.try_recv() {
            match command {
                SequencerCommand::Play => self.play(),
                SequencerCommand::Stop => self.stop(),
                SequencerCommand::SetMode(mode) => self.set_mode(mode),
                SequencerCommand::SelectPattern(index) => self.select_pattern(index),
                SequencerCommand::SeekTo(position) => self.seek(position),
            }
        }
    }

    /// Renders the next `out.len()` samples.
    pub fn render_chunk(&mut self, out: &mut [i16]) {
        self.drain_commands();
        let transport = self.transport.snapshot();
        let session = self.session.load();
        let frames = out.len();
        let channel_count = session.channel_count();

        if self.channel_states.len() < channel_count {
            self.channel_states.resize_with(channel_count, ChannelState::new);
            self.failing.resize(channel_count, false);
        }
        self.buffers.prepare(frames, channel_count);

        self.live.flush_key_events(
            &mut self.channel_states,
            self.absolute_clock,
            &transport,
            self.tuning.as_ref(),
        );
        for state in &mut self.channel_states {
            state.clear_notes_before(self.absolute_clock);
        }

        if self.state == PlayState::Playing {
            self.schedule(&session, frames as u64, &transport);
        }

        self.buffers.render_channels(
            &session.project.channels,
            &session.instruments,
            &self.channel_states,
            self.absolute_clock,
            &transport,
        );
        self.buffers.mix_to_master(channel_count);
        self.buffers.write_pcm(out);

        self.absolute_clock += frames as u64;
        if self.state == PlayState::Playing {
            self.loop_position += frames as u64;
        }
        self.status.publish(
            self.state == PlayState::Playing,
            self.loop_position,
            self.absolute_clock,
        );
    }

    fn schedule(&mut self, session: &Session, frames: u64, transport: &TransportConfig) {
        let project = &session.project;
        let channel_count = session.channel_count();
        let base = ScheduleWindow {
            start: self.loop_position,
            sample_count: frames,
            playback_offset: self.absolute_clock.wrapping_sub(self.loop_position),
            pattern_offset: 0,
            wrap: true,
        };

        let pattern_mode = match self.mode {
            PlaybackMode::Pattern => match project.pattern(self.selected_pattern) {
                Ok(pattern) => {
                    self.missing_pattern = None;
                    Some(pattern)
                }
                Err(e) => {
                    if self.missing_pattern != Some(self.selected_pattern) {
                        tracing::warn!("[Sequencer] Nothing scheduled: {}", e);
                        self.missing_pattern = Some(self.selected_pattern);
                    }
                    return;
                }
            },
            PlaybackMode::Song => None,
        };

        let mut scheduler = ChunkScheduler {
            states: &mut self.channel_states[..channel_count],
            failed: &mut self.buffers.channel_failed[..channel_count],
            failing: &mut self.failing[..channel_count],
            tuning: self.tuning.as_ref(),
            transport,
        };

        if let Some(pattern) = pattern_mode {
            scheduler.schedule(pattern, &base);
            return;
        }

        let window_end = base.start + frames;
        for entry in &project.playlist.entries {
            let pattern = match project.pattern(entry.pattern_index) {
                Ok(pattern) => pattern,
                Err(e) => {
                    tracing::debug!("[Sequencer] Playlist entry skipped: {}", e);
                    continue;
                }
            };
            let offset = (entry.song_step_offset as f64 * transport.samples_per_step()) as u64;
            let len = pattern.loop_length().to_sample_index(transport);
            if offset >= window_end || offset + len <= base.start {
                continue;
            }
            let window = ScheduleWindow {
                pattern_offset: offset,
                wrap: false,
                ..base
            };
            scheduler.schedule(pattern, &window);
        }
    }
}

/// Borrowed pieces of the sequencer needed while scheduling one chunk.
struct ChunkScheduler<'a> {
    states: &'a mut [ChannelState],
    failed: &'a mut [bool],
    failing: &'a mut [bool],
    tuning: &'a dyn TuningSystem,
    transport: &'a TransportConfig,
}

impl ChunkScheduler<'_> {
    fn schedule(&mut self, pattern: &Pattern, window: &ScheduleWindow) {
        for (idx, state) in self.states.iter_mut().enumerate() {
            match pattern.schedule_notes(idx, window, state, self.transport, self.tuning) {
                Ok(_) => {
                    if self.failing[idx] {
                        tracing::info!("[Sequencer] Channel {} recovered", idx);
                        self.failing[idx] = false;
                    }
                }
                Err(e) => {
                    if !self.failing[idx] {
                        tracing::warn!("[Sequencer] Channel {} silenced: {}", idx, e);
                        self.failing[idx] = true;
                    }
                    self.failed[idx] = true;
                }
            }
        }
    }
}

impl StreamingDataProvider for Sequencer {
    fn next_chunk(&mut self, out: &mut [i16]) {
        self.render_chunk(out);
    }

    fn seek_to(&mut self, sample: u64) {
        self.seek(sample);
    }
}
