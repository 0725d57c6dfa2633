use crate::channel_state::ChannelState;
use crate::live::LiveNotePlayer;
use crate::mixer::ChannelBuffers;
use crate::provider::StreamingDataProvider;
use crate::session::SessionHandle;
use crate::transport::Transport;
use stepwise_shared::EqualTemperament;

/// Plays live keyboard notes through the session's channels with no
/// sequencer attached. Keeps its own clock and channel states.
pub struct LiveMonitor {
    live: LiveNotePlayer,
    session: SessionHandle,
    transport: Transport,
    states: Vec<ChannelState>,
    buffers: ChannelBuffers,
    clock: u64,
}

impl LiveMonitor {
    pub fn new(live: LiveNotePlayer, session: SessionHandle, transport: Transport) -> Self {
        let channel_count = session.load().channel_count();
        Self {
            live,
            session,
            transport,
            states: (0..channel_count).map(|_| ChannelState::new()).collect(),
            buffers: ChannelBuffers::new(channel_count, 4096),
            clock: 0,
        }
    }

    pub fn position(&self) -> u64 {
        self.clock
    }
}

impl StreamingDataProvider for LiveMonitor {
    fn next_chunk(&mut self, out: &mut [i16]) {
        let transport = self.transport.snapshot();
        let session = self.session.load();
        let channel_count = session.channel_count();
        if self.states.len() < channel_count {
            self.states.resize_with(channel_count, ChannelState::new);
        }
        self.buffers.prepare(out.len(), channel_count);

        self.live.flush_key_events(&mut self.states, self.clock, &transport, &EqualTemperament);
        for state in &mut self.states {
            state.clear_notes_before(self.clock);
        }

        self.buffers.render_channels(
            &session.project.channels,
            &session.instruments,
            &self.states,
            self.clock,
            &transport,
        );
        self.buffers.mix_to_master(channel_count);
        self.buffers.write_pcm(out);
        self.clock += out.len() as u64;
    }

    fn seek_to(&mut self, sample: u64) {
        self.clock = sample;
        for state in &mut self.states {
            state.clear_all();
        }
        self.live.publish_held_keys(&self.states);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::OscillatorSynth;
    use crate::generator::Waveform;
    use crate::session::Session;
    use stepwise_shared::{ChannelInfo, Pitch};

    fn monitor() -> (LiveMonitor, crate::live::LiveInput) {
        let mut session = Session::default();
        session.add_channel(ChannelInfo::named("Keys"), OscillatorSynth::new(Waveform::Square));
        let (player, input) = LiveNotePlayer::new();
        (LiveMonitor::new(player, session.into_handle(), Transport::default()), input)
    }

    #[test]
    fn test_key_sounds_until_release() {
        let (mut monitor, input) = monitor();
        let mut out = vec![0; 512];

        monitor.next_chunk(&mut out);
        assert!(out.iter().all(|&s| s == 0));

        input.add_key_event(0, Pitch::A4, true);
        monitor.next_chunk(&mut out);
        assert!(out.iter().any(|&s| s != 0));
        assert!(input.is_key_pressed(0, Pitch::A4));

        input.add_key_event(0, Pitch::A4, false);
        monitor.next_chunk(&mut out);
        // Released at the start of this chunk, and the clock only moves forward.
        monitor.next_chunk(&mut out);
        assert!(out.iter().all(|&s| s == 0));
        assert_eq!(monitor.position(), 2_048);
    }

    #[test]
    fn test_seek_drops_held_notes() {
        let (mut monitor, input) = monitor();
        let mut out = vec![0; 256];
        input.add_key_event(0, Pitch::A4, true);
        monitor.next_chunk(&mut out);
        monitor.seek_to(0);
        assert!(!input.is_key_pressed(0, Pitch::A4));
        monitor.next_chunk(&mut out);
        assert!(out.iter().all(|&s| s == 0));
    }
}
