//! Live keyboard input. Any thread can send key events; the audio thread
//! applies them to the channel states once per chunk and publishes which
//! keys are held so the UI can query them without locking.

use crate::channel_state::ChannelState;
use arc_swap::ArcSwap;
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::sync::Arc;
use stepwise_shared::{PatternTime, Pitch, TransportConfig, TuningSystem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub channel: usize,
    pub pitch: Pitch,
    pub is_key_down: bool,
}

/// Snapshot of held pitches: a 256-bit set per channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeldKeys {
    channels: Vec<[u64; 4]>,
}

impl HeldKeys {
    pub fn contains(&self, channel: usize, pitch: Pitch) -> bool {
        let v = pitch.value() as usize;
        self.channels
            .get(channel)
            .is_some_and(|bits| bits[v / 64] & (1 << (v % 64)) != 0)
    }

    pub fn is_empty(&self) -> bool {
        self.channels.iter().all(|bits| bits.iter().all(|&w| w == 0))
    }

    /// Recomputes the set from the states, reusing storage.
    fn rebuild(&mut self, states: &[ChannelState]) {
        self.channels.resize(states.len(), [0; 4]);
        for (bits, state) in self.channels.iter_mut().zip(states) {
            *bits = [0; 4];
            for pitch in state.held_pitches() {
                let v = pitch.value() as usize;
                bits[v / 64] |= 1 << (v % 64);
            }
        }
    }
}

/// Producer side, cheap to clone into UI and input handlers.
#[derive(Clone)]
pub struct LiveInput {
    events_tx: Sender<KeyEvent>,
    held: Arc<ArcSwap<HeldKeys>>,
}

impl LiveInput {
    pub fn add_key_event(&self, channel: usize, pitch: Pitch, is_key_down: bool) {
        let event = KeyEvent {
            channel,
            pitch,
            is_key_down,
        };
        if self.events_tx.send(event).is_err() {
            tracing::debug!("[Live] Player dropped, key event discarded");
        }
    }

    pub fn is_key_pressed(&self, channel: usize, pitch: Pitch) -> bool {
        self.held.load().contains(channel, pitch)
    }

    pub fn held_keys(&self) -> Arc<HeldKeys> {
        self.held.load_full()
    }
}

/// Consumer side, owned by whichever provider renders the channel states.
pub struct LiveNotePlayer {
    events_rx: Receiver<KeyEvent>,
    held: Arc<ArcSwap<HeldKeys>>,
    /// The set not currently published. Rewritten in place when no reader
    /// still holds it.
    spare: Option<Arc<HeldKeys>>,
}

impl LiveNotePlayer {
    pub fn new() -> (LiveNotePlayer, LiveInput) {
        let (events_tx, events_rx) = unbounded();
        let held = Arc::new(ArcSwap::from_pointee(HeldKeys::default()));
        let player = LiveNotePlayer {
            events_rx,
            held: held.clone(),
            spare: Some(Arc::new(HeldKeys::default())),
        };
        (player, LiveInput { events_tx, held })
    }

    /// Applies all queued key events, in order, at `current_sample`.
    pub fn flush_key_events(
        &mut self,
        states: &mut [ChannelState],
        current_sample: u64,
        transport: &TransportConfig,
        tuning: &dyn TuningSystem,
    ) {
        let time = PatternTime::from_samples(current_sample, transport);
        let mut changed = false;
        while let Ok(event) = self.events_rx.try_recv() {
            let Some(state) = states.get_mut(event.channel) else {
                tracing::warn!(
                    "[Live] Key event for channel {} ignored ({} channels)",
                    event.channel,
                    states.len()
                );
                continue;
            };
            if event.is_key_down {
                state.begin_keyboard_note(event.pitch, time, transport, tuning);
            } else {
                state.end_keyboard_note(event.pitch, time, transport);
            }
            changed = true;
        }
        if changed {
            self.publish_held_keys(states);
        }
    }

    /// Publishes the keys held across `states`. Call after anything other
    /// than key events changes them.
    pub fn publish_held_keys(&mut self, states: &[ChannelState]) {
        let mut next = match self.spare.take() {
            Some(spare) if Arc::strong_count(&spare) == 1 && Arc::weak_count(&spare) == 0 => spare,
            // A reader still holds the old snapshot.
            _ => Arc::new(HeldKeys::default()),
        };
        if let Some(keys) = Arc::get_mut(&mut next) {
            keys.rebuild(states);
        }
        self.spare = Some(self.held.swap(next));
    }
}
