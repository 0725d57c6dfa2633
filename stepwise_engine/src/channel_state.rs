use stepwise_shared::{PatternTime, Pitch, TransportConfig, TuningSystem};

/// Sustain given to a keyboard note until its key is released.
pub const KEYBOARD_SUSTAIN: PatternTime = PatternTime::beats(100);
pub const KEYBOARD_VELOCITY: f32 = 0.75;

/// A note pinned to absolute sample positions, ready for rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterializedNote {
    pub frequency: f64,
    pub start_sample: u64,
    pub sample_count: u64,
    pub velocity: f32,
    pub pan: f64,
    /// Set while the note is sustained by a held key.
    pub(crate) held: Option<Pitch>,
}

impl MaterializedNote {
    pub fn new(
        frequency: f64,
        start_sample: u64,
        sample_count: u64,
        velocity: f32,
        pan: f64,
    ) -> Self {
        Self {
            frequency,
            start_sample,
            sample_count,
            velocity,
            pan,
            held: None,
        }
    }

    pub fn end_sample(&self) -> u64 {
        self.start_sample.saturating_add(self.sample_count)
    }

    pub fn is_held(&self) -> bool {
        self.held.is_some()
    }
}

#[derive(Debug, Clone, Copy)]
struct KeyboardNote {
    pitch: Pitch,
    start_sample: u64,
}

/// Per-channel playback state, owned by the audio thread: every note the
/// channel may still have to render, plus the notes whose keys are down.
///
/// Every keyboard note also has a materialized counterpart tagged with its
/// pitch; both lists are updated together.
#[derive(Debug, Clone)]
pub struct ChannelState {
    notes: Vec<MaterializedNote>,
    keyboard_notes: Vec<KeyboardNote>,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelState {
    pub fn new() -> Self {
        Self {
            notes: Vec::with_capacity(256),
            keyboard_notes: Vec::with_capacity(16),
        }
    }

    pub fn add_note(&mut self, note: MaterializedNote) {
        self.notes.push(note);
    }

    pub fn notes(&self) -> &[MaterializedNote] {
        &self.notes
    }

    pub fn held_pitches(&self) -> impl Iterator<Item = Pitch> + '_ {
        self.keyboard_notes.iter().map(|k| k.pitch)
    }

    pub fn is_held(&self, pitch: Pitch) -> bool {
        self.keyboard_notes.iter().any(|k| k.pitch == pitch)
    }

    /// Starts a sustained note at `time`. A note already held at the same
    /// pitch is closed and replaced, never stacked.
    pub fn begin_keyboard_note(
        &mut self,
        pitch: Pitch,
        time: PatternTime,
        transport: &TransportConfig,
        tuning: &dyn TuningSystem,
    ) {
        if let Some(idx) = self.keyboard_notes.iter().position(|k| k.pitch == pitch) {
            self.keyboard_notes.remove(idx);
            self.notes.retain(|n| n.held != Some(pitch));
        }

        let start_sample = time.to_sample_index(transport);
        self.keyboard_notes.push(KeyboardNote { pitch, start_sample });
        self.notes.push(MaterializedNote {
            frequency: tuning.frequency(pitch),
            start_sample,
            sample_count: KEYBOARD_SUSTAIN.to_sample_index(transport),
            velocity: KEYBOARD_VELOCITY,
            pan: 0.0,
            held: Some(pitch),
        });
    }

    /// Fixes the duration of the held note to end at `time`. The note stays
    /// materialized so its remaining span still renders. The end is measured
    /// against the start sample, so tempo changes while held do not move it.
    pub fn end_keyboard_note(
        &mut self,
        pitch: Pitch,
        time: PatternTime,
        transport: &TransportConfig,
    ) {
        let Some(idx) = self.keyboard_notes.iter().position(|k| k.pitch == pitch) else {
            tracing::debug!("[ChannelState] Release of {} without a held note", pitch);
            return;
        };
        let held = self.keyboard_notes.remove(idx);
        let end_sample = time.to_sample_index(transport);

        if let Some(note) = self.notes.iter_mut().find(|n| n.held == Some(pitch)) {
            note.sample_count = end_sample.saturating_sub(held.start_sample);
            note.held = None;
        }
    }

    /// Drops notes that ended before `sample`. Held notes are kept.
    pub fn clear_notes_before(&mut self, sample: u64) {
        self.notes.retain(|n| n.is_held() || n.end_sample() >= sample);
    }

    pub fn clear_all(&mut self) {
        self.notes.clear();
        self.keyboard_notes.clear();
    }
}
