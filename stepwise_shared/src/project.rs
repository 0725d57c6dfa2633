use crate::pitch::Pitch;
use crate::time::PatternTime;
use crate::ProjectError;
use serde::{Deserialize, Serialize};

/// A single note within a pattern, in pattern-relative musical time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub start: PatternTime,
    pub duration: PatternTime,
    pub pitch: Pitch,
    /// Relative volume in [0, 1].
    pub velocity: f32,
    /// -1.0 is hard left, 1.0 hard right.
    pub pan: f64,
}

impl Note {
    pub const DEFAULT_VELOCITY: f32 = 0.7;

    pub fn new(start: PatternTime, duration: PatternTime, pitch: Pitch) -> Self {
        Self {
            start,
            duration,
            pitch,
            velocity: Self::DEFAULT_VELOCITY,
            pan: 0.0,
        }
    }

    pub fn with_velocity(mut self, velocity: f32) -> Self {
        self.velocity = velocity.clamp(0.0, 1.0);
        self
    }

    pub fn with_pan(mut self, pan: f64) -> Self {
        self.pan = pan.clamp(-1.0, 1.0);
        self
    }

    pub fn end(&self) -> PatternTime {
        self.start + self.duration
    }
}

/// The notes one channel plays within one pattern. Order is irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteSequence {
    pub notes: Vec<Note>,
}

impl NoteSequence {
    pub fn new(notes: Vec<Note>) -> Self {
        Self { notes }
    }

    pub fn push(&mut self, note: Note) {
        self.notes.push(note);
    }

    pub fn latest_end(&self) -> Option<PatternTime> {
        self.notes.iter().map(Note::end).max()
    }
}

/// A loopable block holding one `NoteSequence` per project channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub sequences: Vec<NoteSequence>,
    /// Shortest loop this pattern will ever have, even when empty.
    pub min_length: PatternTime,
}

impl Pattern {
    pub const DEFAULT_LENGTH: PatternTime = PatternTime::beats(4);

    pub fn new(channel_count: usize) -> Self {
        Self {
            sequences: vec![NoteSequence::default(); channel_count],
            min_length: Self::DEFAULT_LENGTH,
        }
    }

    pub fn sequence(&self, channel: usize) -> Result<&NoteSequence, ProjectError> {
        self.sequences.get(channel).ok_or(ProjectError::ChannelIndexOutOfRange {
            index: channel,
            count: self.sequences.len(),
        })
    }

    pub fn sequence_mut(&mut self, channel: usize) -> Result<&mut NoteSequence, ProjectError> {
        let count = self.sequences.len();
        self.sequences
            .get_mut(channel)
            .ok_or(ProjectError::ChannelIndexOutOfRange { index: channel, count })
    }

    /// Loop length: the later of `min_length` and the last note end over all
    /// channels, rounded up to a whole bar.
    pub fn loop_length(&self) -> PatternTime {
        self.sequences
            .iter()
            .filter_map(NoteSequence::latest_end)
            .fold(self.min_length, PatternTime::max)
            .round_up_to_bar()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub pattern_index: usize,
    /// Where this pattern instance starts in the song, in steps.
    pub song_step_offset: u64,
}

/// Song-mode arrangement of pattern instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub entries: Vec<PlaylistEntry>,
}

impl Default for Playlist {
    fn default() -> Self {
        Self {
            entries: vec![PlaylistEntry {
                pattern_index: 0,
                song_step_offset: 0,
            }],
        }
    }
}

impl Playlist {
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn push(&mut self, pattern_index: usize, song_step_offset: u64) {
        self.entries.push(PlaylistEntry {
            pattern_index,
            song_step_offset,
        });
    }
}

/// Mixer-facing properties of a channel. The renderer itself lives in the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub name: String,
    pub gain: f32,
    pub muted: bool,
}

impl Default for ChannelInfo {
    fn default() -> Self {
        Self {
            name: "New Channel".to_string(),
            gain: 0.7,
            muted: false,
        }
    }
}

impl ChannelInfo {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub channels: Vec<ChannelInfo>,
    pub patterns: Vec<Pattern>,
    pub playlist: Playlist,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            name: "New Project".to_string(),
            channels: Vec::new(),
            patterns: vec![Pattern::new(0)],
            playlist: Playlist::default(),
        }
    }
}

impl Project {
    /// Adds a channel and an empty note sequence for it in every pattern.
    pub fn add_channel(&mut self, info: ChannelInfo) -> usize {
        self.channels.push(info);
        for pattern in &mut self.patterns {
            pattern.sequences.push(NoteSequence::default());
        }
        self.channels.len() - 1
    }

    pub fn add_pattern(&mut self) -> usize {
        self.patterns.push(Pattern::new(self.channels.len()));
        self.patterns.len() - 1
    }

    pub fn pattern(&self, index: usize) -> Result<&Pattern, ProjectError> {
        self.patterns.get(index).ok_or(ProjectError::PatternIndexOutOfRange {
            index,
            count: self.patterns.len(),
        })
    }

    pub fn pattern_mut(&mut self, index: usize) -> Result<&mut Pattern, ProjectError> {
        let count = self.patterns.len();
        self.patterns
            .get_mut(index)
            .ok_or(ProjectError::PatternIndexOutOfRange { index, count })
    }

    /// Fails on the first pattern whose sequence count differs from the channel count.
    pub fn validate(&self) -> Result<(), ProjectError> {
        let expected = self.channels.len();
        for (idx, pattern) in self.patterns.iter().enumerate() {
            if pattern.sequences.len() != expected {
                return Err(ProjectError::SequenceArityMismatch {
                    pattern: idx,
                    expected,
                    found: pattern.sequences.len(),
                });
            }
        }
        for entry in &self.playlist.entries {
            self.pattern(entry.pattern_index)?;
        }
        Ok(())
    }
}
