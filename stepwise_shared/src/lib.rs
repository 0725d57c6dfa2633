pub mod pitch;
pub mod project;
pub mod time;

pub use pitch::{EqualTemperament, Pitch, PitchClass, TuningSystem};
pub use project::{ChannelInfo, Note, NoteSequence, Pattern, Playlist, PlaylistEntry, Project};
pub use time::{PatternTime, TransportConfig};

use thiserror::Error;

/// Errors raised while building or indexing into project data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectError {
    #[error("octave {0} is out of range (0-10)")]
    OctaveOutOfRange(u32),
    #[error("channel index {index} out of range ({count} channels)")]
    ChannelIndexOutOfRange { index: usize, count: usize },
    #[error("pattern index {index} out of range ({count} patterns)")]
    PatternIndexOutOfRange { index: usize, count: usize },
    /// A pattern does not hold exactly one note sequence per channel.
    #[error("pattern {pattern} has {found} note sequences but the project has {expected} channels")]
    SequenceArityMismatch {
        pattern: usize,
        expected: usize,
        found: usize,
    },
    #[error("{renderers} channel renderers for {channels} channels")]
    RendererCountMismatch { channels: usize, renderers: usize },
}

/// Default engine sample rate (mono 16-bit output).
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
pub const DEFAULT_BPM: f64 = 120.0;
