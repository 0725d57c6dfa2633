use crate::channel::{Instrument, MultiOscillatorSynth, OscillatorSynth, Sampler};
use crate::generator::Waveform;
use arc_swap::ArcSwap;
use std::sync::Arc;
use stepwise_shared::{ChannelInfo, Note, PatternTime, Pitch, PitchClass, Project, ProjectError};

/// Shared, swappable session. Editors clone, modify and store; the audio
/// thread loads it once per chunk.
pub type SessionHandle = Arc<ArcSwap<Session>>;

/// A project plus the renderer for each of its channels.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub project: Project,
    pub instruments: Vec<Instrument>,
}

impl Session {
    pub fn new(project: Project, instruments: Vec<Instrument>) -> Result<Self, ProjectError> {
        let session = Self { project, instruments };
        session.validate()?;
        Ok(session)
    }

    pub fn into_handle(self) -> SessionHandle {
        Arc::new(ArcSwap::from_pointee(self))
    }

    pub fn add_channel(&mut self, info: ChannelInfo, instrument: impl Into<Instrument>) -> usize {
        self.instruments.push(instrument.into());
        self.project.add_channel(info)
    }

    pub fn channel_count(&self) -> usize {
        self.project.channels.len()
    }

    pub fn validate(&self) -> Result<(), ProjectError> {
        if self.instruments.len() != self.project.channels.len() {
            return Err(ProjectError::RendererCountMismatch {
                channels: self.project.channels.len(),
                renderers: self.instruments.len(),
            });
        }
        self.project.validate()
    }

    /// The stock two-bar demo: square bass, saw and sine leads, and a kick
    /// on every beat when a kick sampler is supplied.
    pub fn demo(kick: Option<Sampler>) -> Result<Self, ProjectError> {
        use PitchClass::*;

        let mut session = Session::default();
        session.project.name = "Demo".to_string();
        let bass = session.add_channel(
            ChannelInfo::named("Bass"),
            OscillatorSynth::new(Waveform::Square),
        );
        let saw = session.add_channel(
            ChannelInfo::named("Saw Lead"),
            OscillatorSynth::new(Waveform::Sawtooth),
        );
        let sine = session.add_channel(
            ChannelInfo::named("Sine Lead"),
            MultiOscillatorSynth::default(),
        );

        let notes = |list: &[(u32, u32, PitchClass, u32)]| -> Result<Vec<Note>, ProjectError> {
            list.iter()
                .map(|&(step, len, class, octave)| -> Result<Note, ProjectError> {
                    let pitch = Pitch::new(class, octave)?;
                    Ok(Note::new(PatternTime::steps(step), PatternTime::steps(len), pitch))
                })
                .collect()
        };

        let pattern = session.project.pattern_mut(0)?;
        pattern.sequence_mut(bass)?.notes = notes(&[
            (2, 2, A, 2),
            (6, 2, A, 2),
            (10, 2, A, 2),
            (14, 1, A, 2),
            (15, 1, A, 3),
            (18, 2, A, 2),
            (22, 2, A, 2),
            (26, 2, A, 2),
            (30, 1, A, 2),
            (31, 1, A, 3),
        ])?;
        pattern.sequence_mut(saw)?.notes = notes(&[
            (0, 2, CSharp, 4),
            (4, 2, E, 4),
            (8, 2, CSharp, 4),
            (12, 2, E, 4),
            (14, 1, FSharp, 4),
            (15, 1, G, 4),
            (18, 1, G, 4),
            (20, 1, G, 4),
            (22, 1, G, 4),
            (24, 3, FSharp, 4),
            (28, 3, E, 4),
        ])?;
        pattern.sequence_mut(sine)?.notes = notes(&[
            (0, 2, CSharp, 6),
            (4, 2, E, 6),
            (8, 2, CSharp, 6),
            (12, 2, E, 6),
            (14, 1, FSharp, 6),
            (15, 1, G, 6),
            (18, 1, G, 6),
            (20, 1, G, 6),
            (22, 1, G, 6),
            (24, 3, A, 6),
            (28, 1, E, 6),
            (29, 1, D, 6),
            (30, 1, CSharp, 6),
            (31, 1, B, 5),
        ])?;

        if let Some(kick) = kick {
            let info = ChannelInfo {
                gain: 0.85,
                ..ChannelInfo::named("Kick")
            };
            let channel = session.add_channel(info, kick);
            let pattern = session.project.pattern_mut(0)?;
            pattern.sequence_mut(channel)?.notes = (0..8)
                .map(|beat| {
                    Note::new(PatternTime::beats(beat), PatternTime::steps(2), Pitch::MIDDLE_C)
                })
                .collect();
        }

        session.validate()?;
        Ok(session)
    }
}
