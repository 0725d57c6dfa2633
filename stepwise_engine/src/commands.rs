use crate::transport::{PlaybackMode, PlaybackStatus};
use crossbeam_channel::Sender;
use std::sync::Arc;

/// Transport commands, drained by the sequencer at the start of each chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerCommand {
    Play,
    Stop,
    SetMode(PlaybackMode),
    SelectPattern(usize),
    /// Moves the loop-relative position and drops all scheduled notes.
    SeekTo(u64),
}

/// Control side of a `Sequencer`, cheap to clone. Commands are
/// fire-and-forget: the chunk being rendered when one is sent may not
/// reflect it yet.
#[derive(Clone)]
pub struct SequencerHandle {
    pub(crate) command_tx: Sender<SequencerCommand>,
    pub(crate) status: Arc<PlaybackStatus>,
}

impl SequencerHandle {
    fn send(&self, command: SequencerCommand) {
        if self.command_tx.send(command).is_err() {
            tracing::warn!("[Sequencer] Not running, dropped {:?}", command);
        }
    }

    pub fn play(&self) {
        self.send(SequencerCommand::Play);
    }

    pub fn stop(&self) {
        self.send(SequencerCommand::Stop);
    }

    pub fn set_mode(&self, mode: PlaybackMode) {
        self.send(SequencerCommand::SetMode(mode));
    }

    pub fn select_pattern(&self, index: usize) {
        self.send(SequencerCommand::SelectPattern(index));
    }

    pub fn seek_to(&self, sample: u64) {
        self.send(SequencerCommand::SeekTo(sample));
    }

    pub fn status(&self) -> &PlaybackStatus {
        &self.status
    }
}
