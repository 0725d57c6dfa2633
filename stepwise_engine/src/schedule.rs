//! Pattern scheduling: turns the notes of a pattern that start inside a
//! sample window into materialized notes on a channel.

use crate::channel_state::{ChannelState, MaterializedNote};
use stepwise_shared::{Pattern, ProjectError, TransportConfig, TuningSystem};

/// The window to schedule and where it sits on the absolute clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleWindow {
    /// Position on the pattern (or song) timeline.
    pub start: u64,
    pub sample_count: u64,
    /// Absolute clock minus `start`, added to every materialized note.
    /// Wraps when the timeline is ahead of the clock (after a forward seek).
    pub playback_offset: u64,
    /// Where the pattern begins on the timeline (song mode).
    pub pattern_offset: u64,
    /// Loop the pattern (pattern mode) or play it once (song mode).
    pub wrap: bool,
}

pub trait ScheduleNotes {
    /// Materializes every note of `channel` that starts inside the window
    /// into `state`, returning how many were added.
    fn schedule_notes(
        &self,
        channel: usize,
        window: &ScheduleWindow,
        state: &mut ChannelState,
        transport: &TransportConfig,
        tuning: &dyn TuningSystem,
    ) -> Result<usize, ProjectError>;
}

impl ScheduleNotes for Pattern {
    fn schedule_notes(
        &self,
        channel: usize,
        window: &ScheduleWindow,
        state: &mut ChannelState,
        transport: &TransportConfig,
        tuning: &dyn TuningSystem,
    ) -> Result<usize, ProjectError> {
        let sequence = self.sequence(channel)?;
        let mut added = 0;

        let materialize = |note: &stepwise_shared::Note, anchor: u64, state: &mut ChannelState| {
            state.add_note(
                MaterializedNote::new(
                    tuning.frequency(note.pitch),
                    anchor,
                    note.duration.to_sample_index(transport),
                    note.velocity,
                    note.pan,
                ),
            );
        };

        if !window.wrap {
            let end = window.start + window.sample_count;
            for note in &sequence.notes {
                let position = note.start.to_sample_index(transport) + window.pattern_offset;
                if position >= window.start && position < end {
                    materialize(note, window.playback_offset.wrapping_add(position), state);
                    added += 1;
                }
            }
            return Ok(added);
        }

        let loop_len = self.loop_length().to_sample_index(transport);
        if loop_len == 0 {
            return Ok(0);
        }

        let mut segment_start = window.start;
        let mut remaining = window.sample_count;
        let max_segments = window.sample_count.div_ceil(loop_len) + 1;
        for _ in 0..max_segments {
            if remaining == 0 {
                break;
            }
            let wrapped_start = segment_start % loop_len;
            let wrap_offset = segment_start - wrapped_start;
            let segment_len = remaining.min(loop_len - wrapped_start);
            let segment_end = wrapped_start + segment_len;

            for note in &sequence.notes {
                let position = note.start.to_sample_index(transport) + window.pattern_offset;
                if position >= wrapped_start && position < segment_end {
                    let anchor = window.playback_offset.wrapping_add(wrap_offset + position);
                    materialize(note, anchor, state);
                    added += 1;
                }
            }

            segment_start += segment_len;
            remaining -= segment_len;
        }
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_shared::{EqualTemperament, Note, PatternTime, Pitch};

    fn transport() -> TransportConfig {
        TransportConfig::new(44_100, 120.0)
    }

    /// Two-bar pattern (176 400 samples) with notes at steps 0, 5 and 31.
    fn pattern() -> Pattern {
        let mut pattern = Pattern::new(1);
        for step in [0, 5, 31] {
            let note = Note::new(PatternTime::steps(step), PatternTime::steps(1), Pitch::A4);
            pattern.sequences[0].push(note);
        }
        pattern
    }

    fn window(start: u64, sample_count: u64) -> ScheduleWindow {
        ScheduleWindow {
            start,
            sample_count,
            playback_offset: 0,
            pattern_offset: 0,
            wrap: true,
        }
    }

    fn starts(state: &ChannelState) -> Vec<u64> {
        state.notes().iter().map(|n| n.start_sample).collect()
    }

    #[test]
    fn test_window_inside_one_loop() {
        let t = transport();
        let mut state = ChannelState::new();
        let added = pattern()
            .schedule_notes(0, &window(0, 30_000), &mut state, &t, &EqualTemperament)
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(starts(&state), vec![0, PatternTime::steps(5).to_sample_index(&t)]);
        assert_eq!(state.notes()[0].sample_count, 5_512);
        assert_eq!(state.notes()[0].frequency, 440.0);
    }

    #[test]
    fn test_window_across_loop_boundary() {
        let t = transport();
        let p = pattern();
        let loop_len = p.loop_length().to_sample_index(&t);
        assert_eq!(loop_len, 176_400);

        let last = PatternTime::steps(31).to_sample_index(&t);
        let mut state = ChannelState::new();
        p.schedule_notes(0, &window(last - 100, 10_000), &mut state, &t, &EqualTemperament)
            .unwrap();
        // Tail of the first loop, then the head of the second.
        assert_eq!(starts(&state), vec![last, loop_len]);
    }

    #[test]
    fn test_playback_offset_applies_to_every_segment() {
        let t = transport();
        let p = pattern();
        let loop_len = p.loop_length().to_sample_index(&t);
        let mut state = ChannelState::new();
        let w = ScheduleWindow {
            playback_offset: 1_000_000,
            ..window(loop_len - 100, 300)
        };
        p.schedule_notes(0, &w, &mut state, &t, &EqualTemperament).unwrap();
        assert_eq!(starts(&state), vec![1_000_000 + loop_len]);
    }

    #[test]
    fn test_window_spanning_several_loops() {
        let t = transport();
        let p = pattern();
        let loop_len = p.loop_length().to_sample_index(&t);
        let mut state = ChannelState::new();
        let added = p
            .schedule_notes(0, &window(10, loop_len * 3), &mut state, &t, &EqualTemperament)
            .unwrap();
        // Steps 5 and 31 three times, step 0 of loops two to four.
        assert_eq!(added, 9);
        assert_eq!(starts(&state).last(), Some(&(loop_len * 3)));
    }

    #[test]
    fn test_song_mode_does_not_wrap() {
        let t = transport();
        let p = pattern();
        let loop_len = p.loop_length().to_sample_index(&t);
        let mut state = ChannelState::new();
        let w = ScheduleWindow {
            start: loop_len - 100,
            sample_count: 300,
            playback_offset: 0,
            pattern_offset: 0,
            wrap: false,
        };
        assert_eq!(p.schedule_notes(0, &w, &mut state, &t, &EqualTemperament).unwrap(), 0);

        // Pattern placed one loop into the song picks its first note up here.
        let w = ScheduleWindow { pattern_offset: loop_len, ..w };
        p.schedule_notes(0, &w, &mut state, &t, &EqualTemperament).unwrap();
        assert_eq!(starts(&state), vec![loop_len]);
    }

    #[test]
    fn test_channel_out_of_range() {
        let mut state = ChannelState::new();
        let result = pattern().schedule_notes(
            4,
            &window(0, 100),
            &mut state,
            &transport(),
            &EqualTemperament,
        );
        assert_eq!(result, Err(ProjectError::ChannelIndexOutOfRange { index: 4, count: 1 }));
    }

    #[test]
    fn test_random_tilings_schedule_each_note_once_per_loop() {
        let transports = [transport(), TransportConfig::new(48_000, 133.0)];
        let mut rng = fastrand::Rng::with_seed(42);
        let mut p = pattern();
        let note = Note::new(PatternTime::new(17, 13), PatternTime::steps(2), Pitch::MIDDLE_C);
        p.sequences[0].push(note);

        for t in &transports {
            let loop_len = p.loop_length().to_sample_index(t);
            for _ in 0..50 {
                let loops = rng.u64(1..5);
                let total = loop_len * loops;
                let mut state = ChannelState::new();
                let mut position = 0;
                while position < total {
                    let len = rng.u64(1..loop_len / 2).min(total - position);
                    p.schedule_notes(0, &window(position, len), &mut state, t, &EqualTemperament)
                        .unwrap();
                    position += len;
                }

                let mut got = starts(&state);
                got.sort_unstable();
                let mut expected: Vec<u64> = (0..loops)
                    .flat_map(|l| {
                        p.sequences[0]
                            .notes
                            .iter()
                            .map(move |n| l * loop_len + n.start.to_sample_index(t))
                    })
                    .collect();
                expected.sort_unstable();
                assert_eq!(got, expected);
            }
        }
    }
}
