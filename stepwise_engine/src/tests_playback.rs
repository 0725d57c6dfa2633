use crate::channel::{Instrument, OscillatorSynth, Sampler};
use crate::combiner::AudioStreamCombiner;
use crate::generator::Waveform;
use crate::live::{LiveInput, LiveNotePlayer};
use crate::provider::StreamingDataProvider;
use crate::sequencer::Sequencer;
use crate::session::Session;
use crate::transport::{PlayState, PlaybackMode, Transport};
use crate::SequencerHandle;
use std::sync::Arc;
use stepwise_shared::{ChannelInfo, Note, PatternTime, Pitch, PitchClass, Playlist, TuningSystem};

const BAR: usize = 88_200;
/// 0.7 channel gain at full velocity, as 16-bit PCM.
const SQUARE_LEVEL: i16 = (0.7 * i16::MAX as f32) as i16;

fn square_session(notes: &[(u32, u32)]) -> Session {
    let mut session = Session::default();
    let channel = session.add_channel(
        ChannelInfo::named("Square"),
        OscillatorSynth::new(Waveform::Square),
    );
    let sequence = session.project.pattern_mut(0).unwrap().sequence_mut(channel).unwrap();
    for &(step, len) in notes {
        let note = Note::new(PatternTime::steps(step), PatternTime::steps(len), Pitch::A4);
        sequence.push(note.with_velocity(1.0));
    }
    session
}

fn sequencer(session: Session) -> (Sequencer, SequencerHandle, LiveInput) {
    let (player, input) = LiveNotePlayer::new();
    let (sequencer, handle) = Sequencer::new(session.into_handle(), Transport::default(), player);
    (sequencer, handle, input)
}

fn render(provider: &mut dyn StreamingDataProvider, total: usize, chunk: usize) -> Vec<i16> {
    let mut out = vec![0; total];
    for window in out.chunks_mut(chunk) {
        provider.next_chunk(window);
    }
    out
}

fn sign_changes(samples: &[i16]) -> usize {
    let signs: Vec<bool> = samples.iter().filter(|&&s| s != 0).map(|&s| s > 0).collect();
    signs.windows(2).filter(|w| w[0] != w[1]).count()
}

#[test]
fn test_square_note_renders_at_channel_gain() {
    let (mut seq, _handle, _input) = sequencer(square_session(&[(0, 2)]));
    seq.play();
    let out = render(&mut seq, 22_050, 512);

    // Two steps at 120 BPM: a quarter second.
    let note = &out[..11_025];
    assert!(note.iter().all(|&s| s == 0 || s.abs() == SQUARE_LEVEL));
    let crossings = sign_changes(note);
    assert!((215..=225).contains(&crossings), "{} crossings", crossings);
    assert!(out[11_025..].iter().all(|&s| s == 0));
}

#[test]
fn test_chunk_size_does_not_change_output() {
    let session = square_session(&[(0, 2), (5, 3), (15, 1)]);
    let (mut a, _, _) = sequencer(session.clone());
    let (mut b, _, _) = sequencer(session);
    a.play();
    b.play();
    assert_eq!(render(&mut a, 30_000, 512), render(&mut b, 30_000, 333));
}

#[test]
fn test_pattern_loops_across_chunk_boundary() {
    // One-bar loop, note on the first step only.
    let (mut seq, _handle, _input) = sequencer(square_session(&[(0, 1)]));
    seq.play();
    let out = render(&mut seq, BAR + 10_000, 1_000);

    assert!(out[1..100].iter().all(|&s| s != 0));
    assert!(out[6_000..BAR].iter().all(|&s| s == 0));
    assert!(out[BAR + 1..BAR + 100].iter().all(|&s| s != 0));
    assert_eq!(&out[..5_000], &out[BAR..BAR + 5_000]);
    assert_eq!(seq.loop_position(), (BAR + 10_000) as u64);
}

#[test]
fn test_stop_clears_and_rewinds() {
    let (mut seq, handle, _input) = sequencer(square_session(&[(0, 8)]));
    handle.play();
    render(&mut seq, 4_096, 512);
    assert_eq!(seq.play_state(), PlayState::Playing);
    assert!(handle.status().is_playing());
    assert_eq!(handle.status().position(), 4_096);

    handle.stop();
    let after_stop = render(&mut seq, 1_024, 512);
    assert!(after_stop.iter().all(|&s| s == 0));
    assert_eq!(seq.play_state(), PlayState::Stopped);
    assert_eq!(seq.loop_position(), 0);
    assert_eq!(seq.absolute_clock(), 5_120);
    assert!(seq.channel_states()[0].notes().is_empty());
    assert!(!handle.status().is_playing());

    // Restarts from the top of the pattern, anchored at the current clock.
    handle.play();
    let restarted = render(&mut seq, 512, 512);
    assert!(restarted[1..].iter().all(|&s| s != 0));
}

#[test]
fn test_song_mode_plays_each_entry_once() {
    let mut session = square_session(&[(0, 1)]);
    let second = session.project.add_pattern();
    let a5 = Pitch::new(PitchClass::A, 5).unwrap();
    session.project.pattern_mut(second).unwrap().sequences[0]
        .push(Note::new(PatternTime::ZERO, PatternTime::steps(1), a5).with_velocity(1.0));
    session.project.playlist = Playlist::empty();
    session.project.playlist.push(0, 0);
    session.project.playlist.push(second, 16);
    session.validate().unwrap();

    let (mut seq, handle, _input) = sequencer(session);
    handle.set_mode(PlaybackMode::Song);
    handle.play();
    let out = render(&mut seq, 3 * BAR, 1_024);

    assert!(out[1..100].iter().all(|&s| s != 0));
    assert!(out[6_000..BAR].iter().all(|&s| s == 0));
    // A5 crosses twice as often as A4.
    let first = sign_changes(&out[..5_512]);
    let second = sign_changes(&out[BAR..BAR + 5_512]);
    assert!((second as i64 - 2 * first as i64).abs() <= 2, "{} vs {}", first, second);
    assert!(out[BAR + 6_000..].iter().all(|&s| s == 0));
}

#[test]
fn test_missing_pattern_keeps_live_notes() {
    let (mut seq, handle, input) = sequencer(square_session(&[(0, 1)]));
    handle.select_pattern(7);
    handle.play();
    input.add_key_event(0, Pitch::A4, true);
    let out = render(&mut seq, 2_048, 512);
    assert!(out[100..].iter().any(|&s| s != 0));
}

#[test]
fn test_live_key_while_stopped() {
    let (mut seq, _handle, input) = sequencer(square_session(&[]));
    assert!(render(&mut seq, 1_024, 512).iter().all(|&s| s == 0));

    input.add_key_event(0, Pitch::A4, true);
    let held = render(&mut seq, 4_096, 512);
    assert!(held[100..].iter().any(|&s| s != 0));
    assert!(input.is_key_pressed(0, Pitch::A4));

    input.add_key_event(0, Pitch::A4, false);
    render(&mut seq, 512, 512);
    assert!(!input.is_key_pressed(0, Pitch::A4));
    let released = render(&mut seq, 2_048, 512);
    assert!(released.iter().all(|&s| s == 0));
}

#[test]
fn test_failed_channel_is_silent_others_play() {
    let mut session = square_session(&[(0, 4)]);
    // Second channel without a note sequence in the pattern.
    session.project.channels.push(ChannelInfo::named("Broken"));
    session.instruments.push(Instrument::from(Sampler::new(Arc::new(vec![0.5; 100_000]))));
    assert!(session.validate().is_err());

    let (mut seq, _handle, input) = sequencer(session);
    input.add_key_event(1, Pitch::MIDDLE_C, true);
    seq.play();
    let out = render(&mut seq, 8_192, 512);

    assert!(out.iter().all(|&s| s == 0 || s.abs() == SQUARE_LEVEL));
    assert!(out.iter().any(|&s| s != 0));
}

#[test]
fn test_combined_sequencers_mix_with_gain() {
    let session = square_session(&[(0, 2), (8, 2)]);
    let (mut reference, _, _) = sequencer(session.clone());
    reference.play();
    let expected = render(&mut reference, 20_000, 500);

    let mut combiner = AudioStreamCombiner::new();
    combiner.gain = 0.5;
    for _ in 0..2 {
        let (mut seq, _, _) = sequencer(session.clone());
        seq.play();
        combiner.add(Box::new(seq));
    }
    let mut outer = AudioStreamCombiner::new();
    outer.add(Box::new(combiner));
    assert_eq!(render(&mut outer, 20_000, 500), expected);
}

fn sequencer_with_transport(session: Session, transport: &Transport) -> (Sequencer, LiveInput) {
    let (player, input) = LiveNotePlayer::new();
    let (sequencer, _handle) = Sequencer::new(session.into_handle(), transport.clone(), player);
    (sequencer, input)
}

#[test]
fn test_bpm_change_applies_next_chunk() {
    let transport = Transport::default();
    let (mut seq, _input) = sequencer_with_transport(square_session(&[(0, 1)]), &transport);
    seq.play();
    transport.set_bpm(240.0);
    let out = render(&mut seq, BAR, 1_000);
    // Loop is half as long at double tempo.
    assert!(out[BAR / 2 + 1..BAR / 2 + 100].iter().all(|&s| s != 0));
}

#[test]
fn test_key_release_after_tempo_change_is_silent() {
    let transport = Transport::default();
    let (mut seq, input) = sequencer_with_transport(square_session(&[]), &transport);
    render(&mut seq, 44_100, 441);

    input.add_key_event(0, Pitch::A4, true);
    let pressed = render(&mut seq, 441, 441);
    assert!(pressed[1..].iter().all(|&s| s != 0));

    transport.set_bpm(240.0);
    let held = render(&mut seq, 88_200 - 44_541, 441);
    assert!(held.iter().any(|&s| s != 0));
    assert_eq!(seq.absolute_clock(), 88_200);

    input.add_key_event(0, Pitch::A4, false);
    let release_chunk = render(&mut seq, 441, 441);
    assert_eq!(seq.channel_states()[0].notes()[0].end_sample(), 88_200);
    let after = render(&mut seq, 22_050, 441);
    assert!(release_chunk.iter().chain(&after).all(|&s| s == 0));
    assert!(seq.channel_states()[0].notes().is_empty());
}

#[test]
fn test_live_notes_follow_sequencer_tuning() {
    struct Octave;
    impl TuningSystem for Octave {
        fn frequency(&self, pitch: Pitch) -> f64 {
            2.0 * stepwise_shared::EqualTemperament.frequency(pitch)
        }
    }

    let (mut seq, _handle, input) = sequencer(square_session(&[]));
    seq.set_tuning(Box::new(Octave));
    input.add_key_event(0, Pitch::A4, true);
    render(&mut seq, 512, 512);
    assert_eq!(seq.channel_states()[0].notes()[0].frequency, 880.0);
}
