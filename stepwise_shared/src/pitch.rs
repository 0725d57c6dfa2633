use crate::ProjectError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PitchClass {
    C = 0,
    CSharp = 1,
    D = 2,
    DSharp = 3,
    E = 4,
    F = 5,
    FSharp = 6,
    G = 7,
    GSharp = 8,
    A = 9,
    ASharp = 10,
    B = 11,
}

impl PitchClass {
    pub const DFLAT: PitchClass = PitchClass::CSharp;
    pub const EFLAT: PitchClass = PitchClass::DSharp;
    pub const GFLAT: PitchClass = PitchClass::FSharp;
    pub const AFLAT: PitchClass = PitchClass::GSharp;
    pub const BFLAT: PitchClass = PitchClass::ASharp;

    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    pub fn from_index(idx: u8) -> PitchClass {
        Self::ALL[(idx % 12) as usize]
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }
}

/// Semitone pitch, twelve per octave, counted up from octave 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pitch(u8);

pub const MAX_OCTAVE: u32 = 10;

impl Pitch {
    /// C4
    pub const MIDDLE_C: Pitch = Pitch(48);
    pub const A4: Pitch = Pitch(57);

    pub fn new(class: PitchClass, octave: u32) -> Result<Pitch, ProjectError> {
        if octave > MAX_OCTAVE {
            return Err(ProjectError::OctaveOutOfRange(octave));
        }
        Ok(Pitch((octave * 12 + class as u32) as u8))
    }

    pub const fn from_value(value: u8) -> Pitch {
        Pitch(value)
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn pitch_class(&self) -> PitchClass {
        PitchClass::from_index(self.0)
    }

    pub fn octave(&self) -> u32 {
        self.0 as u32 / 12
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class().symbol(), self.octave())
    }
}

/// Maps pitches to frequencies in Hz.
pub trait TuningSystem: Send + Sync {
    fn frequency(&self, pitch: Pitch) -> f64;
}

/// Twelve-tone equal temperament anchored at A4 = 440 Hz.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualTemperament;

impl EqualTemperament {
    pub const REFERENCE_PITCH: u8 = 57;
    pub const REFERENCE_FREQUENCY: f64 = 440.0;
}

impl TuningSystem for EqualTemperament {
    fn frequency(&self, pitch: Pitch) -> f64 {
        let diff = pitch.value() as i32 - Self::REFERENCE_PITCH as i32;
        Self::REFERENCE_FREQUENCY * 2.0_f64.powf(diff as f64 / 12.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_a4_is_440hz() {
        let a4 = Pitch::new(PitchClass::A, 4).unwrap();
        assert_eq!(a4.value(), 57);
        assert_eq!(EqualTemperament.frequency(a4), 440.0);
    }

    #[test]
    fn test_a0() {
        let a0 = Pitch::new(PitchClass::A, 0).unwrap();
        assert_eq!(a0.value(), 9);
        assert!((EqualTemperament.frequency(a0) - 27.5).abs() < 1e-7);
    }

    #[test]
    fn test_c4() {
        let c4 = Pitch::new(PitchClass::C, 4).unwrap();
        assert_eq!(c4, Pitch::MIDDLE_C);
        assert!((EqualTemperament.frequency(c4) - 261.626).abs() < 1e-3);
    }

    #[test]
    fn test_octaves_double_frequency() {
        for class in PitchClass::ALL {
            let mut frequency = EqualTemperament.frequency(Pitch::new(class, 0).unwrap());
            for octave in 1..=MAX_OCTAVE {
                let next = EqualTemperament.frequency(Pitch::new(class, octave).unwrap());
                assert!((next - 2.0 * frequency).abs() < 1e-3, "{:?}{}", class, octave);
                frequency = next;
            }
        }
    }

    #[test]
    fn test_octave_out_of_range() {
        assert_eq!(
            Pitch::new(PitchClass::C, 11),
            Err(ProjectError::OctaveOutOfRange(11))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Pitch::new(PitchClass::CSharp, 3).unwrap().to_string(), "C#3");
        assert_eq!(Pitch::A4.to_string(), "A4");
        assert_eq!(Pitch::new(PitchClass::BFLAT, 2).unwrap().pitch_class(), PitchClass::ASharp);
    }
}
