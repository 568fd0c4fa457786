//! Presentation loudness records (ETSI TS 103 190-1, 4.2.14.3).
//!
//! Every measurement is optional on the wire; absence is modelled as `None`
//! rather than an options bitmask, so an absent field cannot be read.

use crate::model::presentation::PresentationId;
use crate::utils::errors::ModelError;

/// Loudness regulation compliance practice, 4-bit coded. Codes 5..=13 are
/// reserved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum LoudnessPractice {
    #[default]
    NotIndicated = 0,
    Atsc = 1,
    Ebu = 2,
    Arib = 3,
    FreeTv = 4,
    Manual = 14,
    ConsumerLeveller = 15,
}

impl LoudnessPractice {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::NotIndicated),
            1 => Some(Self::Atsc),
            2 => Some(Self::Ebu),
            3 => Some(Self::Arib),
            4 => Some(Self::FreeTv),
            14 => Some(Self::Manual),
            15 => Some(Self::ConsumerLeveller),
            _ => None,
        }
    }
}

/// Dialogue gating practice, 3-bit coded. Codes 4..=7 are reserved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum DialgatePractice {
    #[default]
    NotIndicated = 0,
    Center = 1,
    Front = 2,
    Manual = 3,
}

impl DialgatePractice {
    pub fn from_code(code: u8) -> Option<Self> {
        (code <= 3).then(|| unsafe { std::mem::transmute::<u8, DialgatePractice>(code) })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum CorrectionType {
    /// Corrected with infinite lookahead.
    #[default]
    FileBased = 0,
    /// Corrected with finite lookahead.
    Realtime = 1,
}

/// Loudness range practice per EBU Tech 3342, 3-bit coded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum LraPractice {
    #[default]
    Tech3342v1 = 0,
    Tech3342v2 = 1,
}

impl LraPractice {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Tech3342v1),
            1 => Some(Self::Tech3342v2),
            _ => None,
        }
    }
}

/// Frames to the next, or since the previous, programme boundary, expressed
/// as a power of two. Magnitude 1..=9 covers 2..=512 frames; negative means
/// "since previous".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgrammeBoundary {
    pub log2_frames: i8,
    /// Sample offset to the boundary, 11-bit.
    pub offset: Option<u16>,
}

impl ProgrammeBoundary {
    pub fn new(log2_frames: i8, offset: Option<u16>) -> Result<Self, ModelError> {
        if log2_frames == 0 || !(-9..=9).contains(&log2_frames) {
            return Err(ModelError::OutOfRange {
                what: "programme boundary",
                value: log2_frames as f64,
                min: -9.0,
                max: 9.0,
            });
        }
        Ok(Self { log2_frames, offset })
    }
}

/// Arbitrary extension bits carried verbatim at the end of a loudness record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionBits {
    pub bits: usize,
    /// Packed MSB-first, final partial byte zero padded.
    pub data: Vec<u8>,
}

/// Loudness measurements for one presentation. All LUFS fields and the LRA
/// field hold wire codes (see [`crate::utils::codecs`]).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Loudness {
    pub presid: PresentationId,
    pub practice: LoudnessPractice,
    /// Only meaningful when `practice` is indicated.
    pub dialgate: Option<DialgatePractice>,
    pub correction: CorrectionType,
    pub relative_gated: Option<u16>,
    /// Speech-gated value plus the gating practice used to measure it.
    pub speech_gated: Option<(u16, DialgatePractice)>,
    pub short_term_3s: Option<u16>,
    pub max_short_term_3s: Option<u16>,
    pub true_peak: Option<u16>,
    pub max_true_peak: Option<u16>,
    pub boundary: Option<ProgrammeBoundary>,
    pub lra: Option<(u16, LraPractice)>,
    pub momentary: Option<u16>,
    pub max_momentary: Option<u16>,
    pub extension: Option<ExtensionBits>,
}

impl Loudness {
    pub fn new(presid: PresentationId, practice: LoudnessPractice) -> Self {
        Self {
            presid,
            practice,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_practice_codes_rejected() {
        assert_eq!(LoudnessPractice::from_code(4), Some(LoudnessPractice::FreeTv));
        for code in 5..=13 {
            assert_eq!(LoudnessPractice::from_code(code), None);
        }
        assert_eq!(
            LoudnessPractice::from_code(14),
            Some(LoudnessPractice::Manual)
        );
        assert_eq!(DialgatePractice::from_code(4), None);
        assert_eq!(LraPractice::from_code(2), None);
    }

    #[test]
    fn boundary_magnitude_is_bounded() {
        assert!(ProgrammeBoundary::new(9, None).is_ok());
        assert!(ProgrammeBoundary::new(-9, Some(100)).is_ok());
        assert!(ProgrammeBoundary::new(0, None).is_err());
        assert!(ProgrammeBoundary::new(10, None).is_err());
    }
}
