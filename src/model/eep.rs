//! EAC3 encoding parameters (EEP).
//!
//! Guides a downstream DD(+) encode for a set of presentations. The three
//! optional blocks (encoder, bitstream, DRC) map to presence bits on the
//! wire, realized here as `Option` fields.

use crate::model::presentation::PresentationId;
use crate::utils::errors::ModelError;

pub type EepId = u8;

/// Most presentations one EEP record can affect.
pub const MAX_EEP_PRESENTATIONS: usize = 15;

/// Compression profile, 3-bit coded. Codes 6 and 7 are reserved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionMode {
    #[default]
    None = 0,
    FilmStandard = 1,
    FilmLight = 2,
    MusicStandard = 3,
    MusicLight = 4,
    Speech = 5,
}

impl CompressionMode {
    pub fn from_code(code: u8) -> Option<Self> {
        (code <= 5).then(|| unsafe { std::mem::transmute::<u8, CompressionMode>(code) })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncoderBlock {
    /// Compression profile for dynrng DRC gain words.
    pub dynrng_prof: CompressionMode,
    /// RF mode (heavy) compression profile.
    pub compr_prof: CompressionMode,
    pub surround90: bool,
    /// Heights downmix level, 5-bit.
    pub hmixlev: u8,
}

/// Legacy BSI fields, all raw wire codes: bsmod 3-bit, dsurmod 2-bit,
/// dialnorm 5-bit, downmix preferences and levels 2/3-bit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BitstreamBlock {
    pub bsmod: u8,
    pub dsurmod: u8,
    pub dialnorm: u8,
    pub dmixmod: u8,
    pub ltrtcmixlev: u8,
    pub ltrtsurmixlev: u8,
    pub lorocmixlev: u8,
    pub lorosurmixlev: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrcBlock {
    pub port_speaker: CompressionMode,
    pub port_headphone: CompressionMode,
    pub flat_panel: CompressionMode,
    pub home_theatre: CompressionMode,
    pub ddplus: CompressionMode,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncoderParams {
    pub id: EepId,
    pub encoder: Option<EncoderBlock>,
    pub bitstream: Option<BitstreamBlock>,
    pub drc: Option<DrcBlock>,
    presentations: Vec<PresentationId>,
}

impl EncoderParams {
    pub fn new(id: EepId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn add_presentation(&mut self, presid: PresentationId) -> Result<(), ModelError> {
        if self.presentations.len() == MAX_EEP_PRESENTATIONS {
            return Err(ModelError::OutOfRange {
                what: "EEP presentation count",
                value: (MAX_EEP_PRESENTATIONS + 1) as f64,
                min: 0.0,
                max: MAX_EEP_PRESENTATIONS as f64,
            });
        }
        self.presentations.push(presid);
        Ok(())
    }

    pub fn presentations(&self) -> &[PresentationId] {
        &self.presentations
    }
}
