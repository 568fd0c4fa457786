//! ED2 turnarounds (ETD).
//!
//! A turnaround maps presentations to encoder parameter records for
//! re-delivery of a legacy format: an ED2 side, a DE side, or both.

use crate::model::eep::EepId;
use crate::model::esd::FrameRate;
use crate::model::presentation::PresentationId;
use crate::utils::errors::ModelError;

pub type EtdId = u8;

/// Most (presentation, eep) pairs per turnaround side.
pub const MAX_TURNAROUND_PAIRS: usize = 15;

/// One presentation paired with the encoder parameters used to turn it
/// around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnaroundPair {
    pub presid: PresentationId,
    pub eepid: EepId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ed2Turnaround {
    pub rate: FrameRate,
    pub pairs: Vec<TurnaroundPair>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeTurnaround {
    pub rate: FrameRate,
    /// DE program config, 5-bit coded.
    pub pgm_config: u8,
    pub pairs: Vec<TurnaroundPair>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Turnaround {
    pub id: EtdId,
    pub ed2: Option<Ed2Turnaround>,
    pub de: Option<DeTurnaround>,
}

impl Turnaround {
    pub fn new(id: EtdId) -> Self {
        Self {
            id,
            ed2: None,
            de: None,
        }
    }

    pub fn set_ed2(
        &mut self,
        rate: FrameRate,
        pairs: Vec<TurnaroundPair>,
    ) -> Result<(), ModelError> {
        check_pairs(&pairs)?;
        if !rate.valid_for_ed2() {
            return Err(ModelError::OutOfRange {
                what: "ED2 turnaround frame rate code",
                value: rate as u8 as f64,
                min: 0.0,
                max: 4.0,
            });
        }
        self.ed2 = Some(Ed2Turnaround { rate, pairs });
        Ok(())
    }

    pub fn set_de(
        &mut self,
        rate: FrameRate,
        pgm_config: u8,
        pairs: Vec<TurnaroundPair>,
    ) -> Result<(), ModelError> {
        check_pairs(&pairs)?;
        if pgm_config > crate::model::esd::MAX_DE_PROGRAM_CONFIG {
            return Err(ModelError::OutOfRange {
                what: "DE program config",
                value: pgm_config as f64,
                min: 0.0,
                max: crate::model::esd::MAX_DE_PROGRAM_CONFIG as f64,
            });
        }
        self.de = Some(DeTurnaround {
            rate,
            pgm_config,
            pairs,
        });
        Ok(())
    }
}

fn check_pairs(pairs: &[TurnaroundPair]) -> Result<(), ModelError> {
    if pairs.is_empty() || pairs.len() > MAX_TURNAROUND_PAIRS {
        return Err(ModelError::OutOfRange {
            what: "turnaround pair count",
            value: pairs.len() as f64,
            min: 1.0,
            max: MAX_TURNAROUND_PAIRS as f64,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sides_are_validated() {
        let mut etd = Turnaround::new(1);
        let pair = TurnaroundPair { presid: 1, eepid: 2 };

        assert!(etd.set_ed2(FrameRate::Fps2500, vec![pair]).is_ok());
        assert!(etd.set_ed2(FrameRate::Fps5000, vec![pair]).is_err());
        assert!(etd.set_ed2(FrameRate::Fps2500, vec![]).is_err());
        assert!(
            etd.set_ed2(FrameRate::Fps2500, vec![pair; 16]).is_err()
        );

        assert!(etd.set_de(FrameRate::Fps2997, 11, vec![pair]).is_ok());
        assert!(etd.set_de(FrameRate::Fps2997, 24, vec![pair]).is_err());
    }
}
