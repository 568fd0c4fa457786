//! Headphone element descriptions (HED).
//!
//! Binaural rendering hints for one element: head tracking, a 7-bit render
//! mode, and for beds a mask of channels excluded from binauralization.

use crate::model::element::ElementId;
use crate::utils::errors::ModelError;

pub const MAX_RENDER_MODE: u8 = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadphoneDesc {
    pub element_id: ElementId,
    pub head_tracking: bool,
    pub render_mode: u8,
    /// One bit per bed channel; only serialized for bed elements.
    pub channel_mask: u16,
}

impl HeadphoneDesc {
    pub fn new(element_id: ElementId, render_mode: u8) -> Result<Self, ModelError> {
        if render_mode > MAX_RENDER_MODE {
            return Err(ModelError::OutOfRange {
                what: "headphone render mode",
                value: render_mode as f64,
                min: 0.0,
                max: MAX_RENDER_MODE as f64,
            });
        }
        Ok(Self {
            element_id,
            head_tracking: false,
            render_mode,
            channel_mask: u16::MAX,
        })
    }
}
