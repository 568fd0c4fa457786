//! Timestamped position updates for dynamic objects.
//!
//! Updates accumulate sorted by timestamp and are applied in one pass at a
//! frame boundary. Timestamps are quantized to 32-sample ticks of the frame.

use crate::utils::codecs;
use crate::utils::errors::ModelError;

/// Update times count 32-sample blocks and travel as a 6-bit field.
pub const MAX_UPDATE_TIME: u16 = 63;

/// One pending position overwrite for the object at `element_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Update {
    /// Time in 32-sample ticks from the start of the frame.
    pub time: u16,
    /// Dense index into the element table; always an object slot.
    pub element_index: u16,
    pub x: u16,
    pub y: u16,
    pub z: u16,
}

impl Update {
    pub fn new(
        time: u16,
        element_index: u16,
        x: f32,
        y: f32,
        z: f32,
    ) -> Result<Self, ModelError> {
        if time > MAX_UPDATE_TIME {
            return Err(ModelError::UpdateTimeTooLarge {
                time,
                max: MAX_UPDATE_TIME,
            });
        }
        Ok(Self {
            time,
            element_index,
            x: codecs::encode_position(x)?,
            y: codecs::encode_position(y)?,
            z: codecs::encode_position(z)?,
        })
    }

    pub fn position(&self) -> (f32, f32, f32) {
        (
            codecs::decode_position(self.x),
            codecs::decode_position(self.y),
            codecs::decode_position(self.z),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_is_bounded() {
        assert!(Update::new(63, 0, 0.0, 0.0, 0.0).is_ok());
        assert!(matches!(
            Update::new(64, 0, 0.0, 0.0, 0.0),
            Err(ModelError::UpdateTimeTooLarge { time: 64, max: 63 })
        ));
    }

    #[test]
    fn position_round_trips() -> anyhow::Result<()> {
        let u = Update::new(5, 2, -1.0, 0.25, 1.0)?;
        let (x, y, z) = u.position();
        assert!((x - -1.0).abs() < 1e-3);
        assert!((y - 0.25).abs() < 1e-3);
        assert!((z - 1.0).abs() < 1e-3);
        Ok(())
    }
}
