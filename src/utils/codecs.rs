//! Numeric codecs mapping physical units to fixed-width wire codes.
//!
//! Each pair is total over its documented domain: `encode` rejects
//! out-of-range physical values *before* any bit manipulation, `decode` is
//! defined for every non-reserved code. Quantization steps are part of the
//! stable wire contract:
//!
//! | quantity  | bits | encoding                               |
//! |-----------|------|----------------------------------------|
//! | position  | 10   | `1 + round(((v+1)/2) * 0x3FE)`, 0 rsvd |
//! | gain      |  6   | `(db + 25.5) / 0.5`, 0 = -inf          |
//! | size      |  5   | `round(v * 31)`                        |
//! | LUFS      | 11   | `1024 + round(v * 10)`                 |
//! | LRA       | 10   | `round(lu * 10)`                       |
//! | dialnorm  |  5   | integer 0..=31                         |

use crate::utils::errors::ModelError;

pub const POSITION_MIN: f32 = -1.0;
pub const POSITION_MAX: f32 = 1.0;

/// Position code 0 is reserved on the wire.
pub const POSITION_CODE_RESERVED: u16 = 0;
/// Code for physical 0.0, the room center.
pub const POSITION_CODE_CENTER: u16 = 0x200;
pub const POSITION_CODE_MAX: u16 = 0x3FF;

pub const GAIN_DB_MIN: f32 = -25.0;
pub const GAIN_DB_MAX: f32 = 6.0;

/// Gain code meaning "muted" (negative infinity dB).
pub const GAIN_CODE_MINUS_INFINITY: u8 = 0;
/// Gain code meaning unity (0 dB).
pub const GAIN_CODE_UNITY: u8 = 0x33;
pub const GAIN_CODE_MAX: u8 = 0x3F;

pub const SIZE_CODE_MAX: u8 = 31;

pub const LUFS_MIN: f32 = -102.4;
pub const LUFS_MAX: f32 = 102.3;
pub const LUFS_CODE_BITS: u32 = 11;

pub const LRA_MAX: f32 = 102.3;
pub const LRA_CODE_BITS: u32 = 10;

pub const DIALNORM_MAX: u8 = 31;

pub fn encode_position(v: f32) -> Result<u16, ModelError> {
    if !(POSITION_MIN..=POSITION_MAX).contains(&v) {
        return Err(ModelError::OutOfRange {
            what: "position",
            value: v as f64,
            min: POSITION_MIN as f64,
            max: POSITION_MAX as f64,
        });
    }
    Ok(1 + (((v + 1.0) / 2.0) * 0x3FE as f32 + 0.5) as u16)
}

/// Inverse of [`encode_position`]. `code` must be non-reserved and in range;
/// the KLV reader validates before decoding.
pub fn decode_position(code: u16) -> f32 {
    debug_assert!(code != POSITION_CODE_RESERVED && code <= POSITION_CODE_MAX);
    (((code - 1) as f32) / 0x3FE as f32) * 2.0 - 1.0
}

pub fn encode_gain(db: f32) -> Result<u8, ModelError> {
    if db.is_infinite() && db < 0.0 {
        return Ok(GAIN_CODE_MINUS_INFINITY);
    }
    if !(GAIN_DB_MIN..=GAIN_DB_MAX).contains(&db) {
        return Err(ModelError::OutOfRange {
            what: "gain",
            value: db as f64,
            min: GAIN_DB_MIN as f64,
            max: GAIN_DB_MAX as f64,
        });
    }
    Ok(((db + 25.5) / 0.5) as u8)
}

pub fn decode_gain(code: u8) -> f32 {
    debug_assert!(code <= GAIN_CODE_MAX);
    if code == GAIN_CODE_MINUS_INFINITY {
        return f32::NEG_INFINITY;
    }
    (code as i16 - GAIN_CODE_UNITY as i16) as f32 * 0.5
}

pub fn encode_size(v: f32) -> Result<u8, ModelError> {
    if !(0.0..=1.0).contains(&v) {
        return Err(ModelError::OutOfRange {
            what: "size",
            value: v as f64,
            min: 0.0,
            max: 1.0,
        });
    }
    Ok((v * 31.0 + 0.5) as u8)
}

pub fn decode_size(code: u8) -> f32 {
    debug_assert!(code <= SIZE_CODE_MAX);
    code as f32 / 31.0
}

/// Encode a loudness-family value (LUFS, dBTP, momentary, short-term 3s).
pub fn encode_lufs(v: f32) -> Result<u16, ModelError> {
    if !(LUFS_MIN..=LUFS_MAX).contains(&v) {
        return Err(ModelError::OutOfRange {
            what: "loudness",
            value: v as f64,
            min: LUFS_MIN as f64,
            max: LUFS_MAX as f64,
        });
    }
    Ok((1024 + (v * 10.0).round() as i32) as u16)
}

pub fn decode_lufs(code: u16) -> f32 {
    (code as i32 - 1024) as f32 / 10.0
}

pub fn encode_lra(lu: f32) -> Result<u16, ModelError> {
    if !(0.0..=LRA_MAX).contains(&lu) {
        return Err(ModelError::OutOfRange {
            what: "loudness range",
            value: lu as f64,
            min: 0.0,
            max: LRA_MAX as f64,
        });
    }
    Ok((lu * 10.0 + 0.5) as u16)
}

pub fn decode_lra(code: u16) -> f32 {
    code as f32 / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_round_trips_within_quantization() {
        for v in [-1.0f32, -0.5, -0.001, 0.0, 0.25, 0.999, 1.0] {
            let code = encode_position(v).unwrap();
            assert!(code >= 1 && code <= POSITION_CODE_MAX);
            let back = decode_position(code);
            assert!((back - v).abs() <= 2.0 / 0x3FE as f32, "{v} -> {code} -> {back}");
        }
    }

    #[test]
    fn position_rejects_out_of_range() {
        assert!(encode_position(1.001).is_err());
        assert!(encode_position(-1.5).is_err());
    }

    #[test]
    fn gain_sentinel_and_steps() {
        assert_eq!(encode_gain(f32::NEG_INFINITY).unwrap(), 0);
        assert_eq!(encode_gain(0.0).unwrap(), GAIN_CODE_UNITY);
        assert_eq!(encode_gain(6.0).unwrap(), GAIN_CODE_MAX);
        assert_eq!(encode_gain(-25.0).unwrap(), 1);
        assert!(encode_gain(6.5).is_err());
        assert!(encode_gain(-26.0).is_err());
        assert_eq!(decode_gain(0), f32::NEG_INFINITY);
        assert_eq!(decode_gain(GAIN_CODE_UNITY), 0.0);
        for code in 1..=GAIN_CODE_MAX {
            assert_eq!(encode_gain(decode_gain(code)).unwrap(), code);
        }
    }

    #[test]
    fn size_round_trips() {
        for code in 0..=SIZE_CODE_MAX {
            assert_eq!(encode_size(decode_size(code)).unwrap(), code);
        }
        assert!(encode_size(1.1).is_err());
    }

    #[test]
    fn lufs_affine_map() {
        assert_eq!(encode_lufs(0.0).unwrap(), 1024);
        assert_eq!(encode_lufs(-23.0).unwrap(), 1024 - 230);
        assert_eq!(decode_lufs(1024 + 63), 6.3);
        assert!(encode_lufs(200.0).is_err());
        for v in [-102.4f32, -23.0, 0.0, 102.3] {
            let code = encode_lufs(v).unwrap();
            assert!((decode_lufs(code) - v).abs() < 0.05);
        }
    }

    #[test]
    fn lra_round_trips() {
        assert_eq!(encode_lra(10.2).unwrap(), 102);
        assert_eq!(decode_lra(102), 10.2);
        assert!(encode_lra(-0.1).is_err());
    }
}
