//! Identity and Timing (IAT) record.
//!
//! A singleton per model: content identity, distribution identity and a
//! high-resolution timestamp in ticks of 1/240000 s.

use crate::utils::errors::ModelError;

pub const MAX_CONTENT_ID_BYTES: usize = 32;
pub const MAX_DISTRIBUTION_ID_BYTES: usize = 16;
pub const MAX_USER_DATA_BYTES: usize = 256;
pub const MAX_EXTENSION_BYTES: usize = 256;

/// 35-bit timestamp ceiling.
pub const MAX_TIMESTAMP: u64 = (1 << 35) - 1;

/// Content identifier type, 5-bit coded. Codes 0x03..=0x1e are reserved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum ContentIdType {
    #[default]
    Uuid = 0x00,
    /// 96-bit EIDR identifier in compact binary format.
    Eidr = 0x01,
    AdId = 0x02,
    Unspecified = 0x1f,
}

impl ContentIdType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Self::Uuid),
            0x01 => Some(Self::Eidr),
            0x02 => Some(Self::AdId),
            0x1f => Some(Self::Unspecified),
            _ => None,
        }
    }
}

/// Distribution identifier type, 3-bit coded. Codes 1..=6 are reserved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum DistributionIdType {
    /// ATSC 3.0 VP1 channel id (ATSC A/336).
    #[default]
    Atsc3 = 0x00,
    Unspecified = 0x07,
}

impl DistributionIdType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Self::Atsc3),
            0x07 => Some(Self::Unspecified),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentId {
    pub id_type: ContentIdType,
    pub data: Vec<u8>,
}

impl ContentId {
    pub fn new(id_type: ContentIdType, data: Vec<u8>) -> Result<Self, ModelError> {
        if data.is_empty() || data.len() > MAX_CONTENT_ID_BYTES {
            return Err(ModelError::OutOfRange {
                what: "content id length",
                value: data.len() as f64,
                min: 1.0,
                max: MAX_CONTENT_ID_BYTES as f64,
            });
        }
        Ok(Self { id_type, data })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionId {
    pub id_type: DistributionIdType,
    pub data: Vec<u8>,
}

impl DistributionId {
    pub fn new(id_type: DistributionIdType, data: Vec<u8>) -> Result<Self, ModelError> {
        if data.is_empty() || data.len() > MAX_DISTRIBUTION_ID_BYTES {
            return Err(ModelError::OutOfRange {
                what: "distribution id length",
                value: data.len() as f64,
                min: 1.0,
                max: MAX_DISTRIBUTION_ID_BYTES as f64,
            });
        }
        Ok(Self { id_type, data })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityTiming {
    pub content_id: Option<ContentId>,
    pub distribution_id: Option<DistributionId>,
    /// Ticks of 1/240000 s, 35-bit.
    pub timestamp: u64,
    /// 11-bit sample offset.
    pub offset: Option<u16>,
    /// 11-bit validity duration.
    pub validity_duration: Option<u16>,
    pub user_data: Vec<u8>,
    pub extension: Vec<u8>,
}

impl IdentityTiming {
    pub fn new(timestamp: u64) -> Result<Self, ModelError> {
        if timestamp > MAX_TIMESTAMP {
            return Err(ModelError::OutOfRange {
                what: "IAT timestamp",
                value: timestamp as f64,
                min: 0.0,
                max: MAX_TIMESTAMP as f64,
            });
        }
        Ok(Self {
            timestamp,
            ..Default::default()
        })
    }
}
