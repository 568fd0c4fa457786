use crate::model::profile::EntityKind;

/// Classification attached to every field-level KLV read failure.
///
/// Distinguishes "the bitstream used a reserved code" from "the value is
/// syntactically valid but out of range" so that callers can tell corrupt
/// streams apart from streams written against a newer revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadStatus {
    Error,
    OutOfMemory,
    ValueReserved,
    ValueOutOfRange,
    MissingAudioElement,
    IncorrectStructure,
}

impl std::fmt::Display for PayloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PayloadStatus::Error => "error",
            PayloadStatus::OutOfMemory => "out of memory",
            PayloadStatus::ValueReserved => "value reserved",
            PayloadStatus::ValueOutOfRange => "value out of range",
            PayloadStatus::MissingAudioElement => "missing audio element",
            PayloadStatus::IncorrectStructure => "incorrect structure",
        };
        f.write_str(s)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    #[error("{kind} table is full: profile allows at most {max}")]
    Capacity { kind: EntityKind, max: usize },

    #[error("{kind} identifier {id} already in use")]
    DuplicateId { kind: EntityKind, id: u16 },

    #[error("unknown {kind} identifier {id}")]
    UnknownId { kind: EntityKind, id: u16 },

    #[error("{kind} identifier {id} is reserved")]
    ReservedId { kind: EntityKind, id: u16 },

    #[error("{kind} identifier {id} exceeds maximum {max}")]
    IdOutOfRange { kind: EntityKind, id: u16, max: u16 },

    #[error("{what} {value} outside legal range [{min}, {max}]")]
    OutOfRange {
        what: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("presentation name pool exhausted ({max} slots)")]
    NamePoolExhausted { max: usize },

    #[error("presentation {id} already holds {max} names")]
    TooManyNames { id: u16, max: usize },

    #[error("element {id} is not a dynamic object")]
    NotAnObject { id: u16 },

    #[error("bed for element {id} holds {count} tracks, limit is {max}")]
    TooManyTracks { id: u16, count: usize, max: usize },

    #[error("update time {time} exceeds maximum tick {max}")]
    UpdateTimeTooLarge { time: u16, max: u16 },
}

#[derive(thiserror::Error, Debug)]
pub enum KlvError {
    #[error("output buffer too small to hold a single payload")]
    BufferTooSmall,

    #[error("{payload} payload length {length} does not match fixed size {expected}")]
    LengthMismatch {
        payload: &'static str,
        length: usize,
        expected: usize,
    },

    #[error("{status} in {payload} payload, field {field}: value {value}")]
    Field {
        payload: &'static str,
        field: &'static str,
        value: u64,
        status: PayloadStatus,
    },

    #[error("{payload} payload refers to unknown {kind} identifier {id}")]
    DanglingReference {
        payload: &'static str,
        kind: EntityKind,
        id: u16,
    },

    #[error("no room in model for {payload} payload: {source}")]
    NoRoom {
        payload: &'static str,
        source: ModelError,
    },

    #[error("truncated BER length field")]
    TruncatedLength,

    #[error("BER length {length} overruns remaining buffer ({remaining} bytes)")]
    LengthOverrun { length: usize, remaining: usize },

    #[error(
        "incompatible bitstream version {found_maj}.{found_min}, supported major is {expected}"
    )]
    VersionMismatch {
        found_maj: u8,
        found_min: u8,
        expected: u8,
    },

    #[error("container config version {0} is not supported")]
    BadContainerVersion(u8),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl KlvError {
    /// Status classification, for callers that branch on failure class
    /// rather than on the specific payload.
    pub fn status(&self) -> PayloadStatus {
        match self {
            KlvError::Field { status, .. } => *status,
            KlvError::NoRoom { .. } => PayloadStatus::OutOfMemory,
            KlvError::DanglingReference { .. } => PayloadStatus::MissingAudioElement,
            KlvError::LengthMismatch { .. }
            | KlvError::TruncatedLength
            | KlvError::LengthOverrun { .. } => PayloadStatus::IncorrectStructure,
            KlvError::VersionMismatch { .. } | KlvError::BadContainerVersion(_) => {
                PayloadStatus::ValueOutOfRange
            }
            _ => PayloadStatus::Error,
        }
    }
}
