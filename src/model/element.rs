//! Audio elements: channel beds and positional objects.
//!
//! An element is one or more audio signals that form a consistent unit: a
//! whole 5.1 bed, or a single moving dialog object. The two shapes share one
//! identifier space and one table slot, expressed here as a tagged enum so
//! that every consumer handles both arms.
//!
//! Bed track lists are kept in a canonical order (target speaker, then
//! source, then gain) so that structurally equal beds compare equal.

use crate::utils::codecs;
use crate::utils::errors::ModelError;

/// Element ids occupy 1..=4095 on the wire; 0 is reserved.
pub type ElementId = u16;

pub const RESERVED_ELEMENT_ID: ElementId = 0;
pub const MAX_ELEMENT_ID: ElementId = 4095;

/// Largest number of source tracks a single bed may carry.
pub const MAX_BED_SOURCES: usize = 128;

/// Target output speaker positions. 0 terminates a bed's track list on the
/// wire; codes above `Rfw` are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Speaker {
    Left = 1,
    Right = 2,
    Center = 3,
    Lfe = 4,
    LeftSurround = 5,
    RightSurround = 6,
    LeftRearSurround = 7,
    RightRearSurround = 8,
    LeftTopFront = 9,
    RightTopFront = 10,
    LeftTopMiddle = 11,
    RightTopMiddle = 12,
    LeftTopRear = 13,
    RightTopRear = 14,
    LeftFrontWide = 15,
    RightFrontWide = 16,
}

impl Speaker {
    pub const LAST_VALID: u8 = Speaker::RightFrontWide as u8;

    pub fn from_code(code: u8) -> Option<Self> {
        if (1..=Self::LAST_VALID).contains(&code) {
            // Contiguous discriminants, checked above.
            Some(unsafe { std::mem::transmute::<u8, Speaker>(code) })
        } else {
            None
        }
    }
}

/// Known speaker configurations for beds and presentations, 5-bit coded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum SpeakerConfig {
    #[default]
    Stereo = 0,
    Surround30 = 1,
    Surround51 = 2,
    Surround512 = 3,
    Surround514 = 4,
    Surround714 = 5,
    Surround916 = 6,
    Portable = 7,
    Headphone = 8,
}

impl SpeakerConfig {
    pub const LAST_VALID: u8 = SpeakerConfig::Headphone as u8;

    pub fn from_code(code: u8) -> Option<Self> {
        if code <= Self::LAST_VALID {
            Some(unsafe { std::mem::transmute::<u8, SpeakerConfig>(code) })
        } else {
            None
        }
    }
}

/// Classes of audio object, 4-bit coded; values above `EmergencyInfo` are
/// reserved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum ObjectClass {
    Dialogue = 0,
    Vds = 1,
    VoiceOver = 2,
    #[default]
    Generic = 3,
    SpokenSubtitle = 4,
    EmergencyAlert = 5,
    EmergencyInfo = 6,
}

impl ObjectClass {
    pub const LAST_VALID: u8 = ObjectClass::EmergencyInfo as u8;

    pub fn from_code(code: u8) -> Option<Self> {
        if code <= Self::LAST_VALID {
            Some(unsafe { std::mem::transmute::<u8, ObjectClass>(code) })
        } else {
            None
        }
    }
}

/// One source-to-speaker mapping inside a bed. Gain is stored as its 6-bit
/// wire code so canonical ordering and wire bytes agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BedTrack {
    pub target: Speaker,
    /// Source signal id, 1..=255.
    pub source: u8,
    pub gain: u8,
}

impl BedTrack {
    pub fn new(target: Speaker, source: u8, gain_db: f32) -> Result<Self, ModelError> {
        Ok(Self {
            target,
            source,
            gain: codecs::encode_gain(gain_db)?,
        })
    }

    pub fn gain_db(&self) -> f32 {
        codecs::decode_gain(self.gain)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BedMetadata {
    pub config: SpeakerConfig,
    /// Present when this bed is derived from another bed by rendering.
    pub origin: Option<ElementId>,
    tracks: Vec<BedTrack>,
}

impl BedMetadata {
    pub fn new(config: SpeakerConfig) -> Self {
        Self {
            config,
            origin: None,
            tracks: Vec::new(),
        }
    }

    /// Append a track, keeping the list in normal form.
    pub fn add_track(&mut self, track: BedTrack) -> Result<(), ModelError> {
        if self.tracks.len() == MAX_BED_SOURCES {
            return Err(ModelError::TooManyTracks {
                id: 0,
                count: self.tracks.len() + 1,
                max: MAX_BED_SOURCES,
            });
        }
        let pos = self.tracks.partition_point(|t| t < &track);
        self.tracks.insert(pos, track);
        Ok(())
    }

    pub fn tracks(&self) -> &[BedTrack] {
        &self.tracks
    }

    pub(crate) fn set_tracks(&mut self, mut tracks: Vec<BedTrack>) {
        tracks.sort_unstable();
        self.tracks = tracks;
    }
}

/// Position and gain codes are stored in wire form (see [`codecs`]); the
/// accessor methods decode on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub class: ObjectClass,
    pub x: u16,
    pub y: u16,
    pub z: u16,
    pub size: u8,
    pub size_3d: bool,
    pub diverge: bool,
    pub dynamic_updates: bool,
    pub gain: u8,
    /// Source signal id, 1..=255.
    pub source: u8,
}

impl Default for ObjectMetadata {
    fn default() -> Self {
        // Centered point source at unity gain.
        Self {
            class: ObjectClass::Generic,
            x: codecs::POSITION_CODE_CENTER,
            y: codecs::POSITION_CODE_CENTER,
            z: codecs::POSITION_CODE_CENTER,
            size: 0,
            size_3d: false,
            diverge: false,
            dynamic_updates: false,
            gain: codecs::GAIN_CODE_UNITY,
            source: 1,
        }
    }
}

impl ObjectMetadata {
    pub fn set_position(&mut self, x: f32, y: f32, z: f32) -> Result<(), ModelError> {
        let x = codecs::encode_position(x)?;
        let y = codecs::encode_position(y)?;
        let z = codecs::encode_position(z)?;
        self.x = x;
        self.y = y;
        self.z = z;
        Ok(())
    }

    pub fn position(&self) -> (f32, f32, f32) {
        (
            codecs::decode_position(self.x),
            codecs::decode_position(self.y),
            codecs::decode_position(self.z),
        )
    }

    pub fn gain_db(&self) -> f32 {
        codecs::decode_gain(self.gain)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    Bed(BedMetadata),
    Object(ObjectMetadata),
}

/// One slot of the element table. The mode (bed vs. object) is fixed at
/// creation; updates may move an object but never change its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub id: ElementId,
    pub kind: ElementKind,
    /// Index into the headphone description table, when one refers to this
    /// element.
    pub hed_index: Option<u16>,
}

impl Element {
    pub fn bed(id: ElementId, md: BedMetadata) -> Self {
        Self {
            id,
            kind: ElementKind::Bed(md),
            hed_index: None,
        }
    }

    pub fn object(id: ElementId, md: ObjectMetadata) -> Self {
        Self {
            id,
            kind: ElementKind::Object(md),
            hed_index: None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut ObjectMetadata> {
        match &mut self.kind {
            ElementKind::Object(md) => Some(md),
            ElementKind::Bed(_) => None,
        }
    }
}

/// Reject reserved or over-range element ids before they reach a table.
pub fn validate_element_id(id: ElementId) -> Result<(), ModelError> {
    use crate::model::profile::EntityKind;
    if id == RESERVED_ELEMENT_ID {
        return Err(ModelError::ReservedId {
            kind: EntityKind::Element,
            id,
        });
    }
    if id > MAX_ELEMENT_ID {
        return Err(ModelError::IdOutOfRange {
            kind: EntityKind::Element,
            id,
            max: MAX_ELEMENT_ID,
        });
    }
    Ok(())
}
