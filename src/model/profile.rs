//! Profile and level constraints.
//!
//! A profile declares the maximum count for every entity kind a model may
//! hold. The model consults it proactively before every insertion, and
//! [`Profile::check_model`] re-validates a populated model against a newly
//! selected, possibly smaller, profile.

use crate::model::PmdModel;
use crate::model::element::ElementKind;

/// Absolute table bounds, independent of any profile.
pub const MAX_AUDIO_SIGNALS: usize = 255;
pub const MAX_AUDIO_ELEMENTS: usize = 4095;
pub const MAX_PRESENTATIONS: usize = 511;
pub const MAX_UPDATES: usize = 2048;
pub const MAX_EAC3_ENCODING_PARAMETERS: usize = 255;
pub const MAX_ED2_TURNAROUNDS: usize = 255;
pub const MAX_HEADPHONE_DESCS: usize = 255;
pub const MAX_PRESENTATION_NAMES: usize = MAX_PRESENTATIONS * 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Signal,
    Element,
    Bed,
    Object,
    Presentation,
    Loudness,
    Update,
    EncoderParams,
    Turnaround,
    HeadphoneDesc,
    IdentityTiming,
    StreamDescription,
    PresentationName,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntityKind::Signal => "audio signal",
            EntityKind::Element => "audio element",
            EntityKind::Bed => "audio bed",
            EntityKind::Object => "audio object",
            EntityKind::Presentation => "presentation",
            EntityKind::Loudness => "loudness record",
            EntityKind::Update => "dynamic update",
            EntityKind::EncoderParams => "encoder parameter record",
            EntityKind::Turnaround => "turnaround record",
            EntityKind::HeadphoneDesc => "headphone description",
            EntityKind::IdentityTiming => "identity and timing record",
            EntityKind::StreamDescription => "stream description",
            EntityKind::PresentationName => "presentation name",
        };
        f.write_str(s)
    }
}

/// A populated model exceeds one of the profile's per-kind maxima.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("too many {kind} entries: {count} exceeds permitted maximum {max}")]
pub struct ConstraintViolation {
    pub kind: EntityKind,
    pub count: usize,
    pub max: usize,
}

/// Per-kind maximum counts.
///
/// Invariants: `max_presentation_names >= max_presentations`; at most one
/// identity/timing record; at most one stream description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintSet {
    pub max_signals: usize,
    pub max_elements: usize,
    pub max_beds: usize,
    pub max_objects: usize,
    pub max_presentations: usize,
    pub max_presentation_names: usize,
    pub max_loudness: usize,
    pub max_updates: usize,
    pub max_eep: usize,
    pub max_etd: usize,
    pub max_hed: usize,
    pub max_iat: usize,
    pub max_esd: usize,
}

impl Default for ConstraintSet {
    fn default() -> Self {
        Self {
            max_signals: MAX_AUDIO_SIGNALS,
            max_elements: MAX_AUDIO_ELEMENTS,
            max_beds: MAX_AUDIO_ELEMENTS,
            max_objects: MAX_AUDIO_ELEMENTS,
            max_presentations: MAX_PRESENTATIONS,
            max_presentation_names: MAX_PRESENTATION_NAMES,
            max_loudness: MAX_PRESENTATIONS,
            max_updates: MAX_UPDATES,
            max_eep: MAX_EAC3_ENCODING_PARAMETERS,
            max_etd: MAX_ED2_TURNAROUNDS,
            max_hed: MAX_HEADPHONE_DESCS,
            max_iat: 1,
            max_esd: 1,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ProfileError {
    #[error("unknown profile number {0}")]
    UnknownProfile(u16),

    #[error("unknown level {level} for profile {number}")]
    UnknownLevel { number: u16, level: u16 },

    #[error("constraint set requires at least as many presentation names ({names}) as presentations ({presentations})")]
    TooFewNames { names: usize, presentations: usize },

    #[error("at most one {0} record may be declared")]
    SingletonExceeded(EntityKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Profile number, 0 for unconstrained.
    pub number: u16,
    pub level: u16,
    pub constraints: ConstraintSet,
}

impl Default for Profile {
    fn default() -> Self {
        Self::unconstrained()
    }
}

impl Profile {
    /// No constraints beyond the absolute table bounds.
    pub fn unconstrained() -> Self {
        Self {
            number: 0,
            level: 0,
            constraints: ConstraintSet::default(),
        }
    }

    /// Select a named profile/level pair.
    pub fn new(number: u16, level: u16) -> Result<Self, ProfileError> {
        match (number, level) {
            (0, 0) => Ok(Self::unconstrained()),
            (1, 1) => Ok(Self::profile1(1, 10, 8)),
            (1, 2) => Ok(Self::profile1(2, 20, 16)),
            (1, 3) => Ok(Self::profile1(3, 50, 48)),
            (1, level) => Err(ProfileError::UnknownLevel { number, level }),
            (number, _) => Err(ProfileError::UnknownProfile(number)),
        }
    }

    fn profile1(level: u16, elements: usize, presentations: usize) -> Self {
        let constraints = ConstraintSet {
            max_signals: 16,
            max_elements: elements,
            max_beds: elements,
            max_objects: elements,
            max_presentations: presentations,
            max_presentation_names: presentations * 2,
            ..ConstraintSet::default()
        };
        Self {
            number: 1,
            level,
            constraints,
        }
    }

    /// Build a profile from a caller-supplied constraint set, enforcing the
    /// set's structural invariants.
    pub fn custom(constraints: ConstraintSet) -> Result<Self, ProfileError> {
        if constraints.max_presentation_names < constraints.max_presentations {
            return Err(ProfileError::TooFewNames {
                names: constraints.max_presentation_names,
                presentations: constraints.max_presentations,
            });
        }
        if constraints.max_iat > 1 {
            return Err(ProfileError::SingletonExceeded(EntityKind::IdentityTiming));
        }
        if constraints.max_esd > 1 {
            return Err(ProfileError::SingletonExceeded(EntityKind::StreamDescription));
        }
        Ok(Self {
            number: 0,
            level: 0,
            constraints,
        })
    }

    /// Required backing storage in bytes for a model built under this
    /// profile: a pure, monotonic function of the constraint set. Tables are
    /// separately owned, capacity-capped collections, so the value is a
    /// sizing contract rather than a binary layout.
    pub fn required_bytes(&self) -> usize {
        use crate::model::element::Element;
        use crate::model::esd::StreamDescription;
        use crate::model::hed::HeadphoneDesc;
        use crate::model::iat::IdentityTiming;
        use crate::model::loudness::Loudness;
        use crate::model::names::Name;
        use crate::model::presentation::Presentation;
        use crate::model::update::Update;
        use std::mem::size_of;

        fn table(count: usize, entry: usize) -> usize {
            (count * entry).next_multiple_of(16)
        }

        let c = &self.constraints;
        table(c.max_elements, size_of::<Element>())
            + table(c.max_presentations, size_of::<Presentation>())
            + table(c.max_presentation_names, size_of::<Name>())
            + table(c.max_loudness, size_of::<Loudness>())
            + table(c.max_updates, size_of::<Update>())
            + table(c.max_eep, size_of::<crate::model::eep::EncoderParams>())
            + table(c.max_etd, size_of::<crate::model::etd::Turnaround>())
            + table(c.max_hed, size_of::<HeadphoneDesc>())
            + table(c.max_iat, size_of::<IdentityTiming>())
            + table(c.max_esd, size_of::<StreamDescription>())
    }

    /// True when every per-kind maximum is at least as large as `other`'s,
    /// meaning any model valid under `other` is valid under `self`.
    pub fn permits(&self, other: &Profile) -> bool {
        let a = &self.constraints;
        let b = &other.constraints;
        a.max_signals >= b.max_signals
            && a.max_elements >= b.max_elements
            && a.max_beds >= b.max_beds
            && a.max_objects >= b.max_objects
            && a.max_presentations >= b.max_presentations
            && a.max_presentation_names >= b.max_presentation_names
            && a.max_loudness >= b.max_loudness
            && a.max_updates >= b.max_updates
            && a.max_eep >= b.max_eep
            && a.max_etd >= b.max_etd
            && a.max_hed >= b.max_hed
            && a.max_iat >= b.max_iat
            && a.max_esd >= b.max_esd
    }

    pub(crate) fn limit(&self, kind: EntityKind) -> usize {
        let c = &self.constraints;
        match kind {
            EntityKind::Signal => c.max_signals,
            EntityKind::Element => c.max_elements,
            EntityKind::Bed => c.max_beds,
            EntityKind::Object => c.max_objects,
            EntityKind::Presentation => c.max_presentations,
            EntityKind::PresentationName => c.max_presentation_names,
            EntityKind::Loudness => c.max_loudness,
            EntityKind::Update => c.max_updates,
            EntityKind::EncoderParams => c.max_eep,
            EntityKind::Turnaround => c.max_etd,
            EntityKind::HeadphoneDesc => c.max_hed,
            EntityKind::IdentityTiming => c.max_iat,
            EntityKind::StreamDescription => c.max_esd,
        }
    }

    /// Retroactively validate a populated model against this profile.
    pub fn check_model(&self, model: &PmdModel) -> Result<(), ConstraintViolation> {
        let beds = model
            .elements()
            .filter(|e| matches!(e.kind, ElementKind::Bed(_)))
            .count();
        let objects = model.elements().count() - beds;

        let counts = [
            (EntityKind::Signal, model.num_signals()),
            (EntityKind::Element, model.elements().count()),
            (EntityKind::Bed, beds),
            (EntityKind::Object, objects),
            (EntityKind::Presentation, model.presentations().count()),
            (EntityKind::PresentationName, model.names().len()),
            (EntityKind::Loudness, model.loudness().count()),
            (EntityKind::Update, model.updates().len()),
            (EntityKind::EncoderParams, model.encoder_params().count()),
            (EntityKind::Turnaround, model.turnarounds().count()),
            (EntityKind::HeadphoneDesc, model.headphone_descs().count()),
            (EntityKind::IdentityTiming, model.iat().is_some() as usize),
            (
                EntityKind::StreamDescription,
                model.esd().is_some() as usize,
            ),
        ];

        for (kind, count) in counts {
            let max = self.limit(kind);
            if count > max {
                return Err(ConstraintViolation { kind, count, max });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_profiles() {
        let p = Profile::new(1, 2).unwrap();
        assert_eq!(p.constraints.max_elements, 20);
        assert_eq!(p.constraints.max_signals, 16);
        assert_eq!(p.constraints.max_presentations, 16);
        assert!(Profile::new(1, 4).is_err());
        assert!(Profile::new(7, 0).is_err());
    }

    #[test]
    fn custom_rejects_too_few_names() {
        let constraints = ConstraintSet {
            max_presentations: 8,
            max_presentation_names: 4,
            ..ConstraintSet::default()
        };
        assert!(Profile::custom(constraints).is_err());
    }

    #[test]
    fn compatibility_is_pointwise() {
        let big = Profile::new(1, 3).unwrap();
        let small = Profile::new(1, 1).unwrap();
        assert!(big.permits(&small));
        assert!(!small.permits(&big));
        assert!(Profile::unconstrained().permits(&big));
    }

    #[test]
    fn sizing_is_monotonic() {
        let small = Profile::new(1, 1).unwrap();
        let large = Profile::new(1, 3).unwrap();
        assert!(small.required_bytes() < large.required_bytes());
        assert!(large.required_bytes() < Profile::unconstrained().required_bytes());
        // Deterministic: same constraint set, same size.
        assert_eq!(
            Profile::new(1, 1).unwrap().required_bytes(),
            small.required_bytes()
        );
    }
}
