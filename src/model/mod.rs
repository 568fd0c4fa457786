//! The PMD document model.
//!
//! One [`PmdModel`] owns every entity table, an id map per identified table,
//! and the presentation name registry. Capacity comes from the
//! [`profile::Profile`] in force; every insertion is gated by it, so a
//! populated model is always valid against its own profile.
//!
//! The model is single-threaded per instance: operations take `&mut self`,
//! never suspend and never touch I/O. It is `Send`; callers serialize access
//! across threads.

pub mod eep;
pub mod element;
pub mod esd;
pub mod etd;
pub mod hed;
pub mod iat;
pub mod idmap;
pub mod lang;
pub mod loudness;
pub mod names;
pub mod presentation;
pub mod profile;
pub mod signals;
pub mod update;

use log::debug;

use crate::model::eep::{EepId, EncoderParams};
use crate::model::element::{BedMetadata, Element, ElementId, ElementKind, ObjectMetadata};
use crate::model::esd::StreamDescription;
use crate::model::etd::{EtdId, Turnaround};
use crate::model::hed::HeadphoneDesc;
use crate::model::iat::IdentityTiming;
use crate::model::idmap::IdMap;
use crate::model::lang::LangCode;
use crate::model::loudness::Loudness;
use crate::model::names::NamePool;
use crate::model::presentation::{Presentation, PresentationId};
use crate::model::profile::{EntityKind, Profile};
use crate::model::signals::{MAX_SIGNAL_ID, MIN_SIGNAL_ID, SignalSet};
use crate::model::update::Update;
use crate::utils::errors::ModelError;

pub use element::SpeakerConfig;

/// Longest document title in bytes.
pub const MAX_TITLE_LENGTH: usize = 255;

#[derive(Debug)]
pub struct PmdModel {
    profile: Profile,
    title: String,
    /// Bitstream version announced by a VERSION payload, major/minor.
    pub(crate) version: Option<(u8, u8)>,

    pub(crate) signals: SignalSet,
    pub(crate) elements: Vec<Element>,
    pub(crate) element_ids: IdMap,
    pub(crate) presentations: Vec<Presentation>,
    pub(crate) presentation_ids: IdMap,
    pub(crate) names: NamePool,
    pub(crate) loudness: Vec<Loudness>,
    pub(crate) updates: Vec<Update>,
    pub(crate) eep: Vec<EncoderParams>,
    pub(crate) eep_ids: IdMap,
    pub(crate) etd: Vec<Turnaround>,
    pub(crate) etd_ids: IdMap,
    pub(crate) hed: Vec<HeadphoneDesc>,
    pub(crate) iat: Option<IdentityTiming>,
    pub(crate) esd: Option<StreamDescription>,
    pub(crate) sample_offset: u16,

    frame: u64,
}

impl Default for PmdModel {
    fn default() -> Self {
        Self::with_profile(Profile::unconstrained())
    }
}

impl PmdModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(profile: Profile) -> Self {
        let c = &profile.constraints;
        let model = Self {
            names: NamePool::new(c.max_presentation_names),
            elements: Vec::with_capacity(c.max_elements.min(64)),
            presentations: Vec::with_capacity(c.max_presentations.min(64)),
            loudness: Vec::new(),
            updates: Vec::new(),
            eep: Vec::new(),
            etd: Vec::new(),
            hed: Vec::new(),
            element_ids: IdMap::default(),
            presentation_ids: IdMap::default(),
            eep_ids: IdMap::default(),
            etd_ids: IdMap::default(),
            signals: SignalSet::default(),
            iat: None,
            esd: None,
            sample_offset: 0,
            version: None,
            title: String::new(),
            frame: 0,
            profile,
        };
        debug!(
            "new model under profile {}.{}",
            model.profile.number, model.profile.level
        );
        model
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Switch to a new profile after validating the current contents
    /// against it.
    pub fn set_profile(&mut self, profile: Profile) -> Result<(), profile::ConstraintViolation> {
        profile.check_model(self)?;
        self.profile = profile;
        Ok(())
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) -> Result<(), ModelError> {
        if title.len() > MAX_TITLE_LENGTH {
            return Err(ModelError::OutOfRange {
                what: "title length",
                value: title.len() as f64,
                min: 0.0,
                max: MAX_TITLE_LENGTH as f64,
            });
        }
        self.title.clear();
        self.title.push_str(title);
        Ok(())
    }

    pub fn version(&self) -> Option<(u8, u8)> {
        self.version
    }

    /// Current frame generation counter.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Start a new frame: bulk-reset every per-frame table.
    ///
    /// Names, the IAT record and the stream description refresh on slower
    /// cycles and survive; everything retransmitted each video frame is
    /// cleared.
    pub fn new_frame(&mut self) {
        self.signals.clear();
        self.elements.clear();
        self.element_ids.clear();
        self.presentations.clear();
        self.presentation_ids.clear();
        self.loudness.clear();
        self.updates.clear();
        self.eep.clear();
        self.eep_ids.clear();
        self.etd.clear();
        self.etd_ids.clear();
        self.hed.clear();
        self.frame += 1;
    }

    fn gate(&self, kind: EntityKind, count: usize) -> Result<(), ModelError> {
        let max = self.profile.limit(kind);
        if count >= max {
            return Err(ModelError::Capacity { kind, max });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // signals
    // ------------------------------------------------------------------

    pub fn add_signal(&mut self, id: u16) -> Result<(), ModelError> {
        if !(MIN_SIGNAL_ID..=MAX_SIGNAL_ID).contains(&id) {
            return Err(ModelError::IdOutOfRange {
                kind: EntityKind::Signal,
                id,
                max: MAX_SIGNAL_ID,
            });
        }
        if self.signals.contains(id) {
            return Err(ModelError::DuplicateId {
                kind: EntityKind::Signal,
                id,
            });
        }
        self.gate(EntityKind::Signal, self.signals.len())?;
        self.signals.add(id);
        Ok(())
    }

    pub fn num_signals(&self) -> usize {
        self.signals.len()
    }

    pub fn signals(&self) -> &SignalSet {
        &self.signals
    }

    // ------------------------------------------------------------------
    // elements
    // ------------------------------------------------------------------

    pub fn add_bed(&mut self, id: ElementId, md: BedMetadata) -> Result<(), ModelError> {
        self.add_element(Element::bed(id, md), EntityKind::Bed)
    }

    pub fn add_object(&mut self, id: ElementId, md: ObjectMetadata) -> Result<(), ModelError> {
        self.add_element(Element::object(id, md), EntityKind::Object)
    }

    fn add_element(&mut self, element: Element, kind: EntityKind) -> Result<(), ModelError> {
        element::validate_element_id(element.id)?;
        if self.element_ids.contains(element.id) {
            return Err(ModelError::DuplicateId {
                kind: EntityKind::Element,
                id: element.id,
            });
        }
        self.gate(EntityKind::Element, self.elements.len())?;
        let of_kind = self
            .elements
            .iter()
            .filter(|e| {
                matches!(e.kind, ElementKind::Bed(_)) == matches!(kind, EntityKind::Bed)
            })
            .count();
        self.gate(kind, of_kind)?;
        self.element_ids
            .insert(element.id, self.elements.len() as u16);
        self.elements.push(element);
        Ok(())
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter()
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.element_ids
            .lookup(id)
            .map(|idx| &self.elements[idx as usize])
    }

    pub(crate) fn element_index(&self, id: ElementId) -> Option<u16> {
        self.element_ids.lookup(id)
    }

    // ------------------------------------------------------------------
    // presentations
    // ------------------------------------------------------------------

    /// Add a presentation selecting the given elements, which must all be
    /// present already.
    pub fn add_presentation(
        &mut self,
        id: PresentationId,
        config: SpeakerConfig,
        lang: LangCode,
        element_ids: &[ElementId],
    ) -> Result<(), ModelError> {
        presentation::validate_presentation_id(id)?;
        if self.presentation_ids.contains(id) {
            return Err(ModelError::DuplicateId {
                kind: EntityKind::Presentation,
                id,
            });
        }
        self.gate(EntityKind::Presentation, self.presentations.len())?;

        let mut pres = Presentation::new(id, config, lang);
        for &eid in element_ids {
            let idx = self.element_ids.lookup(eid).ok_or(ModelError::UnknownId {
                kind: EntityKind::Element,
                id: eid,
            })?;
            pres.add_element_index(idx as usize)?;
        }
        self.names.isolate(&mut pres)?;
        self.presentation_ids
            .insert(id, self.presentations.len() as u16);
        self.presentations.push(pres);
        Ok(())
    }

    pub fn presentations(&self) -> impl Iterator<Item = &Presentation> {
        self.presentations.iter()
    }

    pub fn presentation(&self, id: PresentationId) -> Option<&Presentation> {
        self.presentation_ids
            .lookup(id)
            .map(|idx| &self.presentations[idx as usize])
    }

    /// Set (or refresh) the localized display name of one presentation.
    ///
    /// Names are decoupled from the presentation refresh cycle: setting a
    /// name for a presentation the model does not currently hold is legal,
    /// the name simply waits for the presentation's next refresh.
    pub fn set_presentation_name(
        &mut self,
        presid: PresentationId,
        lang: LangCode,
        text: &str,
    ) -> Result<(), ModelError> {
        presentation::validate_presentation_id(presid)?;
        let slot = match self.names.find(presid, lang) {
            Some(slot) => {
                self.names.set_text(slot, text)?;
                slot
            }
            None => self.names.add(presid, lang, text)?,
        };
        self.names.mark(slot);
        Ok(())
    }

    pub fn names(&self) -> &NamePool {
        &self.names
    }

    // ------------------------------------------------------------------
    // loudness
    // ------------------------------------------------------------------

    pub fn add_loudness(&mut self, loudness: Loudness) -> Result<(), ModelError> {
        if !self.presentation_ids.contains(loudness.presid) {
            return Err(ModelError::UnknownId {
                kind: EntityKind::Presentation,
                id: loudness.presid,
            });
        }
        if self.loudness.iter().any(|l| l.presid == loudness.presid) {
            return Err(ModelError::DuplicateId {
                kind: EntityKind::Loudness,
                id: loudness.presid,
            });
        }
        self.gate(EntityKind::Loudness, self.loudness.len())?;
        self.loudness.push(loudness);
        Ok(())
    }

    pub fn loudness(&self) -> impl Iterator<Item = &Loudness> {
        self.loudness.iter()
    }

    // ------------------------------------------------------------------
    // dynamic updates
    // ------------------------------------------------------------------

    /// Queue a timestamped position update for one object.
    ///
    /// The timeline stays sorted by time. The sort is stable: an update
    /// sharing a timestamp with existing entries lands after them, so
    /// submission order within a tick is preserved and a serialized
    /// timeline deserializes in the same order.
    pub fn add_update(
        &mut self,
        time: u16,
        object_id: ElementId,
        x: f32,
        y: f32,
        z: f32,
    ) -> Result<(), ModelError> {
        let idx = self
            .element_ids
            .lookup(object_id)
            .ok_or(ModelError::UnknownId {
                kind: EntityKind::Element,
                id: object_id,
            })?;
        if !matches!(
            self.elements[idx as usize].kind,
            ElementKind::Object(_)
        ) {
            return Err(ModelError::NotAnObject { id: object_id });
        }
        self.insert_update(Update::new(time, idx, x, y, z)?)
    }

    /// Stable sorted insert of an already-encoded update.
    pub(crate) fn insert_update(&mut self, update: Update) -> Result<(), ModelError> {
        self.gate(EntityKind::Update, self.updates.len())?;
        let pos = self.updates.partition_point(|u| u.time <= update.time);
        self.updates.insert(pos, update);
        Ok(())
    }

    pub fn updates(&self) -> &[Update] {
        &self.updates
    }

    /// Apply every queued update in timeline order, overwriting each target
    /// object's position, then clear the timeline.
    pub fn apply_updates(&mut self) {
        for update in self.updates.drain(..) {
            if let Some(element) = self.elements.get_mut(update.element_index as usize) {
                if let ElementKind::Object(md) = &mut element.kind {
                    md.x = update.x;
                    md.y = update.y;
                    md.z = update.z;
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // delivery records
    // ------------------------------------------------------------------

    pub fn add_eep(&mut self, eep: EncoderParams) -> Result<(), ModelError> {
        if self.eep_ids.contains(eep.id as u16) {
            return Err(ModelError::DuplicateId {
                kind: EntityKind::EncoderParams,
                id: eep.id as u16,
            });
        }
        for &presid in eep.presentations() {
            if !self.presentation_ids.contains(presid) {
                return Err(ModelError::UnknownId {
                    kind: EntityKind::Presentation,
                    id: presid,
                });
            }
        }
        self.gate(EntityKind::EncoderParams, self.eep.len())?;
        self.eep_ids.insert(eep.id as u16, self.eep.len() as u16);
        self.eep.push(eep);
        Ok(())
    }

    pub fn encoder_params(&self) -> impl Iterator<Item = &EncoderParams> {
        self.eep.iter()
    }

    pub fn eep(&self, id: EepId) -> Option<&EncoderParams> {
        self.eep_ids
            .lookup(id as u16)
            .map(|idx| &self.eep[idx as usize])
    }

    pub fn add_etd(&mut self, etd: Turnaround) -> Result<(), ModelError> {
        if self.etd_ids.contains(etd.id as u16) {
            return Err(ModelError::DuplicateId {
                kind: EntityKind::Turnaround,
                id: etd.id as u16,
            });
        }
        self.gate(EntityKind::Turnaround, self.etd.len())?;
        self.etd_ids.insert(etd.id as u16, self.etd.len() as u16);
        self.etd.push(etd);
        Ok(())
    }

    pub fn turnarounds(&self) -> impl Iterator<Item = &Turnaround> {
        self.etd.iter()
    }

    pub fn etd(&self, id: EtdId) -> Option<&Turnaround> {
        self.etd_ids
            .lookup(id as u16)
            .map(|idx| &self.etd[idx as usize])
    }

    pub fn add_hed(&mut self, hed: HeadphoneDesc) -> Result<(), ModelError> {
        let idx = self
            .element_ids
            .lookup(hed.element_id)
            .ok_or(ModelError::UnknownId {
                kind: EntityKind::Element,
                id: hed.element_id,
            })?;
        if self.elements[idx as usize].hed_index.is_some() {
            return Err(ModelError::DuplicateId {
                kind: EntityKind::HeadphoneDesc,
                id: hed.element_id,
            });
        }
        self.gate(EntityKind::HeadphoneDesc, self.hed.len())?;
        self.elements[idx as usize].hed_index = Some(self.hed.len() as u16);
        self.hed.push(hed);
        Ok(())
    }

    pub fn headphone_descs(&self) -> impl Iterator<Item = &HeadphoneDesc> {
        self.hed.iter()
    }

    pub fn set_iat(&mut self, iat: IdentityTiming) -> Result<(), ModelError> {
        if self.profile.limit(EntityKind::IdentityTiming) == 0 {
            return Err(ModelError::Capacity {
                kind: EntityKind::IdentityTiming,
                max: 0,
            });
        }
        self.iat = Some(iat);
        Ok(())
    }

    pub fn iat(&self) -> Option<&IdentityTiming> {
        self.iat.as_ref()
    }

    pub fn set_esd(&mut self, esd: StreamDescription) -> Result<(), ModelError> {
        if self.profile.limit(EntityKind::StreamDescription) == 0 {
            return Err(ModelError::Capacity {
                kind: EntityKind::StreamDescription,
                max: 0,
            });
        }
        self.esd = Some(esd);
        Ok(())
    }

    pub fn esd(&self) -> Option<&StreamDescription> {
        self.esd.as_ref()
    }

    /// Container-level sample offset of the first frame boundary.
    pub fn sample_offset(&self) -> u16 {
        self.sample_offset
    }

    /// The container config payload carries its format version in the high
    /// byte of this field, so only offsets up to 255 are representable.
    pub fn set_sample_offset(&mut self, offset: u16) -> Result<(), ModelError> {
        if offset > 0xFF {
            return Err(ModelError::OutOfRange {
                what: "sample offset",
                value: offset as f64,
                min: 0.0,
                max: 255.0,
            });
        }
        self.sample_offset = offset;
        Ok(())
    }
}
