//! Audio presentations: named selections of elements for one listening
//! configuration.
//!
//! A presentation refers to elements by their *table index*, not their wire
//! identifier, through a word-array bitset. The population count of that
//! bitset is the presentation's element count by construction, so the two
//! can never drift apart.

use crate::model::element::SpeakerConfig;
use crate::model::lang::LangCode;
use crate::utils::errors::ModelError;

/// Presentation ids occupy 1..=511 on the wire; 0 is reserved.
pub type PresentationId = u16;

pub const RESERVED_PRESENTATION_ID: PresentationId = 0;
pub const MAX_PRESENTATION_ID: PresentationId = 511;

/// Upper bound on elements referenced by one presentation.
pub const MAX_PRESENTATION_ELEMENTS: usize = 128;

/// Upper bound on localized names attached to one presentation.
pub const MAX_NAMES_PER_PRESENTATION: usize = 16;

const WORD_BITS: usize = 32;

/// Bitset over element-table indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementSet {
    words: Vec<u32>,
}

impl ElementSet {
    pub fn with_capacity(max_elements: usize) -> Self {
        Self {
            words: vec![0; max_elements.div_ceil(WORD_BITS)],
        }
    }

    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    pub fn add(&mut self, index: usize) {
        let word = index / WORD_BITS;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << (index % WORD_BITS);
    }

    pub fn remove(&mut self, index: usize) {
        if let Some(word) = self.words.get_mut(index / WORD_BITS) {
            *word &= !(1 << (index % WORD_BITS));
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.words
            .get(index / WORD_BITS)
            .is_some_and(|w| w & (1 << (index % WORD_BITS)) != 0)
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Set indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(wi, &w)| {
            (0..WORD_BITS)
                .filter(move |b| w & (1 << b) != 0)
                .map(move |b| wi * WORD_BITS + b)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presentation {
    pub id: PresentationId,
    pub config: SpeakerConfig,
    pub lang: LangCode,
    elements: ElementSet,
    /// Name-pool slot indices attached by the last isolate pass.
    pub(crate) names: Vec<u16>,
}

impl Presentation {
    pub fn new(id: PresentationId, config: SpeakerConfig, lang: LangCode) -> Self {
        Self {
            id,
            config,
            lang,
            elements: ElementSet::default(),
            names: Vec::new(),
        }
    }

    pub fn add_element_index(&mut self, index: usize) -> Result<(), ModelError> {
        if !self.elements.contains(index) && self.elements.len() == MAX_PRESENTATION_ELEMENTS {
            return Err(ModelError::OutOfRange {
                what: "presentation element count",
                value: (MAX_PRESENTATION_ELEMENTS + 1) as f64,
                min: 0.0,
                max: MAX_PRESENTATION_ELEMENTS as f64,
            });
        }
        self.elements.add(index);
        Ok(())
    }

    pub fn remove_element_index(&mut self, index: usize) {
        self.elements.remove(index);
    }

    pub fn contains_element_index(&self, index: usize) -> bool {
        self.elements.contains(index)
    }

    pub fn element_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.elements.iter()
    }

    /// Always equal to the bitmap's population count.
    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn name_slots(&self) -> &[u16] {
        &self.names
    }
}

/// Reject reserved or over-range presentation ids.
pub fn validate_presentation_id(id: PresentationId) -> Result<(), ModelError> {
    use crate::model::profile::EntityKind;
    if id == RESERVED_PRESENTATION_ID {
        return Err(ModelError::ReservedId {
            kind: EntityKind::Presentation,
            id,
        });
    }
    if id > MAX_PRESENTATION_ID {
        return Err(ModelError::IdOutOfRange {
            kind: EntityKind::Presentation,
            id,
            max: MAX_PRESENTATION_ID,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_set_tracks_population() {
        let mut set = ElementSet::with_capacity(64);
        set.add(0);
        set.add(33);
        set.add(63);
        assert_eq!(set.len(), 3);
        assert!(set.contains(33));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 33, 63]);
        set.remove(33);
        assert_eq!(set.len(), 2);
        assert!(!set.contains(33));
    }

    #[test]
    fn element_count_matches_bitmap() -> anyhow::Result<()> {
        let mut p = Presentation::new(1, SpeakerConfig::Surround51, LangCode::new("eng")?);
        p.add_element_index(4)?;
        p.add_element_index(4)?; // idempotent
        p.add_element_index(9)?;
        assert_eq!(p.num_elements(), 2);
        assert_eq!(p.element_indices().collect::<Vec<_>>(), vec![4, 9]);
        Ok(())
    }

    #[test]
    fn id_validation() {
        assert!(validate_presentation_id(0).is_err());
        assert!(validate_presentation_id(512).is_err());
        assert!(validate_presentation_id(511).is_ok());
    }
}
