//! Presentation name registry.
//!
//! Localized presentation names refresh on a slower cycle than the
//! presentations themselves, so they live in their own pool and survive the
//! per-frame model reset. The pool threads a live list and a free list
//! through the same slot array and ages names by read count: the pool's
//! largest read count is the current generation, and a name whose count falls
//! two or more behind it was not re-read during the previous full cycle and
//! is reclaimed on the next [`NamePool::isolate`] pass.

use crate::model::lang::LangCode;
use crate::model::presentation::{MAX_NAMES_PER_PRESENTATION, Presentation, PresentationId};
use crate::utils::errors::ModelError;

/// Longest name text in bytes, excluding the wire NUL terminator.
pub const MAX_NAME_LENGTH: usize = 67;

const LIST_END: u16 = u16::MAX;

#[derive(Debug, Clone)]
pub struct Name {
    pub presid: PresentationId,
    pub lang: LangCode,
    pub text: String,
    readcount: u16,
    next: u16,
}

#[derive(Debug, Clone)]
pub struct NamePool {
    slots: Vec<Name>,
    live: u16,
    free: u16,
    num: usize,
    max_readcount: u16,
}

impl NamePool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.min(LIST_END as usize);
        let slots = (0..capacity)
            .map(|i| Name {
                presid: 0,
                lang: LangCode::default(),
                text: String::new(),
                readcount: 0,
                next: if i + 1 == capacity {
                    LIST_END
                } else {
                    (i + 1) as u16
                },
            })
            .collect();
        Self {
            slots,
            live: LIST_END,
            free: if capacity == 0 { LIST_END } else { 0 },
            num: 0,
            max_readcount: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.num
    }

    pub fn is_empty(&self) -> bool {
        self.num == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, slot: u16) -> Option<&Name> {
        self.slots.get(slot as usize)
    }

    /// Pop a free slot onto the live list and populate it.
    ///
    /// A freshly added name starts one generation behind so that an add
    /// without a subsequent [`mark`](Self::mark) does not itself advance the
    /// pool's generation.
    pub fn add(
        &mut self,
        presid: PresentationId,
        lang: LangCode,
        text: &str,
    ) -> Result<u16, ModelError> {
        if text.len() > MAX_NAME_LENGTH {
            return Err(ModelError::OutOfRange {
                what: "presentation name length",
                value: text.len() as f64,
                min: 0.0,
                max: MAX_NAME_LENGTH as f64,
            });
        }
        if self.free == LIST_END {
            return Err(ModelError::NamePoolExhausted {
                max: self.slots.len(),
            });
        }
        let idx = self.free;
        let slot = &mut self.slots[idx as usize];
        self.free = slot.next;
        slot.next = self.live;
        slot.presid = presid;
        slot.lang = lang;
        slot.text.clear();
        slot.text.push_str(text);
        slot.readcount = self.max_readcount.wrapping_sub(1);
        self.live = idx;
        self.num += 1;
        Ok(idx)
    }

    /// Find the live name for one (presentation, language) pair.
    pub fn find(&self, presid: PresentationId, lang: LangCode) -> Option<u16> {
        let mut idx = self.live;
        while idx != LIST_END {
            let name = &self.slots[idx as usize];
            if name.presid == presid && name.lang == lang {
                return Some(idx);
            }
            idx = name.next;
        }
        None
    }

    /// Record that a name was read again this cycle.
    pub fn mark(&mut self, slot: u16) {
        if let Some(name) = self.slots.get_mut(slot as usize) {
            name.readcount = name.readcount.wrapping_add(1);
            if name.readcount > self.max_readcount {
                self.max_readcount = name.readcount;
            }
        }
    }

    /// Replace the text of an existing live name.
    pub fn set_text(&mut self, slot: u16, text: &str) -> Result<(), ModelError> {
        if text.len() > MAX_NAME_LENGTH {
            return Err(ModelError::OutOfRange {
                what: "presentation name length",
                value: text.len() as f64,
                min: 0.0,
                max: MAX_NAME_LENGTH as f64,
            });
        }
        if let Some(name) = self.slots.get_mut(slot as usize) {
            name.text.clear();
            name.text.push_str(text);
        }
        Ok(())
    }

    /// One linear pass over the live list: attach every fresh name for the
    /// presentation to it, and reclaim every stale one to the free list.
    pub fn isolate(&mut self, pres: &mut Presentation) -> Result<(), ModelError> {
        pres.names.clear();
        let mut prev = LIST_END;
        let mut idx = self.live;
        while idx != LIST_END {
            let next = self.slots[idx as usize].next;
            let name = &self.slots[idx as usize];
            if name.presid == pres.id {
                if self.max_readcount.wrapping_sub(name.readcount) < 2 {
                    if pres.names.len() == MAX_NAMES_PER_PRESENTATION {
                        return Err(ModelError::TooManyNames {
                            id: pres.id,
                            max: MAX_NAMES_PER_PRESENTATION,
                        });
                    }
                    pres.names.push(idx);
                    prev = idx;
                } else {
                    self.unlink(prev, idx);
                }
            } else {
                prev = idx;
            }
            idx = next;
        }
        Ok(())
    }

    fn unlink(&mut self, prev: u16, idx: u16) {
        let next = self.slots[idx as usize].next;
        if prev == LIST_END {
            self.live = next;
        } else {
            self.slots[prev as usize].next = next;
        }
        let slot = &mut self.slots[idx as usize];
        slot.next = self.free;
        slot.lang = LangCode::default();
        slot.text.clear();
        self.free = idx;
        self.num -= 1;
    }

    /// Live names in list order.
    pub fn iter(&self) -> NameIter<'_> {
        NameIter {
            pool: self,
            idx: self.live,
        }
    }
}

pub struct NameIter<'a> {
    pool: &'a NamePool,
    idx: u16,
}

impl<'a> Iterator for NameIter<'a> {
    type Item = (u16, &'a Name);

    fn next(&mut self) -> Option<Self::Item> {
        if self.idx == LIST_END {
            return None;
        }
        let idx = self.idx;
        let name = &self.pool.slots[idx as usize];
        self.idx = name.next;
        Some((idx, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::element::SpeakerConfig;

    fn lang(s: &str) -> LangCode {
        LangCode::new(s).unwrap()
    }

    #[test]
    fn add_find_and_exhaustion() -> anyhow::Result<()> {
        let mut pool = NamePool::new(2);
        let a = pool.add(1, lang("eng"), "Main")?;
        let b = pool.add(1, lang("fra"), "Principal")?;
        assert_ne!(a, b);
        assert_eq!(pool.find(1, lang("fra")), Some(b));
        assert_eq!(pool.find(2, lang("eng")), None);
        assert!(matches!(
            pool.add(2, lang("deu"), "Haupt"),
            Err(ModelError::NamePoolExhausted { max: 2 })
        ));
        Ok(())
    }

    #[test]
    fn marked_names_survive_unmarked_names_age_out() -> anyhow::Result<()> {
        let mut pool = NamePool::new(4);
        let mut pres = Presentation::new(1, SpeakerConfig::Stereo, lang("eng"));

        let kept = pool.add(1, lang("eng"), "Main")?;
        let stale = pool.add(1, lang("fra"), "Principal")?;
        pool.mark(kept);
        pool.mark(stale);

        // Several generations where only the English name is re-read.
        for _ in 0..3 {
            pool.mark(kept);
        }

        pool.isolate(&mut pres)?;
        assert_eq!(pres.name_slots(), &[kept]);
        assert_eq!(pool.len(), 1);

        // The reclaimed slot is reusable.
        let reused = pool.add(1, lang("fra"), "Principal")?;
        assert_eq!(reused, stale);
        Ok(())
    }

    #[test]
    fn one_missed_cycle_is_tolerated() -> anyhow::Result<()> {
        let mut pool = NamePool::new(4);
        let mut pres = Presentation::new(3, SpeakerConfig::Stereo, lang("eng"));

        let a = pool.add(3, lang("eng"), "News")?;
        let b = pool.add(3, lang("spa"), "Noticias")?;
        pool.mark(a);
        pool.mark(b);
        // One cycle where only `a` is read: `b` is exactly one behind and
        // must survive.
        pool.mark(a);

        pool.isolate(&mut pres)?;
        assert_eq!(pres.name_slots(), &[b, a]);
        assert_eq!(pool.len(), 2);
        Ok(())
    }
}
