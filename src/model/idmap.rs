//! Maps sparse external identifiers to dense table indices.
//!
//! Entity identifiers on the wire are sparse 16-bit values chosen by the
//! producer; the tables they land in are dense, fixed-capacity arrays. The
//! map gives O(1) lookup in either direction of the document lifecycle and
//! ordered iteration over the populated slots. Identifiers are never reused
//! without a full table reset, so there is no removal operation.

/// Identifier space covered by one map. Element ids occupy 1..=4095, so one
/// flat table covers every id kind.
pub const ID_MAP_SIZE: usize = 4096;

const UNMAPPED: u16 = u16::MAX;

#[derive(Debug, Clone)]
pub struct IdMap {
    slots: Box<[u16; ID_MAP_SIZE]>,
}

impl Default for IdMap {
    fn default() -> Self {
        Self {
            slots: Box::new([UNMAPPED; ID_MAP_SIZE]),
        }
    }
}

impl IdMap {
    pub fn clear(&mut self) {
        self.slots.fill(UNMAPPED);
    }

    /// Record `id -> index`. The caller has already rejected duplicates.
    pub fn insert(&mut self, id: u16, index: u16) {
        debug_assert!(index != UNMAPPED);
        self.slots[id as usize] = index;
    }

    pub fn lookup(&self, id: u16) -> Option<u16> {
        match self.slots.get(id as usize) {
            Some(&idx) if idx != UNMAPPED => Some(idx),
            _ => None,
        }
    }

    pub fn contains(&self, id: u16) -> bool {
        self.lookup(id).is_some()
    }

    /// Visit every populated slot as `(id, index)`, ascending by id.
    pub fn iter(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|&(_, &idx)| idx != UNMAPPED)
            .map(|(id, &idx)| (id as u16, idx))
    }
}
