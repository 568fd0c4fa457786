//! Audio signal bitmap.
//!
//! Signals are PCM input channels, identified 1..=255. The model only needs
//! membership and count, so a 256-bit bitmap suffices.

pub const MIN_SIGNAL_ID: u16 = 1;
pub const MAX_SIGNAL_ID: u16 = 255;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalSet {
    bits: [u8; 32],
}

impl SignalSet {
    pub fn clear(&mut self) {
        self.bits = [0; 32];
    }

    pub fn add(&mut self, id: u16) {
        self.bits[(id / 8) as usize] |= 1 << (id & 7);
    }

    pub fn remove(&mut self, id: u16) {
        self.bits[(id / 8) as usize] &= !(1 << (id & 7));
    }

    pub fn contains(&self, id: u16) -> bool {
        self.bits[(id / 8) as usize] & (1 << (id & 7)) != 0
    }

    pub fn len(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&b| b == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        (MIN_SIGNAL_ID..=MAX_SIGNAL_ID).filter(|&id| self.contains(id))
    }

    /// Largest signal id present, if any.
    pub fn max_id(&self) -> Option<u16> {
        self.iter().last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_and_count() {
        let mut s = SignalSet::default();
        assert!(s.is_empty());
        s.add(1);
        s.add(255);
        s.add(16);
        assert!(s.contains(16));
        assert!(!s.contains(17));
        assert_eq!(s.len(), 3);
        assert_eq!(s.iter().collect::<Vec<_>>(), vec![1, 16, 255]);
        assert_eq!(s.max_id(), Some(255));
        s.remove(16);
        assert_eq!(s.len(), 2);
    }
}
