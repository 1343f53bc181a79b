//! Set of palette ids an account may currently use.

use super::palette::TRANSPARENT_ID;

/// Bitset over palette ids (up to 64).
///
/// The transparent / erase id is always a member: erasing never requires
/// an unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorSet {
    bits: u64,
}

impl ColorSet {
    /// Largest palette a set can address.
    pub const CAPACITY: usize = 64;

    /// First premium id; bit `i` of an extra-colors bitmap unlocks id `32 + i`.
    pub const FIRST_PREMIUM_ID: u8 = 32;

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_ids(ids: impl IntoIterator<Item = u8>) -> Self {
        let mut set = Self::empty();
        for id in ids {
            set.insert(id);
        }
        set
    }

    /// Free colors plus the premium colors unlocked in `bitmap`.
    pub fn with_unlocks(free: ColorSet, bitmap: u32) -> Self {
        let premium = (bitmap as u64) << Self::FIRST_PREMIUM_ID;
        Self {
            bits: free.bits | premium,
        }
    }

    pub fn insert(&mut self, id: u8) {
        if (id as usize) < Self::CAPACITY {
            self.bits |= 1 << id;
        }
    }

    pub fn remove(&mut self, id: u8) {
        if (id as usize) < Self::CAPACITY {
            self.bits &= !(1 << id);
        }
    }

    /// Membership test; [`TRANSPARENT_ID`] is always usable.
    #[inline]
    pub fn contains(&self, id: u8) -> bool {
        id == TRANSPARENT_ID || ((id as usize) < Self::CAPACITY && self.bits & (1 << id) != 0)
    }

    /// Ids in the set, ascending, transparent excluded.
    pub fn ids(&self) -> impl Iterator<Item = u8> + '_ {
        (1..Self::CAPACITY as u8).filter(move |&id| self.bits & (1 << id) != 0)
    }

    pub fn len(&self) -> usize {
        (self.bits & !1).count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
